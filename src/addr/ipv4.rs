use std::net::{Ipv4Addr, SocketAddrV4};

/// Converts to the raw sockaddr_in for syscalls.
pub(crate) fn to_raw(addr: &SocketAddrV4) -> libc::sockaddr_in {
	libc::sockaddr_in {
		sin_family: libc::AF_INET as libc::sa_family_t,
		sin_port: addr.port().to_be(),
		sin_addr: libc::in_addr {
			s_addr: u32::from_be_bytes(addr.ip().octets()).to_be(),
		},
		sin_zero: [0; 8],
	}
}

/// Creates from raw sockaddr_in.
pub(crate) fn from_raw(raw: &libc::sockaddr_in) -> SocketAddrV4 {
	SocketAddrV4::new(
		Ipv4Addr::from(raw.sin_addr.s_addr.to_ne_bytes()),
		u16::from_be(raw.sin_port),
	)
}

/*
sockaddr_in layout:
  - sin_family: AF_INET
  - sin_port: port in network byte order (big-endian)
  - sin_addr: IP address in network byte order
  - sin_zero: padding up to sizeof(sockaddr)
s_addr is stored as the in-memory bytes of the big-endian value, so
to_ne_bytes() hands back the octets in wire order.
 */
