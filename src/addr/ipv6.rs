use std::net::{Ipv6Addr, SocketAddrV6};

/// Converts to the raw sockaddr_in6 for syscalls.
pub(crate) fn to_raw(addr: &SocketAddrV6) -> libc::sockaddr_in6 {
	libc::sockaddr_in6 {
		sin6_family: libc::AF_INET6 as libc::sa_family_t,
		sin6_port: addr.port().to_be(),
		sin6_flowinfo: addr.flowinfo(),
		sin6_addr: libc::in6_addr {
			s6_addr: addr.ip().octets(),
		},
		sin6_scope_id: addr.scope_id(),
	}
}

/// Creates from raw sockaddr_in6.
pub(crate) fn from_raw(raw: &libc::sockaddr_in6) -> SocketAddrV6 {
	SocketAddrV6::new(
		Ipv6Addr::from(raw.sin6_addr.s6_addr),
		u16::from_be(raw.sin6_port),
		raw.sin6_flowinfo,
		raw.sin6_scope_id,
	)
}

/*
Two extra fields compared to IPv4:
- sin6_flowinfo: traffic class and flow label (usually 0)
- sin6_scope_id: interface index for link-local addresses like fe80::
*/
