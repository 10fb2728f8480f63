//! Candidate addresses and name resolution.
//!
//! Resolution turns a `{host, port}` pair into an ordered list of
//! [`CandidateAddress`] values. Order is the resolver's preference order and
//! is the order the connector and listener try them in.

mod ipv4;
mod ipv6;

use std::ffi::{CStr, CString};
use std::fmt;
use std::net::SocketAddr;

use crate::error::{Error, describe, errno};

/// Address family of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
	V4,
	V6,
}

impl Family {
	/// Returns the libc constant for this address family.
	#[inline]
	pub fn raw(self) -> libc::c_int {
		match self {
			Family::V4 => libc::AF_INET,
			Family::V6 => libc::AF_INET6,
		}
	}

	pub fn of(addr: &SocketAddr) -> Self {
		match addr {
			SocketAddr::V4(_) => Family::V4,
			SocketAddr::V6(_) => Family::V6,
		}
	}
}

/// One resolved endpoint to attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateAddress {
	pub family: Family,
	pub socktype: libc::c_int,
	pub protocol: libc::c_int,
	pub addr: SocketAddr,
}

impl CandidateAddress {
	/// A TCP stream candidate for `addr`.
	pub fn tcp(addr: SocketAddr) -> Self {
		Self {
			family: Family::of(&addr),
			socktype: libc::SOCK_STREAM,
			protocol: libc::IPPROTO_TCP,
			addr,
		}
	}
}

impl fmt::Display for CandidateAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.addr.fmt(f)
	}
}

/// Trait for address types that can be converted to raw sockaddr for syscalls.
pub(crate) trait ToSockAddr {
	/// Calls the provided closure with a pointer to the raw sockaddr and its size.
	fn with_raw<F, R>(&self, f: F) -> R
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R;
}

impl ToSockAddr for SocketAddr {
	fn with_raw<F, R>(&self, f: F) -> R
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R,
	{
		// the raw struct lives on this stack frame until the closure returns
		match self {
			SocketAddr::V4(v4) => {
				let raw = ipv4::to_raw(v4);
				let len = std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
				f(&raw as *const _ as *const libc::sockaddr, len)
			}
			SocketAddr::V6(v6) => {
				let raw = ipv6::to_raw(v6);
				let len = std::mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t;
				f(&raw as *const _ as *const libc::sockaddr, len)
			}
		}
	}
}

/// Creates an address from raw sockaddr storage.
///
/// Returns `None` for families other than AF_INET/AF_INET6 or a short length.
///
/// # Safety
/// `addr` must point to at least `len` readable bytes.
pub(crate) unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<SocketAddr> {
	if addr.is_null() || (len as usize) < std::mem::size_of::<libc::sa_family_t>() {
		return None;
	}
	let family = unsafe { (*addr).sa_family } as libc::c_int;
	match family {
		libc::AF_INET if len as usize >= std::mem::size_of::<libc::sockaddr_in>() => {
			let raw = unsafe { &*(addr as *const libc::sockaddr_in) };
			Some(SocketAddr::V4(ipv4::from_raw(raw)))
		}
		libc::AF_INET6 if len as usize >= std::mem::size_of::<libc::sockaddr_in6>() => {
			let raw = unsafe { &*(addr as *const libc::sockaddr_in6) };
			Some(SocketAddr::V6(ipv6::from_raw(raw)))
		}
		_ => None,
	}
}

/// Frees the getaddrinfo list when dropped.
struct AddrInfoList(*mut libc::addrinfo);

impl Drop for AddrInfoList {
	fn drop(&mut self) {
		if !self.0.is_null() {
			unsafe { libc::freeaddrinfo(self.0) };
		}
	}
}

/// Resolves `host`/`port` into stream candidates with `getaddrinfo`.
///
/// `passive` asks for bind-intent addresses; with an empty host or `"*"` that
/// yields the wildcard address.
pub fn resolve(host: &str, port: u16, passive: bool) -> Result<Vec<CandidateAddress>, Error> {
	let fail = |reason: String| Error::Resolution {
		host: host.to_owned(),
		port,
		reason,
	};

	let node = if passive && (host.is_empty() || host == "*") {
		None
	} else {
		Some(CString::new(host).map_err(|_| fail("host contains a NUL byte".into()))?)
	};
	let service = CString::new(port.to_string()).map_err(|_| fail("invalid port".into()))?;

	let mut hints: libc::addrinfo = unsafe { std::mem::zeroed() };
	hints.ai_family = libc::AF_UNSPEC;
	hints.ai_socktype = libc::SOCK_STREAM;
	hints.ai_protocol = libc::IPPROTO_TCP;
	hints.ai_flags = libc::AI_NUMERICSERV | if passive { libc::AI_PASSIVE } else { 0 };

	let mut res: *mut libc::addrinfo = std::ptr::null_mut();
	let rc = unsafe {
		libc::getaddrinfo(
			node.as_ref().map_or(std::ptr::null(), |n| n.as_ptr()),
			service.as_ptr(),
			&hints,
			&mut res,
		)
	};
	if rc != 0 {
		let reason = if rc == libc::EAI_SYSTEM {
			describe(errno())
		} else {
			unsafe { CStr::from_ptr(libc::gai_strerror(rc)) }.to_string_lossy().into_owned()
		};
		return Err(fail(reason));
	}
	let list = AddrInfoList(res);

	let mut candidates = Vec::new();
	let mut cur = list.0;
	while !cur.is_null() {
		let ai = unsafe { &*cur };
		if let Some(addr) = unsafe { from_sockaddr(ai.ai_addr, ai.ai_addrlen) } {
			candidates.push(CandidateAddress {
				family: Family::of(&addr),
				socktype: ai.ai_socktype,
				protocol: ai.ai_protocol,
				addr,
			});
		}
		cur = ai.ai_next;
	}

	if candidates.is_empty() {
		return Err(fail("no address".into()));
	}
	tracing::trace!(host, port, passive, count = candidates.len(), "resolved");
	Ok(candidates)
}
