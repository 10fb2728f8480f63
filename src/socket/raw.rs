use std::net::SocketAddr;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};

use crate::addr::{CandidateAddress, ToSockAddr, from_sockaddr};
use crate::error::{SocketError, errno};

/// Outcome of issuing `connect()` on a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connect {
	/// The handshake completed inside the call.
	Connected,
	/// The kernel is finishing the handshake asynchronously. Wait for
	/// writability, then read the deferred error with `take_error()`.
	InProgress,
}

/// A TCP socket descriptor.
///
/// The descriptor is created with `SOCK_CLOEXEC` and closed when the value
/// is dropped.
#[derive(Debug)]
pub struct RawSocket {
	fd: OwnedFd,
}

impl RawSocket {
	/// Creates a socket for the candidate's family, type and protocol.
	///
	/// With `nonblocking` the descriptor is created with `SOCK_NONBLOCK`, so
	/// there is no window where it is blocking.
	pub fn new(candidate: &CandidateAddress, nonblocking: bool) -> Result<Self, SocketError> {
		let mut ty = candidate.socktype | libc::SOCK_CLOEXEC;
		if nonblocking {
			ty |= libc::SOCK_NONBLOCK;
		}
		let fd = unsafe { libc::socket(candidate.family.raw(), ty, candidate.protocol) };
		if fd == -1 {
			return Err(SocketError::Create { errno: errno() });
		}
		let fd = unsafe { OwnedFd::from_raw_fd(fd) };

		Ok(Self { fd })
	}

	/// Sets or clears `O_NONBLOCK`.
	pub fn set_nonblocking(&self, nonblocking: bool) -> Result<(), SocketError> {
		let flags = unsafe { libc::fcntl(self.as_raw_fd(), libc::F_GETFL) };

		if flags == -1 {
			return Err(SocketError::GetOption { errno: errno(), option: "F_GETFL" });
		}

		let new_flags = if nonblocking {
			flags | libc::O_NONBLOCK
		} else {
			flags & !libc::O_NONBLOCK
		};
		if new_flags == flags {
			return Ok(());
		}

		let result = unsafe { libc::fcntl(self.as_raw_fd(), libc::F_SETFL, new_flags) };

		if result == -1 {
			return Err(SocketError::SetOption { errno: errno(), option: "O_NONBLOCK" });
		}

		Ok(())
	}

	/// Reports whether `O_NONBLOCK` is currently set.
	pub fn is_nonblocking(&self) -> Result<bool, SocketError> {
		let flags = unsafe { libc::fcntl(self.as_raw_fd(), libc::F_GETFL) };
		if flags == -1 {
			return Err(SocketError::GetOption { errno: errno(), option: "F_GETFL" });
		}
		Ok(flags & libc::O_NONBLOCK != 0)
	}

	/// Issues `connect()`.
	///
	/// `EINPROGRESS` on a nonblocking socket and `EINTR` on a blocking one both
	/// mean the kernel carries on with the handshake; either is reported as
	/// [`Connect::InProgress`]. Every other failure is returned as an error.
	pub fn connect(&self, addr: &SocketAddr) -> Result<Connect, SocketError> {
		let result = addr.with_raw(|ptr, len| unsafe { libc::connect(self.as_raw_fd(), ptr, len) });

		if result == 0 {
			return Ok(Connect::Connected);
		}
		match errno() {
			libc::EINPROGRESS | libc::EINTR => Ok(Connect::InProgress),
			e => Err(SocketError::Connect { errno: e, addr: addr.to_string() }),
		}
	}

	/// Binds the socket to an address.
	pub fn bind(&self, addr: &SocketAddr) -> Result<(), SocketError> {
		let result = addr.with_raw(|ptr, len| unsafe { libc::bind(self.as_raw_fd(), ptr, len) });

		if result == -1 {
			return Err(SocketError::Bind { errno: errno(), addr: addr.to_string() });
		}
		Ok(())
	}

	/// Marks a bound socket as accepting connections.
	pub fn listen(&self, backlog: i32) -> Result<(), SocketError> {
		let result = unsafe { libc::listen(self.as_raw_fd(), backlog) };

		if result == -1 {
			return Err(SocketError::Listen { errno: errno(), backlog });
		}
		Ok(())
	}

	/// Returns the local address, including a kernel-assigned port.
	pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
		let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
		let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;

		let result = unsafe {
			libc::getsockname(self.as_raw_fd(), &mut storage as *mut _ as *mut libc::sockaddr, &mut len)
		};
		if result == -1 {
			return Err(SocketError::GetOption { errno: errno(), option: "getsockname" });
		}

		unsafe { from_sockaddr(&storage as *const _ as *const libc::sockaddr, len) }
			.ok_or(SocketError::InvalidAddress { reason: "unsupported local address family" })
	}

	pub(crate) fn into_fd(self) -> OwnedFd {
		self.fd
	}
}

impl std::io::Read for RawSocket {
	fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
		(&*self).read(buf)
	}
}

impl std::io::Read for &RawSocket {
	fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
		let n = unsafe { libc::read(self.as_raw_fd(), buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };

		if n == -1 {
			Err(std::io::Error::last_os_error())
		} else {
			Ok(n as usize)
		}
	}
}

impl std::io::Write for RawSocket {
	fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
		(&*self).write(buf)
	}

	fn flush(&mut self) -> std::io::Result<()> {
		Ok(())
	}
}

impl std::io::Write for &RawSocket {
	fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
		// MSG_NOSIGNAL: a closed peer yields EPIPE instead of SIGPIPE
		let n = unsafe {
			libc::send(
				self.as_raw_fd(),
				buf.as_ptr() as *const libc::c_void,
				buf.len(),
				libc::MSG_NOSIGNAL,
			)
		};

		if n == -1 {
			Err(std::io::Error::last_os_error())
		} else {
			Ok(n as usize)
		}
	}

	fn flush(&mut self) -> std::io::Result<()> {
		Ok(())
	}
}

impl AsRawFd for RawSocket {
	fn as_raw_fd(&self) -> RawFd {
		self.fd.as_raw_fd()
	}
}

impl AsFd for RawSocket {
	fn as_fd(&self) -> BorrowedFd<'_> {
		self.fd.as_fd()
	}
}

impl FromRawFd for RawSocket {
	unsafe fn from_raw_fd(fd: RawFd) -> Self {
		unsafe { Self { fd: OwnedFd::from_raw_fd(fd) } }
	}
}

impl IntoRawFd for RawSocket {
	fn into_raw_fd(self) -> RawFd {
		self.fd.into_raw_fd()
	}
}

impl From<RawSocket> for OwnedFd {
	fn from(socket: RawSocket) -> Self {
		socket.into_fd()
	}
}

/*
Why connect() reports EINTR as in progress:
A blocking connect() interrupted by a signal does not abort the handshake.
The kernel keeps going, and calling connect() again gives EALREADY.
The only correct follow-up is the same as for EINPROGRESS:
wait for writability, then read SO_ERROR.
*/
