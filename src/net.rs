//! The primitives the connector and listener are built on.
//!
//! [`Net`] bundles name resolution, the raw socket calls and both readiness
//! waits behind one seam. [`System`] is the real implementation over libc.

use std::io::{Read, Write};
use std::net::SocketAddr;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::Arc;
use std::time::Duration;

use crate::addr::{self, CandidateAddress};
use crate::error::{Error, SocketError};
use crate::poll::{self, Interest, Poller, Readiness};
use crate::socket::{self, Connect, RawSocket};

/// Socket primitives used during connection establishment and listener setup.
///
/// Every method maps onto one system call (or one resolver call). Sockets are
/// owned values; dropping one closes its descriptor.
pub trait Net {
	type Socket: AsRawFd + Read + Write;

	fn resolve(&self, host: &str, port: u16, passive: bool) -> Result<Vec<CandidateAddress>, Error>;

	fn create(&self, candidate: &CandidateAddress, nonblocking: bool) -> Result<Self::Socket, SocketError>;

	fn set_nonblocking(&self, socket: &Self::Socket, nonblocking: bool) -> Result<(), SocketError>;

	fn connect(&self, socket: &Self::Socket, candidate: &CandidateAddress) -> Result<Connect, SocketError>;

	/// Reads and clears the deferred connect error.
	fn pending_error(&self, socket: &Self::Socket) -> Result<Option<i32>, SocketError>;

	fn set_reuse_addr(&self, socket: &Self::Socket, enable: bool) -> Result<(), SocketError>;

	fn set_reuse_port(&self, socket: &Self::Socket, enable: bool) -> Result<(), SocketError>;

	fn set_nodelay(&self, socket: &Self::Socket, enable: bool) -> Result<(), SocketError>;

	fn bind(&self, socket: &Self::Socket, candidate: &CandidateAddress) -> Result<(), SocketError>;

	fn listen(&self, socket: &Self::Socket, backlog: i32) -> Result<(), SocketError>;

	fn local_addr(&self, socket: &Self::Socket) -> Result<SocketAddr, SocketError>;

	fn close(&self, socket: Self::Socket) {
		drop(socket);
	}

	/// Waits by blocking the calling thread.
	fn wait_blocking(&self, fd: RawFd, interest: Interest, deadline: Option<Duration>) -> Result<Readiness, SocketError>;

	/// Waits through the caller's event loop.
	fn wait_pollable(&self, fd: RawFd, interest: Interest, deadline: Option<Duration>) -> Result<Readiness, SocketError>;
}

/// The operating system's sockets, resolver and pollers.
#[derive(Debug, Clone, Default)]
pub struct System {
	poller: Option<Arc<Poller>>,
}

impl System {
	pub fn new() -> Self {
		Self::default()
	}

	/// Routes pollable-mode waits through `poller`.
	///
	/// Without a poller, pollable waits use `poll(2)` like blocking ones.
	pub fn with_poller(poller: Arc<Poller>) -> Self {
		Self { poller: Some(poller) }
	}

	pub fn poller(&self) -> Option<&Arc<Poller>> {
		self.poller.as_ref()
	}
}

impl Net for System {
	type Socket = RawSocket;

	fn resolve(&self, host: &str, port: u16, passive: bool) -> Result<Vec<CandidateAddress>, Error> {
		addr::resolve(host, port, passive)
	}

	fn create(&self, candidate: &CandidateAddress, nonblocking: bool) -> Result<RawSocket, SocketError> {
		RawSocket::new(candidate, nonblocking)
	}

	fn set_nonblocking(&self, socket: &RawSocket, nonblocking: bool) -> Result<(), SocketError> {
		socket.set_nonblocking(nonblocking)
	}

	fn connect(&self, socket: &RawSocket, candidate: &CandidateAddress) -> Result<Connect, SocketError> {
		socket.connect(&candidate.addr)
	}

	fn pending_error(&self, socket: &RawSocket) -> Result<Option<i32>, SocketError> {
		socket.take_error()
	}

	fn set_reuse_addr(&self, socket: &RawSocket, enable: bool) -> Result<(), SocketError> {
		socket::set_reuse_addr(socket, enable)
	}

	fn set_reuse_port(&self, socket: &RawSocket, enable: bool) -> Result<(), SocketError> {
		socket::set_reuse_port(socket, enable)
	}

	fn set_nodelay(&self, socket: &RawSocket, enable: bool) -> Result<(), SocketError> {
		socket::set_tcp_nodelay(socket, enable)
	}

	fn bind(&self, socket: &RawSocket, candidate: &CandidateAddress) -> Result<(), SocketError> {
		socket.bind(&candidate.addr)
	}

	fn listen(&self, socket: &RawSocket, backlog: i32) -> Result<(), SocketError> {
		socket.listen(backlog)
	}

	fn local_addr(&self, socket: &RawSocket) -> Result<SocketAddr, SocketError> {
		socket.local_addr()
	}

	fn close(&self, socket: RawSocket) {
		tracing::trace!(fd = socket.as_raw_fd(), "closing socket");
		drop(socket);
	}

	fn wait_blocking(&self, fd: RawFd, interest: Interest, deadline: Option<Duration>) -> Result<Readiness, SocketError> {
		poll::wait(fd, interest, deadline)
	}

	fn wait_pollable(&self, fd: RawFd, interest: Interest, deadline: Option<Duration>) -> Result<Readiness, SocketError> {
		match &self.poller {
			Some(poller) => poller.wait(fd, interest, deadline),
			None => poll::wait(fd, interest, deadline),
		}
	}
}
