//! Outbound connection establishment.
//!
//! [`Connector::connect`] walks the resolved candidates in order:
//!
//! 1. create a socket (nonblocking in pollable mode);
//! 2. if a deadline is set on a blocking socket, flip it to nonblocking so
//!    `connect()` cannot hang;
//! 3. `connect()`; on "in progress" wait for writability within the deadline
//!    and read `SO_ERROR`;
//! 4. apply `TCP_NODELAY`;
//! 5. run the TLS handshake when a client context is configured, still
//!    within the deadline;
//! 6. restore blocking mode;
//! 7. close any previous socket and install the new transport.
//!
//! Only a failed socket creation moves on to the next candidate. Connect,
//! timeout and TLS failures end the attempt, unless
//! [`ConnectionOptions::try_all_addresses`] asks for socket-level connect
//! failures to fall through as well.

use std::io::{Read, Write};
use std::net::SocketAddr;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rustls::{ClientConfig, ClientConnection};

use crate::addr::CandidateAddress;
use crate::deadline::Deadline;
use crate::error::{Error, ErrorKind, SocketError};
use crate::net::{Net, System};
use crate::options::ConnectionOptions;
use crate::poll::{Interest, Readiness};
use crate::socket::Connect;
use crate::tls::{self, TlsStream};

/// The byte stream of an established connection.
pub enum Transport<S: Read + Write> {
	Plain(S),
	Tls(Box<TlsStream<S>>),
}

impl<S: Read + Write> Transport<S> {
	pub fn socket(&self) -> &S {
		match self {
			Transport::Plain(socket) => socket,
			Transport::Tls(stream) => &stream.sock,
		}
	}

	pub fn tls_session(&self) -> Option<&ClientConnection> {
		match self {
			Transport::Plain(_) => None,
			Transport::Tls(stream) => Some(&stream.conn),
		}
	}

	/// Ends the TLS session (best-effort close_notify) and returns the socket.
	pub fn into_socket(self) -> S {
		match self {
			Transport::Plain(socket) => socket,
			Transport::Tls(stream) => {
				let mut stream = *stream;
				stream.conn.send_close_notify();
				if let Err(err) = stream.conn.write_tls(&mut stream.sock) {
					tracing::trace!(error = %err, "close_notify not sent");
				}
				stream.sock
			}
		}
	}
}

impl<S: Read + Write> Read for Transport<S> {
	fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
		match self {
			Transport::Plain(socket) => socket.read(buf),
			Transport::Tls(stream) => stream.read(buf),
		}
	}
}

impl<S: Read + Write> Write for Transport<S> {
	fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
		match self {
			Transport::Plain(socket) => socket.write(buf),
			Transport::Tls(stream) => stream.write(buf),
		}
	}

	fn flush(&mut self) -> std::io::Result<()> {
		match self {
			Transport::Plain(socket) => socket.flush(),
			Transport::Tls(stream) => stream.flush(),
		}
	}
}

struct Active<S: Read + Write> {
	transport: Transport<S>,
	nonblocking: bool,
	peer: SocketAddr,
}

/// Client side of a TCP (optionally TLS) connection.
///
/// Holds at most one socket. Calling [`connect`](Self::connect) again replaces
/// it: the new connection is established first, then the old socket is
/// closed and the new one installed.
pub struct Connector<N: Net = System> {
	net: N,
	options: ConnectionOptions,
	tls: Option<Arc<ClientConfig>>,
	active: Option<Active<N::Socket>>,
}

impl Connector<System> {
	/// Creates a connector backed by the operating system.
	///
	/// Fails only when a TLS configuration is present and cannot be turned
	/// into a client context.
	pub fn new(options: ConnectionOptions) -> Result<Self, Error> {
		Self::with_net(options, System::new())
	}
}

impl<N: Net> Connector<N> {
	pub fn with_net(options: ConnectionOptions, net: N) -> Result<Self, Error> {
		let tls = options.tls_config().map(tls::client_context).transpose()?;
		Ok(Self {
			net,
			options,
			tls,
			active: None,
		})
	}

	/// Validates a raw deadline, then connects.
	///
	/// Invalid values fail with [`Error::Argument`] before anything is
	/// resolved or created.
	pub fn connect_within<T>(&mut self, deadline: T) -> Result<(), Error>
	where
		T: TryInto<Deadline, Error = Error>,
	{
		let deadline = deadline.try_into()?;
		self.connect(Some(deadline))
	}

	/// Establishes a connection, replacing any current one on success.
	///
	/// With `None` the connect (and TLS handshake) may block indefinitely.
	/// When the deadline expires while waiting, the error is
	/// [`Error::Timeout`]. On failure the previous connection, if any, is left
	/// untouched.
	pub fn connect(&mut self, deadline: Option<Deadline>) -> Result<(), Error> {
		let started = Instant::now();
		let budget = deadline.map(Deadline::as_duration);
		let host = self.options.host();
		let port = self.options.port();

		let candidates = self.net.resolve(host, port, false)?;

		let mut last_err = None;
		for candidate in &candidates {
			tracing::debug!(%candidate, pollable = self.options.is_pollable(), "trying candidate");

			let socket = match self.net.create(candidate, self.options.is_pollable()) {
				Ok(socket) => socket,
				Err(err) => {
					tracing::debug!(%candidate, error = %err, "socket creation failed, trying next");
					last_err = Some(Error::from(err));
					continue;
				}
			};

			match self.establish(socket, candidate, budget, started) {
				Ok(active) => {
					if let Some(old) = self.active.take() {
						tracing::debug!(peer = %old.peer, "closing previous connection");
						self.net.close(old.transport.into_socket());
					}
					tracing::info!(
						peer = %active.peer,
						tls = active.transport.tls_session().is_some(),
						nonblocking = active.nonblocking,
						"connected"
					);
					self.active = Some(active);
					return Ok(());
				}
				Err(err) if self.options.tries_all_addresses() && err.kind() == ErrorKind::Socket => {
					tracing::debug!(%candidate, error = %err, "connect failed, trying next");
					last_err = Some(err);
				}
				Err(err) => {
					tracing::warn!(%candidate, error = %err, "connect failed");
					return Err(err);
				}
			}
		}

		Err(last_err.unwrap_or_else(|| Error::Resolution {
			host: host.to_owned(),
			port,
			reason: "no address".into(),
		}))
	}

	/// Connects, optionally negotiates TLS, and closes `socket` on any failure.
	fn establish(
		&self,
		socket: N::Socket,
		candidate: &CandidateAddress,
		budget: Option<Duration>,
		started: Instant,
	) -> Result<Active<N::Socket>, Error> {
		let mut nonblocking = match self.connect_socket(&socket, candidate, budget, started) {
			Ok(nonblocking) => nonblocking,
			Err(err) => {
				self.net.close(socket);
				return Err(err);
			}
		};

		let transport = match &self.tls {
			None => Transport::Plain(socket),
			Some(ctx) => {
				let fd = socket.as_raw_fd();
				let server_name = self.options.effective_server_name();
				let handshake = tls::client_handshake(ctx, socket, server_name, |interest| {
					self.wait(fd, interest, candidate, budget, started)
				});
				match handshake {
					Ok(stream) => {
						if nonblocking && !self.options.is_pollable() {
							if let Err(err) = self.net.set_nonblocking(&stream.sock, false) {
								self.net.close(stream.sock);
								return Err(err.into());
							}
							nonblocking = false;
						}
						Transport::Tls(Box::new(stream))
					}
					Err((err, socket)) => {
						self.net.close(socket);
						return Err(err);
					}
				}
			}
		};

		Ok(Active {
			transport,
			nonblocking,
			peer: candidate.addr,
		})
	}

	/// Runs `connect()` to completion. Returns whether the socket is left nonblocking.
	///
	/// A socket flipped to nonblocking for the deadline stays that way when a
	/// TLS handshake follows, so the handshake waits are bounded too.
	/// [`establish`](Self::establish) restores blocking mode once it is done.
	fn connect_socket(
		&self,
		socket: &N::Socket,
		candidate: &CandidateAddress,
		budget: Option<Duration>,
		started: Instant,
	) -> Result<bool, Error> {
		let pollable = self.options.is_pollable();
		let mut nonblocking = pollable;

		if !nonblocking && budget.is_some() {
			self.net.set_nonblocking(socket, true)?;
			nonblocking = true;
		}

		match self.net.connect(socket, candidate)? {
			Connect::Connected => {}
			Connect::InProgress => {
				self.wait(socket.as_raw_fd(), Interest::Writable, candidate, budget, started)?;
				if let Some(errno) = self.net.pending_error(socket)? {
					return Err(SocketError::Connect { errno, addr: candidate.to_string() }.into());
				}
			}
		}

		if nonblocking && !pollable && self.tls.is_none() {
			self.net.set_nonblocking(socket, false)?;
			nonblocking = false;
		}

		if self.options.effective_nodelay() {
			self.net.set_nodelay(socket, true)?;
		}
		Ok(nonblocking)
	}

	fn wait(
		&self,
		fd: RawFd,
		interest: Interest,
		candidate: &CandidateAddress,
		budget: Option<Duration>,
		started: Instant,
	) -> Result<(), Error> {
		let left = budget.map(|total| total.saturating_sub(started.elapsed()));
		tracing::trace!(fd, ?interest, ?left, "waiting for readiness");

		let readiness = if self.options.is_pollable() {
			self.net.wait_pollable(fd, interest, left)?
		} else {
			self.net.wait_blocking(fd, interest, left)?
		};
		match readiness {
			Readiness::Ready => Ok(()),
			Readiness::TimedOut => Err(Error::Timeout {
				addr: candidate.to_string(),
				elapsed: started.elapsed(),
			}),
		}
	}

	/// Closes the current connection. Does nothing when not connected.
	pub fn close(&mut self) {
		if let Some(active) = self.active.take() {
			tracing::debug!(peer = %active.peer, "closing connection");
			self.net.close(active.transport.into_socket());
		}
	}

	pub fn is_connected(&self) -> bool {
		self.active.is_some()
	}

	pub fn peer_addr(&self) -> Option<SocketAddr> {
		self.active.as_ref().map(|a| a.peer)
	}

	/// Whether the installed socket is in nonblocking mode.
	pub fn is_nonblocking(&self) -> Option<bool> {
		self.active.as_ref().map(|a| a.nonblocking)
	}

	pub fn as_raw_fd(&self) -> Option<RawFd> {
		self.active.as_ref().map(|a| a.transport.socket().as_raw_fd())
	}

	pub fn transport(&self) -> Option<&Transport<N::Socket>> {
		self.active.as_ref().map(|a| &a.transport)
	}

	pub fn transport_mut(&mut self) -> Option<&mut Transport<N::Socket>> {
		self.active.as_mut().map(|a| &mut a.transport)
	}

	/// Hands over the established transport, leaving the connector empty.
	pub fn into_transport(mut self) -> Option<Transport<N::Socket>> {
		self.active.take().map(|a| a.transport)
	}

	/// Toggles `TCP_NODELAY` on the current connection.
	pub fn set_nodelay(&self, enable: bool) -> Result<(), Error> {
		let active = self.active.as_ref().ok_or(SocketError::SetOption {
			errno: libc::ENOTCONN,
			option: "TCP_NODELAY",
		})?;
		self.net.set_nodelay(active.transport.socket(), enable)?;
		Ok(())
	}

	pub fn options(&self) -> &ConnectionOptions {
		&self.options
	}

	pub fn net(&self) -> &N {
		&self.net
	}
}

fn not_connected() -> std::io::Error {
	std::io::Error::new(std::io::ErrorKind::NotConnected, "connector has no active connection")
}

impl<N: Net> Read for Connector<N> {
	fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
		self.transport_mut().ok_or_else(not_connected)?.read(buf)
	}
}

impl<N: Net> Write for Connector<N> {
	fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
		self.transport_mut().ok_or_else(not_connected)?.write(buf)
	}

	fn flush(&mut self) -> std::io::Result<()> {
		self.transport_mut().ok_or_else(not_connected)?.flush()
	}
}
