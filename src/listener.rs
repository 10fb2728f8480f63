use std::net::SocketAddr;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::Arc;

use rustls::ServerConfig;

use crate::addr::CandidateAddress;
use crate::error::Error;
use crate::net::{Net, System};
use crate::options::ListenerOptions;
use crate::tls::{self, TlsConfig};

/// A bound server socket, plus the TLS context for accepted connections.
///
/// Construction either yields a bound socket or an error; a socket that
/// fails configuration or `bind()` is closed before the error is returned.
/// Accepting connections and running server handshakes is left to the
/// caller, using [`socket`](Self::socket) and [`tls_context`](Self::tls_context).
pub struct Listener<N: Net = System> {
	net: N,
	socket: N::Socket,
	nonblocking: bool,
	backlog: i32,
	tls_context: Option<Arc<ServerConfig>>,
	tls_config: Option<TlsConfig>,
}

impl Listener<System> {
	pub fn bind(options: ListenerOptions) -> Result<Self, Error> {
		Self::bind_with(options, System::new())
	}
}

impl<N: Net> Listener<N> {
	/// Builds the TLS context (if any), resolves passive addresses and binds
	/// the first candidate a socket can be created for.
	///
	/// The TLS context comes first, so a bad TLS configuration fails before
	/// any socket exists. Option and bind failures are not retried on later
	/// candidates.
	pub fn bind_with(options: ListenerOptions, net: N) -> Result<Self, Error> {
		let tls_context = options.tls_config().map(tls::server_context).transpose()?;

		let candidates = net.resolve(options.host(), options.port(), true)?;

		let mut last_err = None;
		for candidate in &candidates {
			let socket = match net.create(candidate, options.is_pollable()) {
				Ok(socket) => socket,
				Err(err) => {
					tracing::debug!(%candidate, error = %err, "socket creation failed, trying next");
					last_err = Some(Error::from(err));
					continue;
				}
			};

			if let Err(err) = configure(&net, &socket, candidate, &options) {
				tracing::warn!(%candidate, error = %err, "listener setup failed");
				net.close(socket);
				return Err(err);
			}

			match net.local_addr(&socket) {
				Ok(local) => tracing::info!(address = %local, tls = tls_context.is_some(), "listener bound"),
				Err(err) => tracing::info!(%candidate, error = %err, "listener bound, local address unknown"),
			}

			return Ok(Self {
				net,
				socket,
				nonblocking: options.is_pollable(),
				backlog: options.backlog_len(),
				tls_context,
				tls_config: options.tls_config().cloned(),
			});
		}

		Err(last_err.unwrap_or_else(|| Error::Resolution {
			host: options.host().to_owned(),
			port: options.port(),
			reason: "no address".into(),
		}))
	}

	/// Starts accepting connections with the configured backlog.
	pub fn listen(&self) -> Result<(), Error> {
		self.net.listen(&self.socket, self.backlog)?;
		Ok(())
	}

	/// The bound address; shows the kernel-assigned port after binding port 0.
	pub fn local_addr(&self) -> Result<SocketAddr, Error> {
		Ok(self.net.local_addr(&self.socket)?)
	}

	pub fn socket(&self) -> &N::Socket {
		&self.socket
	}

	pub fn is_nonblocking(&self) -> bool {
		self.nonblocking
	}

	pub fn tls_context(&self) -> Option<&Arc<ServerConfig>> {
		self.tls_context.as_ref()
	}

	pub fn tls_config(&self) -> Option<&TlsConfig> {
		self.tls_config.as_ref()
	}

	/// Gives up the socket and the server TLS context.
	pub fn into_parts(self) -> (N::Socket, Option<Arc<ServerConfig>>) {
		(self.socket, self.tls_context)
	}

	pub fn close(self) {
		self.net.close(self.socket);
	}
}

impl<N: Net> AsRawFd for Listener<N> {
	fn as_raw_fd(&self) -> RawFd {
		self.socket.as_raw_fd()
	}
}

fn configure<N: Net>(
	net: &N,
	socket: &N::Socket,
	candidate: &CandidateAddress,
	options: &ListenerOptions,
) -> Result<(), Error> {
	let reuse = options.reuse_config();
	if reuse.addr {
		net.set_reuse_addr(socket, true)?;
	}
	if reuse.port {
		net.set_reuse_port(socket, true)?;
	}
	if options.nodelay() {
		net.set_nodelay(socket, true)?;
	}
	net.bind(socket, candidate)?;
	Ok(())
}
