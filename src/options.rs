use crate::tls::TlsConfig;

// ============================================================================
// Shared Configuration Structs
// ============================================================================

/// Address reuse configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReuseConfig {
	pub addr: bool,
	pub port: bool,
}

impl Default for ReuseConfig {
	fn default() -> Self {
		Self {
			addr: true,  // Almost always want this for servers
			port: false,
		}
	}
}

impl ReuseConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn addr(mut self, enable: bool) -> Self {
		self.addr = enable;
		self
	}

	pub fn port(mut self, enable: bool) -> Self {
		self.port = enable;
		self
	}

	/// Enable both for load balancing across threads.
	pub fn both(mut self) -> Self {
		self.addr = true;
		self.port = true;
		self
	}
}

// ============================================================================
// Connection Options
// ============================================================================

/// Settings for an outbound connection.
///
/// # Example
/// ```ignore
/// use tcplane::{ConnectionOptions, Connector, TlsConfig};
///
/// let mut conn = Connector::new(
///     ConnectionOptions::new("example.com", 443)
///         .tls(TlsConfig::new().alpn(["http/1.1"]))
///         .tcp_nodelay(true),
/// )?;
/// conn.connect_within(5_000u64)?;
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
	host: String,
	port: u16,
	tcp_nodelay: Option<bool>,
	tls: Option<TlsConfig>,
	server_name: Option<String>,
	pollable: bool,
	try_all: bool,
}

impl ConnectionOptions {
	pub fn new(host: impl Into<String>, port: u16) -> Self {
		Self {
			host: host.into(),
			port,
			tcp_nodelay: None,
			tls: None,
			server_name: None,
			pollable: false,
			try_all: false,
		}
	}

	pub fn tcp_nodelay(mut self, enable: bool) -> Self {
		self.tcp_nodelay = Some(enable);
		self
	}

	pub fn tls(mut self, config: TlsConfig) -> Self {
		self.tls = Some(config);
		self
	}

	/// Name checked against the server certificate. Defaults to the host.
	pub fn server_name(mut self, name: impl Into<String>) -> Self {
		self.server_name = Some(name.into());
		self
	}

	/// Marks the caller as running under a cooperative poller.
	///
	/// Sockets are then created nonblocking, readiness waits go through the
	/// pollable wait, and `TCP_NODELAY` is on unless set explicitly.
	pub fn pollable(mut self, enable: bool) -> Self {
		self.pollable = enable;
		self
	}

	/// Lets a refused or failed `connect()` move on to the next candidate.
	///
	/// Off by default: a connect error ends the attempt. Timeouts and TLS
	/// failures end it either way.
	pub fn try_all_addresses(mut self, enable: bool) -> Self {
		self.try_all = enable;
		self
	}

	pub fn host(&self) -> &str {
		&self.host
	}

	pub fn port(&self) -> u16 {
		self.port
	}

	pub fn tls_config(&self) -> Option<&TlsConfig> {
		self.tls.as_ref()
	}

	pub fn tries_all_addresses(&self) -> bool {
		self.try_all
	}

	pub fn effective_server_name(&self) -> &str {
		self.server_name.as_deref().unwrap_or(&self.host)
	}

	pub fn is_pollable(&self) -> bool {
		self.pollable
	}

	/// `TCP_NODELAY` as it will be applied: the explicit value, else the pollable flag.
	pub fn effective_nodelay(&self) -> bool {
		self.tcp_nodelay.unwrap_or(self.pollable)
	}
}

// ============================================================================
// Listener Options
// ============================================================================

/// Settings for a listening socket.
///
/// # Example
/// ```ignore
/// use tcplane::{Listener, ListenerOptions};
///
/// let listener = Listener::bind(ListenerOptions::new("0.0.0.0", 8080).reuse_port(true))?;
/// listener.listen()?;
/// ```
#[derive(Debug, Clone)]
pub struct ListenerOptions {
	host: String,
	port: u16,
	reuse: ReuseConfig,
	tcp_nodelay: bool,
	tls: Option<TlsConfig>,
	pollable: bool,
	backlog: i32,
}

impl ListenerOptions {
	pub fn new(host: impl Into<String>, port: u16) -> Self {
		Self {
			host: host.into(),
			port,
			reuse: ReuseConfig::default(),
			tcp_nodelay: false,
			tls: None,
			pollable: false,
			backlog: 128,
		}
	}

	/// Set address reuse options.
	pub fn reuse(mut self, config: ReuseConfig) -> Self {
		self.reuse = config;
		self
	}

	pub fn reuse_addr(mut self, enable: bool) -> Self {
		self.reuse.addr = enable;
		self
	}

	pub fn reuse_port(mut self, enable: bool) -> Self {
		self.reuse.port = enable;
		self
	}

	pub fn tcp_nodelay(mut self, enable: bool) -> Self {
		self.tcp_nodelay = enable;
		self
	}

	pub fn tls(mut self, config: TlsConfig) -> Self {
		self.tls = Some(config);
		self
	}

	pub fn pollable(mut self, enable: bool) -> Self {
		self.pollable = enable;
		self
	}

	/// Set listen backlog. Default: 128.
	pub fn backlog(mut self, backlog: i32) -> Self {
		self.backlog = backlog;
		self
	}

	pub fn host(&self) -> &str {
		&self.host
	}

	pub fn port(&self) -> u16 {
		self.port
	}

	pub fn reuse_config(&self) -> ReuseConfig {
		self.reuse
	}

	pub fn nodelay(&self) -> bool {
		self.tcp_nodelay
	}

	pub fn tls_config(&self) -> Option<&TlsConfig> {
		self.tls.as_ref()
	}

	pub fn is_pollable(&self) -> bool {
		self.pollable
	}

	pub fn backlog_len(&self) -> i32 {
		self.backlog
	}
}
