use std::time::Duration;

/// Socket creation/configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("socket() failed: {}", describe(*.errno))]
    Create { errno: i32 },

    #[error("bind({addr}) failed: {}", describe(*.errno))]
    Bind { errno: i32, addr: String },

    #[error("listen(backlog={backlog}) failed: {}", describe(*.errno))]
    Listen { errno: i32, backlog: i32 },

    #[error("connect({addr}) failed: {}", describe(*.errno))]
    Connect { errno: i32, addr: String },

    #[error("setsockopt({option}) failed: {}", describe(*.errno))]
    SetOption { errno: i32, option: &'static str },

    #[error("getsockopt({option}) failed: {}", describe(*.errno))]
    GetOption { errno: i32, option: &'static str },

    #[error("waiting for readiness failed: {}", describe(*.errno))]
    Wait { errno: i32 },

    #[error("invalid address: {reason}")]
    InvalidAddress { reason: &'static str },
}

impl SocketError {
    /// The OS error code carried by this error, if any.
    pub fn errno(&self) -> Option<i32> {
        match self {
            SocketError::Create { errno }
            | SocketError::Bind { errno, .. }
            | SocketError::Listen { errno, .. }
            | SocketError::Connect { errno, .. }
            | SocketError::SetOption { errno, .. }
            | SocketError::GetOption { errno, .. }
            | SocketError::Wait { errno } => Some(*errno),
            SocketError::InvalidAddress { .. } => None,
        }
    }
}

/// TLS context and handshake errors.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("cannot read {what} from {source_name}: {source}")]
    Pem {
        what: &'static str,
        source_name: String,
        source: std::io::Error,
    },

    #[error("no {what} found in {source_name}")]
    Empty {
        what: &'static str,
        source_name: String,
    },

    #[error("server context needs a certificate chain and a private key")]
    MissingIdentity,

    #[error("invalid server name {0:?}")]
    ServerName(String),

    #[error(transparent)]
    Rustls(#[from] rustls::Error),

    #[error("handshake failed: {0}")]
    Handshake(std::io::Error),
}

/// Error returned by connection establishment and listener setup.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("cannot resolve {host}:{port}: {reason}")]
    Resolution {
        host: String,
        port: u16,
        reason: String,
    },

    #[error(transparent)]
    Socket(#[from] SocketError),

    #[error("connect({addr}) timed out after {elapsed:?}")]
    Timeout { addr: String, elapsed: Duration },

    #[error("tls: {0}")]
    Tls(#[from] TlsError),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Argument,
    Resolution,
    Socket,
    Timeout,
    Tls,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Argument(_) => ErrorKind::Argument,
            Error::Resolution { .. } => ErrorKind::Resolution,
            Error::Socket(_) => ErrorKind::Socket,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Tls(_) => ErrorKind::Tls,
        }
    }

    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// The OS error code behind a socket error, if there is one.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Error::Socket(err) => err.errno(),
            _ => None,
        }
    }
}

/// Returns current errno value.
#[inline]
pub(crate) fn errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

/// Converts errno to human-readable string.
pub fn describe(errno: i32) -> String {
    match errno {
        libc::EACCES => "permission denied".into(),
        libc::EADDRINUSE => "address already in use".into(),
        libc::EADDRNOTAVAIL => "address not available".into(),
        libc::EAFNOSUPPORT => "address family not supported".into(),
        libc::EAGAIN => "resource temporarily unavailable".into(),
        libc::EALREADY => "operation already in progress".into(),
        libc::EBADF => "bad file descriptor".into(),
        libc::ECONNREFUSED => "connection refused".into(),
        libc::ECONNRESET => "connection reset by peer".into(),
        libc::EHOSTUNREACH => "host unreachable".into(),
        libc::EINPROGRESS => "operation in progress".into(),
        libc::EINTR => "interrupted by signal".into(),
        libc::EINVAL => "invalid argument".into(),
        libc::EISCONN => "already connected".into(),
        libc::EMFILE => "too many open files".into(),
        libc::ENETUNREACH => "network unreachable".into(),
        libc::ENOBUFS => "no buffer space available".into(),
        libc::ENOPROTOOPT => "protocol not available".into(),
        libc::ENOTCONN => "not connected".into(),
        libc::EPIPE => "broken pipe".into(),
        libc::ETIMEDOUT => "connection timed out".into(),
        _ => format!("errno {}", errno),
    }
}

/// Maps errno to std::io::ErrorKind.
fn errno_to_kind(errno: i32) -> std::io::ErrorKind {
    match errno {
        libc::EACCES | libc::EPERM => std::io::ErrorKind::PermissionDenied,
        libc::EADDRINUSE => std::io::ErrorKind::AddrInUse,
        libc::EADDRNOTAVAIL => std::io::ErrorKind::AddrNotAvailable,
        libc::EAGAIN => std::io::ErrorKind::WouldBlock,
        libc::ECONNREFUSED => std::io::ErrorKind::ConnectionRefused,
        libc::ECONNRESET => std::io::ErrorKind::ConnectionReset,
        libc::EINTR => std::io::ErrorKind::Interrupted,
        libc::EINVAL => std::io::ErrorKind::InvalidInput,
        libc::ENOTCONN => std::io::ErrorKind::NotConnected,
        libc::EPIPE => std::io::ErrorKind::BrokenPipe,
        libc::ETIMEDOUT => std::io::ErrorKind::TimedOut,
        _ => std::io::ErrorKind::Other,
    }
}

impl From<SocketError> for std::io::Error {
    fn from(err: SocketError) -> Self {
        let kind = errno_to_kind(err.errno().unwrap_or(libc::EINVAL));
        std::io::Error::new(kind, err)
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::Argument(_) => std::io::ErrorKind::InvalidInput,
            Error::Resolution { .. } => std::io::ErrorKind::NotFound,
            Error::Socket(sock) => errno_to_kind(sock.errno().unwrap_or(libc::EINVAL)),
            Error::Timeout { .. } => std::io::ErrorKind::TimedOut,
            Error::Tls(_) => std::io::ErrorKind::InvalidData,
        };
        std::io::Error::new(kind, err)
    }
}
