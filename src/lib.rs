//! TCP connectors and listeners with optional TLS.
//!
//! A [`Connector`] resolves a host, tries each candidate address, handles the
//! nonblocking "connect in progress" case with a deadline, and can run a TLS
//! handshake on the result. A [`Listener`] resolves a bind address and hands
//! back a configured, bound socket plus a server TLS context.
//!
//! Blocking versus pollable behaviour is chosen per connector/listener with
//! the `pollable` option; there is no global mode.

pub mod socket;
pub mod poll;
pub mod tls;
mod addr;
mod connector;
mod deadline;
mod error;
mod listener;
mod net;
mod options;

pub use self::addr::{CandidateAddress, Family, resolve};
pub use self::connector::{Connector, Transport};
pub use self::deadline::Deadline;
pub use self::error::{Error, ErrorKind, SocketError, TlsError, describe};
pub use self::listener::Listener;
pub use self::net::{Net, System};
pub use self::options::{ConnectionOptions, ListenerOptions, ReuseConfig};
pub use self::poll::{Interest, Poller, Readiness};
pub use self::socket::{Connect, RawSocket};
pub use self::tls::{Pem, TlsConfig, TlsStream};
