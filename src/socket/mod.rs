mod options;
mod pending;
mod raw;

pub use self::options::{reuse_addr, reuse_port, set_reuse_addr, set_reuse_port, set_tcp_nodelay, tcp_nodelay};
pub use self::raw::{Connect, RawSocket};
