use std::os::fd::AsRawFd;

use crate::error::{SocketError, errno};

fn set_int<S: AsRawFd>(
	socket: &S,
	level: libc::c_int,
	name: libc::c_int,
	val: libc::c_int,
	option: &'static str,
) -> Result<(), SocketError> {
	let result = unsafe {
		libc::setsockopt(
			socket.as_raw_fd(),
			level,
			name,
			&val as *const _ as *const libc::c_void,
			std::mem::size_of::<libc::c_int>() as libc::socklen_t,
		)
	};
	if result == -1 {
		Err(SocketError::SetOption { errno: errno(), option })
	} else {
		Ok(())
	}
}

fn get_int<S: AsRawFd>(
	socket: &S,
	level: libc::c_int,
	name: libc::c_int,
	option: &'static str,
) -> Result<libc::c_int, SocketError> {
	let mut val: libc::c_int = 0;
	let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
	let result = unsafe {
		libc::getsockopt(
			socket.as_raw_fd(),
			level,
			name,
			&mut val as *mut _ as *mut libc::c_void,
			&mut len,
		)
	};
	if result == -1 {
		Err(SocketError::GetOption { errno: errno(), option })
	} else {
		Ok(val)
	}
}

/// Sets SO_REUSEADDR on a socket.
///
/// Allows binding to an address that's in TIME_WAIT state.
/// Essential for server restarts.
pub fn set_reuse_addr<S: AsRawFd>(socket: &S, enable: bool) -> Result<(), SocketError> {
	set_int(socket, libc::SOL_SOCKET, libc::SO_REUSEADDR, enable as libc::c_int, "SO_REUSEADDR")
}

/// Sets SO_REUSEPORT on a socket.
///
/// Allows multiple sockets to bind the same port.
/// Used for load balancing across threads/processes.
pub fn set_reuse_port<S: AsRawFd>(socket: &S, enable: bool) -> Result<(), SocketError> {
	set_int(socket, libc::SOL_SOCKET, libc::SO_REUSEPORT, enable as libc::c_int, "SO_REUSEPORT")
}

/// Sets TCP_NODELAY on a socket.
///
/// Disables Nagle's algorithm, so small writes go out immediately.
pub fn set_tcp_nodelay<S: AsRawFd>(socket: &S, enable: bool) -> Result<(), SocketError> {
	set_int(socket, libc::IPPROTO_TCP, libc::TCP_NODELAY, enable as libc::c_int, "TCP_NODELAY")
}

pub fn reuse_addr<S: AsRawFd>(socket: &S) -> Result<bool, SocketError> {
	get_int(socket, libc::SOL_SOCKET, libc::SO_REUSEADDR, "SO_REUSEADDR").map(|v| v != 0)
}

pub fn reuse_port<S: AsRawFd>(socket: &S) -> Result<bool, SocketError> {
	get_int(socket, libc::SOL_SOCKET, libc::SO_REUSEPORT, "SO_REUSEPORT").map(|v| v != 0)
}

pub fn tcp_nodelay<S: AsRawFd>(socket: &S) -> Result<bool, SocketError> {
	get_int(socket, libc::IPPROTO_TCP, libc::TCP_NODELAY, "TCP_NODELAY").map(|v| v != 0)
}
