//! Readiness waits on a single descriptor.
//!
//! Two flavours exist. [`wait`] parks the calling thread in `poll(2)`.
//! [`Poller`] routes the wait through an epoll instance owned by a caller that
//! already drives its own loop. Both treat a `None` deadline as "wait forever"
//! and a zero deadline as a single non-blocking probe.

use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::{Duration, Instant};

use crate::error::{SocketError, errno};

/// What the caller is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
	Readable,
	Writable,
}

impl Interest {
	fn poll_events(self) -> libc::c_short {
		match self {
			Interest::Readable => libc::POLLIN,
			Interest::Writable => libc::POLLOUT,
		}
	}

	fn epoll_events(self) -> u32 {
		match self {
			Interest::Readable => libc::EPOLLIN as u32,
			Interest::Writable => libc::EPOLLOUT as u32,
		}
	}
}

/// Result of a readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
	/// The descriptor is ready, or has an error/hangup condition pending.
	Ready,
	TimedOut,
}

/// Milliseconds left before `deadline`, rounded up, in the form poll/epoll take.
fn timeout_ms(deadline: Option<Duration>, start: Instant) -> libc::c_int {
	match deadline {
		None => -1,
		Some(total) => {
			let left = total.saturating_sub(start.elapsed());
			let mut ms = left.as_millis();
			if Duration::from_millis(ms as u64) < left {
				ms += 1;
			}
			ms.min(libc::c_int::MAX as u128) as libc::c_int
		}
	}
}

/// Blocks the calling thread until `fd` is ready for `interest` or `deadline` passes.
///
/// `POLLERR`/`POLLHUP` count as ready; the caller is expected to read the
/// deferred error afterwards. `EINTR` restarts the wait with the time left.
pub fn wait(fd: RawFd, interest: Interest, deadline: Option<Duration>) -> Result<Readiness, SocketError> {
	let start = Instant::now();
	loop {
		let mut pfd = libc::pollfd {
			fd,
			events: interest.poll_events(),
			revents: 0,
		};
		let n = unsafe { libc::poll(&mut pfd, 1, timeout_ms(deadline, start)) };
		match n {
			-1 => {
				let e = errno();
				if e == libc::EINTR {
					continue;
				}
				return Err(SocketError::Wait { errno: e });
			}
			0 => return Ok(Readiness::TimedOut),
			_ if pfd.revents & libc::POLLNVAL != 0 => return Err(SocketError::Wait { errno: libc::EBADF }),
			_ => return Ok(Readiness::Ready),
		}
	}
}

/// An epoll instance used for readiness waits in pollable mode.
///
/// Each wait registers the descriptor one-shot, waits, and removes it again,
/// so the poller never holds on to a descriptor it was not asked about.
/// Events for descriptors registered by someone else are skipped.
#[derive(Debug)]
pub struct Poller {
	epfd: OwnedFd,
}

impl Poller {
	pub fn new() -> Result<Self, SocketError> {
		let fd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
		if fd == -1 {
			return Err(SocketError::Create { errno: errno() });
		}
		Ok(Self {
			epfd: unsafe { OwnedFd::from_raw_fd(fd) },
		})
	}

	pub fn wait(&self, fd: RawFd, interest: Interest, deadline: Option<Duration>) -> Result<Readiness, SocketError> {
		let mut event = libc::epoll_event {
			events: interest.epoll_events() | libc::EPOLLONESHOT as u32,
			u64: fd as u64,
		};
		let mut rc = unsafe { libc::epoll_ctl(self.epfd.as_raw_fd(), libc::EPOLL_CTL_ADD, fd, &mut event) };
		if rc == -1 && errno() == libc::EEXIST {
			rc = unsafe { libc::epoll_ctl(self.epfd.as_raw_fd(), libc::EPOLL_CTL_MOD, fd, &mut event) };
		}
		if rc == -1 {
			return Err(SocketError::Wait { errno: errno() });
		}

		let outcome = self.wait_registered(fd, deadline);

		unsafe {
			libc::epoll_ctl(self.epfd.as_raw_fd(), libc::EPOLL_CTL_DEL, fd, std::ptr::null_mut());
		}
		outcome
	}

	fn wait_registered(&self, fd: RawFd, deadline: Option<Duration>) -> Result<Readiness, SocketError> {
		let start = Instant::now();
		let mut events = [libc::epoll_event { events: 0, u64: 0 }; 8];
		loop {
			let n = unsafe {
				libc::epoll_wait(
					self.epfd.as_raw_fd(),
					events.as_mut_ptr(),
					events.len() as libc::c_int,
					timeout_ms(deadline, start),
				)
			};
			if n == -1 {
				let e = errno();
				if e == libc::EINTR {
					continue;
				}
				return Err(SocketError::Wait { errno: e });
			}
			if n == 0 {
				return Ok(Readiness::TimedOut);
			}
			for event in &events[..n as usize] {
				let token = event.u64;
				if token == fd as u64 {
					return Ok(Readiness::Ready);
				}
			}
		}
	}
}

impl AsRawFd for Poller {
	fn as_raw_fd(&self) -> RawFd {
		self.epfd.as_raw_fd()
	}
}
