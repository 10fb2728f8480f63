use std::os::fd::AsRawFd;

use super::raw::RawSocket;
use crate::error::{SocketError, errno};

impl RawSocket {
    /// Reads and clears the socket error status (`SO_ERROR`).
    ///
    /// Returns `None` if no error is latched (connect succeeded).
    /// Returns `Some(errno)` if the asynchronous connect failed.
    ///
    /// Call this after the descriptor is reported writable.
    /// Reading clears the error, so only call once per attempt.
    pub fn take_error(&self) -> Result<Option<i32>, SocketError> {
        let mut error: libc::c_int = 0;
        let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;

        let result = unsafe {
            libc::getsockopt(
                self.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_ERROR,
                &mut error as *mut _ as *mut libc::c_void,
                &mut len,
            )
        };

        if result == -1 {
            return Err(SocketError::GetOption { errno: errno(), option: "SO_ERROR" });
        }

        if error == 0 {
            Ok(None)
        } else {
            Ok(Some(error))
        }
    }
}
/*
 Breaking it down:
  ┌───────────────────────────────────────────┬───────────────────────────────────────────┐
  │                   Line                    │                  Purpose                  │
  ├───────────────────────────────────────────┼───────────────────────────────────────────┤
  │ libc::SOL_SOCKET                          │ Socket-level option (not TCP/IP specific) │
  ├───────────────────────────────────────────┼───────────────────────────────────────────┤
  │ libc::SO_ERROR                            │ The latched asynchronous error            │
  ├───────────────────────────────────────────┼───────────────────────────────────────────┤
  │ error == 0                                │ Zero means the handshake completed        │
  └───────────────────────────────────────────┴───────────────────────────────────────────┘
 */
