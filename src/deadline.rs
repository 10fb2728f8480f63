use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;

/// A connect deadline in whole milliseconds.
///
/// Values that did not start life as a `u64` or a `Duration` go through
/// `TryFrom`/`FromStr`, which reject anything that is not a non-negative
/// integer with [`Error::Argument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(u64);

impl Deadline {
	#[inline]
	pub const fn from_millis(ms: u64) -> Self {
		Self(ms)
	}

	#[inline]
	pub const fn as_millis(self) -> u64 {
		self.0
	}

	#[inline]
	pub const fn as_duration(self) -> Duration {
		Duration::from_millis(self.0)
	}
}

impl From<u64> for Deadline {
	fn from(ms: u64) -> Self {
		Self(ms)
	}
}

impl From<u32> for Deadline {
	fn from(ms: u32) -> Self {
		Self(ms.into())
	}
}

impl From<Duration> for Deadline {
	/// Truncates to whole milliseconds; saturates at `u64::MAX`.
	fn from(d: Duration) -> Self {
		Self(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
	}
}

impl TryFrom<i64> for Deadline {
	type Error = Error;

	fn try_from(ms: i64) -> Result<Self, Error> {
		u64::try_from(ms)
			.map(Self)
			.map_err(|_| Error::Argument(format!("deadline must be non-negative, got {ms}")))
	}
}

impl TryFrom<i32> for Deadline {
	type Error = Error;

	fn try_from(ms: i32) -> Result<Self, Error> {
		Self::try_from(i64::from(ms))
	}
}

impl TryFrom<f64> for Deadline {
	type Error = Error;

	fn try_from(ms: f64) -> Result<Self, Error> {
		if !ms.is_finite() || ms.fract() != 0.0 {
			return Err(Error::Argument(format!("deadline must be an integer, got {ms}")));
		}
		if ms < 0.0 {
			return Err(Error::Argument(format!("deadline must be non-negative, got {ms}")));
		}
		if ms > u64::MAX as f64 {
			return Err(Error::Argument(format!("deadline out of range: {ms}")));
		}
		Ok(Self(ms as u64))
	}
}

impl FromStr for Deadline {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Error> {
		s.trim()
			.parse::<u64>()
			.map(Self)
			.map_err(|_| Error::Argument(format!("deadline must be a non-negative integer, got {s:?}")))
	}
}

impl TryFrom<&str> for Deadline {
	type Error = Error;

	fn try_from(s: &str) -> Result<Self, Error> {
		s.parse()
	}
}
