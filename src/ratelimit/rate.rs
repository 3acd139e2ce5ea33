//! Rate strings (`N/s`, `N/m`, `N/h`) and validated limiter parameters.

// std
use std::sync::LazyLock;
// crates.io
use regex::Regex;
// self
use crate::_prelude::*;

static RATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^(0|[1-9][0-9]*)/([smh])$").expect("Rate pattern should be a valid regex.")
});

/// Errors raised while building a limiter.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum LimiterConfigError {
	/// The rate string does not match `N/s`, `N/m`, or `N/h`.
	#[error("Rate `{value}` is not a valid rate string.")]
	InvalidRate {
		/// Offending input.
		value: String,
	},
	/// The numerator does not fit in an unsigned 64-bit integer.
	#[error("Rate `{value}` does not fit in an unsigned 64-bit integer.")]
	RateOutOfRange {
		/// Offending input.
		value: String,
	},
	/// Burst sizes must be zero or positive.
	#[error("Burst size must be >= 0, got {burst}.")]
	NegativeBurst {
		/// Offending burst size.
		burst: i64,
	},
	/// Per-client limiters need room for at least one client.
	#[error("Client cache size must be positive.")]
	ZeroCacheSize,
}

/// Refill rate: `count` tokens every `period_secs` seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rate {
	count: u64,
	period_secs: u64,
}
impl Rate {
	/// Rate that never refills.
	pub const ZERO: Self = Self { count: 0, period_secs: 1 };

	/// Tokens added per period.
	pub fn count(self) -> u64 {
		self.count
	}

	/// Period length in seconds: 1, 60, or 3600.
	pub fn period_secs(self) -> u64 {
		self.period_secs
	}

	/// Returns the rate in tokens per second.
	pub fn per_second(self) -> f64 {
		self.count as f64 / self.period_secs as f64
	}
}
impl FromStr for Rate {
	type Err = LimiterConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let captures = RATE_PATTERN
			.captures(s)
			.ok_or_else(|| LimiterConfigError::InvalidRate { value: s.into() })?;
		let count = captures[1]
			.parse::<u64>()
			.map_err(|_| LimiterConfigError::RateOutOfRange { value: s.into() })?;
		let period_secs = match &captures[2] {
			"s" => 1,
			"m" => 60,
			_ => 3_600,
		};

		Ok(Self { count, period_secs })
	}
}

/// Validated rate and burst shared by every bucket of one limiter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LimiterConfig {
	rate: Rate,
	burst: u64,
}
impl LimiterConfig {
	/// Parses `rate` and checks that `burst` is not negative.
	pub fn new(rate: &str, burst: i64) -> Result<Self, LimiterConfigError> {
		let rate = rate.parse()?;
		let burst =
			u64::try_from(burst).map_err(|_| LimiterConfigError::NegativeBurst { burst })?;

		Ok(Self { rate, burst })
	}

	/// Refill rate.
	pub fn rate(&self) -> Rate {
		self.rate
	}

	/// Bucket capacity.
	pub fn burst(&self) -> u64 {
		self.burst
	}
}
