//! Single-bucket limiter shared by every caller.

// self
use crate::{
	_prelude::*,
	ratelimit::{
		LimiterConfig, LimiterConfigError, RateLimitDecision, RateLimiter, RequestMeta, TokenBucket,
	},
};

/// Limits the aggregate request rate regardless of who is calling.
#[derive(Debug)]
pub struct GlobalLimiter {
	bucket: Mutex<TokenBucket>,
}
impl GlobalLimiter {
	/// Builds a limiter from a rate string such as `100/h` and a burst size.
	pub fn new(rate: &str, burst: i64) -> Result<Self, LimiterConfigError> {
		Ok(Self::from_config(&LimiterConfig::new(rate, burst)?))
	}

	/// Builds a limiter from an already validated configuration.
	pub fn from_config(config: &LimiterConfig) -> Self {
		Self { bucket: Mutex::new(TokenBucket::new(config)) }
	}

	/// Returns `true` if a request observed at `now` may proceed.
	pub fn allow(&self, now: OffsetDateTime) -> bool {
		self.decision(now).is_allowed()
	}

	/// Consumes a token for `now`, reporting a retry hint on denial.
	pub fn decision(&self, now: OffsetDateTime) -> RateLimitDecision {
		let decision = RateLimitDecision::from_bucket(&mut self.bucket.lock(), now);

		#[cfg(feature = "tracing")]
		if !decision.is_allowed() {
			tracing::debug!("global rate limit exceeded");
		}

		decision
	}
}
impl RateLimiter for GlobalLimiter {
	fn decide(&self, now: OffsetDateTime, _: &RequestMeta<'_>) -> RateLimitDecision {
		self.decision(now)
	}
}
