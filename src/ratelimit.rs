//! Token-bucket admission control.
//!
//! [`GlobalLimiter`] shares one bucket between every caller; [`ClientLimiter`] keeps one bucket
//! per client key in a bounded LRU cache. Both consult the instant the caller passes in, so a
//! [`Clock`](crate::clock::Clock) (or a test) fully controls refill.

mod bucket;
mod client;
mod client_key;
mod global;
mod rate;

pub use bucket::*;
pub use client::*;
pub use client_key::*;
pub use global::*;
pub use rate::*;

// self
use crate::{
	_prelude::*,
	obs::{self, OpKind, OpOutcome},
};

/// Admission check shared by global and per-client limiters.
pub trait RateLimiter
where
	Self: Send + Sync,
{
	/// Decides whether `request`, observed at `now`, may proceed.
	fn decide(&self, now: OffsetDateTime, request: &RequestMeta<'_>) -> RateLimitDecision;

	/// Returns `true` if `request` may proceed.
	fn allow(&self, now: OffsetDateTime, request: &RequestMeta<'_>) -> bool {
		self.decide(now, request).is_allowed()
	}

	/// Like [`RateLimiter::decide`], mapping a denial onto [`Error::RateLimitExceeded`].
	fn check(&self, now: OffsetDateTime, request: &RequestMeta<'_>) -> Result<()> {
		match self.decide(now, request) {
			RateLimitDecision::Allow => Ok(()),
			RateLimitDecision::Deny(retry) => Err(Error::RateLimitExceeded(retry)),
		}
	}
}

/// Result of one admission check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
	/// The request may proceed immediately.
	Allow,
	/// The request was rejected; the directive is absent when the bucket can never refill.
	Deny(Option<RetryDirective>),
}
impl RateLimitDecision {
	/// Returns `true` for [`RateLimitDecision::Allow`].
	pub fn is_allowed(&self) -> bool {
		matches!(self, Self::Allow)
	}

	pub(crate) fn from_bucket(bucket: &mut TokenBucket, now: OffsetDateTime) -> Self {
		let decision = if bucket.try_acquire(now) {
			Self::Allow
		} else {
			Self::Deny(bucket.retry_after().and_then(|wait| {
				now.checked_add(wait).map(|retry_at| RetryDirective::new(retry_at, wait))
			}))
		};

		obs::record_outcome(OpKind::RateLimit, OpOutcome::from_ok(decision.is_allowed()));

		decision
	}
}

/// Advises callers when to retry after a [`RateLimitDecision::Deny`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryDirective {
	/// Instant when one token will be available again.
	pub earliest_retry_at: OffsetDateTime,
	/// Suggested backoff duration.
	pub recommended_backoff: Duration,
	/// Optional descriptive string.
	pub reason: Option<String>,
}
impl RetryDirective {
	/// Creates a new directive with the provided timing metadata.
	pub fn new(earliest_retry_at: OffsetDateTime, recommended_backoff: Duration) -> Self {
		Self { earliest_retry_at, recommended_backoff, reason: None }
	}

	/// Adds a human-readable reason.
	pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
		self.reason = Some(reason.into());

		self
	}

	/// Whole seconds suitable for a `Retry-After` header, rounded up.
	pub fn retry_after_secs(&self) -> u64 {
		let backoff = self.recommended_backoff;
		let secs = backoff.whole_seconds() + i64::from(backoff.subsec_nanoseconds() > 0);

		u64::try_from(secs).unwrap_or(0)
	}
}
