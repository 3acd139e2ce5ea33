//! Token bucket driven by caller-supplied instants.

// self
use crate::{_prelude::*, ratelimit::LimiterConfig};

const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// Continuous-refill token bucket.
///
/// The bucket starts full. Every call refills for the time elapsed (capped at capacity) before
/// trying to consume one token; an instant earlier than the last observed one refills nothing.
///
/// Credit is kept in integer units where one token equals the rate period in nanoseconds, so a
/// rate of `N` per period adds exactly `N` units per elapsed nanosecond and a call exactly one
/// token interval later always finds a whole token.
#[derive(Clone, Debug)]
pub struct TokenBucket {
	credit: u128,
	capacity: u128,
	token_cost: u128,
	refill_per_nano: u128,
	last_refill: Option<OffsetDateTime>,
}
impl TokenBucket {
	/// Creates a full bucket from a validated limiter configuration.
	pub fn new(config: &LimiterConfig) -> Self {
		let rate = config.rate();
		let token_cost = u128::from(rate.period_secs()) * NANOS_PER_SECOND;
		let capacity = u128::from(config.burst()) * token_cost;

		Self {
			credit: capacity,
			capacity,
			token_cost,
			refill_per_nano: u128::from(rate.count()),
			last_refill: None,
		}
	}

	/// Refills for the time elapsed up to `now` and consumes one token when available.
	pub fn try_acquire(&mut self, now: OffsetDateTime) -> bool {
		self.refill(now);

		if self.credit >= self.token_cost {
			self.credit -= self.token_cost;

			true
		} else {
			false
		}
	}

	/// Wait until one token becomes available, or `None` if the bucket can never refill.
	pub fn retry_after(&self) -> Option<Duration> {
		if self.refill_per_nano == 0 || self.capacity < self.token_cost {
			return None;
		}

		let deficit = self.token_cost.saturating_sub(self.credit);
		let nanos = deficit.div_ceil(self.refill_per_nano);

		Some(Duration::nanoseconds(i64::try_from(nanos).unwrap_or(i64::MAX)))
	}

	/// Tokens currently available, as of the last refill.
	pub fn tokens(&self) -> f64 {
		self.credit as f64 / self.token_cost as f64
	}

	fn refill(&mut self, now: OffsetDateTime) {
		match self.last_refill {
			Some(last) if now > last => {
				let elapsed = u128::try_from((now - last).whole_nanoseconds()).unwrap_or(0);
				let earned = elapsed.saturating_mul(self.refill_per_nano);

				self.credit = self.credit.saturating_add(earned).min(self.capacity);
				self.last_refill = Some(now);
			},
			Some(_) => {},
			None => self.last_refill = Some(now),
		}
	}
}
