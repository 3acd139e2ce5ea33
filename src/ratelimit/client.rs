//! Per-client limiter backed by a bounded LRU of token buckets.

// std
use std::num::NonZeroUsize;
// crates.io
use lru::LruCache;
// self
use crate::{
	_prelude::*,
	ratelimit::{
		ClientKeyFn, LimiterConfig, LimiterConfigError, RateLimitDecision, RateLimiter,
		RequestMeta, TokenBucket, client_key_ip,
	},
};

type SharedBucket = Arc<Mutex<TokenBucket>>;

/// Limits each client independently; the least recently seen client loses its bucket when the
/// cache is full, so it starts over with a full burst.
pub struct ClientLimiter {
	config: LimiterConfig,
	buckets: Mutex<LruCache<String, SharedBucket>>,
	key_fn: ClientKeyFn,
}
impl ClientLimiter {
	/// Builds a limiter keyed by [`client_key_ip`].
	pub fn new(rate: &str, burst: i64, cache_size: usize) -> Result<Self, LimiterConfigError> {
		Self::with_key_fn(rate, burst, cache_size, Arc::new(client_key_ip))
	}

	/// Builds a limiter keyed by `key_fn`.
	pub fn with_key_fn(
		rate: &str,
		burst: i64,
		cache_size: usize,
		key_fn: ClientKeyFn,
	) -> Result<Self, LimiterConfigError> {
		Self::from_config(LimiterConfig::new(rate, burst)?, cache_size, key_fn)
	}

	/// Builds a limiter from an already validated configuration.
	pub fn from_config(
		config: LimiterConfig,
		cache_size: usize,
		key_fn: ClientKeyFn,
	) -> Result<Self, LimiterConfigError> {
		let capacity = NonZeroUsize::new(cache_size).ok_or(LimiterConfigError::ZeroCacheSize)?;

		Ok(Self { config, buckets: Mutex::new(LruCache::new(capacity)), key_fn })
	}

	/// Number of clients currently tracked.
	pub fn tracked_clients(&self) -> usize {
		self.buckets.lock().len()
	}

	/// Looks up or creates the bucket for `key` under one cache lock, marking it most recently
	/// used; concurrent first sightings of a key therefore share a single bucket.
	fn bucket_for(&self, key: String) -> SharedBucket {
		self.buckets
			.lock()
			.get_or_insert(key, || Arc::new(Mutex::new(TokenBucket::new(&self.config))))
			.clone()
	}
}
impl RateLimiter for ClientLimiter {
	fn decide(&self, now: OffsetDateTime, request: &RequestMeta<'_>) -> RateLimitDecision {
		let key = (self.key_fn)(request);
		// The cache lock is released before the bucket is locked.
		let bucket = self.bucket_for(key.clone());
		let decision = RateLimitDecision::from_bucket(&mut bucket.lock(), now);

		#[cfg(feature = "tracing")]
		if !decision.is_allowed() {
			tracing::debug!(client = %key, "client rate limit exceeded");
		}

		decision
	}
}
impl Debug for ClientLimiter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientLimiter")
			.field("config", &self.config)
			.field("tracked_clients", &self.tracked_clients())
			.finish()
	}
}
