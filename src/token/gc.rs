//! Background collection of expired refresh tokens.

// crates.io
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	obs::{self, OpKind, OpOutcome, OpSpan},
	token::TokenService,
};

impl TokenService {
	/// Runs one collection pass and returns the number of removed refresh tokens.
	///
	/// Expired entries are snapshotted under the read lock, then removed in batches of
	/// [`TokenServiceConfig::gc_batch_size`](crate::token::TokenServiceConfig::gc_batch_size),
	/// each under its own write lock, so readers are never blocked for the whole pass.
	pub fn collect_expired(&self) -> usize {
		let span = OpSpan::new(OpKind::RefreshTokenGc, "collect_expired").entered();

		span.record(OpOutcome::Attempt);

		let now = self.clock.now();
		let expired = self.registry.expired_before(now);
		let removed = expired
			.chunks(self.config.gc_batch_size.max(1))
			.map(|batch| self.registry.remove_batch(batch))
			.sum::<usize>();

		let remaining = self.registry.len();

		#[cfg(feature = "tracing")]
		tracing::debug!(
			candidates = expired.len(),
			removed,
			remaining,
			"refresh token collection pass finished"
		);

		span.record(OpOutcome::Success);
		obs::record_refresh_tokens(remaining);

		removed
	}

	/// Collects immediately, then once per jittered period until `cancel` fires.
	pub async fn run(&self, cancel: CancellationToken) {
		#[cfg(feature = "tracing")]
		tracing::info!(
			period_secs = self.config.gc_period.as_secs_f64(),
			jitter = self.config.gc_jitter,
			batch_size = self.config.gc_batch_size,
			"refresh token collector started"
		);

		loop {
			self.collect_expired();

			tokio::select! {
				_ = cancel.cancelled() => break,
				_ = tokio::time::sleep(self.next_collection_delay()) => {},
			}
		}

		#[cfg(feature = "tracing")]
		tracing::info!("refresh token collector stopped");
	}

	/// Starts [`TokenService::run`] on the current Tokio runtime.
	pub fn spawn(self: Arc<Self>) -> GcHandle {
		let cancel = CancellationToken::new();
		let child = cancel.clone();
		let span = OpSpan::new(OpKind::RefreshTokenGc, "run");
		let task = tokio::spawn(async move { span.instrument(self.run(child)).await });

		GcHandle { cancel, task }
	}

	fn next_collection_delay(&self) -> StdDuration {
		let period = self.config.gc_period;
		let jitter = self.config.gc_jitter;

		if jitter <= 0.0 {
			return period;
		}

		// Unrepresentable delays fall back to the base period.
		StdDuration::try_from_secs_f64(
			period.as_secs_f64() * (1.0 + rand::random::<f64>() * jitter),
		)
		.unwrap_or(period)
	}
}

/// Handle to a spawned refresh-token collector.
#[derive(Debug)]
pub struct GcHandle {
	cancel: CancellationToken,
	task: JoinHandle<()>,
}
impl GcHandle {
	/// Signals the collector to stop without waiting for it.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Returns `true` once the collector task has exited.
	pub fn is_finished(&self) -> bool {
		self.task.is_finished()
	}

	/// Cancels the collector and waits for the task to exit.
	pub async fn shutdown(self) -> Result<(), JoinError> {
		self.cancel.cancel();
		self.task.await
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{_preludet::*, clock::Clock, token::TokenServiceConfig};

	#[test]
	fn pass_removes_only_expired_tokens_in_batches() {
		let clock = test_clock();
		let service = test_token_service_with(
			clock.clone(),
			TokenServiceConfig { gc_batch_size: 2, ..Default::default() },
		);

		for _ in 0..5 {
			service
				.issue_refresh_token(Duration::seconds(30), "admin")
				.expect("Short refresh token should be issued.");
		}

		let keeper = service
			.issue_refresh_token(Duration::hours(1), "admin")
			.expect("Long refresh token should be issued.");

		assert_eq!(service.collect_expired(), 0);

		clock.advance(Duration::minutes(1));

		assert_eq!(service.collect_expired(), 5);
		assert_eq!(service.refresh_token_count(), 1);
		assert!(service.verify_refresh_token(keeper.raw.expose()).is_ok());
		assert_eq!(service.registry().metrics().collected(), 5);
	}

	#[test]
	fn jitter_never_shortens_the_period() {
		let service = test_token_service_with(
			test_clock(),
			TokenServiceConfig { gc_jitter: 0.5, ..Default::default() },
		);

		for _ in 0..32 {
			let delay = service.next_collection_delay();

			assert!(delay >= StdDuration::from_secs(60));
			assert!(delay < StdDuration::from_secs(90));
		}
	}

	#[test]
	fn oversized_jitter_falls_back_to_the_period() {
		let service = test_token_service_with(
			test_clock(),
			TokenServiceConfig { gc_jitter: 1e300, ..Default::default() },
		);
		let delay = service.next_collection_delay();

		assert!(delay >= StdDuration::from_secs(60));
	}

	#[tokio::test(start_paused = true)]
	async fn spawned_collector_prunes_on_tick_and_stops_on_shutdown() {
		let clock = test_clock();
		let service = Arc::new(test_token_service_with(clock.clone(), TokenServiceConfig::default()));

		service
			.issue_refresh_token(Duration::seconds(30), "admin")
			.expect("Refresh token should be issued.");

		let handle = service.clone().spawn();

		tokio::task::yield_now().await;

		assert_eq!(service.refresh_token_count(), 1);

		clock.advance(Duration::minutes(1));
		tokio::time::sleep(StdDuration::from_secs(61)).await;

		assert_eq!(service.refresh_token_count(), 0);
		assert!(clock.now() > TEST_EPOCH);

		handle.shutdown().await.expect("Collector task should join cleanly.");
	}
}
