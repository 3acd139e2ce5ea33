//! In-process refresh-token registry, the sole source of refresh-token revocation.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::_prelude::*;

/// Thread-safe counters describing registry activity.
#[derive(Debug, Default)]
pub struct RegistryMetrics {
	registered: AtomicU64,
	revoked: AtomicU64,
	collected: AtomicU64,
}
impl RegistryMetrics {
	/// Returns the number of refresh tokens registered since startup.
	pub fn registered(&self) -> u64 {
		self.registered.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh tokens removed by explicit deletion.
	pub fn revoked(&self) -> u64 {
		self.revoked.load(Ordering::Relaxed)
	}

	/// Returns the number of expired refresh tokens removed by the collector.
	pub fn collected(&self) -> u64 {
		self.collected.load(Ordering::Relaxed)
	}
}

/// Mapping from raw refresh token to its expiry instant.
#[derive(Debug, Default)]
pub struct RefreshTokenRegistry {
	entries: RwLock<HashMap<String, OffsetDateTime>>,
	metrics: RegistryMetrics,
}
impl RefreshTokenRegistry {
	/// Registers `raw` until `expires_at`.
	pub fn insert(&self, raw: impl Into<String>, expires_at: OffsetDateTime) {
		self.entries.write().insert(raw.into(), expires_at);
		self.metrics.registered.fetch_add(1, Ordering::Relaxed);
	}

	/// Returns `true` if `raw` is registered.
	pub fn contains(&self, raw: &str) -> bool {
		self.entries.read().contains_key(raw)
	}

	/// Removes `raw`; returns `false` when it was already absent.
	pub fn remove(&self, raw: &str) -> bool {
		let removed = self.entries.write().remove(raw).is_some();

		if removed {
			self.metrics.revoked.fetch_add(1, Ordering::Relaxed);
		}

		removed
	}

	/// Snapshots, under the read lock, every token whose expiry lies strictly before `instant`.
	pub fn expired_before(&self, instant: OffsetDateTime) -> Vec<String> {
		self.entries
			.read()
			.iter()
			.filter(|(_, expires_at)| **expires_at < instant)
			.map(|(raw, _)| raw.clone())
			.collect()
	}

	/// Removes a batch of tokens under a single write lock and returns how many were present.
	pub fn remove_batch(&self, batch: &[String]) -> usize {
		let mut guard = self.entries.write();
		let removed = batch.iter().filter(|raw| guard.remove(raw.as_str()).is_some()).count();

		drop(guard);

		self.metrics.collected.fetch_add(removed as u64, Ordering::Relaxed);

		removed
	}

	/// Number of registered tokens.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Returns `true` when no refresh token is registered.
	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}

	/// Activity counters.
	pub fn metrics(&self) -> &RegistryMetrics {
		&self.metrics
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn expired_snapshot_is_strictly_before_now() {
		let now = macros::datetime!(2025-11-10 12:00 UTC);
		let registry = RefreshTokenRegistry::default();

		registry.insert("past", now - Duration::seconds(1));
		registry.insert("exact", now);
		registry.insert("future", now + Duration::hours(1));

		assert_eq!(registry.expired_before(now), vec!["past".to_string()]);
	}

	#[test]
	fn remove_is_idempotent_and_counted_once() {
		let registry = RefreshTokenRegistry::default();

		registry.insert("token", macros::datetime!(2025-11-10 12:00 UTC));

		assert!(registry.remove("token"));
		assert!(!registry.remove("token"));
		assert_eq!(registry.metrics().revoked(), 1);
		assert!(registry.is_empty());
	}

	#[test]
	fn batch_removal_skips_missing_entries() {
		let registry = RefreshTokenRegistry::default();
		let expiry = macros::datetime!(2025-11-10 12:00 UTC);

		registry.insert("a", expiry);
		registry.insert("b", expiry);

		let removed = registry.remove_batch(&["a".into(), "b".into(), "c".into()]);

		assert_eq!(removed, 2);
		assert_eq!(registry.metrics().collected(), 2);
		assert_eq!(registry.metrics().registered(), 2);
	}
}
