// self
use crate::obs::{OpKind, OpOutcome};

/// Counter incremented once per recorded outcome, labeled by `op` and `outcome`.
pub const OP_TOTAL: &str = "authgate_op_total";
/// Gauge holding the number of registered refresh tokens after each collection pass.
pub const REFRESH_TOKENS: &str = "authgate_refresh_tokens";

/// Counts `outcome` for `kind` on the global recorder; a no-op without the `metrics` feature.
pub fn record_outcome(kind: OpKind, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(OP_TOTAL, "op" => kind.as_str(), "outcome" => outcome.as_str()).increment(1);

	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}

/// Publishes the refresh-token registry size.
pub fn record_refresh_tokens(count: usize) {
	#[cfg(feature = "metrics")]
	metrics::gauge!(REFRESH_TOKENS).set(count as f64);

	#[cfg(not(feature = "metrics"))]
	let _ = count;
}
