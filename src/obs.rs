//! Optional observability helpers for token, limiter, and handshake operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` (default) to emit spans named `authgate.op` carrying `op`, `stage`, and the
//!   final `outcome`, plus debug/info events from the refresh-token collector and limiters.
//! - Enable `metrics` to increment the `authgate_op_total` counter for every
//!   attempt/success/failure, labeled by `op` + `outcome`, and to publish the
//!   `authgate_refresh_tokens` gauge after each collection pass.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// Signing a new access or refresh token.
	TokenIssue,
	/// Verifying an access or refresh token.
	TokenVerify,
	/// One refresh-token garbage collection pass.
	RefreshTokenGc,
	/// A rate-limit admission decision.
	RateLimit,
	/// Parsing a signed OAuth2 state value.
	StateParse,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::TokenIssue => "token_issue",
			OpKind::TokenVerify => "token_verify",
			OpKind::RefreshTokenGc => "refresh_token_gc",
			OpKind::RateLimit => "rate_limit",
			OpKind::StateParse => "state_parse",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion (or an admitted request).
	Success,
	/// Failure propagated back to the caller (or a rejected request).
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}

	/// Maps a boolean result onto [`OpOutcome::Success`] or [`OpOutcome::Failure`].
	pub const fn from_ok(ok: bool) -> Self {
		if ok { OpOutcome::Success } else { OpOutcome::Failure }
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
