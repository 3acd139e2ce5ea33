//! Crate-level error types shared across tokens, limiters, handshakes, and cookies.

// self
use crate::{
	_prelude::*,
	config::ConfigError,
	cookies::CookieError,
	ratelimit::{LimiterConfigError, RetryDirective},
	state::{StateError, TemplateError},
	token::{KeyError, TokenError},
};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical error exposed by public APIs that span more than one component.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Token issuance or verification failure.
	#[error(transparent)]
	Token(#[from] TokenError),
	/// Signing key could not be loaded or generated.
	#[error(transparent)]
	Key(#[from] KeyError),
	/// Rate limiter could not be constructed.
	#[error(transparent)]
	Limiter(#[from] LimiterConfigError),
	/// OAuth2 state or OIDC nonce failure.
	#[error(transparent)]
	State(#[from] StateError),
	/// Logout URL template failure.
	#[error(transparent)]
	Template(#[from] TemplateError),
	/// Cookie chunking failure.
	#[error(transparent)]
	Cookie(#[from] CookieError),
	/// Configuration could not be parsed or validated.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// The caller exhausted its request budget.
	#[error("Rate limit exceeded.")]
	RateLimitExceeded(Option<RetryDirective>),
	/// The request carried no usable credential.
	#[error("Request is not authenticated: {reason}.")]
	Unauthenticated {
		/// Why the credential was rejected.
		reason: &'static str,
	},
}
impl Error {
	/// Returns the retry hint attached to a [`Error::RateLimitExceeded`] failure.
	pub fn retry_directive(&self) -> Option<&RetryDirective> {
		match self {
			Self::RateLimitExceeded(directive) => directive.as_ref(),
			_ => None,
		}
	}
}
