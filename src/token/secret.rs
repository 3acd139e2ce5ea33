//! Redacting holder for issued RS512 JWTs.
//!
//! The same string travels as the JSON `accessToken` or as the refresh-token cookie value, so
//! every formatter path hides it.

// self
use crate::_prelude::*;

/// Compact JWT (`header.claims.signature`); only [`TokenSecret::expose`] reveals it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a freshly signed JWT.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the JWT for a response body, a cookie, or the registry key.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Consumes the wrapper, handing the JWT to a token response.
	pub fn into_inner(self) -> String {
		self.0
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
