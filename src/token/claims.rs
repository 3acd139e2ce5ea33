//! Registered JWT claims carried by access and refresh tokens.

// crates.io
use rand::RngCore;
// self
use crate::_prelude::*;

/// `iss` claim stamped on, and required from, every token.
pub const ISSUER: &str = "ui.authgate.io";
/// `aud` claim stamped on, and required from, every token.
pub const AUDIENCE: &str = "ui.authgate.io";

const TOKEN_ID_LEN: usize = 20;

/// Claims set of a signed token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
	/// Issuer.
	pub iss: String,
	/// Audience.
	pub aud: String,
	/// Subject; empty for anonymous access tokens.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub sub: String,
	/// Expiry as Unix seconds.
	pub exp: i64,
	/// Issued-at as Unix seconds.
	pub iat: i64,
	/// Unique token identifier.
	pub jti: String,
}
impl Claims {
	pub(crate) fn new(subject: &str, issued_at: OffsetDateTime, expires_at: OffsetDateTime) -> Self {
		Self {
			iss: ISSUER.into(),
			aud: AUDIENCE.into(),
			sub: subject.into(),
			exp: expires_at.unix_timestamp(),
			iat: issued_at.unix_timestamp(),
			jti: generate_token_id(),
		}
	}

	/// Returns `true` once `instant` has reached the expiry second.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant.unix_timestamp() >= self.exp
	}
}

fn generate_token_id() -> String {
	let mut bytes = [0_u8; TOKEN_ID_LEN];

	rand::rng().fill_bytes(&mut bytes);

	hex::encode(bytes)
}
