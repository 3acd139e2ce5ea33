//! OIDC replay-protection nonce.
//!
//! The raw nonce stays in an HTTP-only cookie; only `base64url(sha256(nonce))` is sent to the
//! identity provider, and the ID token's `nonce` claim must echo that hash.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	state::{StateError, random_hex},
};

const OIDC_NONCE_LEN: usize = 32;

/// Raw OIDC nonce.
#[derive(Clone, PartialEq, Eq)]
pub struct OidcNonce(String);
impl OidcNonce {
	/// Draws 32 random bytes and hex-encodes them.
	pub fn generate() -> Self {
		Self(random_hex(OIDC_NONCE_LEN))
	}

	/// Wraps a nonce read back from the nonce cookie.
	pub fn from_cookie(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Raw value to store in the nonce cookie.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Identity-provider-facing hash of this nonce.
	pub fn hash(&self) -> String {
		hash_nonce(&self.0)
	}
}
impl Debug for OidcNonce {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("OidcNonce").field(&"<redacted>").finish()
	}
}

/// Returns `base64url(sha256(nonce))` with padding.
pub fn hash_nonce(nonce: &str) -> String {
	URL_SAFE.encode(Sha256::digest(nonce.as_bytes()))
}

/// Requires the ID token's `nonce` claim to equal the hash of the cookie nonce.
pub fn verify_id_token_nonce(cookie_nonce: &str, claimed: &str) -> Result<(), StateError> {
	if hash_nonce(cookie_nonce) == claimed {
		Ok(())
	} else {
		#[cfg(feature = "tracing")]
		tracing::debug!("oidc nonce mismatch");

		Err(StateError::NonceMismatch)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn hash_matches_known_digest() {
		// sha256("abc"), base64url with padding.
		assert_eq!(hash_nonce("abc"), "ungWv48Bz-pBQUDeXa4iI7ADYaOWF3qctBD_YfIAFa0=");
	}

	#[test]
	fn generated_nonce_verifies_against_its_hash() {
		let nonce = OidcNonce::generate();

		assert_eq!(nonce.expose().len(), OIDC_NONCE_LEN * 2);
		assert!(verify_id_token_nonce(nonce.expose(), &nonce.hash()).is_ok());
		assert!(matches!(
			verify_id_token_nonce(nonce.expose(), nonce.expose()),
			Err(StateError::NonceMismatch)
		));
		assert_ne!(nonce, OidcNonce::generate());
	}
}
