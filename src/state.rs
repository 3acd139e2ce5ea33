//! Signed OAuth2 state, OIDC nonce hashing, and logout-URL templating for the federated login
//! handshake.
//!
//! The state value is `base64url(json) + "." + base64url(hmac_sha256(secret, base64url(json)))`.
//! The HMAC secret is drawn once per [`StateCodec`] and never leaves it, so states minted by one
//! codec instance are rejected by any other.

pub mod nonce;
pub mod template;

pub use nonce::*;
pub use template::*;

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
// self
use crate::{
	_prelude::*,
	obs::{OpKind, OpOutcome, OpSpan},
};

type HmacSha256 = Hmac<Sha256>;

/// Matches the SHA-256 block size.
const SECRET_LEN: usize = 64;
const STATE_NONCE_LEN: usize = 32;

/// Handshake failures.
#[derive(Debug, ThisError)]
pub enum StateError {
	/// The value could not be split, decoded, or deserialized.
	#[error("OAuth2 state is malformed.")]
	Malformed,
	/// The HMAC does not match the payload.
	#[error("OAuth2 state signature is invalid.")]
	SignatureMismatch,
	/// The callback `state` parameter does not match the state cookie.
	#[error("OAuth2 state does not match the state cookie.")]
	StateMismatch,
	/// The ID token nonce does not match the hash of the nonce cookie.
	#[error("OIDC nonce does not match the nonce cookie.")]
	NonceMismatch,
	/// The state payload could not be serialized.
	#[error("OAuth2 state could not be encoded: {reason}.")]
	Encode {
		/// Underlying serializer message.
		reason: String,
	},
	/// The HMAC key was rejected.
	#[error("OAuth2 state secret is unusable.")]
	Secret,
}

/// Anti-CSRF payload carried through the identity provider round trip.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth2State {
	/// Random value echoed back by the identity provider as the `state` parameter.
	pub nonce: String,
	/// Where the frontend wants to land after login; may be empty.
	#[serde(rename = "redirectURL")]
	pub redirect_url: String,
}

/// Signs and verifies [`OAuth2State`] values with a per-instance secret.
pub struct StateCodec {
	secret: [u8; SECRET_LEN],
}
impl StateCodec {
	/// Creates a codec with a freshly drawn random secret.
	pub fn new() -> Self {
		let mut secret = [0_u8; SECRET_LEN];

		rand::rng().fill_bytes(&mut secret);

		Self { secret }
	}

	/// Creates a codec with a fixed secret, for deterministic tests.
	pub fn with_secret(secret: [u8; SECRET_LEN]) -> Self {
		Self { secret }
	}

	/// Mints a state carrying a fresh nonce plus `redirect_url` and returns it with its signed
	/// wire form.
	pub fn get_state(&self, redirect_url: &str) -> Result<(OAuth2State, String), StateError> {
		let state =
			OAuth2State { nonce: random_hex(STATE_NONCE_LEN), redirect_url: redirect_url.into() };
		let json =
			serde_json::to_vec(&state).map_err(|e| StateError::Encode { reason: e.to_string() })?;
		let payload = URL_SAFE.encode(json);
		let mut mac = self.mac()?;

		mac.update(payload.as_bytes());

		let signature = URL_SAFE.encode(mac.finalize().into_bytes());

		Ok((state, format!("{payload}.{signature}")))
	}

	/// Verifies and decodes a signed state.
	pub fn parse_state(&self, raw: &str) -> Result<OAuth2State, StateError> {
		let span = OpSpan::new(OpKind::StateParse, "parse_state").entered();
		let result = self.decode(raw);

		span.record(OpOutcome::from_ok(result.is_ok()));

		result
	}

	/// Checks the callback `state` query parameter against the state cookie and returns the
	/// decoded state.
	pub fn verify_callback_state(
		&self,
		query_state: &str,
		cookie_value: &str,
	) -> Result<OAuth2State, StateError> {
		let state = self.parse_state(cookie_value)?;

		if state.nonce != query_state {
			#[cfg(feature = "tracing")]
			tracing::debug!("oauth2 state mismatch");

			return Err(StateError::StateMismatch);
		}

		Ok(state)
	}

	fn decode(&self, raw: &str) -> Result<OAuth2State, StateError> {
		let mut parts = raw.split('.');
		let (Some(payload), Some(signature), None) = (parts.next(), parts.next(), parts.next())
		else {
			return Err(StateError::Malformed);
		};
		let json = URL_SAFE.decode(payload).map_err(|_| StateError::Malformed)?;
		let signature = URL_SAFE.decode(signature).map_err(|_| StateError::Malformed)?;
		let mut mac = self.mac()?;

		mac.update(payload.as_bytes());
		mac.verify_slice(&signature).map_err(|_| StateError::SignatureMismatch)?;

		serde_json::from_slice(&json).map_err(|_| StateError::Malformed)
	}

	fn mac(&self) -> Result<HmacSha256, StateError> {
		HmacSha256::new_from_slice(&self.secret).map_err(|_| StateError::Secret)
	}
}
impl Default for StateCodec {
	fn default() -> Self {
		Self::new()
	}
}
impl Debug for StateCodec {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("StateCodec").field("secret", &"<redacted>").finish()
	}
}

pub(crate) fn random_hex(len: usize) -> String {
	let mut bytes = vec![0_u8; len];

	rand::rng().fill_bytes(&mut bytes);

	hex::encode(bytes)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn state_round_trips_with_camel_case_field() {
		let codec = StateCodec::new();
		let (state, raw) = codec.get_state("/dashboard").expect("State should be minted.");

		assert_eq!(state.nonce.len(), STATE_NONCE_LEN * 2);

		let payload = raw.split('.').next().expect("Signed state should have a payload.");
		let json = URL_SAFE.decode(payload).expect("Payload should be base64url.");
		let value = serde_json::from_slice::<serde_json::Value>(&json)
			.expect("Payload should be JSON.");

		assert_eq!(value["redirectURL"], "/dashboard");
		assert_eq!(codec.parse_state(&raw).expect("State should verify."), state);
	}

	#[test]
	fn other_codec_rejects_signature() {
		let (_, raw) = StateCodec::with_secret([1; SECRET_LEN])
			.get_state("")
			.expect("State should be minted.");
		let err = StateCodec::with_secret([2; SECRET_LEN])
			.parse_state(&raw)
			.expect_err("Foreign state should not verify.");

		assert!(matches!(err, StateError::SignatureMismatch));
	}

	#[test]
	fn wrong_segment_count_is_malformed() {
		let codec = StateCodec::new();
		let (_, raw) = codec.get_state("").expect("State should be minted.");
		let extra = format!("{raw}.extra");

		for input in ["", "abc", extra.as_str(), "a.b.c"] {
			assert!(
				matches!(codec.parse_state(input), Err(StateError::Malformed)),
				"{input:?} should be malformed"
			);
		}
	}

	#[test]
	fn signed_non_json_payload_is_malformed() {
		let codec = StateCodec::with_secret([7; SECRET_LEN]);
		let payload = URL_SAFE.encode(b"not json");
		let mut mac = codec.mac().expect("Codec secret should key an HMAC.");

		mac.update(payload.as_bytes());

		let raw = format!("{payload}.{}", URL_SAFE.encode(mac.finalize().into_bytes()));

		assert!(matches!(codec.parse_state(&raw), Err(StateError::Malformed)));
	}

	#[test]
	fn callback_state_must_match_cookie_nonce() {
		let codec = StateCodec::new();
		let (state, raw) = codec.get_state("/").expect("State should be minted.");

		assert_eq!(
			codec.verify_callback_state(&state.nonce, &raw).expect("Matching state should pass."),
			state
		);
		assert!(matches!(
			codec.verify_callback_state("other", &raw),
			Err(StateError::StateMismatch)
		));
	}

	#[test]
	fn debug_redacts_secret() {
		assert_eq!(
			format!("{:?}", StateCodec::with_secret([9; SECRET_LEN])),
			"StateCodec { secret: \"<redacted>\" }"
		);
	}
}
