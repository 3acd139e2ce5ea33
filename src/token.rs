//! Access/refresh token issuance, verification, and refresh-token lifecycle.
//!
//! [`TokenService`] signs RS512 JWTs with a fixed issuer and audience. Access tokens are
//! stateless; refresh tokens are additionally registered in a [`RefreshTokenRegistry`] so they
//! can be revoked before their natural expiry, and a background collector (see
//! [`TokenService::run`]) prunes registry entries once they expire. Every time check goes
//! through the injected [`Clock`], never the wall clock directly.

pub mod claims;
pub mod gc;
pub mod key;
pub mod registry;
pub mod secret;

pub use claims::*;
pub use gc::*;
pub use key::*;
pub use registry::*;
pub use secret::*;

// crates.io
use jsonwebtoken::{Algorithm, Header, Validation, errors::ErrorKind};
// self
use crate::{
	_prelude::*,
	clock::{Clock, SystemClock},
	obs::{OpKind, OpOutcome, OpSpan},
};

/// Lifetime of every access token.
pub const ACCESS_TOKEN_LIFETIME: Duration = Duration::minutes(10);

const SIGNING_ALGORITHM: Algorithm = Algorithm::RS512;

/// Token verification and issuance failures.
#[derive(Debug, ThisError)]
pub enum TokenError {
	/// The raw value is not a decodable token.
	#[error("Token is malformed.")]
	Malformed,
	/// Signature, algorithm, issuer, or audience mismatch, or a revoked refresh token.
	#[error("Token is invalid: {reason}.")]
	Invalid {
		/// Human-readable reason.
		reason: String,
	},
	/// The token reached its expiry instant.
	#[error("Token has expired.")]
	Expired,
	/// Signing failed.
	#[error("Token could not be signed: {reason}.")]
	Signing {
		/// Underlying signer message.
		reason: String,
	},
	/// Requested lifetime is zero or negative.
	#[error("Token lifetime must be positive.")]
	NonPositiveLifetime,
	/// Requested lifetime pushes the expiry past the representable date range.
	#[error("Token lifetime is out of range.")]
	LifetimeOutOfRange,
}
impl TokenError {
	fn classify(e: jsonwebtoken::errors::Error) -> Self {
		match e.kind() {
			ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) =>
				Self::Malformed,
			ErrorKind::ExpiredSignature => Self::Expired,
			_ => Self::Invalid { reason: e.to_string() },
		}
	}
}

/// Signed token handed to callers.
#[derive(Clone, Debug)]
pub struct Token {
	/// Self-contained signed artifact.
	pub raw: TokenSecret,
	/// Lifetime the token was issued with.
	pub expires_in: Duration,
	/// Expiry instant.
	pub expires_at: OffsetDateTime,
}

/// Tunables for the refresh-token collector.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenServiceConfig {
	/// Base period between collection passes.
	pub gc_period: StdDuration,
	/// Extra random delay added to each period, as a fraction of `gc_period`.
	pub gc_jitter: f64,
	/// Maximum number of entries removed under one write lock.
	pub gc_batch_size: usize,
}
impl Default for TokenServiceConfig {
	fn default() -> Self {
		Self { gc_period: StdDuration::from_secs(60), gc_jitter: 0.0, gc_batch_size: 100 }
	}
}

/// Issues and verifies tokens and owns the refresh-token registry.
pub struct TokenService {
	key: SigningKey,
	validation: Validation,
	clock: Arc<dyn Clock>,
	registry: RefreshTokenRegistry,
	config: TokenServiceConfig,
}
impl TokenService {
	/// Creates a service reading the system clock.
	pub fn new(key: SigningKey, config: TokenServiceConfig) -> Self {
		Self::with_clock(key, config, Arc::new(SystemClock))
	}

	/// Creates a service driven by the provided clock.
	pub fn with_clock(key: SigningKey, config: TokenServiceConfig, clock: Arc<dyn Clock>) -> Self {
		let mut validation = Validation::new(SIGNING_ALGORITHM);

		validation.set_issuer(&[ISSUER]);
		validation.set_audience(&[AUDIENCE]);
		validation.set_required_spec_claims(&["exp", "iss", "aud"]);
		// Expiry is checked against the injected clock instead.
		validation.validate_exp = false;
		validation.validate_nbf = false;
		validation.leeway = 0;

		Self { key, validation, clock, registry: RefreshTokenRegistry::default(), config }
	}

	/// Issues an anonymous access token valid for [`ACCESS_TOKEN_LIFETIME`].
	pub fn issue_access_token(&self) -> Result<Token, TokenError> {
		self.issue_access_token_for("")
	}

	/// Issues an access token for `subject` valid for [`ACCESS_TOKEN_LIFETIME`].
	pub fn issue_access_token_for(&self, subject: &str) -> Result<Token, TokenError> {
		self.sign(ACCESS_TOKEN_LIFETIME, subject)
	}

	/// Issues a refresh token and registers it until its expiry.
	pub fn issue_refresh_token(
		&self,
		lifetime: Duration,
		subject: &str,
	) -> Result<Token, TokenError> {
		let token = self.sign(lifetime, subject)?;

		self.registry.insert(token.raw.expose(), token.expires_at);

		Ok(token)
	}

	/// Verifies signature, algorithm, issuer, audience, and expiry of `raw`.
	pub fn verify_access_token(&self, raw: &str) -> Result<Claims, TokenError> {
		self.verify(raw, "verify_access_token", false)
	}

	/// Verifies `raw` like an access token, then requires it to still be registered.
	pub fn verify_refresh_token(&self, raw: &str) -> Result<Claims, TokenError> {
		self.verify(raw, "verify_refresh_token", true)
	}

	/// Revokes a refresh token. Deleting an unknown token is a no-op.
	pub fn delete_refresh_token(&self, raw: &str) {
		self.registry.remove(raw);
	}

	/// Number of currently registered refresh tokens.
	pub fn refresh_token_count(&self) -> usize {
		self.registry.len()
	}

	/// Refresh-token registry backing revocation.
	pub fn registry(&self) -> &RefreshTokenRegistry {
		&self.registry
	}

	/// Collector tunables.
	pub fn config(&self) -> &TokenServiceConfig {
		&self.config
	}

	/// Current instant according to the injected clock.
	pub fn now(&self) -> OffsetDateTime {
		self.clock.now()
	}

	fn sign(&self, expires_in: Duration, subject: &str) -> Result<Token, TokenError> {
		let span = OpSpan::new(OpKind::TokenIssue, "sign").entered();

		span.record(OpOutcome::Attempt);

		if !expires_in.is_positive() {
			span.record(OpOutcome::Failure);

			return Err(TokenError::NonPositiveLifetime);
		}

		let now = self.clock.now();
		// JWT timestamps are whole seconds; aligning keeps `expires_at` equal to `exp`.
		let issued_at = now - Duration::nanoseconds(i64::from(now.nanosecond()));
		let Some(expires_at) = issued_at.checked_add(expires_in) else {
			span.record(OpOutcome::Failure);

			return Err(TokenError::LifetimeOutOfRange);
		};
		let claims = Claims::new(subject, issued_at, expires_at);
		let mut header = Header::new(SIGNING_ALGORITHM);

		header.kid = self.key.key_id().map(ToOwned::to_owned);

		let raw = jsonwebtoken::encode(&header, &claims, self.key.encoding()).map_err(|e| {
			span.record(OpOutcome::Failure);

			TokenError::Signing { reason: e.to_string() }
		})?;

		span.record(OpOutcome::Success);

		Ok(Token { raw: TokenSecret::new(raw), expires_in, expires_at })
	}

	fn verify(
		&self,
		raw: &str,
		stage: &'static str,
		registered_only: bool,
	) -> Result<Claims, TokenError> {
		let span = OpSpan::new(OpKind::TokenVerify, stage).entered();
		let result = jsonwebtoken::decode::<Claims>(raw, self.key.decoding(), &self.validation)
			.map_err(TokenError::classify)
			.and_then(|data| {
				if data.claims.is_expired_at(self.clock.now()) {
					Err(TokenError::Expired)
				} else if registered_only && !self.registry.contains(raw) {
					Err(TokenError::Invalid { reason: "refresh token is not registered".into() })
				} else {
					Ok(data.claims)
				}
			});

		match &result {
			Ok(_) => span.record(OpOutcome::Success),
			Err(_e) => {
				#[cfg(feature = "tracing")]
				tracing::debug!(error = %_e, "token verification failed");

				span.record(OpOutcome::Failure);
			},
		}

		result
	}
}
impl Debug for TokenService {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenService")
			.field("key", &self.key)
			.field("registered_refresh_tokens", &self.registry.len())
			.field("config", &self.config)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
	// self
	use super::*;
	use crate::_preludet::*;

	#[test]
	fn access_token_round_trips_with_kid_header() {
		let clock = test_clock();
		let service = test_token_service(clock);
		let token = service.issue_access_token().expect("Access token should be issued.");

		assert_eq!(token.expires_in, ACCESS_TOKEN_LIFETIME);
		assert_eq!(token.expires_at, TEST_EPOCH + ACCESS_TOKEN_LIFETIME);

		let header = jsonwebtoken::decode_header(token.raw.expose())
			.expect("Issued token header should decode.");

		assert_eq!(header.alg, Algorithm::RS512);
		assert_eq!(header.kid.as_deref(), Some("test-key"));

		let claims =
			service.verify_access_token(token.raw.expose()).expect("Fresh token should verify.");

		assert_eq!(claims.iat, TEST_EPOCH.unix_timestamp());
		assert!(claims.sub.is_empty());
	}

	#[test]
	fn sub_second_clock_is_aligned_to_whole_seconds() {
		let clock = test_clock();

		clock.set(TEST_EPOCH + Duration::milliseconds(750));

		let service = test_token_service(clock);
		let token = service.issue_access_token().expect("Access token should be issued.");

		assert_eq!(token.expires_at, TEST_EPOCH + ACCESS_TOKEN_LIFETIME);
	}

	#[test]
	fn tampered_claims_fail_as_invalid() {
		let service = test_token_service(test_clock());
		let token = service.issue_access_token().expect("Access token should be issued.");
		let mut parts = token.raw.expose().split('.').map(str::to_owned).collect::<Vec<_>>();
		let forged = serde_json::json!({
			"iss": ISSUER,
			"aud": AUDIENCE,
			"sub": "mallory",
			"exp": TEST_EPOCH.unix_timestamp() + 3600,
			"iat": TEST_EPOCH.unix_timestamp(),
			"jti": "forged",
		});

		parts[1] = URL_SAFE_NO_PAD.encode(forged.to_string());

		let err = service
			.verify_access_token(&parts.join("."))
			.expect_err("Forged claims should not verify.");

		assert!(matches!(err, TokenError::Invalid { .. }));
	}

	#[test]
	fn token_from_another_key_is_invalid() {
		let clock = test_clock();
		let other = TokenService::with_clock(
			SigningKey::generate_with_bits(1024).expect("Test key should generate."),
			TokenServiceConfig::default(),
			clock.clone(),
		);
		let service = test_token_service(clock);
		let token = other.issue_access_token().expect("Access token should be issued.");
		let err = service
			.verify_access_token(token.raw.expose())
			.expect_err("Foreign signature should not verify.");

		assert!(matches!(err, TokenError::Invalid { .. }));
	}

	#[test]
	fn garbage_is_malformed() {
		let service = test_token_service(test_clock());
		let err = service.verify_access_token("garbage").expect_err("Garbage should not verify.");

		assert!(matches!(err, TokenError::Malformed));
	}

	#[test]
	fn non_positive_lifetime_is_rejected() {
		let service = test_token_service(test_clock());
		let err = service
			.issue_refresh_token(Duration::ZERO, "admin")
			.expect_err("Zero lifetime should be rejected.");

		assert!(matches!(err, TokenError::NonPositiveLifetime));
		assert!(service.registry().is_empty());
	}

	#[test]
	fn unrepresentable_expiry_is_rejected() {
		let service = test_token_service(test_clock());
		let err = service
			.issue_refresh_token(Duration::MAX, "admin")
			.expect_err("Maximum lifetime should be rejected.");

		assert!(matches!(err, TokenError::LifetimeOutOfRange));
		assert!(service.registry().is_empty());
	}

	#[test]
	fn access_token_is_not_a_refresh_token() {
		let service = test_token_service(test_clock());
		let token = service.issue_access_token().expect("Access token should be issued.");
		let err = service
			.verify_refresh_token(token.raw.expose())
			.expect_err("Unregistered token should not pass refresh verification.");

		assert!(matches!(err, TokenError::Invalid { .. }));
	}
}
