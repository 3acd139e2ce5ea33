//! Security and traffic-control plane for auth gateways: signed access/refresh tokens with a
//! revocation registry, token-bucket rate limiting, a signed OAuth2 state protocol, and chunked
//! cookies for oversized values.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod clock;
pub mod config;
pub mod cookies;
pub mod error;
pub mod obs;
pub mod ratelimit;
pub mod session;
pub mod state;
pub mod token;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and fixtures for tests; enabled via `cfg(test)` or the `test`
	//! crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		clock::{Clock, ManualClock},
		token::{SigningKey, TokenService, TokenServiceConfig},
	};

	/// PEM-encoded RSA key shared by tests so they never pay for key generation.
	pub const TEST_SIGNING_KEY_PEM: &str = include_str!("../tests/fixtures/signing_key.pem");

	/// Instant every manual test clock starts from.
	pub const TEST_EPOCH: OffsetDateTime = time::macros::datetime!(2025-11-10 12:00 UTC);

	/// Loads the fixture signing key with the `test-key` key identifier.
	pub fn test_signing_key() -> SigningKey {
		SigningKey::from_pem(TEST_SIGNING_KEY_PEM.as_bytes())
			.expect("Fixture PEM should load as a signing key.")
			.with_key_id("test-key")
	}

	/// Builds a manual clock pinned to [`TEST_EPOCH`].
	pub fn test_clock() -> Arc<ManualClock> {
		Arc::new(ManualClock::new(TEST_EPOCH))
	}

	/// Builds a token service backed by the fixture key and the provided clock.
	pub fn test_token_service(clock: Arc<ManualClock>) -> TokenService {
		test_token_service_with(clock, TokenServiceConfig::default())
	}

	/// Builds a token service backed by the fixture key, the provided clock, and `config`.
	pub fn test_token_service_with(
		clock: Arc<ManualClock>,
		config: TokenServiceConfig,
	) -> TokenService {
		let clock: Arc<dyn Clock> = clock;

		TokenService::with_clock(test_signing_key(), config, clock)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, HashSet},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		str::FromStr,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use http;
pub use url;
