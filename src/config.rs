//! Gateway configuration and the constructors that turn it into live components.

// std
use std::path::PathBuf;
// self
use crate::{
	_prelude::*,
	ratelimit::{ClientLimiter, GlobalLimiter, LimiterConfigError},
	state::{LogoutUrlBuilder, TemplateError},
	token::{KeyError, SigningKey, TokenServiceConfig},
};

/// Burst granted to each client when logins are limited.
pub const LOGIN_BURST: i64 = 1;
/// Burst granted to all clients together when traceflow creation is limited.
pub const TRACEFLOW_BURST: i64 = 10;
/// Longest refresh-token lifetime a configuration may request (one year).
pub const MAX_REFRESH_TOKEN_LIFETIME_SECS: u64 = 366 * 24 * 60 * 60;
/// Largest collector jitter, as a fraction of the period.
pub const MAX_GC_JITTER: f64 = 1.;

/// Configuration parsing and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// The document is not valid JSON for [`GatewayConfig`].
	#[error("Configuration could not be parsed at `{path}`.")]
	Parse {
		/// Path of the offending field.
		path: String,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// A field holds a value outside its accepted range.
	#[error("Configuration field `{field}` is invalid: {reason}.")]
	Invalid {
		/// Dotted path of the offending field.
		field: &'static str,
		/// Why the value was rejected.
		reason: &'static str,
	},
	/// The OIDC logout template does not parse.
	#[error("OIDC logout URL template is invalid.")]
	LogoutTemplate(#[from] TemplateError),
}

/// Root configuration document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
	/// Token and cookie settings.
	pub auth: AuthConfig,
	/// Rate limits.
	pub limits: LimitsConfig,
	/// Federated login; absent when only basic auth is enabled.
	pub oidc: Option<OidcConfig>,
}
impl GatewayConfig {
	/// Parses and validates a JSON document.
	pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
		let deserializer = &mut serde_json::Deserializer::from_str(json);
		let config: Self = serde_path_to_error::deserialize(deserializer)
			.map_err(|source| ConfigError::Parse { path: source.path().to_string(), source })?;

		config.validate()?;

		Ok(config)
	}

	/// Checks value ranges that serde cannot express.
	pub fn validate(&self) -> Result<(), ConfigError> {
		let invalid = |field, reason| Err(ConfigError::Invalid { field, reason });
		let lifetime_in_range = |secs| (1..=MAX_REFRESH_TOKEN_LIFETIME_SECS).contains(&secs);

		if !lifetime_in_range(self.auth.refresh_token_lifetime_secs) {
			return invalid("auth.refresh_token_lifetime_secs", "must be at most one year");
		}
		if !lifetime_in_range(self.auth.oidc_refresh_token_lifetime_secs) {
			return invalid("auth.oidc_refresh_token_lifetime_secs", "must be at most one year");
		}
		if self.auth.gc_period_secs == 0 {
			return invalid("auth.gc_period_secs", "must be positive");
		}
		if !(0. ..=MAX_GC_JITTER).contains(&self.auth.gc_jitter) {
			return invalid("auth.gc_jitter", "must be a fraction between 0 and 1");
		}
		if self.auth.gc_batch_size == 0 {
			return invalid("auth.gc_batch_size", "must be positive");
		}
		if self.limits.client_cache_size == 0 {
			return invalid("limits.client_cache_size", "must be positive");
		}
		if let Some(oidc) = &self.oidc {
			if oidc.client_id.is_empty() {
				return invalid("oidc.client_id", "must not be empty");
			}

			oidc.logout_url_builder()?;
		}

		Ok(())
	}

	/// Collector tunables for the token service.
	pub fn token_service_config(&self) -> TokenServiceConfig {
		TokenServiceConfig {
			gc_period: StdDuration::from_secs(self.auth.gc_period_secs),
			gc_jitter: self.auth.gc_jitter,
			gc_batch_size: self.auth.gc_batch_size,
		}
	}

	/// Loads the configured signing key, or generates one when no path is set.
	pub fn signing_key(&self) -> Result<SigningKey, KeyError> {
		let key = match &self.auth.jwt_key_path {
			Some(path) => SigningKey::from_pem_file(path)?,
			None => SigningKey::generate()?,
		};

		Ok(key.with_key_id(self.auth.key_id.clone()))
	}

	/// Per-client login limiter; `None` when `limits.max_logins_per_second` is negative.
	pub fn login_limiter(&self) -> Result<Option<ClientLimiter>, LimiterConfigError> {
		let Some((rate, burst)) =
			limiter_params(self.limits.max_logins_per_second, "s", LOGIN_BURST)
		else {
			return Ok(None);
		};

		ClientLimiter::new(&rate, burst, self.limits.client_cache_size).map(Some)
	}

	/// Global traceflow limiter; `None` when `limits.max_traceflows_per_hour` is negative.
	pub fn traceflow_limiter(&self) -> Result<Option<GlobalLimiter>, LimiterConfigError> {
		let Some((rate, burst)) =
			limiter_params(self.limits.max_traceflows_per_hour, "h", TRACEFLOW_BURST)
		else {
			return Ok(None);
		};

		GlobalLimiter::new(&rate, burst).map(Some)
	}
}

/// Token and cookie settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
	/// PEM private key used to sign tokens; a fresh key is generated when absent.
	pub jwt_key_path: Option<PathBuf>,
	/// `kid` header stamped on every token.
	pub key_id: String,
	/// Sets the `Secure` attribute on every cookie.
	pub cookie_secure: bool,
	/// Refresh-token lifetime for password logins.
	pub refresh_token_lifetime_secs: u64,
	/// Refresh-token lifetime for OIDC logins.
	pub oidc_refresh_token_lifetime_secs: u64,
	/// Base period of the refresh-token collector.
	pub gc_period_secs: u64,
	/// Random extra delay per collector period, as a fraction of the period.
	pub gc_jitter: f64,
	/// Expired refresh tokens removed per write lock.
	pub gc_batch_size: usize,
}
impl AuthConfig {
	/// Refresh-token lifetime for password logins.
	pub fn refresh_token_lifetime(&self) -> Duration {
		seconds(self.refresh_token_lifetime_secs)
	}

	/// Refresh-token lifetime for OIDC logins.
	pub fn oidc_refresh_token_lifetime(&self) -> Duration {
		seconds(self.oidc_refresh_token_lifetime_secs)
	}
}
impl Default for AuthConfig {
	fn default() -> Self {
		Self {
			jwt_key_path: None,
			key_id: "jwt-key".into(),
			cookie_secure: false,
			refresh_token_lifetime_secs: 24 * 60 * 60,
			oidc_refresh_token_lifetime_secs: 30 * 60,
			gc_period_secs: 60,
			gc_jitter: 0.,
			gc_batch_size: 100,
		}
	}
}

/// Rate limits; a negative value disables the corresponding limiter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
	/// Login attempts per second, per client IP.
	pub max_logins_per_second: i64,
	/// Traceflow creations per hour, across all clients.
	pub max_traceflows_per_hour: i64,
	/// Number of clients the login limiter tracks at once.
	pub client_cache_size: usize,
}
impl Default for LimitsConfig {
	fn default() -> Self {
		Self { max_logins_per_second: 1, max_traceflows_per_hour: 100, client_cache_size: 10_000 }
	}
}

/// Federated login settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OidcConfig {
	/// Public URL of the gateway.
	pub server_url: Url,
	/// OAuth2 client identifier registered with the identity provider.
	pub client_id: String,
	/// Logout URL template; empty means the provider session is left alone on logout.
	#[serde(default)]
	pub logout_url_template: String,
}
impl OidcConfig {
	/// Binds the logout template to this gateway's client id and URL.
	pub fn logout_url_builder(&self) -> Result<LogoutUrlBuilder, TemplateError> {
		LogoutUrlBuilder::new(&self.logout_url_template, &self.client_id, self.server_url.as_str())
	}

	/// Redirect URI registered with the identity provider.
	pub fn callback_url(&self) -> Url {
		let mut url = self.server_url.clone();

		if let Ok(mut segments) = url.path_segments_mut() {
			segments.pop_if_empty().extend(["auth", "oauth2", "callback"]);
		}

		url
	}
}

fn limiter_params(configured: i64, unit: &str, burst: i64) -> Option<(String, i64)> {
	match configured {
		n if n < 0 => None,
		0 => Some((format!("0/{unit}"), 0)),
		n => Some((format!("{n}/{unit}"), burst)),
	}
}

fn seconds(secs: u64) -> Duration {
	Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))
}
