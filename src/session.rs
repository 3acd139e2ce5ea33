//! Auth handlers of the gateway without HTTP routing: password login, token refresh, logout,
//! and both legs of the OIDC login handshake.
//!
//! Callers authenticate the user (password check, authorization-code exchange, ID-token
//! verification) on their side and hand the results in; [`AuthSessions`] turns them into tokens
//! and the cookies to set or remove.

// crates.io
use cookie::Cookie;
use url::Position;
// self
use crate::{
	_prelude::*,
	config::{ConfigError, GatewayConfig},
	cookies::{
		self, AUTH_PATH, CookieError, OAUTH2_STATE_COOKIE, OIDC_ID_TOKEN_COOKIE, OIDC_NONCE_COOKIE,
	},
	state::{self, LogoutUrlBuilder, OAuth2State, OidcNonce, StateCodec},
	token::{Token, TokenService},
};

/// Query parameter appended to the post-login redirect of a federated login.
pub const AUTH_METHOD_PARAM: &str = "auth_method";

const TOKEN_TYPE: &str = "Bearer";
const DEFAULT_REDIRECT: &str = "/";

/// JSON body returned by login and refresh.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
	/// Signed access token.
	pub access_token: String,
	/// Always `Bearer`.
	pub token_type: String,
	/// Access-token lifetime in whole seconds.
	pub expires_in: i64,
}
impl TokenResponse {
	fn bearer(token: Token) -> Self {
		Self {
			access_token: token.raw.into_inner(),
			token_type: TOKEN_TYPE.into(),
			expires_in: token.expires_in.whole_seconds(),
		}
	}
}

/// Result of a successful login.
#[derive(Clone, Debug)]
pub struct LoginGrant {
	/// Body for the client.
	pub response: TokenResponse,
	/// Cookie carrying the newly registered refresh token.
	pub refresh_cookie: Cookie<'static>,
}

/// Where the user agent goes after logout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogoutRedirect {
	/// End the identity-provider session too (`303 See Other`).
	IdentityProvider(String),
	/// Redirect requested by the frontend (`302 Found`).
	Requested(String),
}

/// Result of a logout.
#[derive(Clone, Debug)]
pub struct LogoutOutcome {
	/// Cookies that clear the refresh token and any ID-token chunks.
	pub removal_cookies: Vec<Cookie<'static>>,
	/// Redirect target, if any; without one the handler answers `200 OK`.
	pub redirect: Option<LogoutRedirect>,
}
impl LogoutOutcome {
	/// Identity-provider logout URL, when one was rendered.
	pub fn logout_url(&self) -> Option<&str> {
		match &self.redirect {
			Some(LogoutRedirect::IdentityProvider(url)) => Some(url.as_str()),
			_ => None,
		}
	}
}

/// First leg of a federated login.
#[derive(Clone, Debug)]
pub struct OidcLogin {
	/// Decoded state; its nonce is the `state` parameter sent to the identity provider.
	pub state: OAuth2State,
	/// Hashed OIDC nonce sent to the identity provider as the `nonce` parameter.
	pub nonce_hash: String,
	/// State and nonce handshake cookies.
	pub cookies: Vec<Cookie<'static>>,
}

/// Second leg of a federated login.
#[derive(Clone, Debug)]
pub struct OidcCompletion {
	/// Tokens for the authenticated subject.
	pub grant: LoginGrant,
	/// ID-token chunks followed by removals of both handshake cookies.
	pub cookies: Vec<Cookie<'static>>,
	/// Frontend location carrying `auth_method=oidc`.
	pub redirect_url: String,
}

#[derive(Debug)]
struct OidcSession {
	server_url: Url,
	refresh_token_lifetime: Duration,
	logout: LogoutUrlBuilder,
}

/// Composes the token service, the state codec, and cookie helpers into login flows.
#[derive(Debug)]
pub struct AuthSessions {
	tokens: Arc<TokenService>,
	state: StateCodec,
	cookie_secure: bool,
	refresh_token_lifetime: Duration,
	oidc: Option<OidcSession>,
}
impl AuthSessions {
	/// Binds the flows to `config`; fails when the OIDC logout template does not parse.
	pub fn new(
		tokens: Arc<TokenService>,
		state: StateCodec,
		config: &GatewayConfig,
	) -> Result<Self, ConfigError> {
		let oidc = config
			.oidc
			.as_ref()
			.map(|oidc| -> Result<_, ConfigError> {
				Ok(OidcSession {
					server_url: oidc.server_url.clone(),
					refresh_token_lifetime: config.auth.oidc_refresh_token_lifetime(),
					logout: oidc.logout_url_builder()?,
				})
			})
			.transpose()?;

		Ok(Self {
			tokens,
			state,
			cookie_secure: config.auth.cookie_secure,
			refresh_token_lifetime: config.auth.refresh_token_lifetime(),
			oidc,
		})
	}

	/// Token service backing the flows.
	pub fn tokens(&self) -> &Arc<TokenService> {
		&self.tokens
	}

	/// Returns `true` when federated login is configured.
	pub fn oidc_enabled(&self) -> bool {
		self.oidc.is_some()
	}

	/// Issues tokens for a user whose password the caller already checked.
	pub fn login(&self, subject: &str) -> Result<LoginGrant> {
		self.grant(self.refresh_token_lifetime, subject)
	}

	/// Exchanges a refresh token for a new access token.
	///
	/// A non-empty `Authorization` header must read exactly `Bearer <token>`; otherwise the
	/// refresh cookie is used.
	pub fn refresh(
		&self,
		authorization: Option<&str>,
		cookie_header: Option<&str>,
	) -> Result<TokenResponse> {
		let refresh_token = match authorization.filter(|header| !header.is_empty()) {
			Some(header) => bearer_token(header)?.to_owned(),
			None => cookie_header.and_then(cookies::refresh_token_from_header).ok_or(
				Error::Unauthenticated {
					reason: "no refresh token in cookie or authorization header",
				},
			)?,
		};
		let claims = self.tokens.verify_refresh_token(&refresh_token)?;
		let access = self.tokens.issue_access_token_for(&claims.sub)?;

		Ok(TokenResponse::bearer(access))
	}

	/// Revokes the refresh token and clears session cookies.
	///
	/// With federated login and a logout template, the ID token kept in its chunked cookie is
	/// used to render the identity-provider logout URL, which takes precedence over
	/// `redirect_url`.
	pub fn logout(
		&self,
		cookie_header: Option<&str>,
		redirect_url: Option<&str>,
	) -> Result<LogoutOutcome> {
		let cookie_header = cookie_header.unwrap_or_default();
		let mut removal_cookies = Vec::new();

		if let Some((refresh_token, removal)) = cookies::unset_refresh_token_cookie(cookie_header) {
			self.tokens.delete_refresh_token(&refresh_token);
			removal_cookies.push(removal);
		}

		let mut redirect = redirect_url
			.filter(|url| !url.is_empty())
			.map(|url| LogoutRedirect::Requested(url.into()));

		if let Some(oidc) = &self.oidc {
			let jar = cookies::parse_header(cookie_header);

			// No ID-token cookie means there is no provider session to end.
			if let Ok((id_token, removals)) = cookies::unset(OIDC_ID_TOKEN_COOKIE, &jar, AUTH_PATH)
			{
				removal_cookies.extend(removals);

				if let Some(url) = oidc.logout.build(&id_token)? {
					redirect = Some(LogoutRedirect::IdentityProvider(url));
				}
			}
		}

		Ok(LogoutOutcome { removal_cookies, redirect })
	}

	/// Mints the signed state and OIDC nonce for a redirect to the identity provider.
	pub fn begin_oidc_login(&self, redirect_url: &str) -> Result<OidcLogin> {
		self.oidc_session()?;

		let (state, raw_state) = self.state.get_state(redirect_url)?;
		let nonce = OidcNonce::generate();
		let cookies = vec![
			cookies::oauth2_state_cookie(&raw_state, self.cookie_secure),
			cookies::oidc_nonce_cookie(nonce.expose(), self.cookie_secure),
		];

		Ok(OidcLogin { state, nonce_hash: nonce.hash(), cookies })
	}

	/// Completes a federated login once the caller has exchanged the authorization code and
	/// verified the ID token.
	///
	/// `query_state` is the callback's `state` parameter, `id_token_nonce` the verified ID
	/// token's `nonce` claim, and `subject` its `sub` claim.
	pub fn complete_oidc_login(
		&self,
		query_state: &str,
		cookie_header: &str,
		id_token_nonce: &str,
		subject: &str,
		raw_id_token: &str,
	) -> Result<OidcCompletion> {
		let oidc = self.oidc_session()?;
		let state_cookie = required_cookie(cookie_header, OAUTH2_STATE_COOKIE)?;
		let state = self.state.verify_callback_state(query_state, &state_cookie)?;
		let nonce_cookie = required_cookie(cookie_header, OIDC_NONCE_COOKIE)?;

		state::verify_id_token_nonce(&nonce_cookie, id_token_nonce)?;

		let grant = self.grant(oidc.refresh_token_lifetime, subject)?;
		let mut cookies = cookies::id_token_cookies(raw_id_token, self.cookie_secure)?;

		cookies.extend(cookies::handshake_removal_cookies());

		#[cfg(feature = "tracing")]
		tracing::info!(chunks = cookies.len() - 2, "oidc login completed");

		Ok(OidcCompletion {
			grant,
			cookies,
			redirect_url: post_login_redirect(&oidc.server_url, &state.redirect_url),
		})
	}

	fn grant(&self, lifetime: Duration, subject: &str) -> Result<LoginGrant> {
		let refresh = self.tokens.issue_refresh_token(lifetime, subject)?;
		let access = self.tokens.issue_access_token_for(subject)?;

		Ok(LoginGrant {
			response: TokenResponse::bearer(access),
			refresh_cookie: cookies::refresh_token_cookie(refresh.raw.expose(), self.cookie_secure),
		})
	}

	fn oidc_session(&self) -> Result<&OidcSession> {
		self.oidc.as_ref().ok_or(Error::Unauthenticated { reason: "oidc login is not configured" })
	}
}

fn bearer_token(header: &str) -> Result<&str> {
	let mut parts = header.split(' ');

	match (parts.next(), parts.next(), parts.next()) {
		(Some(TOKEN_TYPE), Some(token), None) => Ok(token),
		_ => Err(Error::Unauthenticated {
			reason: "authorization header does not have a valid format",
		}),
	}
}

fn required_cookie(cookie_header: &str, name: &str) -> Result<String, CookieError> {
	cookies::cookie_value(cookie_header, name).ok_or_else(|| CookieError::Missing { name: name.into() })
}

// Absolute targets keep their origin; anything else resolves against the gateway and is returned
// as a path so it cannot leave the gateway's origin. Query keys come out sorted.
fn post_login_redirect(server_url: &Url, requested: &str) -> String {
	let requested = if requested.is_empty() { DEFAULT_REDIRECT } else { requested };
	let (mut url, relative) = match Url::parse(requested) {
		Ok(url) => (url, false),
		Err(_) => match server_url.join(requested).or_else(|_| server_url.join(DEFAULT_REDIRECT)) {
			Ok(url) => (url, true),
			Err(_) => return format!("{DEFAULT_REDIRECT}?{AUTH_METHOD_PARAM}=oidc"),
		},
	};
	let mut pairs = url
		.query_pairs()
		.filter(|(key, _)| key != AUTH_METHOD_PARAM)
		.map(|(key, value)| (key.into_owned(), value.into_owned()))
		.collect::<Vec<_>>();

	pairs.push((AUTH_METHOD_PARAM.into(), "oidc".into()));
	pairs.sort_by(|a, b| a.0.cmp(&b.0));
	url.query_pairs_mut().clear().extend_pairs(&pairs);

	if relative { url[Position::BeforePath..].to_owned() } else { url.into() }
}
