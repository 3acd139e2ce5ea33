//! Cookie helpers for refresh-token delivery, the OIDC handshake, and chunked oversized values.

pub mod chunk;

pub use chunk::*;
pub use cookie::{Cookie, SameSite};

// self
use crate::_prelude::*;

/// Refresh-token cookie name.
pub const REFRESH_TOKEN_COOKIE: &str = "authgate-refresh-token";
/// Path the refresh-token and ID-token cookies are scoped to.
pub const AUTH_PATH: &str = "/auth";
/// Signed OAuth2 state cookie name.
pub const OAUTH2_STATE_COOKIE: &str = "authgate-oauth2-state";
/// Raw OIDC nonce cookie name.
pub const OIDC_NONCE_COOKIE: &str = "authgate-oidc-nonce";
/// Chunked OIDC ID-token cookie name, kept only to log out from the identity provider.
pub const OIDC_ID_TOKEN_COOKIE: &str = "authgate-oidc-id-token";
/// Path the handshake cookies are scoped to.
pub const OAUTH2_PATH: &str = "/auth/oauth2";

/// Cookie construction and chunking failures.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CookieError {
	/// Cookie names must not be empty.
	#[error("Cookie name must not be empty.")]
	EmptyName,
	/// Cookie names must be RFC 6265 tokens.
	#[error("Cookie name `{name}` contains invalid character {character:?}.")]
	InvalidName {
		/// Offending name.
		name: String,
		/// First invalid character.
		character: char,
	},
	/// Chunked cookies cannot carry a `Domain` attribute.
	#[error("Chunked cookies must not set a domain.")]
	DomainNotSupported,
	/// Space and comma delimit chunks and cannot appear in a chunked value.
	#[error("Cookie value contains reserved character {character:?}.")]
	ReservedCharacter {
		/// Offending character.
		character: char,
	},
	/// Cookie values are limited to printable ASCII without `"`, `;`, and `\`.
	#[error("Cookie value contains invalid character {character:?}.")]
	InvalidValueCharacter {
		/// Offending character.
		character: char,
	},
	/// The value needs more chunks than allowed.
	#[error("Cookie value cannot be split into at most {max_chunks} chunks.")]
	ValueTooLarge {
		/// Chunk limit.
		max_chunks: usize,
	},
	/// No cookie carries the requested name.
	#[error("No cookie named `{name}`.")]
	Missing {
		/// Requested name.
		name: String,
	},
	/// The first chunk does not start with `<digit>:`.
	#[error("First cookie chunk has an invalid format.")]
	InvalidHeader,
	/// A declared chunk was not sent.
	#[error("Cookie chunk {index} is missing.")]
	ChunkMissing {
		/// Index of the first missing chunk.
		index: usize,
	},
}

/// Session-scoped, HTTP-only, `SameSite=Strict` cookie carrying a refresh token.
pub fn refresh_token_cookie(raw: &str, secure: bool) -> Cookie<'static> {
	Cookie::build((REFRESH_TOKEN_COOKIE, raw.to_owned()))
		.path(AUTH_PATH)
		.secure(secure)
		.http_only(true)
		.same_site(SameSite::Strict)
		.build()
}

/// Reads the refresh token from a `Cookie` request header.
pub fn refresh_token_from_header(cookie_header: &str) -> Option<String> {
	cookie_value(cookie_header, REFRESH_TOKEN_COOKIE)
}

/// Returns the refresh token found in `cookie_header` together with the cookie that removes it.
pub fn unset_refresh_token_cookie(cookie_header: &str) -> Option<(String, Cookie<'static>)> {
	let token = refresh_token_from_header(cookie_header)?;

	Some((token, removal(REFRESH_TOKEN_COOKIE.into(), AUTH_PATH.into())))
}

/// Handshake cookie carrying the signed OAuth2 state.
pub fn oauth2_state_cookie(raw: &str, secure: bool) -> Cookie<'static> {
	handshake_cookie(OAUTH2_STATE_COOKIE, raw, secure)
}

/// Handshake cookie carrying the raw OIDC nonce.
pub fn oidc_nonce_cookie(nonce: &str, secure: bool) -> Cookie<'static> {
	handshake_cookie(OIDC_NONCE_COOKIE, nonce, secure)
}

/// Removal cookies for both handshake cookies, sent once the callback completes.
pub fn handshake_removal_cookies() -> [Cookie<'static>; 2] {
	[
		removal(OAUTH2_STATE_COOKIE.into(), OAUTH2_PATH.into()),
		removal(OIDC_NONCE_COOKIE.into(), OAUTH2_PATH.into()),
	]
}

/// Splits the raw ID token into `SameSite=Strict` chunk cookies scoped to [`AUTH_PATH`].
pub fn id_token_cookies(raw: &str, secure: bool) -> Result<Vec<Cookie<'static>>, CookieError> {
	let template = Cookie::build((OIDC_ID_TOKEN_COOKIE, raw))
		.path(AUTH_PATH)
		.secure(secure)
		.http_only(true)
		.same_site(SameSite::Strict)
		.build();

	split(&template)
}

/// Returns the value of the first cookie named `name` in a `Cookie` request header.
pub fn cookie_value(cookie_header: &str, name: &str) -> Option<String> {
	Cookie::split_parse(cookie_header)
		.filter_map(|cookie| cookie.ok())
		.find(|cookie| cookie.name() == name)
		.map(|cookie| cookie.value().to_owned())
}

// Lax, so the cookie survives the redirect chain back from the identity provider.
fn handshake_cookie(name: &'static str, value: &str, secure: bool) -> Cookie<'static> {
	Cookie::build((name, value.to_owned()))
		.path(OAUTH2_PATH)
		.secure(secure)
		.http_only(true)
		.same_site(SameSite::Lax)
		.build()
}
