// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE};
// self
use authgate::state::{
	LOGOUT_VARIABLES, LogoutTemplate, LogoutUrlBuilder, OidcNonce, StateCodec, StateError,
	TemplateError, hash_nonce, verify_id_token_nonce,
};

#[test]
fn parse_returns_the_minted_state() {
	let codec = StateCodec::new();

	for redirect in ["", "/", "/flows?tab=1", "https://gateway.example.com/ui/#frag"] {
		let (state, raw) = codec.get_state(redirect).expect("Failed to mint OAuth2 state.");
		let parsed = codec.parse_state(&raw).expect("Minted state should parse.");

		assert_eq!(parsed, state);
		assert_eq!(parsed.redirect_url, redirect);
	}
}

#[test]
fn every_single_byte_flip_is_detected() {
	let codec = StateCodec::new();
	let (_, raw) = codec.get_state("/dashboard").expect("Failed to mint OAuth2 state.");
	let bytes = raw.as_bytes();

	for index in 0..bytes.len() {
		if bytes[index] == b'.' {
			continue;
		}

		let mut flipped = bytes.to_vec();

		// Stay inside the base64url alphabet so decoding alone cannot catch it.
		flipped[index] = if bytes[index] == b'A' { b'B' } else { b'A' };

		let tampered = String::from_utf8(flipped).expect("Flipped state should stay ASCII.");

		assert!(codec.parse_state(&tampered).is_err(), "flip at byte {index} should be detected");
	}
}

#[test]
fn tampered_payload_fails_signature_check() {
	let codec = StateCodec::new();
	let (_, raw) = codec.get_state("/").expect("Failed to mint OAuth2 state.");
	let (_, signature) = raw.split_once('.').expect("State should have two segments.");
	let forged = URL_SAFE.encode(br#"{"nonce":"attacker","redirectURL":"https://evil"}"#);

	assert!(matches!(
		codec.parse_state(&format!("{forged}.{signature}")),
		Err(StateError::SignatureMismatch)
	));
}

#[test]
fn codecs_do_not_share_secrets() {
	let (_, raw) = StateCodec::new().get_state("/").expect("Failed to mint OAuth2 state.");

	assert!(matches!(StateCodec::new().parse_state(&raw), Err(StateError::SignatureMismatch)));
}

#[test]
fn callback_state_and_nonce_checks() {
	let codec = StateCodec::new();
	let (state, raw) = codec.get_state("/").expect("Failed to mint OAuth2 state.");

	codec.verify_callback_state(&state.nonce, &raw).expect("Matching state should verify.");

	assert!(matches!(codec.verify_callback_state("", &raw), Err(StateError::StateMismatch)));

	let nonce = OidcNonce::generate();

	assert_eq!(nonce.expose().len(), 64);
	assert!(nonce.expose().chars().all(|c| c.is_ascii_hexdigit()));
	assert_ne!(nonce.hash(), nonce.expose());
	assert_eq!(nonce.hash(), hash_nonce(nonce.expose()));

	verify_id_token_nonce(nonce.expose(), &nonce.hash()).expect("Hashed nonce should match.");

	assert!(matches!(
		verify_id_token_nonce(nonce.expose(), nonce.expose()),
		Err(StateError::NonceMismatch)
	));
}

#[test]
fn logout_templates_are_validated_up_front() {
	assert!(matches!(
		LogoutTemplate::parse("https://idp/logout?x={{ Password }}", &LOGOUT_VARIABLES),
		Err(TemplateError::UnknownVariable { .. })
	));
	assert!(matches!(
		LogoutUrlBuilder::new("https://idp/{{Nope}}", "client", "https://gateway.example.com"),
		Err(TemplateError::UnknownVariable { .. })
	));

	let builder = LogoutUrlBuilder::new(
		"https://idp.example.com/logout?id_token_hint={{ Token }}&post_logout_redirect_uri={{URL}}",
		"client",
		"https://gateway.example.com/",
	)
	.expect("Failed to build logout URL builder.");

	assert_eq!(
		builder.build("a.b.c").expect("Logout URL should render."),
		Some(
			"https://idp.example.com/logout?id_token_hint=a.b.c&post_logout_redirect_uri=https%3A%2F%2Fgateway.example.com%2F"
				.into()
		)
	);
}
