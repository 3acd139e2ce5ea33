// self
use authgate::cookies::{
	AUTH_PATH, Cookie, CookieError, MAX_CHUNKS, MAX_COOKIE_SIZE, OIDC_ID_TOKEN_COOKIE, SameSite,
	id_token_cookies, join, join_header, split, unset,
};

fn header_of(cookies: &[Cookie<'_>]) -> String {
	cookies
		.iter()
		.map(|cookie| format!("{}={}", cookie.name(), cookie.value()))
		.collect::<Vec<_>>()
		.join("; ")
}

#[test]
fn five_thousand_bytes_split_into_two_chunks() {
	let value = "a".repeat(5_000);
	let chunks = split(&Cookie::new("foo", value.clone())).expect("Failed to split cookie.");

	assert_eq!(chunks.len(), 2);
	assert!(chunks[0].value().starts_with("2:"));
	assert_eq!(chunks[1].name(), "foo-1");
	assert!(chunks.iter().all(|chunk| chunk.to_string().len() <= MAX_COOKIE_SIZE));
	assert_eq!(join("foo", &chunks).expect("Chunks should join."), value);
	assert_eq!(join_header("foo", &header_of(&chunks)).expect("Header should join."), value);
}

#[test]
fn round_trip_holds_up_to_the_bound_and_fails_beyond() {
	let per_chunk = MAX_COOKIE_SIZE - "foo=".len() - 2;

	for len in [0, 1, per_chunk - 1, per_chunk, per_chunk + 1, 3 * per_chunk, MAX_CHUNKS * per_chunk]
	{
		let value = "z".repeat(len);
		let chunks = split(&Cookie::new("foo", value.clone()))
			.expect("Value within the bound should split.");

		assert!(chunks.len() <= MAX_CHUNKS);
		assert_eq!(join("foo", &chunks).expect("Chunks should join."), value, "length {len}");
	}

	let too_large = "z".repeat(MAX_CHUNKS * per_chunk + 1);

	assert_eq!(
		split(&Cookie::new("foo", too_large)),
		Err(CookieError::ValueTooLarge { max_chunks: MAX_CHUNKS })
	);
}

#[test]
fn withheld_chunk_fails_the_join() {
	let chunks =
		split(&Cookie::new("foo", "q".repeat(12_000))).expect("Failed to split cookie.");

	assert_eq!(chunks.len(), 3);

	for withheld in 1..chunks.len() {
		let partial = chunks
			.iter()
			.enumerate()
			.filter(|(index, _)| *index != withheld)
			.map(|(_, chunk)| chunk.clone())
			.collect::<Vec<_>>();

		assert_eq!(join("foo", &partial), Err(CookieError::ChunkMissing { index: withheld }));
	}

	assert_eq!(join("foo", &chunks[1..]), Err(CookieError::Missing { name: "foo".into() }));
}

#[test]
fn id_token_cookie_keeps_its_attributes_and_can_be_unset() {
	let id_token = "eyJ".repeat(2_000);
	let chunks = id_token_cookies(&id_token, true).expect("Failed to split ID token.");

	assert_eq!(chunks.len(), 2);

	for chunk in &chunks {
		assert_eq!(chunk.path(), Some(AUTH_PATH));
		assert_eq!(chunk.secure(), Some(true));
		assert_eq!(chunk.same_site(), Some(SameSite::Strict));
		assert!(chunk.to_string().len() <= MAX_COOKIE_SIZE);
	}

	let (value, removals) =
		unset(OIDC_ID_TOKEN_COOKIE, &chunks, AUTH_PATH).expect("ID token should unset.");

	assert_eq!(value, id_token);
	assert_eq!(removals.len(), 2);
	assert!(removals.iter().all(|cookie| cookie.value().is_empty()));
}
