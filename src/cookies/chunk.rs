//! Byte-exact chunking of oversized cookie values.
//!
//! Wire format: the first cookie is `name=<count>:<data>`, each following cookie is
//! `name-<index>=<data>`, and every chunk carries the template's attributes.

// crates.io
use cookie::Cookie;
// self
use crate::{_prelude::*, cookies::CookieError};

/// Largest serialized cookie, attributes included, that browsers reliably accept.
pub const MAX_COOKIE_SIZE: usize = 4093;
/// Most chunks a single logical value may span.
pub const MAX_CHUNKS: usize = 4;

// Room for the `<count>:` prefix on chunk 0 and the `-<index>` suffix on the others.
const CHUNK_MARKER_LEN: usize = 2;

/// Splits `template`'s value across as many cookies as needed, each within
/// [`MAX_COOKIE_SIZE`].
pub fn split(template: &Cookie<'_>) -> Result<Vec<Cookie<'static>>, CookieError> {
	validate(template)?;

	let value = template.value();
	let mut base = template.clone().into_owned();

	base.set_value("");

	let overhead = base.to_string().len() + CHUNK_MARKER_LEN;
	let capacity = MAX_COOKIE_SIZE
		.checked_sub(overhead)
		.filter(|capacity| *capacity > 0)
		.ok_or(CookieError::ValueTooLarge { max_chunks: MAX_CHUNKS })?;
	let count = value.len().div_ceil(capacity).max(1);

	if count > MAX_CHUNKS {
		return Err(CookieError::ValueTooLarge { max_chunks: MAX_CHUNKS });
	}

	let name = base.name().to_owned();
	let chunks = (0..count)
		.map(|index| {
			let start = index * capacity;
			let slice = &value[start..value.len().min(start + capacity)];
			let mut chunk = base.clone();

			if index == 0 {
				chunk.set_value(format!("{count}:{slice}"));
			} else {
				chunk.set_name(format!("{name}-{index}"));
				chunk.set_value(slice.to_owned());
			}

			chunk
		})
		.collect();

	Ok(chunks)
}

/// Reassembles the value split under `name` from the request's cookies.
pub fn join(name: &str, cookies: &[Cookie<'_>]) -> Result<String, CookieError> {
	join_with_names(name, cookies).map(|(value, _)| value)
}

/// Like [`join`], reading cookies from a raw `Cookie` request header.
pub fn join_header(name: &str, cookie_header: &str) -> Result<String, CookieError> {
	join(name, &parse_header(cookie_header))
}

/// Reassembles the value split under `name` and returns it with one removal cookie, scoped to
/// `path`, for every chunk that made it up.
pub fn unset(
	name: &str,
	cookies: &[Cookie<'_>],
	path: &str,
) -> Result<(String, Vec<Cookie<'static>>), CookieError> {
	let (value, names) = join_with_names(name, cookies)?;
	let removals =
		names.into_iter().map(|chunk_name| removal(chunk_name, path.to_owned())).collect();

	Ok((value, removals))
}

/// Parses every well-formed pair of a `Cookie` request header, skipping malformed ones.
pub fn parse_header(cookie_header: &str) -> Vec<Cookie<'static>> {
	Cookie::split_parse(cookie_header.to_owned()).filter_map(|cookie| cookie.ok()).collect()
}

pub(crate) fn removal(name: String, path: String) -> Cookie<'static> {
	let mut cookie = Cookie::build((name, "")).path(path).build();

	cookie.make_removal();

	cookie
}

fn validate(template: &Cookie<'_>) -> Result<(), CookieError> {
	let name = template.name();

	if name.is_empty() {
		return Err(CookieError::EmptyName);
	}
	if let Some(character) = name.chars().find(|c| !is_token_char(*c)) {
		return Err(CookieError::InvalidName { name: name.into(), character });
	}
	if template.domain().is_some() {
		return Err(CookieError::DomainNotSupported);
	}
	if let Some(character) = template.value().chars().find(|c| matches!(c, ' ' | ',')) {
		return Err(CookieError::ReservedCharacter { character });
	}
	if let Some(character) = template.value().chars().find(|c| !is_value_char(*c)) {
		return Err(CookieError::InvalidValueCharacter { character });
	}

	Ok(())
}

fn join_with_names(
	name: &str,
	cookies: &[Cookie<'_>],
) -> Result<(String, Vec<String>), CookieError> {
	let by_name = cookies
		.iter()
		.filter(|cookie| cookie.name().starts_with(name))
		.map(|cookie| (cookie.name(), cookie.value()))
		.collect::<HashMap<_, _>>();
	let first = by_name.get(name).ok_or_else(|| CookieError::Missing { name: name.into() })?;
	let count = match first.as_bytes() {
		[digit @ b'1'..=b'9', b':', ..] => usize::from(digit - b'0'),
		_ => return Err(CookieError::InvalidHeader),
	};
	let mut value = first[2..].to_owned();
	let mut names = vec![name.to_owned()];

	for index in 1..count {
		let chunk_name = format!("{name}-{index}");
		let chunk = by_name
			.get(chunk_name.as_str())
			.ok_or(CookieError::ChunkMissing { index })?;

		value.push_str(chunk);
		names.push(chunk_name);
	}

	Ok((value, names))
}

fn is_token_char(c: char) -> bool {
	c.is_ascii_graphic() && !"()<>@,;:\\\"/[]?={}".contains(c)
}

fn is_value_char(c: char) -> bool {
	matches!(c, '\x21'..='\x7e') && !matches!(c, '"' | ';' | '\\')
}
