//! Request metadata and client-key derivation for per-client limiters.

// std
use std::{
	net::{IpAddr, SocketAddr},
	sync::LazyLock,
};
// crates.io
use http::HeaderMap;
use ipnetwork::IpNetwork;
// self
use crate::_prelude::*;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

static PRIVATE_NETWORKS: LazyLock<Vec<IpNetwork>> = LazyLock::new(|| {
	["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16", "fc00::/7"]
		.into_iter()
		.filter_map(|cidr| cidr.parse().ok())
		.collect()
});

/// Derives the bucket key for a request.
pub type ClientKeyFn = Arc<dyn Fn(&RequestMeta<'_>) -> String + Send + Sync>;

/// The parts of an inbound request a limiter may inspect.
#[derive(Clone, Copy, Debug)]
pub struct RequestMeta<'a> {
	/// Request headers.
	pub headers: &'a HeaderMap,
	/// Peer address as reported by the transport, usually `ip:port`.
	pub remote_addr: &'a str,
}
impl<'a> RequestMeta<'a> {
	/// Bundles request headers with the peer address.
	pub fn new(headers: &'a HeaderMap, remote_addr: &'a str) -> Self {
		Self { headers, remote_addr }
	}
}

/// Keys requests by client IP address.
///
/// Looks for the right-most non-private address across every `X-Forwarded-For` value first, then
/// a parsable `X-Real-IP`, and finally falls back to the peer address with any port removed.
pub fn client_key_ip(request: &RequestMeta<'_>) -> String {
	if let Some(ip) = forwarded_for_ip(request.headers) {
		return ip.to_string();
	}
	if let Some(ip) = request
		.headers
		.get(X_REAL_IP)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.trim().parse::<IpAddr>().ok())
	{
		return ip.to_string();
	}

	let remote = request.remote_addr.trim();

	match remote.parse::<SocketAddr>() {
		Ok(addr) => addr.ip().to_string(),
		Err(_) => remote.to_owned(),
	}
}

/// Returns `true` for RFC 1918 IPv4 and unique-local IPv6 addresses.
pub fn is_private(ip: IpAddr) -> bool {
	PRIVATE_NETWORKS.iter().any(|network| network.contains(ip))
}

fn forwarded_for_ip(headers: &HeaderMap) -> Option<IpAddr> {
	let parts = headers
		.get_all(X_FORWARDED_FOR)
		.iter()
		.filter_map(|value| value.to_str().ok())
		.flat_map(|value| value.split(','))
		.collect::<Vec<_>>();

	parts
		.into_iter()
		.rev()
		.filter_map(|part| part.trim().parse::<IpAddr>().ok())
		.find(|ip| !is_private(*ip))
}

#[cfg(test)]
mod tests {
	// crates.io
	use http::HeaderValue;
	// self
	use super::*;

	fn key(headers: &[(&'static str, &'static str)], remote_addr: &str) -> String {
		let mut map = HeaderMap::new();

		for &(name, value) in headers {
			map.append(name, HeaderValue::from_static(value));
		}

		client_key_ip(&RequestMeta::new(&map, remote_addr))
	}

	#[test]
	fn remote_addr_port_is_stripped() {
		assert_eq!(key(&[], "192.168.1.1"), "192.168.1.1");
		assert_eq!(key(&[], "192.168.1.1:32167"), "192.168.1.1");
		assert_eq!(key(&[], "[2001:db8::1]:443"), "2001:db8::1");
		assert_eq!(key(&[], " not-an-ip "), "not-an-ip");
	}

	#[test]
	fn real_ip_header_is_used_even_when_private() {
		assert_eq!(key(&[("x-real-ip", "192.168.1.1")], "10.0.1.1"), "192.168.1.1");
		assert_eq!(key(&[("x-real-ip", "garbage")], "10.0.1.1:80"), "10.0.1.1");
	}

	#[test]
	fn private_forwarded_entries_are_skipped() {
		assert_eq!(key(&[("x-forwarded-for", "192.168.1.1")], "10.0.1.1"), "10.0.1.1");
		assert_eq!(key(&[("x-forwarded-for", "8.8.8.8")], "10.0.1.1"), "8.8.8.8");
	}

	#[test]
	fn right_most_public_entry_wins_across_header_values() {
		let headers = [
			("x-forwarded-for", "10.10.0.1"),
			("x-forwarded-for", "1.1.1.1, 8.8.8.8"),
			("x-forwarded-for", "10.0.10.10"),
			("x-forwarded-for", "192.168.2.1"),
			("x-real-ip", "192.168.1.1"),
		];

		assert_eq!(key(&headers, "10.0.1.1"), "8.8.8.8");
	}

	#[test]
	fn private_ranges_cover_ipv4_and_ipv6() {
		for ip in ["10.1.2.3", "172.31.255.255", "192.168.0.1", "fd00::1"] {
			assert!(is_private(ip.parse().expect("Fixture IP should parse.")), "{ip} is private");
		}
		for ip in ["172.32.0.1", "8.8.8.8", "2001:db8::1", "127.0.0.1"] {
			assert!(!is_private(ip.parse().expect("Fixture IP should parse.")), "{ip} is public");
		}
	}
}
