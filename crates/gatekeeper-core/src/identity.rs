//! Client Identity Resolver
//!
//! Derives the identity a request is counted and banned under. Sources are
//! checked in a fixed order and the first usable one wins:
//!
//! 1. the trusted edge proxy header (`cf-connecting-ip` by default)
//! 2. `x-real-ip`
//! 3. the left-most entry of `x-forwarded-for`
//! 4. the transport peer address, with IPv4-mapped IPv6 addresses reduced to
//!    plain IPv4 so a dual-stack listener yields the same identity
//!
//! Header values are taken as-is. Nothing here verifies that a header was
//! actually written by a proxy, so a client talking to the server directly
//! can pick its own identity. Deployments must terminate at a reverse proxy
//! that strips or overwrites these headers.

use std::net::SocketAddr;

use hyper::header::HeaderMap;

use crate::config::IdentityConfig;
use crate::types::ClientId;

const X_REAL_IP: &str = "x-real-ip";
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Resolve the client identity for a request. Never fails: without any
/// header or peer address the empty-string sentinel is returned.
pub fn resolve_client_id(
	headers: &HeaderMap,
	peer: Option<SocketAddr>,
	config: &IdentityConfig,
) -> ClientId {
	config
		.trusted_header
		.as_deref()
		.and_then(|name| header_value(headers, name))
		.or_else(|| header_value(headers, X_REAL_IP))
		.or_else(|| extract_from_xff(headers))
		.map(ClientId::from)
		.or_else(|| peer.map(|addr| ClientId::from(addr.ip().to_canonical().to_string())))
		.unwrap_or_default()
}

/// Trimmed header value, `None` if missing, empty or not visible ASCII
fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
	headers
		.get(name)
		.and_then(|h| h.to_str().ok())
		.map(str::trim)
		.filter(|s| !s.is_empty())
}

/// X-Forwarded-For is "client, proxy1, proxy2": take the left-most entry
fn extract_from_xff(headers: &HeaderMap) -> Option<&str> {
	header_value(headers, X_FORWARDED_FOR)
		.and_then(|s| s.split(',').next())
		.map(str::trim)
		.filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
	use super::*;
	use hyper::header::HeaderValue;

	fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
		let mut map = HeaderMap::new();
		for (name, value) in pairs {
			map.insert(*name, HeaderValue::from_static(value));
		}
		map
	}

	fn peer() -> Option<SocketAddr> {
		Some("192.0.2.7:51234".parse().unwrap())
	}

	#[test]
	fn test_real_ip_outranks_forwarded_for() {
		let h = headers(&[("x-forwarded-for", "1.1.1.1, 2.2.2.2"), ("x-real-ip", "3.3.3.3")]);
		let id = resolve_client_id(&h, peer(), &IdentityConfig::default());
		assert_eq!(id.as_str(), "3.3.3.3");
	}

	#[test]
	fn test_forwarded_for_takes_leftmost() {
		let h = headers(&[("x-forwarded-for", " 1.1.1.1 , 2.2.2.2")]);
		let id = resolve_client_id(&h, peer(), &IdentityConfig::default());
		assert_eq!(id.as_str(), "1.1.1.1");
	}

	#[test]
	fn test_trusted_header_wins() {
		let h = headers(&[
			("cf-connecting-ip", "9.9.9.9"),
			("x-real-ip", "3.3.3.3"),
			("x-forwarded-for", "1.1.1.1"),
		]);
		let id = resolve_client_id(&h, peer(), &IdentityConfig::default());
		assert_eq!(id.as_str(), "9.9.9.9");
	}

	#[test]
	fn test_trusted_header_can_be_disabled() {
		let h = headers(&[("cf-connecting-ip", "9.9.9.9"), ("x-real-ip", "3.3.3.3")]);
		let config = IdentityConfig { trusted_header: None };
		assert_eq!(resolve_client_id(&h, peer(), &config).as_str(), "3.3.3.3");
	}

	#[test]
	fn test_custom_trusted_header() {
		let h = headers(&[("x-edge-client", "8.8.4.4"), ("x-real-ip", "3.3.3.3")]);
		let config = IdentityConfig { trusted_header: Some("x-edge-client".into()) };
		assert_eq!(resolve_client_id(&h, peer(), &config).as_str(), "8.8.4.4");
	}

	#[test]
	fn test_falls_back_to_peer_ip() {
		let id = resolve_client_id(&HeaderMap::new(), peer(), &IdentityConfig::default());
		assert_eq!(id.as_str(), "192.0.2.7");

		let v6: SocketAddr = "[2001:db8::1]:443".parse().unwrap();
		let id = resolve_client_id(&HeaderMap::new(), Some(v6), &IdentityConfig::default());
		assert_eq!(id.as_str(), "2001:db8::1");
	}

	#[test]
	fn test_mapped_ipv4_peer_is_canonical() {
		let mapped: SocketAddr = "[::ffff:192.0.2.9]:8080".parse().unwrap();
		let id = resolve_client_id(&HeaderMap::new(), Some(mapped), &IdentityConfig::default());
		assert_eq!(id.as_str(), "192.0.2.9");
	}

	#[test]
	fn test_empty_headers_are_skipped() {
		let h = headers(&[("x-real-ip", "  "), ("x-forwarded-for", ", 2.2.2.2")]);
		let id = resolve_client_id(&h, peer(), &IdentityConfig::default());
		assert_eq!(id.as_str(), "192.0.2.7");
	}

	#[test]
	fn test_sentinel_without_any_source() {
		let id = resolve_client_id(&HeaderMap::new(), None, &IdentityConfig::default());
		assert!(id.is_empty());
	}
}

// vim: ts=4
