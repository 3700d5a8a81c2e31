//! Admission engine tests
//!
//! End-to-end admission scenarios and concurrent access

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use gatekeeper_core::{Admission, ClientId, ConnectionControl, Gatekeeper, GatekeeperConfig};
use hyper::header::{HeaderMap, HeaderValue};
use tempfile::TempDir;

#[derive(Default)]
struct TestConn {
	aborted: bool,
}

impl ConnectionControl for TestConn {
	fn abort(&mut self) {
		assert!(!self.aborted, "connection aborted twice");
		self.aborted = true;
	}
}

fn create_test_gatekeeper(limit: u32) -> (Arc<Gatekeeper>, TempDir) {
	let temp_dir = TempDir::new().expect("Failed to create temp directory");
	let config = GatekeeperConfig {
		limit,
		ban_file: temp_dir.path().join("banned-ips.json"),
		..GatekeeperConfig::default()
	};
	(Arc::new(Gatekeeper::new(config)), temp_dir)
}

fn peer(ip: &str) -> Option<SocketAddr> {
	Some(SocketAddr::new(ip.parse().expect("valid ip"), 40000))
}

#[test]
fn test_scenario_fifty_one_requests() {
	let (gk, _temp) = create_test_gatekeeper(50);
	let headers = HeaderMap::new();
	let t = Instant::now();

	for i in 0..50u64 {
		let mut conn = TestConn::default();
		let admission = gk.admit_at(&headers, peer("203.0.113.9"), &mut conn, t + Duration::from_millis(i * 100));
		assert!(admission.is_admitted());
		assert!(!conn.aborted);
	}

	let mut conn = TestConn::default();
	let admission = gk.admit_at(&headers, peer("203.0.113.9"), &mut conn, t + Duration::from_secs(9));
	assert!(matches!(admission, Admission::BannedNow { count: 51, .. }));
	assert!(conn.aborted);

	// A request long after the window expired still hits the ban
	let mut conn = TestConn::default();
	let admission = gk.admit_at(&headers, peer("203.0.113.9"), &mut conn, t + Duration::from_secs(86_400));
	assert!(matches!(admission, Admission::RejectedBanned { .. }));
	assert!(conn.aborted);
	assert!(gk.tracked("203.0.113.9").is_none());
}

#[test]
fn test_ban_survives_restart() {
	let (gk, temp) = create_test_gatekeeper(1);
	let t = Instant::now();

	gk.decide(ClientId::from("A"), t);
	assert!(matches!(gk.decide(ClientId::from("A"), t), Admission::BannedNow { .. }));
	drop(gk);

	let config = GatekeeperConfig {
		limit: 1,
		ban_file: temp.path().join("banned-ips.json"),
		..GatekeeperConfig::default()
	};
	let gk = Gatekeeper::new(config);
	let mut conn = TestConn::default();
	let mut headers = HeaderMap::new();
	headers.insert("x-real-ip", HeaderValue::from_static("A"));
	let admission = gk.admit(&headers, peer("198.51.100.1"), &mut conn);
	assert_eq!(admission, Admission::RejectedBanned { client_id: ClientId::from("A") });
	assert!(conn.aborted);
}

#[test]
fn test_window_expiry_prevents_ban() {
	let (gk, _temp) = create_test_gatekeeper(5);
	let id = ClientId::from("slow");
	let t = Instant::now();

	// Five requests per window, three windows in a row
	for window in 0..3u64 {
		let start = t + Duration::from_secs(window * 61);
		for i in 0..5u64 {
			assert!(gk.decide(id.clone(), start + Duration::from_secs(i)).is_admitted());
		}
	}
	assert!(!gk.is_banned("slow"));
}

#[test]
fn test_concurrent_clients_single_ban_each() {
	let (gk, _temp) = create_test_gatekeeper(20);
	let admitted = Arc::new(AtomicUsize::new(0));
	let mut handles = vec![];

	for i in 0..8 {
		let gk = Arc::clone(&gk);
		let admitted = Arc::clone(&admitted);
		handles.push(std::thread::spawn(move || {
			// Two threads share each identity
			let id = ClientId::from(format!("10.0.0.{}", i % 4));
			for _ in 0..30 {
				if gk.decide(id.clone(), Instant::now()).is_admitted() {
					admitted.fetch_add(1, Ordering::Relaxed);
				}
			}
		}));
	}
	for handle in handles {
		handle.join().expect("Thread panicked");
	}

	// Each identity gets exactly `limit` requests through and one ban
	assert_eq!(admitted.load(Ordering::Relaxed), 4 * 20);
	let stats = gk.stats();
	assert_eq!(stats.total_bans_issued, 4);
	assert_eq!(stats.active_bans, 4);
	assert_eq!(stats.total_rejected, 4 * 60 - 4 * 21);
	assert_eq!(gk.list_bans().len(), 4);
}

// vim: ts=4
