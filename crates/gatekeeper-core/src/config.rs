//! Gatekeeper Configuration

use std::path::PathBuf;
use std::time::Duration;

/// Default trusted proxy header (set by the CDN / edge layer)
pub const DEFAULT_TRUSTED_HEADER: &str = "cf-connecting-ip";

/// Identity resolution settings
#[derive(Clone, Debug)]
pub struct IdentityConfig {
	/// Header set by a trusted edge proxy, checked before any other source.
	/// `None` disables it.
	pub trusted_header: Option<Box<str>>,
}

impl Default for IdentityConfig {
	fn default() -> Self {
		Self { trusted_header: Some(DEFAULT_TRUSTED_HEADER.into()) }
	}
}

/// Main gatekeeper configuration
#[derive(Clone, Debug)]
pub struct GatekeeperConfig {
	/// Requests allowed per identity in one window. Request `limit + 1` bans.
	pub limit: u32,
	/// Length of the tumbling window
	pub window: Duration,
	/// Tracker entries idle for longer than this are evicted by the reaper
	pub stale_after: Duration,
	/// How often the reaper runs
	pub reap_interval: Duration,
	/// Ban list persistence file
	pub ban_file: PathBuf,
	pub identity: IdentityConfig,
}

impl GatekeeperConfig {
	/// Count at which the "approaching limit" signal fires (80% of the limit)
	pub fn soft_limit(&self) -> u32 {
		// u64 keeps `limit * 4` from overflowing; the result always fits back into u32
		u32::try_from(u64::from(self.limit) * 4 / 5).unwrap_or(u32::MAX)
	}
}

impl Default for GatekeeperConfig {
	fn default() -> Self {
		Self {
			limit: 50,
			window: Duration::from_secs(60),
			stale_after: Duration::from_secs(300), // 5 minutes
			reap_interval: Duration::from_secs(300),
			ban_file: PathBuf::from("./data/banned-ips.json"),
			identity: IdentityConfig::default(),
		}
	}
}


// vim: ts=4
