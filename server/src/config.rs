//! Server configuration from environment variables
//!
//! | Variable            | Default                   |
//! |---------------------|---------------------------|
//! | `GK_LISTEN`         | `127.0.0.1:8080`          |
//! | `GK_STATIC_DIR`     | `./public`                |
//! | `GK_ADMIN_TOKEN`    | unset (admin API off)     |
//! | `GK_LIMIT`          | `50`                      |
//! | `GK_WINDOW_SECS`    | `60`                      |
//! | `GK_STALE_SECS`     | `300`                     |
//! | `GK_REAP_SECS`      | `300`                     |
//! | `GK_BAN_FILE`       | `./data/banned-ips.json`  |
//! | `GK_TRUSTED_HEADER` | `cf-connecting-ip`, empty disables it |

use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use gatekeeper_core::{GatekeeperConfig, IdentityConfig};

use crate::prelude::*;

#[derive(Clone, Debug)]
pub struct ServerConfig {
	pub listen: SocketAddr,
	pub static_dir: Box<Path>,
	/// Bearer token for the ban list endpoints. Without it they are not mounted.
	pub admin_token: Option<Box<str>>,
	pub gatekeeper: GatekeeperConfig,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
			static_dir: PathBuf::from("./public").into(),
			admin_token: None,
			gatekeeper: GatekeeperConfig::default(),
		}
	}
}

impl ServerConfig {
	pub fn from_env() -> GkResult<Self> {
		Self::from_lookup(|name| env::var(name).ok())
	}

	/// Build the config from a variable lookup function
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> GkResult<Self> {
		let mut config = Self::default();
		let gk = &mut config.gatekeeper;

		if let Some(listen) = parse_var(&lookup, "GK_LISTEN")? {
			config.listen = listen;
		}
		if let Some(dir) = lookup("GK_STATIC_DIR") {
			config.static_dir = PathBuf::from(dir).into();
		}
		config.admin_token = lookup("GK_ADMIN_TOKEN").filter(|t| !t.is_empty()).map(Into::into);

		if let Some(limit) = parse_var(&lookup, "GK_LIMIT")? {
			gk.limit = limit;
		}
		if let Some(secs) = parse_var(&lookup, "GK_WINDOW_SECS")? {
			gk.window = Duration::from_secs(secs);
		}
		if let Some(secs) = parse_var(&lookup, "GK_STALE_SECS")? {
			gk.stale_after = Duration::from_secs(secs);
		}
		if let Some(secs) = parse_var(&lookup, "GK_REAP_SECS")? {
			gk.reap_interval = Duration::from_secs(secs);
		}
		if let Some(path) = lookup("GK_BAN_FILE") {
			gk.ban_file = PathBuf::from(path);
		}
		if let Some(header) = lookup("GK_TRUSTED_HEADER") {
			let header = header.trim().to_ascii_lowercase();
			gk.identity = IdentityConfig {
				trusted_header: (!header.is_empty()).then(|| header.into()),
			};
		}

		Ok(config)
	}
}

fn parse_var<T: FromStr>(
	lookup: &impl Fn(&str) -> Option<String>,
	name: &str,
) -> GkResult<Option<T>> {
	let Some(value) = lookup(name) else {
		return Ok(None);
	};
	value.trim().parse().map(Some).map_err(|_| {
		error!("Invalid value for {}: {:?}", name, value);
		Error::Parse
	})
}


// vim: ts=4
