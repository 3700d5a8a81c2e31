//! Ban list persistence
//!
//! The ban list is stored as one JSON document that is always rewritten as a
//! whole: the new content goes to a temporary sibling file which is synced
//! and then renamed over the target, so a crash mid-write leaves either the
//! old or the new list on disk, never a torn one.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// On-disk representation of the ban list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BanRecord {
	pub ips: Vec<ClientId>,
	/// ISO-8601 UTC timestamp of the write
	pub last_updated: String,
	pub total_banned: usize,
}

impl BanRecord {
	pub fn new(ips: Vec<ClientId>) -> Self {
		Self {
			total_banned: ips.len(),
			ips,
			last_updated: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
		}
	}
}

/// Storage backend for the ban list
pub trait BanStorage: Send + Sync {
	/// Read the stored record. `Ok(None)` if nothing was stored yet. On error
	/// the stored data is left in place or moved aside, never discarded.
	fn load(&self) -> GkResult<Option<BanRecord>>;

	/// Replace the stored record
	fn save(&self, record: &BanRecord) -> GkResult<()>;
}

/// JSON file backend
#[derive(Debug)]
pub struct JsonFileStorage {
	path: Box<Path>,
}

impl JsonFileStorage {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into().into_boxed_path() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn sibling(&self, suffix: &str) -> PathBuf {
		let mut name = self.path.file_name().unwrap_or_default().to_os_string();
		name.push(suffix);
		self.path.with_file_name(name)
	}

	/// Move a file that could not be loaded out of the way, so the next save
	/// does not replace it
	fn quarantine(&self, suffix: &str) {
		let target = self.sibling(suffix);
		match fs::rename(&self.path, &target) {
			Ok(()) => warn!("Ban list moved aside to {}", target.display()),
			Err(e) => warn!("Failed to move ban list {} aside: {}", self.path.display(), e),
		}
	}
}

impl BanStorage for JsonFileStorage {
	fn load(&self) -> GkResult<Option<BanRecord>> {
		let data = match fs::read(&self.path) {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(e) => {
				self.quarantine(".unreadable");
				return Err(e.into());
			}
		};

		match serde_json::from_slice(&data) {
			Ok(record) => Ok(Some(record)),
			Err(e) => {
				self.quarantine(".corrupt");
				Err(e.into())
			}
		}
	}

	fn save(&self, record: &BanRecord) -> GkResult<()> {
		if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
			fs::create_dir_all(dir)?;
		}

		let data = serde_json::to_vec_pretty(record)?;
		let tmp_path = self.sibling(".tmp");

		if let Err(e) = write_synced(&tmp_path, &data).and_then(|()| fs::rename(&tmp_path, &self.path)) {
			// Nothing to do if the temp file was never created
			let _ = fs::remove_file(&tmp_path);
			return Err(e.into());
		}

		Ok(())
	}
}

fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
	let mut file = fs::File::create(path)?;
	file.write_all(data)?;
	file.sync_all()
}


// vim: ts=4
