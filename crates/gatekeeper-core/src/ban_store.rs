//! Ban Store
//!
//! The set of permanently banned identities and the only state that survives
//! a restart. Every change is written through to the storage backend before
//! the call returns. A failed write is logged and counted but never rolls
//! back the in-memory set: the ban keeps being enforced and the next
//! successful write catches the file up.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::prelude::*;
use crate::storage::{BanRecord, BanStorage};

pub struct BanStore {
	bans: RwLock<HashSet<ClientId>>,
	storage: Box<dyn BanStorage>,
	/// Serializes writes; held while the snapshot is taken
	writer: Mutex<()>,
	persist_failures: AtomicU64,
}

impl BanStore {
	/// Load the ban list from `storage`.
	///
	/// A missing record starts an empty list, which is written right away so
	/// the backing file exists after startup. An unreadable or malformed
	/// record is logged and the list starts empty, but nothing is written
	/// until the first ban: a failed read does not prove the stored list is
	/// gone.
	pub fn load(storage: Box<dyn BanStorage>) -> Self {
		let (bans, write_back) = match storage.load() {
			Ok(Some(record)) => {
				let bans: HashSet<ClientId> = record.ips.into_iter().collect();
				if bans.len() != record.total_banned {
					warn!(
						"Ban list count mismatch: totalBanned={}, unique entries={}",
						record.total_banned,
						bans.len()
					);
				}
				info!("Loaded {} banned clients", bans.len());
				(bans, false)
			}
			Ok(None) => {
				info!("No ban list found, starting with an empty one");
				(HashSet::new(), true)
			}
			Err(e) => {
				error!("Failed to load ban list, starting with an empty one: {}", e);
				(HashSet::new(), false)
			}
		};

		let store = Self {
			bans: RwLock::new(bans),
			storage,
			writer: Mutex::new(()),
			persist_failures: AtomicU64::new(0),
		};
		if write_back {
			store.persist_logged();
		}
		store
	}

	pub fn is_banned(&self, id: &str) -> bool {
		self.bans.read().contains(id)
	}

	/// Ban `id`. Returns false (and writes nothing) if it was already banned.
	pub fn ban(&self, id: &ClientId) -> bool {
		if !self.bans.write().insert(id.clone()) {
			return false;
		}
		info!(client = %id, "Client banned");
		self.persist_logged();
		true
	}

	/// Lift the ban on `id`. Returns whether it was banned.
	pub fn unban(&self, id: &str) -> bool {
		if !self.bans.write().remove(id) {
			return false;
		}
		info!(client = %id, "Client unbanned");
		self.persist_logged();
		true
	}

	/// Banned identities, sorted
	pub fn list(&self) -> Vec<ClientId> {
		let mut ips: Vec<ClientId> = self.bans.read().iter().cloned().collect();
		ips.sort_unstable();
		ips
	}

	pub fn len(&self) -> usize {
		self.bans.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.bans.read().is_empty()
	}

	/// Write the full ban list to storage
	pub fn persist(&self) -> GkResult<()> {
		let _writer = self.writer.lock();
		let record = BanRecord::new(self.list());
		self.storage.save(&record)?;
		debug!("Ban list persisted ({} entries)", record.total_banned);
		Ok(())
	}

	/// Number of failed writes since startup
	pub fn persist_failures(&self) -> u64 {
		self.persist_failures.load(Ordering::Relaxed)
	}

	fn persist_logged(&self) {
		if let Err(e) = self.persist() {
			self.persist_failures.fetch_add(1, Ordering::Relaxed);
			error!("Failed to persist ban list: {}", e);
		}
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use std::sync::Arc;
	use std::sync::atomic::AtomicUsize;

	/// In-memory storage counting the writes it receives
	#[derive(Clone, Default)]
	pub(crate) struct MemoryStorage {
		pub record: Arc<Mutex<Option<BanRecord>>>,
		pub saves: Arc<AtomicUsize>,
		pub fail_saves: Arc<std::sync::atomic::AtomicBool>,
		pub fail_load: bool,
	}

	impl BanStorage for MemoryStorage {
		fn load(&self) -> GkResult<Option<BanRecord>> {
			if self.fail_load {
				return Err(Error::Parse);
			}
			Ok(self.record.lock().clone())
		}

		fn save(&self, record: &BanRecord) -> GkResult<()> {
			if self.fail_saves.load(Ordering::Relaxed) {
				return Err(Error::Io(std::io::Error::other("disk full")));
			}
			self.saves.fetch_add(1, Ordering::Relaxed);
			*self.record.lock() = Some(record.clone());
			Ok(())
		}
	}

	#[test]
	fn test_empty_store_is_written_on_load() {
		let storage = MemoryStorage::default();
		let store = BanStore::load(Box::new(storage.clone()));

		assert!(store.is_empty());
		assert_eq!(storage.saves.load(Ordering::Relaxed), 1);
		assert_eq!(storage.record.lock().as_ref().unwrap().total_banned, 0);
	}

	#[test]
	fn test_existing_record_is_not_rewritten() {
		let storage = MemoryStorage::default();
		*storage.record.lock() = Some(BanRecord::new(vec!["1.1.1.1".into()]));

		let store = BanStore::load(Box::new(storage.clone()));
		assert!(store.is_banned("1.1.1.1"));
		assert_eq!(storage.saves.load(Ordering::Relaxed), 0);
	}

	#[test]
	fn test_ban_is_idempotent() {
		let storage = MemoryStorage::default();
		let store = BanStore::load(Box::new(storage.clone()));
		let loaded_saves = storage.saves.load(Ordering::Relaxed);

		let x = ClientId::from("x");
		assert!(store.ban(&x));
		assert!(!store.ban(&x));

		assert_eq!(storage.saves.load(Ordering::Relaxed) - loaded_saves, 1);
		assert_eq!(store.list(), vec![x.clone()]);
		let record = storage.record.lock().clone().unwrap();
		assert_eq!(record.ips, vec![x]);
		assert_eq!(record.total_banned, 1);
	}

	#[test]
	fn test_unban() {
		let storage = MemoryStorage::default();
		let store = BanStore::load(Box::new(storage.clone()));

		store.ban(&ClientId::from("x"));
		let saves = storage.saves.load(Ordering::Relaxed);

		assert!(!store.unban("y"));
		assert_eq!(storage.saves.load(Ordering::Relaxed), saves);

		assert!(store.unban("x"));
		assert!(!store.is_banned("x"));
		assert_eq!(storage.saves.load(Ordering::Relaxed), saves + 1);
		assert!(storage.record.lock().as_ref().unwrap().ips.is_empty());
	}

	#[test]
	fn test_load_failure_does_not_overwrite() {
		let storage = MemoryStorage { fail_load: true, ..MemoryStorage::default() };
		*storage.record.lock() = Some(BanRecord::new(vec!["1.1.1.1".into()]));
		let store = BanStore::load(Box::new(storage.clone()));

		assert!(store.is_empty());
		assert_eq!(storage.saves.load(Ordering::Relaxed), 0);
		assert_eq!(storage.record.lock().as_ref().unwrap().ips, vec![ClientId::from("1.1.1.1")]);
	}

	#[test]
	fn test_save_failure_keeps_ban() {
		let storage = MemoryStorage::default();
		let store = BanStore::load(Box::new(storage.clone()));
		storage.fail_saves.store(true, Ordering::Relaxed);

		assert!(store.ban(&ClientId::from("x")));
		assert!(store.is_banned("x"));
		assert_eq!(store.persist_failures(), 1);

		// Next successful write catches up
		storage.fail_saves.store(false, Ordering::Relaxed);
		store.persist().unwrap();
		assert_eq!(storage.record.lock().as_ref().unwrap().ips, vec![ClientId::from("x")]);
	}

	#[test]
	fn test_duplicates_in_record_collapse() {
		let storage = MemoryStorage::default();
		*storage.record.lock() = Some(BanRecord::new(vec!["a".into(), "a".into(), "b".into()]));

		let store = BanStore::load(Box::new(storage));
		assert_eq!(store.len(), 2);
	}
}

// vim: ts=4
