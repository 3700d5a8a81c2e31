//! Admission Decision Engine
//!
//! Every request passes through [`Gatekeeper::admit`] before it reaches the
//! application. The decision for one request:
//!
//! 1. resolve the client identity
//! 2. banned clients are rejected right away, their tracker state is never
//!    touched again
//! 3. otherwise the request is counted in the client's window
//! 4. the request that pushes the count over the limit bans the client and
//!    is rejected itself
//! 5. everything else is admitted
//!
//! Rejections abort the connection instead of producing a response.
//!
//! Steps 2-4 run under the tracker lock, so for a given identity the ban
//! check, the count update and the ban are atomic with respect to other
//! requests and to the reaper. The ban write to storage happens under that
//! lock too; bans are rare and the write is small.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use hyper::header::HeaderMap;
use parking_lot::Mutex;

use crate::api::{Admission, ClientStatus, ConnectionControl, GatekeeperStats};
use crate::ban_store::BanStore;
use crate::config::GatekeeperConfig;
use crate::identity::resolve_client_id;
use crate::prelude::*;
use crate::storage::{BanStorage, JsonFileStorage};
use crate::tracker::{RequestTracker, TrackerEntry};

pub struct Gatekeeper {
	config: GatekeeperConfig,
	tracker: Mutex<RequestTracker>,
	bans: BanStore,
	total_admitted: AtomicU64,
	total_rejected: AtomicU64,
	total_bans: AtomicU64,
	total_reaped: AtomicU64,
}

impl Gatekeeper {
	/// Create a gatekeeper persisting its ban list to `config.ban_file`
	pub fn new(config: GatekeeperConfig) -> Self {
		let storage = JsonFileStorage::new(config.ban_file.clone());
		Self::with_storage(config, Box::new(storage))
	}

	/// Create a gatekeeper with a custom ban list backend
	pub fn with_storage(config: GatekeeperConfig, storage: Box<dyn BanStorage>) -> Self {
		let tracker = RequestTracker::new(config.limit, config.soft_limit(), config.window);
		let bans = BanStore::load(storage);
		info!(
			"Gatekeeper ready: limit={} window={:?} banned={}",
			config.limit,
			config.window,
			bans.len()
		);

		Self {
			config,
			tracker: Mutex::new(tracker),
			bans,
			total_admitted: AtomicU64::new(0),
			total_rejected: AtomicU64::new(0),
			total_bans: AtomicU64::new(0),
			total_reaped: AtomicU64::new(0),
		}
	}

	pub fn config(&self) -> &GatekeeperConfig {
		&self.config
	}

	/// Resolve the identity of a request
	pub fn resolve(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> ClientId {
		resolve_client_id(headers, peer, &self.config.identity)
	}

	/// Decide on an inbound request, aborting `conn` if it is rejected.
	///
	/// Blocks the calling thread: see [`Gatekeeper::decide`].
	pub fn admit<C>(&self, headers: &HeaderMap, peer: Option<SocketAddr>, conn: &mut C) -> Admission
	where
		C: ConnectionControl + ?Sized,
	{
		self.admit_at(headers, peer, conn, Instant::now())
	}

	/// Same as [`Gatekeeper::admit`] with an explicit clock reading
	pub fn admit_at<C>(
		&self,
		headers: &HeaderMap,
		peer: Option<SocketAddr>,
		conn: &mut C,
		now: Instant,
	) -> Admission
	where
		C: ConnectionControl + ?Sized,
	{
		let client_id = self.resolve(headers, peer);
		let admission = self.decide(client_id, now);
		if !admission.is_admitted() {
			conn.abort();
		}
		admission
	}

	/// Admission decision for an already resolved identity.
	///
	/// This is a blocking call. It waits on the tracker mutex, and the request
	/// that triggers a ban also writes and syncs the ban list while holding
	/// it. Async callers run it inline on the runtime thread, which is fine
	/// for occasional small writes; a slow disk stalls admission for all
	/// clients until the write returns.
	pub fn decide(&self, client_id: ClientId, now: Instant) -> Admission {
		let mut tracker = self.tracker.lock();

		if self.bans.is_banned(&client_id) {
			self.total_rejected.fetch_add(1, Ordering::Relaxed);
			debug!(client = %client_id, "Rejected banned client");
			return Admission::RejectedBanned { client_id };
		}

		let outcome = tracker.record_and_check(&client_id, now);
		if outcome.limit_exceeded {
			// No need to keep counting a banned identity
			tracker.remove(&client_id);
			self.bans.ban(&client_id);
			drop(tracker);

			self.total_bans.fetch_add(1, Ordering::Relaxed);
			warn!(
				client = %client_id,
				count = outcome.count,
				limit = self.config.limit,
				"Request limit exceeded, client banned"
			);
			return Admission::BannedNow { client_id, count: outcome.count };
		}
		drop(tracker);

		self.total_admitted.fetch_add(1, Ordering::Relaxed);
		Admission::Admitted {
			client_id,
			count: outcome.count,
			remaining: self.config.limit.saturating_sub(outcome.count),
		}
	}

	pub fn is_banned(&self, id: &str) -> bool {
		self.bans.is_banned(id)
	}

	/// Ban `id` explicitly. Returns false if it was already banned.
	pub fn ban(&self, id: &ClientId) -> bool {
		let mut tracker = self.tracker.lock();
		tracker.remove(id);
		self.bans.ban(id)
	}

	/// Lift the ban on `id`. Returns whether it was banned.
	pub fn unban(&self, id: &str) -> bool {
		self.bans.unban(id)
	}

	/// Banned identities, sorted
	pub fn list_bans(&self) -> Vec<ClientId> {
		self.bans.list()
	}

	/// Tracker state of `id`, if any
	pub fn tracked(&self, id: &str) -> Option<TrackerEntry> {
		self.tracker.lock().get(id)
	}

	/// Quota status of `id`
	pub fn client_status(&self, id: &ClientId, now: Instant) -> ClientStatus {
		let limit = self.config.limit;
		let (count, reset_in) = self.tracker.lock().status(id, now).unwrap_or_default();

		ClientStatus {
			ip: id.clone(),
			request_count: count,
			limit,
			remaining: limit.saturating_sub(count),
			window_seconds: self.config.window.as_secs(),
			reset_in_seconds: reset_in.as_secs(),
			banned: self.bans.is_banned(id),
		}
	}

	/// Evict tracker entries idle for longer than the stale threshold.
	/// Entries of banned identities are kept.
	pub fn reap(&self, now: Instant) -> usize {
		let mut tracker = self.tracker.lock();
		let removed =
			tracker.evict_stale(now, self.config.stale_after, |id| self.bans.is_banned(id));
		let remaining = tracker.len();
		drop(tracker);

		self.total_reaped.fetch_add(removed as u64, Ordering::Relaxed);
		if removed > 0 {
			debug!("Reaped {} stale clients, {} still tracked", removed, remaining);
		}
		removed
	}

	/// Write the ban list to storage now
	pub fn flush(&self) -> GkResult<()> {
		self.bans.persist()
	}

	pub fn stats(&self) -> GatekeeperStats {
		GatekeeperStats {
			tracked_clients: self.tracker.lock().len(),
			active_bans: self.bans.len(),
			total_admitted: self.total_admitted.load(Ordering::Relaxed),
			total_rejected: self.total_rejected.load(Ordering::Relaxed),
			total_bans_issued: self.total_bans.load(Ordering::Relaxed),
			total_reaped: self.total_reaped.load(Ordering::Relaxed),
			persist_failures: self.bans.persist_failures(),
		}
	}
}


// vim: ts=4
