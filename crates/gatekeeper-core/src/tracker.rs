//! Request Tracker
//!
//! Per-identity request counting over a tumbling window. A window starts with
//! the first request of an identity and is re-anchored on the first request
//! after it expired, so the count resets fully instead of decaying.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::prelude::*;

/// Tracking state of a single identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerEntry {
	/// Requests observed in the current window
	pub count: u32,
	/// First request of the current window
	pub window_start: Instant,
	/// Most recent request
	pub last_seen: Instant,
}

/// Result of recording one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackOutcome {
	/// Count after this request
	pub count: u32,
	/// The count is above the limit
	pub limit_exceeded: bool,
	/// This request reached the soft threshold (80% of the limit)
	pub approaching_limit: bool,
}

pub struct RequestTracker {
	entries: HashMap<ClientId, TrackerEntry>,
	limit: u32,
	soft_limit: u32,
	window: Duration,
}

impl RequestTracker {
	pub fn new(limit: u32, soft_limit: u32, window: Duration) -> Self {
		Self { entries: HashMap::new(), limit, soft_limit, window }
	}

	/// Record a request of `id` at `now` and check it against the limit
	pub fn record_and_check(&mut self, id: &ClientId, now: Instant) -> TrackOutcome {
		let window = self.window;
		let entry = self
			.entries
			.entry(id.clone())
			.and_modify(|entry| {
				if now.saturating_duration_since(entry.window_start) > window {
					entry.count = 1;
					entry.window_start = now;
				} else {
					entry.count = entry.count.saturating_add(1);
				}
				entry.last_seen = now;
			})
			.or_insert(TrackerEntry { count: 1, window_start: now, last_seen: now });

		let count = entry.count;
		let approaching_limit = self.soft_limit > 0 && count == self.soft_limit;
		if approaching_limit {
			warn!(client = %id, count, limit = self.limit, "Client approaching request limit");
		}

		TrackOutcome { count, limit_exceeded: count > self.limit, approaching_limit }
	}

	pub fn get(&self, id: &str) -> Option<TrackerEntry> {
		self.entries.get(id).copied()
	}

	pub fn remove(&mut self, id: &str) -> Option<TrackerEntry> {
		self.entries.remove(id)
	}

	/// Count in the current window and time until it resets.
	/// An expired window reads as zero requests.
	pub fn status(&self, id: &str, now: Instant) -> Option<(u32, Duration)> {
		let entry = self.entries.get(id)?;
		let elapsed = now.saturating_duration_since(entry.window_start);
		if elapsed > self.window {
			Some((0, Duration::ZERO))
		} else {
			Some((entry.count, self.window - elapsed))
		}
	}

	/// Remove entries idle for longer than `stale_after`, except those `keep`
	/// returns true for. Returns the number of removed entries.
	pub fn evict_stale(
		&mut self,
		now: Instant,
		stale_after: Duration,
		keep: impl Fn(&ClientId) -> bool,
	) -> usize {
		let before = self.entries.len();
		self.entries.retain(|id, entry| {
			now.saturating_duration_since(entry.last_seen) <= stale_after || keep(id)
		});
		before - self.entries.len()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn limit(&self) -> u32 {
		self.limit
	}

	pub fn window(&self) -> Duration {
		self.window
	}
}


// vim: ts=4
