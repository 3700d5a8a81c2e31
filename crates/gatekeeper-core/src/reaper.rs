//! Background Reaper
//!
//! Periodically evicts tracker entries of idle, non-banned clients so the
//! tracker does not grow without bound.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::gatekeeper::Gatekeeper;
use crate::prelude::*;

/// Spawn the reaper on the current tokio runtime. It runs every
/// `reap_interval` of the gatekeeper config until `cancel` fires.
pub fn spawn_reaper(gatekeeper: Arc<Gatekeeper>, cancel: CancellationToken) -> JoinHandle<()> {
	let period = gatekeeper.config().reap_interval.max(Duration::from_millis(1));

	tokio::spawn(async move {
		let mut interval = tokio::time::interval(period);
		interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
		// The first tick completes immediately
		interval.tick().await;
		info!("Reaper started (every {:?})", period);

		loop {
			tokio::select! {
				() = cancel.cancelled() => break,
				_ = interval.tick() => {
					gatekeeper.reap(Instant::now());
				}
			}
		}
		debug!("Reaper stopped");
	})
}


// vim: ts=4
