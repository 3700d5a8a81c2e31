//! Admission API
//!
//! Types exchanged between the admission engine and the HTTP layer in front
//! of the application.

use serde::Serialize;

use crate::types::ClientId;

/// Control over the connection a request arrived on.
///
/// Aborting is not the same as answering with an error status: nothing at
/// all is written, the transport is torn down. Scanners and abusive clients
/// get no confirmation that they were blocked.
pub trait ConnectionControl {
	/// Tear down the connection without sending a response
	fn abort(&mut self);
}

/// Outcome of an admission decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
	/// Pass the request on to the application
	Admitted {
		client_id: ClientId,
		/// Requests in the current window, this one included
		count: u32,
		/// Requests left before the client gets banned
		remaining: u32,
	},
	/// The client was already banned; the connection has been aborted
	RejectedBanned { client_id: ClientId },
	/// This request pushed the client over the limit; the client is now
	/// banned and the connection has been aborted
	BannedNow { client_id: ClientId, count: u32 },
}

impl Admission {
	pub fn is_admitted(&self) -> bool {
		matches!(self, Admission::Admitted { .. })
	}

	pub fn client_id(&self) -> &ClientId {
		match self {
			Admission::Admitted { client_id, .. }
			| Admission::RejectedBanned { client_id }
			| Admission::BannedNow { client_id, .. } => client_id,
		}
	}
}

/// Quota status of a single client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientStatus {
	pub ip: ClientId,
	pub request_count: u32,
	pub limit: u32,
	pub remaining: u32,
	pub window_seconds: u64,
	/// Seconds until the current window resets (0 without an open window)
	pub reset_in_seconds: u64,
	pub banned: bool,
}

/// Counters of the admission engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatekeeperStats {
	/// Identities currently tracked
	pub tracked_clients: usize,
	/// Identities currently banned
	pub active_bans: usize,
	pub total_admitted: u64,
	/// Connections aborted because the client was already banned
	pub total_rejected: u64,
	/// Bans issued by the engine since startup
	pub total_bans_issued: u64,
	/// Entries removed by the reaper since startup
	pub total_reaped: u64,
	pub persist_failures: u64,
}

// vim: ts=4
