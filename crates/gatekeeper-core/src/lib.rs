//! Admission engine of the Gatekeeper request guard.
//!
//! Attributes every inbound request to a client identity, counts requests per
//! identity in a tumbling window and permanently bans clients going over the
//! limit. The ban list is persisted and survives restarts; banned clients get
//! their connection aborted before any application code runs.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod api;
pub mod ban_store;
pub mod config;
pub mod error;
pub mod gatekeeper;
pub mod identity;
pub mod prelude;
pub mod reaper;
pub mod storage;
pub mod tracker;
pub mod types;

pub use api::{Admission, ClientStatus, ConnectionControl, GatekeeperStats};
pub use config::{GatekeeperConfig, IdentityConfig};
pub use gatekeeper::Gatekeeper;
pub use reaper::spawn_reaper;
pub use storage::{BanRecord, BanStorage, JsonFileStorage};
pub use types::ClientId;

// vim: ts=4
