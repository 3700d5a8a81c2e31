//! HTTP front server guarded by the Gatekeeper admission engine.
//!
//! Every request goes through the admission engine before it is routed.
//! Rejected requests never reach a handler: their connection is dropped
//! without a response. Admitted requests are served by an axum router with
//! a few JSON status endpoints and a static file fallback.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod app;
pub mod config;
pub mod handler;
pub mod prelude;
pub mod routes;
pub mod webserver;

pub use app::run;
pub use config::ServerConfig;

// vim: ts=4
