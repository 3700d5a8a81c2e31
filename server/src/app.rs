//! Application state and startup

use std::sync::Arc;

use gatekeeper_core::{Gatekeeper, spawn_reaper};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::prelude::*;
use crate::{routes, webserver};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct AppState {
	pub gatekeeper: Arc<Gatekeeper>,
	pub opts: ServerConfig,
}

pub type App = Arc<AppState>;

/// Install the log subscriber. Filtering follows `RUST_LOG`.
pub fn init_logging() {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_target(false)
		.init();
}

/// Run the server until a shutdown signal arrives, then flush the ban list
pub async fn run(opts: ServerConfig) -> GkResult<()> {
	info!("Gatekeeper V{}", VERSION);

	let gatekeeper = Arc::new(Gatekeeper::new(opts.gatekeeper.clone()));
	let app: App = Arc::new(AppState { gatekeeper: gatekeeper.clone(), opts });

	let shutdown = CancellationToken::new();
	let reaper = spawn_reaper(gatekeeper.clone(), shutdown.child_token());

	let listener = TcpListener::bind(app.opts.listen).await.map_err(|e| {
		error!("FATAL: Cannot bind {}: {}", app.opts.listen, e);
		Error::Io(e)
	})?;
	info!("Listening on HTTP {}", app.opts.listen);

	let router = routes::init(app.clone());
	let server = tokio::spawn(webserver::serve(listener, gatekeeper.clone(), router, shutdown.clone()));

	shutdown_signal().await;
	info!("Shutting down");
	shutdown.cancel();

	if let Err(e) = server.await {
		warn!("Server task failed: {}", e);
	}
	if let Err(e) = reaper.await {
		warn!("Reaper task failed: {}", e);
	}

	gatekeeper.flush().inspect_err(|e| error!("Failed to flush ban list on shutdown: {}", e))?;
	info!("Ban list flushed ({} entries)", gatekeeper.stats().active_bans);
	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			error!("Failed to listen for ctrl-c: {}", e);
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			}
			Err(e) => {
				error!("Failed to listen for SIGTERM: {}", e);
				std::future::pending::<()>().await;
			}
		}
	};
	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		() = ctrl_c => {}
		() = terminate => {}
	}
}

// vim: ts=4
