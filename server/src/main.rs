use gatekeeper::{ServerConfig, app};

#[tokio::main]
async fn main() -> Result<(), gatekeeper_core::error::Error> {
	app::init_logging();

	let config = ServerConfig::from_env()?;
	app::run(config).await
}

// vim: ts=4
