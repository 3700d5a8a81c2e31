use axum::{
	Router, middleware,
	routing::{delete, get},
};
use tower_http::services::ServeDir;

use crate::handler;
use crate::prelude::*;

pub fn init(app: App) -> Router {
	let mut router = Router::new()
		.route("/api/status", get(handler::get_status))
		.route("/api/stats", get(handler::get_stats));

	if app.opts.admin_token.is_some() {
		let admin_router = Router::new()
			.route("/api/banned", get(handler::get_banned))
			.route("/api/banned/{ip}", delete(handler::delete_banned))
			.route_layer(middleware::from_fn_with_state(app.clone(), handler::require_admin));
		router = router.merge(admin_router);
	} else {
		info!("No admin token configured, ban list endpoints disabled");
	}

	router.fallback_service(ServeDir::new(&app.opts.static_dir)).with_state(app)
}

// vim: ts=4
