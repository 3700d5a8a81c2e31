//! JSON endpoints
//!
//! Thin wrappers around the gatekeeper API. The ban list endpoints are only
//! mounted when an admin token is configured.

use axum::{
	Extension, Json,
	extract::{Path, Request, State},
	http::{StatusCode, header},
	middleware::Next,
	response::Response,
};
use gatekeeper_core::{ClientStatus, GatekeeperStats};
use serde::Serialize;
use std::time::Instant;
use subtle::ConstantTimeEq;

use crate::prelude::*;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BanListResponse {
	pub ips: Vec<ClientId>,
	pub total_banned: usize,
}

#[derive(Debug, Serialize)]
pub struct UnbanResponse {
	pub ip: ClientId,
	pub unbanned: bool,
}

/// Quota status of the calling client
pub async fn get_status(
	State(app): State<App>,
	Extension(client_id): Extension<ClientId>,
) -> Json<ClientStatus> {
	Json(app.gatekeeper.client_status(&client_id, Instant::now()))
}

pub async fn get_stats(State(app): State<App>) -> Json<GatekeeperStats> {
	Json(app.gatekeeper.stats())
}

pub async fn get_banned(State(app): State<App>) -> Json<BanListResponse> {
	let ips = app.gatekeeper.list_bans();
	Json(BanListResponse { total_banned: ips.len(), ips })
}

pub async fn delete_banned(
	State(app): State<App>,
	Path(ip): Path<String>,
) -> Result<Json<UnbanResponse>, StatusCode> {
	if !app.gatekeeper.unban(&ip) {
		return Err(StatusCode::NOT_FOUND);
	}
	Ok(Json(UnbanResponse { ip: ip.into(), unbanned: true }))
}

/// Require `Authorization: Bearer <admin token>`
pub async fn require_admin(
	State(app): State<App>,
	req: Request,
	next: Next,
) -> Result<Response, StatusCode> {
	let Some(token) = app.opts.admin_token.as_deref() else {
		return Err(StatusCode::NOT_FOUND);
	};
	let authorized = req
		.headers()
		.get(header::AUTHORIZATION)
		.and_then(|h| h.to_str().ok())
		.and_then(bearer_token)
		.is_some_and(|t| bool::from(t.as_bytes().ct_eq(token.as_bytes())));

	if !authorized {
		warn!("Rejected admin request to {}", req.uri().path());
		return Err(StatusCode::UNAUTHORIZED);
	}
	Ok(next.run(req).await)
}

/// Credentials of an `Authorization: Bearer` header. The scheme name is
/// case-insensitive.
fn bearer_token(value: &str) -> Option<&str> {
	let (scheme, token) = value.trim().split_once(' ')?;
	scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_bearer_token() {
		assert_eq!(bearer_token("Bearer abc"), Some("abc"));
		assert_eq!(bearer_token("bearer abc"), Some("abc"));
		assert_eq!(bearer_token("BEARER  abc "), Some("abc"));
		assert_eq!(bearer_token("Basic abc"), None);
		assert_eq!(bearer_token("Bearer"), None);
	}
}

// vim: ts=4
