//! Connection handling
//!
//! Connections are served by hyper directly instead of `axum::serve` so a
//! request can fail the whole connection. Every connection carries its own
//! cancellation token: when the admission engine rejects a request the token
//! fires and the connection future is dropped together with the socket,
//! without writing a status line. This holds for HTTP/2 as well, where a
//! failing service call alone would only reset one stream. Admitted requests
//! are handed to the axum router with the resolved client identity attached
//! as an extension.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes, HttpBody};
use axum::{BoxError, Router};
use gatekeeper_core::{ConnectionControl, Gatekeeper};
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use crate::prelude::*;

/// Returned by the service to make hyper abort the connection
#[derive(Debug)]
pub struct ConnectionAborted;

impl fmt::Display for ConnectionAborted {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "connection aborted")
	}
}

impl std::error::Error for ConnectionAborted {}

/// Handle on the connection a request arrived on. Aborting cancels the
/// connection token, which makes the accept loop drop the whole connection.
#[derive(Debug, Clone, Default)]
pub struct HyperConnection {
	token: CancellationToken,
}

impl HyperConnection {
	pub fn is_aborted(&self) -> bool {
		self.token.is_cancelled()
	}
}

impl ConnectionControl for HyperConnection {
	fn abort(&mut self) {
		self.token.cancel();
	}
}

/// Accept connections until `shutdown` fires
pub async fn serve(
	listener: TcpListener,
	gatekeeper: Arc<Gatekeeper>,
	router: Router,
	shutdown: CancellationToken,
) {
	loop {
		let (stream, peer) = tokio::select! {
			() = shutdown.cancelled() => break,
			res = listener.accept() => match res {
				Ok(conn) => conn,
				Err(e) => {
					warn!("Accept failed: {}", e);
					continue;
				}
			},
		};

		let gatekeeper = gatekeeper.clone();
		let router = router.clone();
		tokio::spawn(async move {
			let conn = HyperConnection::default();
			let abort = conn.token.clone();
			let svc = hyper::service::service_fn(move |req: hyper::Request<Incoming>| {
				handle_request(gatekeeper.clone(), router.clone(), conn.clone(), peer, req)
			});
			let builder = auto::Builder::new(TokioExecutor::new());
			let serve = builder.serve_connection(TokioIo::new(stream), svc);

			tokio::select! {
				res = serve => {
					if let Err(e) = res {
						debug!("Connection from {} closed: {}", peer, e);
					}
				}
				// Dropping the connection future closes the socket
				() = abort.cancelled() => debug!("Connection from {} aborted", peer),
			}
		});
	}
	info!("Stopped accepting connections");
}

/// Run admission for one request, then route it. On rejection `conn` is
/// aborted and the call fails without producing a response.
pub async fn handle_request<B>(
	gatekeeper: Arc<Gatekeeper>,
	router: Router,
	mut conn: HyperConnection,
	peer: SocketAddr,
	mut req: hyper::Request<B>,
) -> Result<axum::response::Response, ConnectionAborted>
where
	B: HttpBody<Data = Bytes> + Send + 'static,
	B::Error: Into<BoxError>,
{
	let admission = gatekeeper.admit(req.headers(), Some(peer), &mut conn);
	if conn.is_aborted() {
		debug!("Dropping connection from {} ({:?})", peer, admission);
		return Err(ConnectionAborted);
	}
	let client_id = admission.client_id().clone();

	let start = Instant::now();
	info!("REQ [{}] {} {} {}", peer, client_id, req.method(), req.uri().path());
	req.extensions_mut().insert(client_id);

	let res = match router.oneshot(req.map(Body::new)).await {
		Ok(res) => res,
		Err(never) => match never {},
	};

	let status = res.status();
	if status.is_client_error() || status.is_server_error() {
		warn!("RES: {} tm:{:?}", status, start.elapsed().as_millis());
	} else {
		info!("RES: {} tm:{:?}", status, start.elapsed().as_millis());
	}
	Ok(res)
}

// vim: ts=4
