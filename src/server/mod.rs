mod admin;
pub mod bootstrap;
pub mod runtime;
mod state;

pub use admin::handle_admin;
pub use state::GatewayState;

use crate::accounting::Accounting;
use anyhow::Result;
use bytes::Bytes;
use http_body::Body;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{error, info};

/// Drain budget for the four request/response protocols (spec §4.6).
pub const STANDARD_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
/// The REST/API listener drains faster — its clients are expected to retry
/// on connection loss, so there is no reason to hold the line open as long.
pub const API_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Accept loop shared by every protocol listener and the admin server (the
/// Lifecycle Coordinator, spec §4.6): serve connections with `handler` until
/// `shutdown` fires, then stop accepting and wait up to `drain_timeout` for
/// in-flight connections to finish before returning.
///
/// Grounded on the teacher's `run_proxy_server`, generalized from one
/// hard-coded protocol to any `handler` with a per-listener drain budget,
/// and switched from the ad hoc `Semaphore`+`AtomicI64` pair to the shared
/// `Accounting` wait-group so every listener drains the same way.
///
/// Generic over the response body type so both the ordinary adaptors
/// (`crate::proxy::context::BoxBody`, erroring as `hyper::Error`) and the
/// gRPC router (`tonic::body::BoxBody`, erroring as `tonic::Status`) can
/// share this one accept loop.
pub async fn serve<H, F, B>(
    name: &'static str,
    listen: SocketAddr,
    shutdown: Arc<Notify>,
    drain_timeout: Duration,
    handler: H,
) -> Result<()>
where
    H: Fn(Request<Incoming>) -> F + Clone + Send + Sync + 'static,
    F: Future<Output = Response<B>> + Send + 'static,
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let listener = TcpListener::bind(listen).await?;
    info!("server: {}: listening, addr={}", name, listen);

    let connections = Accounting::new();

    loop {
        let accepted = tokio::select! {
            result = listener.accept() => result,
            _ = shutdown.notified() => {
                info!("server: {}: stop accepting new connections, draining...", name);
                break;
            }
        };

        let (stream, peer_addr) = match accepted {
            Ok(v) => {
                metrics::counter!("gateway_connections_total", "protocol" => name, "status" => "accepted")
                    .increment(1);
                v
            }
            Err(e) => {
                error!("server: {}: accept failed, error={}", name, e);
                metrics::counter!("gateway_connections_total", "protocol" => name, "status" => "error")
                    .increment(1);
                continue;
            }
        };

        let handler = handler.clone();
        let conn_guard = connections.begin();
        metrics::gauge!("gateway_connections_active", "protocol" => name).increment(1.0);

        tokio::spawn(async move {
            let _conn_guard = conn_guard;
            let io = TokioIo::new(stream);
            let svc = service_fn(move |req: Request<Incoming>| {
                let handler = handler.clone();
                async move { Ok::<_, Infallible>(handler(req).await) }
            });

            if let Err(e) = auto::Builder::new(TokioExecutor::new())
                .http1()
                .keep_alive(true)
                .http2()
                .keep_alive_interval(Some(Duration::from_secs(20)))
                .serve_connection_with_upgrades(io, svc)
                .await
            {
                if !e.to_string().contains("connection closed") {
                    error!("server: {}: connection error, peer={}, error={}", name, peer_addr, e);
                }
            }

            metrics::gauge!("gateway_connections_active", "protocol" => name).decrement(1.0);
        });
    }

    if connections.drain(drain_timeout).await {
        info!("server: {}: all connections drained", name);
    } else {
        info!(
            "server: {}: drain timeout ({}s), {} connections still active",
            name,
            drain_timeout.as_secs(),
            connections.in_flight(),
        );
    }

    Ok(())
}
