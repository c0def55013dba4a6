use crate::adaptors::grpc::GrpcRouter;
use crate::adaptors::{api, jsonrpc, tendermint, websocket};
use crate::config::GatewayConfig;
use crate::metrics::Metrics;
use crate::registry::Registry;
use crate::server;
use crate::server::{GatewayState, API_DRAIN_TIMEOUT, STANDARD_DRAIN_TIMEOUT};
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// CLI arguments forwarded from `main()`.
pub struct BootstrapArgs {
    pub config_path: std::path::PathBuf,
    pub admin_listen: String,
}

/// Gateway lifecycle: load → spawn five protocol listeners + admin → wait
/// for shutdown → drain each listener → close the connection pool (spec
/// §4.6). Ports of 0 disable a protocol entirely (spec §6).
pub async fn run(args: BootstrapArgs) -> Result<()> {
    init_tracing();

    let config = GatewayConfig::load(&args.config_path)?;
    let registry = Registry::new(config.upstream.clone());
    let metrics = Metrics::install();
    let state = GatewayState::new(registry, config.ports, metrics);

    let shutdown = Arc::new(Notify::new());
    let mut listeners = Vec::new();

    if state.ports.api != 0 {
        listeners.push(spawn_listener(
            "api",
            state.ports.api,
            state.clone(),
            shutdown.clone(),
            API_DRAIN_TIMEOUT,
            |req, state| async move { api::handle(req, &state).await },
        ));
    }

    if state.ports.rpc != 0 {
        listeners.push(spawn_listener(
            "tendermint",
            state.ports.rpc,
            state.clone(),
            shutdown.clone(),
            STANDARD_DRAIN_TIMEOUT,
            |req, state| async move { tendermint::handle(req, &state).await },
        ));
    }

    if state.ports.jsonrpc != 0 {
        listeners.push(spawn_listener(
            "jsonrpc",
            state.ports.jsonrpc,
            state.clone(),
            shutdown.clone(),
            STANDARD_DRAIN_TIMEOUT,
            |req, state| async move { jsonrpc::handle(req, &state).await },
        ));
    }

    if state.ports.jsonrpc_ws != 0 {
        listeners.push(spawn_listener(
            "websocket",
            state.ports.jsonrpc_ws,
            state.clone(),
            shutdown.clone(),
            STANDARD_DRAIN_TIMEOUT,
            |req, state| async move { websocket::handle(req, state).await },
        ));
    }

    if state.ports.grpc != 0 {
        let addr: SocketAddr = ([0, 0, 0, 0], state.ports.grpc).into();
        let router = GrpcRouter::new(state.clone());
        let shutdown = shutdown.clone();
        listeners.push(tokio::spawn(async move {
            if let Err(e) = server::serve("grpc", addr, shutdown, STANDARD_DRAIN_TIMEOUT, move |req| {
                let router = router.clone();
                async move { router.handle(req).await }
            })
            .await
            {
                tracing::error!("server: grpc: failed, error={}", e);
            }
        }));
    }

    start_admin_server(&state, &args.admin_listen, &shutdown);

    tracing::info!("server: gateway started, protocols={}", listeners.len());

    wait_for_shutdown(&shutdown).await;

    for handle in listeners {
        if let Err(e) = handle.await {
            tracing::error!("server: listener task error: {}", e);
        }
    }

    state.pool.close();
    tracing::info!("server: shutdown complete");
    Ok(())
}

fn spawn_listener<H, F>(
    name: &'static str,
    port: u16,
    state: GatewayState,
    shutdown: Arc<Notify>,
    drain_timeout: std::time::Duration,
    handler: H,
) -> tokio::task::JoinHandle<()>
where
    H: Fn(hyper::Request<hyper::body::Incoming>, GatewayState) -> F + Clone + Send + Sync + 'static,
    F: std::future::Future<Output = hyper::Response<crate::proxy::context::BoxBody>> + Send + 'static,
{
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    tokio::spawn(async move {
        let result = server::serve(name, addr, shutdown, drain_timeout, move |req| {
            handler(req, state.clone())
        })
        .await;
        if let Err(e) = result {
            tracing::error!("server: {}: failed, error={}", name, e);
        }
    })
}

fn start_admin_server(state: &GatewayState, admin_listen: &str, shutdown: &Arc<Notify>) {
    let state = state.clone();
    let shutdown = shutdown.clone();
    let Ok(addr) = admin_listen.parse::<SocketAddr>() else {
        tracing::error!("server: admin: invalid listen address {}", admin_listen);
        return;
    };

    tokio::spawn(async move {
        // The admin listener is not part of the graceful-drain fleet: health
        // and metrics scrapers should keep working for the full shutdown
        // window, so it is simply aborted when the process exits.
        let _ = server::serve(
            "admin",
            addr,
            shutdown,
            std::time::Duration::from_secs(1),
            move |req| {
                let state = state.clone();
                async move { server::handle_admin(req, state) }
            },
        )
        .await;
    });
}

fn init_tracing() {
    let (non_blocking, _guard) = tracing_appender::non_blocking::NonBlockingBuilder::default()
        .buffered_lines_limit(128_000)
        .lossy(true)
        .finish(std::io::stdout());

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(false)
                .json(),
        )
        .init();

    std::mem::forget(_guard);
}

async fn wait_for_shutdown(shutdown: &Arc<Notify>) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("server: received SIGINT, shutting down"),
        _ = terminate => tracing::info!("server: received SIGTERM, shutting down"),
    }

    shutdown.notify_waiters();
}
