// HTTP server
// Exposes the run slot: submit a prompt, poll the current run, cancel it

mod handlers;
mod middleware;

pub use handlers::{create_router, health_check, ApiError, SubmitRunRequest, SubmitRunResponse};
pub use middleware::{rate_limit_middleware, RateLimiter};

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::session::RunSlot;

/// How often idle rate-limit buckets are purged
const LIMITER_PURGE_INTERVAL: Duration = Duration::from_secs(60);
/// Buckets untouched for this long are dropped
const LIMITER_IDLE: Duration = Duration::from_secs(600);

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub slot: RunSlot,
    pub limiter: RateLimiter,
}

impl AppState {
    pub fn new(slot: RunSlot, config: &ServerConfig) -> Self {
        Self {
            slot,
            limiter: RateLimiter::new(
                f64::from(config.rate_limit_rps),
                f64::from(config.rate_limit_burst),
            ),
        }
    }
}

/// CORS policy; an empty origin list allows any origin.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Serve the API until Ctrl-C.
pub async fn serve(slot: RunSlot, config: &ServerConfig) -> Result<()> {
    let addr: SocketAddr = config
        .bind_address
        .parse()
        .with_context(|| format!("Invalid bind address: {}", config.bind_address))?;

    let state = AppState::new(slot.clone(), config);

    let limiter = state.limiter.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(LIMITER_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            limiter.purge_idle(LIMITER_IDLE);
        }
    });

    let app = create_router(state)
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(slot))
    .await
    .context("HTTP server failed")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal(slot: RunSlot) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
    slot.cancel();
}
