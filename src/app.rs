use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use axum::{middleware::from_fn_with_state, routing::get, Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{info, warn};

use crate::{
    auth::{self, extractors::require_auth},
    error::route_not_found,
    middleware::{
        access_log,
        cors::cors,
        rate_limit::rate_limit,
        request_id::{RandomRequestId, REQUEST_ID_HEADER},
    },
    state::AppState,
    transactions,
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Request id → access log → CORS → (rate limit | bearer auth) → handler.
pub fn build_app(state: AppState) -> Router {
    let public = auth::auth_routes()
        .route_layer(from_fn_with_state(state.rate_limiter.clone(), rate_limit));

    let protected = auth::account_routes()
        .merge(transactions::routes())
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api/v1", public.merge(protected))
        .fallback(route_not_found)
        .with_state(state.clone())
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, RandomRequestId))
                .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
                .layer(access_log::layer())
                .layer(from_fn_with_state(state.cors, cors)),
        )
}

/// Serves until SIGINT/SIGTERM, then drains for at most [`SHUTDOWN_GRACE`].
pub async fn serve(app: Router, addr: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(addr = %listener.local_addr()?, "listening");

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = stop_rx.await;
    });
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        finished = &mut server => {
            finished.context("server task")?.context("server error")?;
            return Ok(());
        }
        _ = shutdown_signal() => {}
    }

    info!("shutdown signal received, draining connections");
    let _ = stop_tx.send(());
    match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
        Ok(finished) => finished.context("server task")?.context("server error")?,
        Err(_) => warn!(grace_secs = SHUTDOWN_GRACE.as_secs(), "drain timed out, forcing close"),
    }
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
