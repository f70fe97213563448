use axum::{routing::get, Router, extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::atomic::Ordering;
use tokio::net::TcpListener;

use crate::handlers::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(welcome_handler))
        .route("/_health", get(health_handler))
        .route("/readyz", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .route("/_build", get(build_handler))
}

pub async fn start_server<F>(
    bind_addr: &str,
    app: Router,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(bind_addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

async fn welcome_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "msg": format!("Welcome to {}", state.project_name) }))
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn ready_handler(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.draining.load(Ordering::SeqCst) {
        return (StatusCode::SERVICE_UNAVAILABLE, "DRAINING");
    }
    if !state.readiness.load(Ordering::SeqCst) {
        return (StatusCode::SERVICE_UNAVAILABLE, "NOT_READY");
    }
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "READY"),
        Err(e) => {
            tracing::warn!(error = %e, "readiness check could not reach store");
            (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE")
        }
    }
}

async fn build_handler(State(state): State<AppState>) -> String {
    state.version.clone()
}

async fn metrics_handler(State(state): State<AppState>) -> (StatusCode, String) {
    let data = state.metrics.encode();
    (StatusCode::OK, String::from_utf8_lossy(&data).to_string())
}
