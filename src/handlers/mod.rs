pub mod extract;
pub mod owners;
pub mod pets;

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post, put};
use axum::Router;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

use crate::error::ErrorCode;
use crate::health;
use crate::observability::metrics::Metrics;
use crate::store::StoreSessionFactory;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StoreSessionFactory>,
    pub metrics: Arc<Metrics>,
    pub readiness: Arc<AtomicBool>,
    pub draining: Arc<AtomicBool>,
    pub service_id: String,
    pub project_name: String,
    pub version: String,
}

impl AppState {
    pub fn new(store: Arc<dyn StoreSessionFactory>, metrics: Arc<Metrics>, service_id: String) -> Self {
        Self {
            store,
            metrics,
            readiness: Arc::new(AtomicBool::new(false)),
            draining: Arc::new(AtomicBool::new(false)),
            service_id,
            project_name: "PetShop".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_project(mut self, name: String, version: String) -> Self {
        self.project_name = name;
        self.version = version;
        self
    }

    pub fn mark_ready(&self) {
        self.readiness.store(true, Ordering::SeqCst);
    }

    pub fn start_draining(&self) {
        self.draining.store(true, Ordering::SeqCst);
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/owners", post(owners::create_owner).get(owners::list_owners))
        .route("/owners/by-date", get(owners::list_owners_by_date))
        .route("/owners/:owner_id", delete(owners::delete_owner))
        .route("/pets", post(pets::create_pet).get(pets::list_pets_by_owner_name))
        .route("/pets/owner", get(pets::owner_of_pet_by_name))
        .route("/pets/owner/:owner_id", get(pets::list_pets_by_owner_id))
        .route("/pets/:pet_id", put(pets::update_pet))
        .route("/pets/:pet_id/owner", get(pets::owner_of_pet))
        .route("/pets/:pet_id/owner/:owner_id", delete(pets::delete_pet))
        .merge(health::routes())
        .layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .with_state(state)
}

async fn track_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let span = tracing::info_span!(
        "request",
        service_id = %state.service_id,
        method = %method,
        path = %req.uri().path(),
    );
    let started = Instant::now();
    let response = next.run(req).instrument(span.clone()).await;

    let status = response.status().as_u16();
    if let Some(ErrorCode(code)) = response.extensions().get::<ErrorCode>() {
        state.metrics.record_error(code);
    }
    state
        .metrics
        .observe_request(method.as_str(), status, started.elapsed().as_secs_f64());
    span.in_scope(|| tracing::debug!(status, "request finished"));
    response
}
