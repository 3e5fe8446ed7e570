//! Axum router wiring.

use axum::{
    routing::{get, post},
    Router,
};

use crate::{admin, app_state::AppState, ops};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(ops::healthz))
        .route("/metrics", get(ops::metrics))
        .route("/v1/targets/:uuid/bindings", get(admin::list_bindings))
        .route("/v1/targets/:uuid/evaluate", post(admin::evaluate))
        .with_state(state)
}
