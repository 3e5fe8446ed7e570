//! Admin surface: binding listing and ad-hoc evaluation ("test a target as user X").
//!
//! - `GET  /v1/targets/:uuid/bindings`
//! - `POST /v1/targets/:uuid/evaluate`

mod error;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use gatekeep_core::error::Result;
use gatekeep_core::{PolicyResult, TransportContext, User};

use crate::app_state::AppState;
use crate::catalog::Catalog;
use crate::engine::{EngineContext, PolicyEngine};

pub use error::ApiError;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvaluateRequest {
    pub user: User,
    #[serde(default)]
    pub context: Map<String, Value>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default = "default_true")]
    pub use_cache: bool,
    #[serde(default)]
    pub debug: bool,
}

fn default_true() -> bool {
    true
}

impl EvaluateRequest {
    pub fn new(user: User) -> Self {
        Self {
            user,
            context: Map::new(),
            session_id: None,
            use_cache: true,
            debug: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluateResponse {
    pub passing: bool,
    pub messages: Vec<String>,
}

impl From<PolicyResult> for EvaluateResponse {
    fn from(r: PolicyResult) -> Self {
        Self {
            passing: r.passing,
            messages: r.messages().to_vec(),
        }
    }
}

/// Evaluate a persisted target for an arbitrary user.
pub async fn test_evaluate(
    catalog: &Catalog,
    ctx: EngineContext,
    target_pk: &Uuid,
    req: EvaluateRequest,
) -> Result<PolicyResult> {
    let target = catalog.target(target_pk)?;
    let transport = req.session_id.map(TransportContext::with_session);

    let mut engine = PolicyEngine::new(&target, req.user, transport, ctx);
    engine.use_cache = req.use_cache;
    engine.request_mut().context = req.context;
    engine.request_mut().debug = req.debug;

    let result = engine.build().await?.result();
    tracing::debug!(target_pk=%target_pk, passing=result.passing, "admin evaluation");
    Ok(result)
}

pub async fn list_bindings(
    State(state): State<AppState>,
    Path(target): Path<Uuid>,
) -> std::result::Result<Json<Vec<Value>>, ApiError> {
    let bindings = state.catalog().bindings_for_target(&target)?;
    Ok(Json(bindings.iter().map(|b| b.describe()).collect()))
}

pub async fn evaluate(
    State(state): State<AppState>,
    Path(target): Path<Uuid>,
    Json(req): Json<EvaluateRequest>,
) -> std::result::Result<Json<EvaluateResponse>, ApiError> {
    let result = test_evaluate(state.catalog(), state.engine_context(), &target, req).await?;
    Ok(Json(result.into()))
}
