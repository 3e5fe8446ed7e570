#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use gatekeep_core::User;
use gatekeep_engine::admin::{self, ApiError, EvaluateRequest};
use gatekeep_engine::app_state::AppState;
use gatekeep_engine::config;
use gatekeep_engine::policies::PolicyRegistry;

const TARGET: &str = "5d8f3c1e-2a1b-4c3d-9e8f-0a1b2c3d4e5f";
const GROUP: &str = "0f0e0d0c-0b0a-4908-8706-050403020100";

fn config_yaml() -> String {
    format!(
        r#"
version: 1
engine:
  audit:
    sink: none
policies:
  - name: allow
    type: dummy
    params: {{ result: true }}
  - name: deny
    type: dummy
    params: {{ result: false }}
targets:
  - uuid: {TARGET}
    name: admin-app
    mode: all
    bindings:
      - policy: allow
        order: 0
      - group: {GROUP}
        order: 1
"#
    )
}

fn state() -> AppState {
    let cfg = config::load_from_str(&config_yaml()).unwrap();
    AppState::new(cfg, &PolicyRegistry::with_builtins()).unwrap()
}

fn target() -> Uuid {
    TARGET.parse().unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn config_builds_catalog() {
    let state = state();
    let catalog = state.catalog();
    assert_eq!(catalog.policy_count(), 2);
    assert_eq!(catalog.target_count(), 1);
    assert_eq!(catalog.target_name(&target()).as_deref(), Some("admin-app"));
    assert!(catalog.policy_by_name("deny").is_some());

    let bindings = catalog.bindings_for_target(&target()).unwrap();
    assert_eq!(bindings.len(), 2);
    assert_eq!(bindings[1].order, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_evaluate_respects_group_membership() {
    let state = state();
    let group: Uuid = GROUP.parse().unwrap();

    let outsider = EvaluateRequest::new(User::new(1, "alice"));
    let res = admin::test_evaluate(state.catalog(), state.engine_context(), &target(), outsider)
        .await
        .unwrap();
    assert!(!res.passing);
    assert_eq!(res.messages(), ["dummy"]);

    let member = EvaluateRequest::new(User::new(2, "bob").with_group(group));
    let res = admin::test_evaluate(state.catalog(), state.engine_context(), &target(), member)
        .await
        .unwrap();
    assert!(res.passing);
}

#[tokio::test(flavor = "multi_thread")]
async fn evaluate_handler_returns_decision() {
    let state = state();
    let req: EvaluateRequest = serde_json::from_value(json!({
        "user": { "pk": 3, "username": "carol", "groups": [GROUP] },
        "context": { "password": "x" },
        "debug": true
    }))
    .unwrap();
    assert!(req.use_cache);

    let Json(resp) = admin::evaluate(State(state), Path(target()), Json(req))
        .await
        .unwrap();
    assert!(resp.passing);
    assert_eq!(resp.messages, vec!["dummy".to_string()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_target_is_not_found() {
    let state = state();
    let err = admin::list_bindings(State(state), Path(Uuid::new_v4()))
        .await
        .expect_err("must fail");
    assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread")]
async fn list_bindings_describes_each_binding() {
    let state = state();
    let Json(rows) = admin::list_bindings(State(state), Path(target())).await.unwrap();
    assert_eq!(rows.len(), 2);
}

#[test]
fn api_error_maps_status() {
    let bad = ApiError(gatekeep_core::GatekeepError::BadRequest("x".into()));
    assert_eq!(bad.into_response().status(), StatusCode::BAD_REQUEST);
    let inv = ApiError(gatekeep_core::GatekeepError::Invariant("x".into()));
    assert_eq!(inv.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test(flavor = "multi_thread")]
async fn metrics_include_catalog_gauges() {
    let state = state();
    let resp = gatekeep_engine::ops::metrics(State(state)).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
