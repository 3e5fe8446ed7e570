#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use gatekeep_core::cleanse::CLEANSED_SUBSTITUTE;
use gatekeep_core::{Binding, Policy, PolicyEngineMode, Target, TransportContext, User};
use gatekeep_engine::audit::{AuditAction, ChannelAuditSink};
use gatekeep_engine::cache::{cache_key, CacheStore, MemoryCache};
use gatekeep_engine::catalog::Catalog;
use gatekeep_engine::invalidation::CacheInvalidator;
use gatekeep_engine::policies::DummyPolicy;
use gatekeep_engine::{EngineContext, PolicyEngine};

use common::*;

fn counted_target(counter: &Arc<CountingPolicy>) -> Target {
    let policy = Arc::new(Policy::new("counting", counter.clone()));
    target_with(PolicyEngineMode::All, vec![policy])
}

#[tokio::test(flavor = "multi_thread")]
async fn second_evaluation_is_served_from_cache() {
    let counter = Arc::new(CountingPolicy::default());
    let target = counted_target(&counter);
    let ctx = EngineContext::in_memory();

    for _ in 0..2 {
        let mut engine = PolicyEngine::new(&target, User::new(7, "carol"), None, ctx.clone());
        let res = engine.build().await.unwrap().result();
        assert!(res.passing);
        assert_eq!(res.messages(), ["counted"]);
    }
    assert_eq!(counter.calls(), 1);
    assert_eq!(ctx.metrics.cache_lookups.get(&[("outcome", "hit")]), 1);
    assert_eq!(ctx.metrics.cache_lookups.get(&[("outcome", "miss")]), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn cache_is_keyed_by_session() {
    let counter = Arc::new(CountingPolicy::default());
    let target = counted_target(&counter);
    let ctx = EngineContext::in_memory();

    for session in ["s1", "s2", "s1"] {
        let mut engine = PolicyEngine::new(
            &target,
            User::new(7, "carol"),
            Some(TransportContext::with_session(session)),
            ctx.clone(),
        );
        assert!(engine.build().await.unwrap().passing());
    }
    assert_eq!(counter.calls(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn use_cache_false_and_anonymous_always_evaluate() {
    let counter = Arc::new(CountingPolicy::default());
    let target = counted_target(&counter);
    let ctx = EngineContext::in_memory();

    for _ in 0..2 {
        let mut engine = PolicyEngine::new(&target, User::new(7, "carol"), None, ctx.clone());
        engine.use_cache = false;
        engine.build().await.unwrap();
    }
    for _ in 0..2 {
        let mut engine = PolicyEngine::new(&target, User::anonymous(), None, ctx.clone());
        engine.build().await.unwrap();
    }
    assert_eq!(counter.calls(), 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn debug_requests_skip_cache_and_audit() {
    let (sink, mut rx) = ChannelAuditSink::new(16);
    let cache = Arc::new(MemoryCache::new());
    let ctx = EngineContext::new(cache.clone(), Arc::new(sink));

    let policy = Arc::new(dummy_policy_logged());
    let target = target_with(PolicyEngineMode::All, vec![policy]);
    let mut engine = PolicyEngine::new(&target, User::new(7, "carol"), None, ctx);
    engine.request_mut().debug = true;
    assert!(engine.build().await.unwrap().passing());

    assert!(cache.is_empty());
    assert!(rx.try_recv().is_err());
}

fn dummy_policy_logged() -> Policy {
    Policy::new("logged", Arc::new(gatekeep_engine::policies::DummyPolicy::new(true)))
        .with_execution_logging(true)
}

#[tokio::test(flavor = "multi_thread")]
async fn execution_logging_emits_cleansed_event() {
    let (sink, mut rx) = ChannelAuditSink::new(16);
    let ctx = EngineContext::new(Arc::new(MemoryCache::new()), Arc::new(sink));

    let policy = Arc::new(dummy_policy_logged());
    let policy_uuid = policy.policy_uuid;
    let target = target_with(PolicyEngineMode::All, vec![policy]);
    let mut engine = PolicyEngine::new(&target, User::new(7, "carol"), None, ctx);
    engine
        .request_mut()
        .context
        .insert("password".into(), json!("hunter2"));
    engine.build().await.unwrap();

    let event = rx.recv().await.expect("execution event");
    assert_eq!(event.action, AuditAction::PolicyExecution);
    assert_eq!(event.policy_uuid(), Some(policy_uuid.simple().to_string().as_str()));
    assert_eq!(event.context["result"]["passing"], json!(true));
    assert_eq!(
        event.context["request"]["context"]["password"],
        json!(CLEANSED_SUBSTITUTE)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn recoverable_error_emits_exception_event() {
    let (sink, mut rx) = ChannelAuditSink::new(16);
    let ctx = EngineContext::new(Arc::new(MemoryCache::new()), Arc::new(sink));

    let policy = Arc::new(Policy::new("raising", Arc::new(RaisingPolicy)));
    let target = target_with(PolicyEngineMode::All, vec![policy]);
    let mut engine = PolicyEngine::new(&target, User::new(7, "carol"), None, ctx);
    engine.build().await.unwrap();

    let event = rx.recv().await.expect("exception event");
    assert_eq!(event.action, AuditAction::PolicyException);
    assert_eq!(event.message, "division by zero");
}

#[tokio::test(flavor = "multi_thread")]
async fn policy_update_purges_cached_decisions() {
    let cache = Arc::new(MemoryCache::new());
    let store: Arc<dyn CacheStore> = cache.clone();
    let ctx = EngineContext::new(Arc::clone(&store), Arc::new(gatekeep_engine::audit::NullAuditSink));
    let catalog = Catalog::new().with_listener(Arc::new(CacheInvalidator::new(Arc::clone(&store))));

    let pk = Uuid::new_v4();
    catalog.add_target(pk, PolicyEngineMode::All, None).unwrap();
    let counter = Arc::new(CountingPolicy::default());
    let policy = catalog
        .insert_policy(Policy::new("counting", counter.clone()))
        .unwrap();
    catalog
        .add_binding(Binding::for_policy(pk, Arc::clone(&policy)))
        .unwrap();

    let user = User::new(9, "dave");
    let target = catalog.target(&pk).unwrap();
    PolicyEngine::new(&target, user.clone(), None, ctx.clone()).build().await.unwrap();
    let key = cache_key(&target.bindings()[0], &gatekeep_core::PolicyRequest::new(user.clone()));
    assert!(store.get(&key).await.unwrap().is_some());

    // Swap the implementation to a failing one under the same uuid.
    let replacement = Policy::new("counting", Arc::new(gatekeep_engine::policies::DummyPolicy::new(false)))
        .with_uuid(policy.policy_uuid);
    catalog.update_policy(replacement).await.unwrap();
    assert!(cache.is_empty());

    let target = catalog.target(&pk).unwrap();
    let mut engine = PolicyEngine::new(&target, user, None, ctx);
    assert!(!engine.build().await.unwrap().passing());
    assert_eq!(counter.calls(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn binding_removal_purges_cached_decisions() {
    let cache = Arc::new(MemoryCache::new());
    let store: Arc<dyn CacheStore> = cache.clone();
    let ctx = EngineContext::new(Arc::clone(&store), Arc::new(gatekeep_engine::audit::NullAuditSink));
    let catalog = Catalog::new().with_listener(Arc::new(CacheInvalidator::new(Arc::clone(&store))));

    let pk = Uuid::new_v4();
    catalog.add_target(pk, PolicyEngineMode::Any, None).unwrap();
    let binding = Binding::for_policy(pk, catalog.insert_policy(Policy::new(
        "d",
        Arc::new(gatekeep_engine::policies::DummyPolicy::new(true)),
    )).unwrap());
    let binding_uuid = binding.policy_binding_uuid;
    catalog.add_binding(binding).unwrap();

    let target = catalog.target(&pk).unwrap();
    PolicyEngine::new(&target, User::new(1, "erin"), None, ctx).build().await.unwrap();
    assert_eq!(cache.len(), 1);

    catalog.remove_binding(&binding_uuid).await.unwrap();
    assert!(cache.is_empty());
    assert!(catalog.bindings_for_target(&pk).unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn policy_update_during_inflight_build_is_not_reused() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
    let ctx = EngineContext::new(Arc::clone(&store), Arc::new(gatekeep_engine::audit::NullAuditSink));
    let catalog = Catalog::new().with_listener(Arc::new(CacheInvalidator::new(Arc::clone(&store))));

    let pk = Uuid::new_v4();
    catalog.add_target(pk, PolicyEngineMode::All, None).unwrap();
    let wait = Duration::from_millis(200);
    let policy = catalog
        .insert_policy(Policy::new("slow", Arc::new(DummyPolicy::new(true).with_wait(wait, wait))))
        .unwrap();
    catalog.add_binding(Binding::for_policy(pk, Arc::clone(&policy))).unwrap();

    let user = User::new(11, "frank");
    let target = catalog.target(&pk).unwrap();
    let mut engine = PolicyEngine::new(&target, user.clone(), None, ctx.clone());
    let replacement =
        Policy::new("slow", Arc::new(DummyPolicy::new(false))).with_uuid(policy.policy_uuid);

    // The in-flight worker finishes after the purge and still writes its result.
    let (built, updated) = tokio::join!(engine.build(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        catalog.update_policy(replacement).await
    });
    updated.unwrap();
    assert!(built.unwrap().passing());

    let target = catalog.target(&pk).unwrap();
    let mut engine = PolicyEngine::new(&target, user, None, ctx.clone());
    let res = engine.build().await.unwrap().result();
    assert!(!res.passing);
    assert_eq!(ctx.metrics.cache_lookups.get(&[("outcome", "hit")]), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn binding_update_during_inflight_build_is_not_reused() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
    let ctx = EngineContext::new(Arc::clone(&store), Arc::new(gatekeep_engine::audit::NullAuditSink));
    let catalog = Catalog::new().with_listener(Arc::new(CacheInvalidator::new(Arc::clone(&store))));

    let pk = Uuid::new_v4();
    catalog.add_target(pk, PolicyEngineMode::All, None).unwrap();
    let wait = Duration::from_millis(200);
    let policy = catalog
        .insert_policy(Policy::new("slow", Arc::new(DummyPolicy::new(true).with_wait(wait, wait))))
        .unwrap();
    let binding = Binding::for_policy(pk, policy);
    catalog.add_binding(binding.clone()).unwrap();

    let user = User::new(12, "grace");
    let target = catalog.target(&pk).unwrap();
    let mut engine = PolicyEngine::new(&target, user.clone(), None, ctx.clone());
    let (built, updated) = tokio::join!(engine.build(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        catalog.update_binding(binding.with_negate(true)).await
    });
    updated.unwrap();
    assert!(built.unwrap().passing());

    let target = catalog.target(&pk).unwrap();
    let mut engine = PolicyEngine::new(&target, user, None, ctx);
    assert!(!engine.build().await.unwrap().passing());
}
