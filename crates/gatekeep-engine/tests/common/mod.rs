#![allow(dead_code)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use gatekeep_core::{
    Binding, Policy, PolicyCheck, PolicyEngineMode, PolicyException, PolicyRequest, PolicyResult,
    Target,
};
use gatekeep_engine::policies::DummyPolicy;

#[derive(Debug, Error)]
#[error("division by zero")]
pub struct ZeroDiv;

/// Always raises a recoverable error wrapping `ZeroDiv`.
pub struct RaisingPolicy;

#[async_trait]
impl PolicyCheck for RaisingPolicy {
    fn component(&self) -> &'static str {
        "raising"
    }

    async fn passes(&self, _r: &PolicyRequest) -> Result<PolicyResult, PolicyException> {
        Err(PolicyException::with_cause(ZeroDiv))
    }
}

/// Panics; only the worker backstop can turn this into a result.
pub struct PanickingPolicy;

#[async_trait]
impl PolicyCheck for PanickingPolicy {
    fn component(&self) -> &'static str {
        "panicking"
    }

    async fn passes(&self, _r: &PolicyRequest) -> Result<PolicyResult, PolicyException> {
        panic!("predicate blew up");
    }
}

/// Passes and counts how often it was asked.
#[derive(Default)]
pub struct CountingPolicy {
    pub calls: AtomicUsize,
}

impl CountingPolicy {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PolicyCheck for CountingPolicy {
    fn component(&self) -> &'static str {
        "counting"
    }

    async fn passes(&self, _r: &PolicyRequest) -> Result<PolicyResult, PolicyException> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(PolicyResult::new(true).with_message("counted"))
    }
}

/// Runs the wrapped check and replaces its messages with a fixed label.
pub struct Tagged<C> {
    label: &'static str,
    inner: C,
}

impl<C: PolicyCheck> Tagged<C> {
    pub fn new(label: &'static str, inner: C) -> Self {
        Self { label, inner }
    }
}

#[async_trait]
impl<C: PolicyCheck> PolicyCheck for Tagged<C> {
    fn component(&self) -> &'static str {
        "tagged"
    }

    async fn passes(&self, r: &PolicyRequest) -> Result<PolicyResult, PolicyException> {
        let inner = self.inner.passes(r).await?;
        Ok(PolicyResult::new(inner.passing).with_message(self.label))
    }
}

pub fn dummy(result: bool) -> Arc<Policy> {
    Arc::new(Policy::new("dummy", Arc::new(DummyPolicy::new(result))))
}

/// Target with one policy binding per entry, ordered as given.
pub fn target_with(mode: PolicyEngineMode, policies: Vec<Arc<Policy>>) -> Target {
    let pk = Uuid::new_v4();
    let bindings = policies
        .into_iter()
        .enumerate()
        .map(|(i, p)| Binding::for_policy(pk, p).with_order(i as i32))
        .collect();
    Target::with_bindings(pk, mode, bindings).unwrap()
}
