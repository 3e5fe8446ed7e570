use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use gatekeep_core::error::{GatekeepError, Result};
use gatekeep_core::{
    Binding, PolicyEngineMode, PolicyRequest, PolicyResult, Target, TransportContext, User,
};

use crate::cache::{self, cache_key};
use crate::config::TimeoutMode;
use crate::process::PolicyProcess;

use super::EngineContext;

/// Worker dispatched during `build`, waiting to be collected.
struct PendingProcess {
    slot: usize,
    binding: Binding,
    rx: oneshot::Receiver<PolicyResult>,
    handle: JoinHandle<()>,
}

/// Computes one aggregate decision for (target, user[, transport]).
///
/// Construct, optionally adjust `use_cache` / the request context, then
/// `build().await?` and read `result()` or `passing()`.
pub struct PolicyEngine {
    bindings: Vec<Binding>,
    request: PolicyRequest,
    mode: PolicyEngineMode,
    /// Reuse cached per-binding decisions (default on).
    pub use_cache: bool,
    /// Decision when no enabled binding exists.
    pub empty_result: bool,
    ctx: EngineContext,
    // One slot per binding, in binding order.
    results: Vec<Option<PolicyResult>>,
    built: bool,
}

impl PolicyEngine {
    pub fn new(
        target: &Target,
        user: User,
        transport: Option<TransportContext>,
        ctx: EngineContext,
    ) -> Self {
        let mut engine = Self::from_parts(target.enabled_bindings(), user, transport, ctx);
        engine.mode = target.mode;
        engine.request.obj = Some(target.pk);
        engine
    }

    /// Evaluate a binding set that is not attached to a persisted target.
    pub fn for_bindings(
        bindings: Vec<Binding>,
        user: User,
        transport: Option<TransportContext>,
        ctx: EngineContext,
    ) -> Self {
        let mut bindings: Vec<Binding> = bindings.into_iter().filter(|b| b.enabled).collect();
        bindings.sort_by_key(|b| b.order);
        Self::from_parts(bindings, user, transport, ctx)
    }

    fn from_parts(
        bindings: Vec<Binding>,
        user: User,
        transport: Option<TransportContext>,
        ctx: EngineContext,
    ) -> Self {
        let mut request = PolicyRequest::new(user);
        if let Some(t) = transport {
            request.set_transport(t);
        }
        Self {
            bindings,
            request,
            mode: PolicyEngineMode::default(),
            use_cache: true,
            empty_result: true,
            ctx,
            results: Vec::new(),
            built: false,
        }
    }

    pub fn with_mode(mut self, mode: PolicyEngineMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_empty_result(mut self, empty_result: bool) -> Self {
        self.empty_result = empty_result;
        self
    }

    pub fn mode(&self) -> PolicyEngineMode {
        self.mode
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn request(&self) -> &PolicyRequest {
        &self.request
    }

    /// Adjust the request (context facts, debug flag) before `build`.
    pub fn request_mut(&mut self) -> &mut PolicyRequest {
        &mut self.request
    }

    /// Evaluate every binding. Fails only on configuration errors or when a
    /// binding ends up without a result; denied decisions are not errors.
    pub async fn build(&mut self) -> Result<&mut Self> {
        self.request.validate()?;
        for b in &self.bindings {
            if let Some(policy) = b.policy() {
                if policy.is_abstract() {
                    return Err(GatekeepError::Configuration(format!(
                        "binding {} references policy {} ({}) which has no implementation",
                        b.policy_binding_uuid, policy.name, policy.policy_uuid
                    )));
                }
            }
        }

        self.results = vec![None; self.bindings.len()];
        self.built = false;
        let read_cache = self.use_cache && !self.request.debug;

        let mut pending = Vec::new();
        for (slot, binding) in self.bindings.iter().enumerate() {
            if read_cache {
                let key = cache_key(binding, &self.request);
                match cache::lookup(&self.ctx.cache, &key).await {
                    Ok(Some(hit)) => {
                        tracing::debug!(%key, binding=%binding.policy_binding_uuid, "taking result from cache");
                        self.ctx.metrics.cache_lookups.inc(&[("outcome", "hit")]);
                        self.results[slot] = Some(hit);
                        continue;
                    }
                    Ok(None) => {
                        self.ctx.metrics.cache_lookups.inc(&[("outcome", "miss")]);
                    }
                    Err(e) => {
                        tracing::warn!(%key, error=%e, "cache lookup failed, evaluating");
                        self.ctx.metrics.cache_lookups.inc(&[("outcome", "error")]);
                    }
                }
            }

            let (tx, rx) = oneshot::channel();
            let process = PolicyProcess::new(binding.clone(), self.request.clone(), self.ctx.clone())?;
            let handle = process.spawn(tx);
            tracing::debug!(binding=%binding.policy_binding_uuid, "dispatched policy process");
            pending.push(PendingProcess {
                slot,
                binding: binding.clone(),
                rx,
                handle,
            });
        }

        for p in pending {
            let (slot, res) = self.collect(p).await;
            self.results[slot] = res;
        }

        let collected = self.results.iter().filter(|r| r.is_some()).count();
        if collected < self.bindings.len() {
            return Err(GatekeepError::Invariant(format!(
                "collected {collected} results for {} bindings",
                self.bindings.len()
            )));
        }

        self.built = true;
        let passing = self.result().passing;
        self.ctx.metrics.engine_builds.inc(&[
            ("mode", self.mode.as_str()),
            ("result", if passing { "pass" } else { "fail" }),
        ]);
        tracing::debug!(
            mode = self.mode.as_str(),
            bindings = self.bindings.len(),
            passing,
            "policy engine built"
        );
        Ok(self)
    }

    async fn collect(&self, pending: PendingProcess) -> (usize, Option<PolicyResult>) {
        let PendingProcess {
            slot,
            binding,
            mut rx,
            handle,
        } = pending;
        let binding_uuid = binding.policy_binding_uuid;

        let res = match timeout(binding.timeout, &mut rx).await {
            Ok(delivered) => delivered.ok(),
            Err(_) => {
                let mode = self.ctx.timeout_mode;
                self.ctx.metrics.binding_timeouts.inc(&[("mode", mode.as_str())]);
                match mode {
                    TimeoutMode::Soft => {
                        tracing::warn!(binding=%binding_uuid, timeout=?binding.timeout, "policy process exceeded timeout, still waiting");
                        rx.await.ok()
                    }
                    TimeoutMode::Hard => {
                        tracing::warn!(binding=%binding_uuid, timeout=?binding.timeout, "policy process exceeded timeout, aborting");
                        handle.abort();
                        Some(
                            PolicyResult::new(false)
                                .with_message(format!(
                                    "policy timed out after {}s",
                                    binding.timeout.as_secs_f64()
                                ))
                                .with_source_binding(binding_uuid),
                        )
                    }
                }
            }
        };

        if res.is_none() {
            tracing::error!(binding=%binding_uuid, "policy process ended without a result");
        }
        (slot, res)
    }

    /// Aggregate decision, folded in binding order. Fails closed before `build`.
    pub fn result(&self) -> PolicyResult {
        if !self.built {
            return PolicyResult::new(false).with_message("policy engine has not been built");
        }
        let results: Vec<&PolicyResult> = self.results.iter().flatten().collect();
        if results.is_empty() {
            return PolicyResult::new(self.empty_result);
        }

        let passing = match self.mode {
            PolicyEngineMode::All => results.iter().all(|r| r.passing),
            PolicyEngineMode::Any => results.iter().any(|r| r.passing),
        };
        let messages = results
            .iter()
            .flat_map(|r| r.messages().iter().cloned())
            .collect::<Vec<_>>();

        let mut out = PolicyResult::with_messages(passing, messages);
        out.source_results = results.into_iter().cloned().collect();
        out
    }

    pub fn passing(&self) -> bool {
        self.result().passing
    }
}
