use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use gatekeep_core::error::Result;
use gatekeep_core::{Binding, BindingSubject, PolicyException, PolicyRequest, PolicyResult};

use crate::audit::AuditEvent;
use crate::cache::{cache_key, encode_result};
use crate::engine::EngineContext;
use crate::obs::EngineMetrics;

/// Evaluates exactly one binding for one request.
///
/// `execute` can be awaited directly (tests, nested policy calls); `spawn`
/// runs it isolated and always answers on the channel.
pub struct PolicyProcess {
    binding: Binding,
    request: PolicyRequest,
    ctx: EngineContext,
}

impl PolicyProcess {
    pub fn new(binding: Binding, request: PolicyRequest, ctx: EngineContext) -> Result<Self> {
        request.validate()?;
        Ok(Self {
            binding,
            request,
            ctx,
        })
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    async fn check(&self) -> std::result::Result<PolicyResult, PolicyException> {
        match &self.binding.subject {
            Some(BindingSubject::Policy(policy)) => policy.passes(&self.request).await,
            Some(BindingSubject::Group(group)) => {
                Ok(PolicyResult::new(self.request.user.is_member(group)))
            }
            Some(BindingSubject::User(pk)) => Ok(PolicyResult::new(self.request.user.pk == Some(*pk))),
            None => Ok(PolicyResult::new(false)),
        }
    }

    fn component(&self) -> &'static str {
        match &self.binding.subject {
            Some(BindingSubject::Policy(p)) => p.component(),
            Some(other) => other.kind(),
            None => "empty",
        }
    }

    /// Run the check, apply negation, audit, stamp and write through the cache.
    /// Recoverable policy errors become failing results here.
    pub async fn execute(&self) -> PolicyResult {
        let started = Instant::now();
        let binding_uuid = self.binding.policy_binding_uuid;

        let mut result = match self.check().await {
            Ok(mut res) => {
                if self.binding.negate {
                    res.passing = !res.passing;
                }
                if let Some(policy) = self.binding.policy() {
                    if policy.execution_logging && !self.request.debug {
                        self.ctx
                            .audit
                            .emit(AuditEvent::execution(&self.binding, &self.request, &res));
                    }
                }
                res
            }
            Err(exc) => {
                let message = exc.to_string();
                tracing::debug!(binding=%binding_uuid, error=%message, "policy raised, using failing result");
                if !self.request.debug {
                    self.ctx
                        .audit
                        .emit(AuditEvent::exception(&self.binding, &self.request, &message));
                }
                PolicyResult::new(false).with_message(message)
            }
        };
        result.source_binding = Some(binding_uuid);

        let metrics = &self.ctx.metrics;
        metrics
            .policy_executions
            .inc(&[("result", if result.passing { "pass" } else { "fail" })]);
        metrics
            .execution_duration
            .observe(&[("component", self.component())], started.elapsed());

        if self.request.should_cache() {
            self.write_cache(&result).await;
        }

        tracing::debug!(binding=%binding_uuid, passing=result.passing, "policy process finished");
        result
    }

    async fn write_cache(&self, result: &PolicyResult) {
        let key = cache_key(&self.binding, &self.request);
        let written = match encode_result(result) {
            Ok(raw) => self.ctx.cache.set(&key, raw, self.ctx.cache_ttl).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            tracing::warn!(%key, error=%e, "failed to cache policy result");
        }
    }

    /// Run in its own task. Whatever happens inside, exactly one result is sent
    /// on `tx` unless the task is aborted.
    pub fn spawn(self, tx: oneshot::Sender<PolicyResult>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let _inflight = InflightGuard::new(Arc::clone(&self.ctx.metrics));
            let binding_uuid = self.binding.policy_binding_uuid;

            let result = match AssertUnwindSafe(self.execute()).catch_unwind().await {
                Ok(res) => res,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    self.ctx.metrics.worker_backstops.inc(&[]);
                    tracing::warn!(binding=%binding_uuid, error=%message, "policy process crashed, using failure_result");
                    PolicyResult::new(self.binding.failure_result)
                        .with_message(message)
                        .with_source_binding(binding_uuid)
                }
            };

            if tx.send(result).is_err() {
                tracing::debug!(binding=%binding_uuid, "result receiver gone; dropping result");
            }
        })
    }
}

struct InflightGuard(Arc<EngineMetrics>);

impl InflightGuard {
    fn new(metrics: Arc<EngineMetrics>) -> Self {
        metrics.workers_inflight.inc(&[]);
        Self(metrics)
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.0.workers_inflight.dec(&[]);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "policy process panicked".to_string()
    }
}
