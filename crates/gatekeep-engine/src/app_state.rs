//! Shared application state for the gatekeep service.

use std::sync::Arc;
use std::time::Duration;

use gatekeep_core::error::Result;

use crate::audit::{AuditSink, ChannelAuditSink, LogAuditSink, NullAuditSink};
use crate::cache::{CacheStore, MemoryCache};
use crate::catalog::Catalog;
use crate::config::{AuditSinkKind, GatekeepConfig};
use crate::engine::EngineContext;
use crate::invalidation::CacheInvalidator;
use crate::obs::EngineMetrics;
use crate::policies::PolicyRegistry;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: GatekeepConfig,
    catalog: Catalog,
    ctx: EngineContext,
}

impl AppState {
    /// Build application state from validated config.
    ///
    /// Must be called inside a tokio runtime: the cache sweeper (and the
    /// channel audit drain, when configured) are spawned here.
    pub fn new(cfg: GatekeepConfig, registry: &PolicyRegistry) -> Result<Self> {
        let metrics = Arc::new(EngineMetrics::default());
        let memory = Arc::new(MemoryCache::new());
        spawn_cache_sweeper(Arc::clone(&memory));
        let cache: Arc<dyn CacheStore> = memory;
        let audit = build_audit_sink(&cfg, &metrics);
        let ctx = EngineContext::from_settings(&cfg.engine, Arc::clone(&cache), audit, metrics);

        let catalog = Catalog::from_config(&cfg, registry)?
            .with_listener(Arc::new(CacheInvalidator::new(cache)));

        Ok(Self {
            inner: Arc::new(AppStateInner { cfg, catalog, ctx }),
        })
    }

    pub fn cfg(&self) -> &GatekeepConfig {
        &self.inner.cfg
    }

    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    pub fn engine_context(&self) -> EngineContext {
        self.inner.ctx.clone()
    }

    pub fn metrics(&self) -> Arc<EngineMetrics> {
        Arc::clone(&self.inner.ctx.metrics)
    }

    pub fn metrics_extra(&self) -> Vec<(&'static str, u64)> {
        let c = &self.inner.catalog;
        vec![
            ("gatekeep_catalog_policies", c.policy_count() as u64),
            ("gatekeep_catalog_targets", c.target_count() as u64),
            ("gatekeep_catalog_bindings", c.binding_count() as u64),
        ]
    }
}

fn build_audit_sink(cfg: &GatekeepConfig, metrics: &Arc<EngineMetrics>) -> Arc<dyn AuditSink> {
    match cfg.engine.audit.sink {
        AuditSinkKind::Log => Arc::new(LogAuditSink),
        AuditSinkKind::None => Arc::new(NullAuditSink),
        AuditSinkKind::Channel => {
            let (sink, mut rx) = ChannelAuditSink::new(cfg.engine.audit.buffer);
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    LogAuditSink.emit(event);
                }
            });
            Arc::new(sink.with_metrics(Arc::clone(metrics)))
        }
    }
}

const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

fn spawn_cache_sweeper(cache: Arc<MemoryCache>) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(CACHE_SWEEP_INTERVAL);
        loop {
            tick.tick().await;
            cache.sweep();
        }
    });
}
