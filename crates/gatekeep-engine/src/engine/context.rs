use std::sync::Arc;
use std::time::Duration;

use crate::audit::{AuditSink, NullAuditSink};
use crate::cache::{CacheStore, MemoryCache};
use crate::config::{EngineSection, TimeoutMode};
use crate::obs::EngineMetrics;

/// Shared collaborators for every evaluation: cache store, audit sink, metrics,
/// plus engine-wide settings. Cheap to clone.
#[derive(Clone)]
pub struct EngineContext {
    pub cache: Arc<dyn CacheStore>,
    pub audit: Arc<dyn AuditSink>,
    pub metrics: Arc<EngineMetrics>,
    pub cache_ttl: Duration,
    pub timeout_mode: TimeoutMode,
}

impl EngineContext {
    pub fn new(cache: Arc<dyn CacheStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            cache,
            audit,
            metrics: Arc::new(EngineMetrics::default()),
            cache_ttl: Duration::from_secs(300),
            timeout_mode: TimeoutMode::Soft,
        }
    }

    /// In-memory cache, audit discarded.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCache::new()), Arc::new(NullAuditSink))
    }

    pub fn from_settings(
        settings: &EngineSection,
        cache: Arc<dyn CacheStore>,
        audit: Arc<dyn AuditSink>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            cache,
            audit,
            metrics,
            cache_ttl: settings.cache_ttl(),
            timeout_mode: settings.timeout_mode,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_timeout_mode(mut self, mode: TimeoutMode) -> Self {
        self.timeout_mode = mode;
        self
    }
}
