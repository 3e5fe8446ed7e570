//! Cache invalidation wiring: catalog change -> purge derived cache keys.

use std::sync::Arc;

use async_trait::async_trait;

use gatekeep_core::error::Result;
use gatekeep_core::{Binding, Policy};

use crate::cache::{purge_binding, CacheStore};
use crate::catalog::CatalogListener;

/// Purges every decision a changed policy or binding could have produced.
pub struct CacheInvalidator {
    cache: Arc<dyn CacheStore>,
}

impl CacheInvalidator {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl CatalogListener for CacheInvalidator {
    async fn policy_mutated(&self, policy: &Policy, bindings: &[Binding]) -> Result<()> {
        let mut purged = 0;
        for b in bindings {
            purged += purge_binding(&self.cache, &b.policy_binding_uuid).await?;
        }
        tracing::debug!(policy=%policy.policy_uuid, bindings=bindings.len(), purged, "invalidated policy cache");
        Ok(())
    }

    async fn binding_changed(&self, binding: &Binding) -> Result<()> {
        let purged = purge_binding(&self.cache, &binding.policy_binding_uuid).await?;
        tracing::debug!(binding=%binding.policy_binding_uuid, purged, "invalidated binding cache");
        Ok(())
    }
}
