use std::sync::Arc;

use dashmap::DashMap;

use gatekeep_core::error::{GatekeepError, Result};
use gatekeep_core::model::ABSTRACT_COMPONENT;
use gatekeep_core::PolicyCheck;

use super::dummy::DummyPolicy;

/// Builds a policy implementation from its config `params` block.
pub type PolicyFactory =
    Arc<dyn Fn(&serde_yaml::Value) -> Result<Arc<dyn PolicyCheck>> + Send + Sync>;

/// Explicit type-name -> factory registry, built once at startup.
#[derive(Default)]
pub struct PolicyRegistry {
    factories: DashMap<String, PolicyFactory>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self {
            factories: DashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let reg = Self::new();
        reg.register(DummyPolicy::COMPONENT, Arc::new(DummyPolicy::from_params));
        reg
    }

    pub fn register(&self, component: &str, factory: PolicyFactory) {
        if self.factories.insert(component.to_string(), factory).is_some() {
            tracing::warn!(%component, "policy type registered twice; last one wins");
        }
    }

    pub fn registered(&self) -> Vec<String> {
        let mut out: Vec<String> = self.factories.iter().map(|e| e.key().clone()).collect();
        out.sort();
        out
    }

    /// Resolve a config type name. `base` resolves to no implementation
    /// (the abstract policy); unknown names are a config error.
    pub fn build(
        &self,
        component: &str,
        params: &serde_yaml::Value,
    ) -> Result<Option<Arc<dyn PolicyCheck>>> {
        if component == ABSTRACT_COMPONENT {
            return Ok(None);
        }
        let factory = self
            .factories
            .get(component)
            .ok_or_else(|| GatekeepError::BadRequest(format!("unknown policy type: {component}")))?
            .value()
            .clone();
        factory(params).map(Some)
    }
}
