use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GatekeepError, Result};
use crate::model::Binding;

/// How constituent results are folded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyEngineMode {
    /// Every binding must pass.
    All,
    /// At least one binding must pass.
    #[default]
    Any,
}

impl PolicyEngineMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyEngineMode::All => "all",
            PolicyEngineMode::Any => "any",
        }
    }
}

/// Protected resource plus a snapshot of its bindings.
#[derive(Debug, Clone)]
pub struct Target {
    pub pk: Uuid,
    pub mode: PolicyEngineMode,
    bindings: Vec<Binding>,
}

impl Target {
    pub fn new(pk: Uuid, mode: PolicyEngineMode) -> Self {
        Self {
            pk,
            mode,
            bindings: Vec::new(),
        }
    }

    /// Build a target snapshot; bindings must belong to it and have unique orders.
    pub fn with_bindings(pk: Uuid, mode: PolicyEngineMode, bindings: Vec<Binding>) -> Result<Self> {
        let mut target = Self::new(pk, mode);
        for b in bindings {
            target.attach(b)?;
        }
        Ok(target)
    }

    pub fn attach(&mut self, binding: Binding) -> Result<()> {
        if binding.target != self.pk {
            return Err(GatekeepError::BadRequest(format!(
                "binding {} belongs to target {}, not {}",
                binding.policy_binding_uuid, binding.target, self.pk
            )));
        }
        if self.bindings.iter().any(|b| b.order == binding.order) {
            return Err(GatekeepError::BadRequest(format!(
                "duplicate binding order {} on target {}",
                binding.order, self.pk
            )));
        }
        self.bindings.push(binding);
        Ok(())
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Enabled bindings, ascending by `order`.
    pub fn enabled_bindings(&self) -> Vec<Binding> {
        let mut out: Vec<Binding> = self.bindings.iter().filter(|b| b.enabled).cloned().collect();
        out.sort_by_key(|b| b.order);
        out
    }
}
