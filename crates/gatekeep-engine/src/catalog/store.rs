use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use gatekeep_core::error::{GatekeepError, Result};
use gatekeep_core::{Binding, BindingSubject, Policy, PolicyEngineMode, Target};

/// Notified after catalog mutations that can invalidate cached decisions.
#[async_trait]
pub trait CatalogListener: Send + Sync {
    /// `bindings` are all bindings referencing the policy after the change.
    async fn policy_mutated(&self, policy: &Policy, bindings: &[Binding]) -> Result<()>;
    /// A binding was updated or deleted.
    async fn binding_changed(&self, binding: &Binding) -> Result<()>;
}

#[derive(Debug, Clone)]
struct TargetRecord {
    name: Option<String>,
    mode: PolicyEngineMode,
}

#[derive(Default)]
pub struct Catalog {
    policies: DashMap<Uuid, Arc<Policy>>,
    targets: DashMap<Uuid, TargetRecord>,
    bindings: DashMap<Uuid, Binding>,
    listeners: Vec<Arc<dyn CatalogListener>>,
    // Serializes structural writes so uniqueness checks and inserts don't race.
    write_lock: Mutex<()>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listener(mut self, listener: Arc<dyn CatalogListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    fn write_guard(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| GatekeepError::Internal("catalog write lock poisoned".into()))
    }

    // ---- policies

    pub fn insert_policy(&self, policy: Policy) -> Result<Arc<Policy>> {
        let _g = self.write_guard()?;
        if self.policies.contains_key(&policy.policy_uuid) {
            return Err(GatekeepError::BadRequest(format!(
                "policy {} already exists",
                policy.policy_uuid
            )));
        }
        if self.policies.iter().any(|p| p.name == policy.name) {
            return Err(GatekeepError::BadRequest(format!(
                "policy name already in use: {}",
                policy.name
            )));
        }
        let policy = Arc::new(policy);
        self.policies.insert(policy.policy_uuid, Arc::clone(&policy));
        Ok(policy)
    }

    pub fn policy(&self, uuid: &Uuid) -> Option<Arc<Policy>> {
        self.policies.get(uuid).map(|p| Arc::clone(p.value()))
    }

    pub fn policy_by_name(&self, name: &str) -> Option<Arc<Policy>> {
        self.policies
            .iter()
            .find(|p| p.name == name)
            .map(|p| Arc::clone(p.value()))
    }

    /// Replace a policy (same uuid) and re-point every binding at the new version.
    /// The stored revision is bumped past the current one.
    pub async fn update_policy(&self, mut policy: Policy) -> Result<()> {
        let (policy, affected) = {
            let _g = self.write_guard()?;
            let current = self
                .policies
                .get(&policy.policy_uuid)
                .map(|p| p.revision)
                .ok_or_else(|| GatekeepError::NotFound(format!("policy {}", policy.policy_uuid)))?;
            policy.revision = current + 1;
            if self
                .policies
                .iter()
                .any(|p| p.name == policy.name && p.policy_uuid != policy.policy_uuid)
            {
                return Err(GatekeepError::BadRequest(format!(
                    "policy name already in use: {}",
                    policy.name
                )));
            }
            let policy = Arc::new(policy);
            self.policies.insert(policy.policy_uuid, Arc::clone(&policy));

            let mut affected = Vec::new();
            for mut b in self.bindings.iter_mut() {
                if b.references_policy(&policy.policy_uuid) {
                    b.subject = Some(BindingSubject::Policy(Arc::clone(&policy)));
                    affected.push(b.clone());
                }
            }
            (policy, affected)
        };

        tracing::debug!(policy=%policy.policy_uuid, bindings=affected.len(), "policy mutated");
        for l in &self.listeners {
            l.policy_mutated(&policy, &affected).await?;
        }
        Ok(())
    }

    /// Refused while any binding still references the policy.
    pub fn remove_policy(&self, uuid: &Uuid) -> Result<Arc<Policy>> {
        let _g = self.write_guard()?;
        if self.bindings.iter().any(|b| b.references_policy(uuid)) {
            return Err(GatekeepError::BadRequest(format!("policy {uuid} is still bound")));
        }
        self.policies
            .remove(uuid)
            .map(|(_, p)| p)
            .ok_or_else(|| GatekeepError::NotFound(format!("policy {uuid}")))
    }

    // ---- targets

    pub fn add_target(&self, pk: Uuid, mode: PolicyEngineMode, name: Option<String>) -> Result<()> {
        let _g = self.write_guard()?;
        if self.targets.contains_key(&pk) {
            return Err(GatekeepError::BadRequest(format!("target {pk} already exists")));
        }
        self.targets.insert(pk, TargetRecord { name, mode });
        Ok(())
    }

    pub fn set_target_mode(&self, pk: &Uuid, mode: PolicyEngineMode) -> Result<()> {
        let mut rec = self
            .targets
            .get_mut(pk)
            .ok_or_else(|| GatekeepError::NotFound(format!("target {pk}")))?;
        rec.mode = mode;
        Ok(())
    }

    pub fn target_name(&self, pk: &Uuid) -> Option<String> {
        self.targets.get(pk).and_then(|t| t.name.clone())
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    pub fn policy_count(&self) -> usize {
        self.policies.len()
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Snapshot of a target with all of its bindings (enabled or not).
    pub fn target(&self, pk: &Uuid) -> Result<Target> {
        let mode = self
            .targets
            .get(pk)
            .map(|t| t.mode)
            .ok_or_else(|| GatekeepError::NotFound(format!("target {pk}")))?;
        Target::with_bindings(*pk, mode, self.bindings_for_target(pk)?)
    }

    /// Read-only listing, ascending by order.
    pub fn bindings_for_target(&self, pk: &Uuid) -> Result<Vec<Binding>> {
        if !self.targets.contains_key(pk) {
            return Err(GatekeepError::NotFound(format!("target {pk}")));
        }
        let mut out: Vec<Binding> = self
            .bindings
            .iter()
            .filter(|b| &b.target == pk)
            .map(|b| b.value().clone())
            .collect();
        out.sort_by_key(|b| b.order);
        Ok(out)
    }

    pub fn bindings_for_policy(&self, policy_uuid: &Uuid) -> Vec<Binding> {
        self.bindings
            .iter()
            .filter(|b| b.references_policy(policy_uuid))
            .map(|b| b.value().clone())
            .collect()
    }

    // ---- bindings

    fn check_binding(&self, binding: &Binding) -> Result<()> {
        if !self.targets.contains_key(&binding.target) {
            return Err(GatekeepError::NotFound(format!("target {}", binding.target)));
        }
        if let Some(policy) = binding.policy() {
            if !self.policies.contains_key(&policy.policy_uuid) {
                return Err(GatekeepError::NotFound(format!("policy {}", policy.policy_uuid)));
            }
        }
        let clash = self.bindings.iter().any(|b| {
            b.target == binding.target
                && b.order == binding.order
                && b.policy_binding_uuid != binding.policy_binding_uuid
        });
        if clash {
            return Err(GatekeepError::BadRequest(format!(
                "target {} already has a binding with order {}",
                binding.target, binding.order
            )));
        }
        Ok(())
    }

    pub fn add_binding(&self, binding: Binding) -> Result<()> {
        let _g = self.write_guard()?;
        if self.bindings.contains_key(&binding.policy_binding_uuid) {
            return Err(GatekeepError::BadRequest(format!(
                "binding {} already exists",
                binding.policy_binding_uuid
            )));
        }
        self.check_binding(&binding)?;
        self.bindings.insert(binding.policy_binding_uuid, binding);
        Ok(())
    }

    /// Replace a binding (same uuid); the stored revision is bumped past the current one.
    pub async fn update_binding(&self, mut binding: Binding) -> Result<()> {
        {
            let _g = self.write_guard()?;
            let current = self
                .bindings
                .get(&binding.policy_binding_uuid)
                .map(|b| b.revision)
                .ok_or_else(|| {
                    GatekeepError::NotFound(format!("binding {}", binding.policy_binding_uuid))
                })?;
            binding.revision = current + 1;
            self.check_binding(&binding)?;
            let stored = binding.policy().and_then(|p| self.policy(&p.policy_uuid));
            if let Some(policy) = stored {
                binding.subject = Some(BindingSubject::Policy(policy));
            }
            self.bindings.insert(binding.policy_binding_uuid, binding.clone());
        }
        for l in &self.listeners {
            l.binding_changed(&binding).await?;
        }
        Ok(())
    }

    pub async fn remove_binding(&self, uuid: &Uuid) -> Result<Binding> {
        let removed = {
            let _g = self.write_guard()?;
            self.bindings
                .remove(uuid)
                .map(|(_, b)| b)
                .ok_or_else(|| GatekeepError::NotFound(format!("binding {uuid}")))?
        };
        for l in &self.listeners {
            l.binding_changed(&removed).await?;
        }
        Ok(removed)
    }
}
