use std::time::Duration;

use gatekeep_core::error::{GatekeepError, Result};
use gatekeep_core::{Binding, BindingSubject, Policy};

use crate::config::GatekeepConfig;
use crate::policies::PolicyRegistry;

use super::Catalog;

impl Catalog {
    /// Build a catalog from validated config, resolving policy types through `registry`.
    pub fn from_config(cfg: &GatekeepConfig, registry: &PolicyRegistry) -> Result<Self> {
        let catalog = Catalog::new();

        for p in &cfg.policies {
            let check = registry.build(&p.kind, &p.params).map_err(|e| {
                GatekeepError::BadRequest(format!("policy {} failed to load: {e}", p.name))
            })?;
            let policy = match check {
                Some(check) => Policy::new(p.name.clone(), check),
                None => Policy::abstract_base(p.name.clone()),
            };
            let policy = match p.uuid {
                Some(uuid) => policy.with_uuid(uuid),
                None => policy,
            };
            if policy.is_abstract() {
                tracing::warn!(policy=%p.name, "policy has no implementation; bindings to it will fail evaluation");
            }
            catalog.insert_policy(policy.with_execution_logging(p.execution_logging))?;
        }

        for t in &cfg.targets {
            catalog.add_target(t.uuid, t.mode, t.name.clone())?;
            for b in &t.bindings {
                let policy = match &b.policy {
                    Some(name) => Some(catalog.policy_by_name(name).ok_or_else(|| {
                        GatekeepError::BadRequest(format!("unknown policy: {name}"))
                    })?),
                    None => None,
                };
                let subject = BindingSubject::from_parts(policy, b.group, b.user)?;
                let mut binding = Binding::new(t.uuid, subject)
                    .with_order(b.order)
                    .with_enabled(b.enabled)
                    .with_negate(b.negate)
                    .with_timeout(Duration::from_secs(b.timeout))
                    .with_failure_result(b.failure_result);
                if let Some(uuid) = b.uuid {
                    binding.policy_binding_uuid = uuid;
                }
                catalog.add_binding(binding)?;
            }
        }

        tracing::info!(
            policies = catalog.policy_count(),
            targets = catalog.target_count(),
            bindings = catalog.binding_count(),
            "catalog loaded"
        );
        Ok(catalog)
    }
}
