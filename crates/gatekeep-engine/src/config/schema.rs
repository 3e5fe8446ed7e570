use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;
use uuid::Uuid;

use gatekeep_core::error::{GatekeepError, Result};
use gatekeep_core::PolicyEngineMode;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatekeepConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub policies: Vec<PolicyConfig>,

    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

impl GatekeepConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(GatekeepError::UnsupportedVersion);
        }

        self.engine.validate()?;

        let mut names = HashSet::new();
        for p in &self.policies {
            if p.name.trim().is_empty() {
                return Err(GatekeepError::BadRequest("policy name must not be empty".into()));
            }
            if !names.insert(p.name.as_str()) {
                return Err(GatekeepError::BadRequest(format!("duplicate policy name: {}", p.name)));
            }
        }

        let mut target_ids = HashSet::new();
        for t in &self.targets {
            if !target_ids.insert(t.uuid) {
                return Err(GatekeepError::BadRequest(format!("duplicate target uuid: {}", t.uuid)));
            }
            t.validate(&names)?;
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self { listen: default_listen() }
    }
}

fn default_listen() -> String {
    "0.0.0.0:9000".into()
}

/// What happens when a worker outlives its binding's timeout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutMode {
    /// Stop waiting on the deadline, then block until the worker answers.
    #[default]
    Soft,
    /// Abort the worker on the deadline and record a failing result.
    Hard,
}

impl TimeoutMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeoutMode::Soft => "soft",
            TimeoutMode::Hard => "hard",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    /// TTL for cached per-binding decisions; 0 disables cache writes.
    #[serde(default = "default_cache_timeout_secs")]
    pub cache_timeout_secs: u64,

    #[serde(default)]
    pub timeout_mode: TimeoutMode,

    #[serde(default)]
    pub audit: AuditSection,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            cache_timeout_secs: default_cache_timeout_secs(),
            timeout_mode: TimeoutMode::default(),
            audit: AuditSection::default(),
        }
    }
}

impl EngineSection {
    pub fn validate(&self) -> Result<()> {
        if self.cache_timeout_secs > 86_400 {
            return Err(GatekeepError::BadRequest(
                "engine.cache_timeout_secs must be between 0 and 86400".into(),
            ));
        }
        if !(1..=1_000_000).contains(&self.audit.buffer) {
            return Err(GatekeepError::BadRequest(
                "engine.audit.buffer must be between 1 and 1000000".into(),
            ));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_timeout_secs)
    }
}

fn default_cache_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSinkKind {
    /// Log inline through tracing.
    #[default]
    Log,
    /// Queue events and log them from a background task.
    Channel,
    None,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditSection {
    #[serde(default)]
    pub sink: AuditSinkKind,
    #[serde(default = "default_audit_buffer")]
    pub buffer: usize,
}

impl Default for AuditSection {
    fn default() -> Self {
        Self {
            sink: AuditSinkKind::default(),
            buffer: default_audit_buffer(),
        }
    }
}

fn default_audit_buffer() -> usize {
    1024
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    pub name: String,
    #[serde(default)]
    pub uuid: Option<Uuid>,
    /// Registry type name; `base` declares an abstract policy.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub execution_logging: bool,
    #[serde(default)]
    pub params: serde_yaml::Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    pub uuid: Uuid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mode: PolicyEngineMode,
    #[serde(default)]
    pub bindings: Vec<BindingConfig>,
}

impl TargetConfig {
    fn validate(&self, policy_names: &HashSet<&str>) -> Result<()> {
        let mut orders = HashSet::new();
        for b in &self.bindings {
            if !orders.insert(b.order) {
                return Err(GatekeepError::BadRequest(format!(
                    "target {}: duplicate binding order {}",
                    self.uuid, b.order
                )));
            }
            let refs = [b.policy.is_some(), b.group.is_some(), b.user.is_some()]
                .iter()
                .filter(|set| **set)
                .count();
            if refs > 1 {
                return Err(GatekeepError::BadRequest(format!(
                    "target {}: binding order {} references more than one of policy/group/user",
                    self.uuid, b.order
                )));
            }
            if let Some(name) = &b.policy {
                if !policy_names.contains(name.as_str()) {
                    return Err(GatekeepError::BadRequest(format!(
                        "target {}: binding references unknown policy {name}",
                        self.uuid
                    )));
                }
            }
            if !(1..=3600).contains(&b.timeout) {
                return Err(GatekeepError::BadRequest(format!(
                    "target {}: binding timeout must be between 1 and 3600 seconds",
                    self.uuid
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindingConfig {
    #[serde(default)]
    pub uuid: Option<Uuid>,
    /// Policy name.
    #[serde(default)]
    pub policy: Option<String>,
    #[serde(default)]
    pub group: Option<Uuid>,
    /// User pk.
    #[serde(default)]
    pub user: Option<u64>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub negate: bool,
    /// Seconds.
    #[serde(default = "default_binding_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub failure_result: bool,
    #[serde(default)]
    pub order: i32,
}

fn default_true() -> bool {
    true
}

fn default_binding_timeout() -> u64 {
    30
}
