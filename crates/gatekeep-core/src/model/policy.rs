use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::PolicyException;
use crate::types::{PolicyRequest, PolicyResult};

/// Component name reported for a policy without an implementation.
pub const ABSTRACT_COMPONENT: &str = "base";

/// Pluggable predicate. The engine only ever calls through this trait.
///
/// Implementations return `Err(PolicyException)` for expected failures; those
/// become failing results. Anything else (a panic) is contained by the worker.
#[async_trait]
pub trait PolicyCheck: Send + Sync {
    /// Registry type name (e.g. "dummy").
    fn component(&self) -> &'static str;

    async fn passes(&self, request: &PolicyRequest) -> Result<PolicyResult, PolicyException>;
}

/// Policy identity record plus its resolved implementation.
///
/// A policy without an implementation is the abstract base type: it exists as a
/// record but cannot be evaluated by the engine.
#[derive(Clone)]
pub struct Policy {
    pub policy_uuid: Uuid,
    pub name: String,
    pub execution_logging: bool,
    /// Bumped by the catalog on every update; part of derived cache keys.
    pub revision: u64,
    check: Option<Arc<dyn PolicyCheck>>,
}

impl Policy {
    pub fn new(name: impl Into<String>, check: Arc<dyn PolicyCheck>) -> Self {
        Self {
            policy_uuid: Uuid::new_v4(),
            name: name.into(),
            execution_logging: false,
            revision: 0,
            check: Some(check),
        }
    }

    pub fn abstract_base(name: impl Into<String>) -> Self {
        Self {
            policy_uuid: Uuid::new_v4(),
            name: name.into(),
            execution_logging: false,
            revision: 0,
            check: None,
        }
    }

    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.policy_uuid = uuid;
        self
    }

    pub fn with_execution_logging(mut self, enabled: bool) -> Self {
        self.execution_logging = enabled;
        self
    }

    pub fn is_abstract(&self) -> bool {
        self.check.is_none()
    }

    pub fn component(&self) -> &'static str {
        self.check
            .as_ref()
            .map(|c| c.component())
            .unwrap_or(ABSTRACT_COMPONENT)
    }

    /// Run the predicate. The abstract base fails with a recoverable error.
    pub async fn passes(&self, request: &PolicyRequest) -> Result<PolicyResult, PolicyException> {
        match &self.check {
            Some(check) => check.passes(request).await,
            None => Err(PolicyException::new(format!(
                "policy {} has no implementation",
                self.name
            ))),
        }
    }
}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policy")
            .field("policy_uuid", &self.policy_uuid)
            .field("name", &self.name)
            .field("component", &self.component())
            .field("execution_logging", &self.execution_logging)
            .field("revision", &self.revision)
            .finish()
    }
}
