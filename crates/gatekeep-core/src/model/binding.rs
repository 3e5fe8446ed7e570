use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{GatekeepError, Result};
use crate::model::Policy;

/// Wait budget applied when a binding does not set one.
pub const DEFAULT_BINDING_TIMEOUT: Duration = Duration::from_secs(30);

/// The single thing a binding checks.
#[derive(Debug, Clone)]
pub enum BindingSubject {
    Policy(Arc<Policy>),
    /// Passes iff the subject is a member of this group.
    Group(Uuid),
    /// Passes iff the subject is this user (by pk).
    User(u64),
}

impl BindingSubject {
    /// Build from independently optional references; more than one is rejected.
    pub fn from_parts(
        policy: Option<Arc<Policy>>,
        group: Option<Uuid>,
        user: Option<u64>,
    ) -> Result<Option<Self>> {
        match (policy, group, user) {
            (None, None, None) => Ok(None),
            (Some(p), None, None) => Ok(Some(BindingSubject::Policy(p))),
            (None, Some(g), None) => Ok(Some(BindingSubject::Group(g))),
            (None, None, Some(u)) => Ok(Some(BindingSubject::User(u))),
            _ => Err(GatekeepError::BadRequest(
                "binding must reference at most one of policy, group, user".into(),
            )),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BindingSubject::Policy(_) => "policy",
            BindingSubject::Group(_) => "group",
            BindingSubject::User(_) => "user",
        }
    }
}

/// Association between a target and one check.
#[derive(Debug, Clone)]
pub struct Binding {
    pub policy_binding_uuid: Uuid,
    pub target: Uuid,
    /// `None` means nothing is bound; such a binding fails closed.
    pub subject: Option<BindingSubject>,
    pub enabled: bool,
    pub negate: bool,
    pub timeout: Duration,
    pub failure_result: bool,
    pub order: i32,
    /// Bumped by the catalog on every update; part of derived cache keys.
    pub revision: u64,
}

impl Binding {
    pub fn new(target: Uuid, subject: Option<BindingSubject>) -> Self {
        Self {
            policy_binding_uuid: Uuid::new_v4(),
            target,
            subject,
            enabled: true,
            negate: false,
            timeout: DEFAULT_BINDING_TIMEOUT,
            failure_result: false,
            order: 0,
            revision: 0,
        }
    }

    /// Binding that is not attached to a persisted target.
    pub fn detached(subject: Option<BindingSubject>) -> Self {
        Self::new(Uuid::nil(), subject)
    }

    pub fn for_policy(target: Uuid, policy: Arc<Policy>) -> Self {
        Self::new(target, Some(BindingSubject::Policy(policy)))
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_negate(mut self, negate: bool) -> Self {
        self.negate = negate;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_failure_result(mut self, failure_result: bool) -> Self {
        self.failure_result = failure_result;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn policy(&self) -> Option<&Arc<Policy>> {
        match &self.subject {
            Some(BindingSubject::Policy(p)) => Some(p),
            _ => None,
        }
    }

    pub fn references_policy(&self, policy_uuid: &Uuid) -> bool {
        self.policy()
            .map(|p| &p.policy_uuid == policy_uuid)
            .unwrap_or(false)
    }

    /// JSON summary used by audit events and admin listings.
    pub fn describe(&self) -> Value {
        let subject = match &self.subject {
            Some(BindingSubject::Policy(p)) => json!({
                "kind": "policy",
                "policy_uuid": p.policy_uuid.simple().to_string(),
                "name": p.name,
                "component": p.component(),
            }),
            Some(BindingSubject::Group(g)) => json!({
                "kind": "group",
                "group_uuid": g.simple().to_string(),
            }),
            Some(BindingSubject::User(pk)) => json!({ "kind": "user", "user_pk": pk }),
            None => Value::Null,
        };
        json!({
            "policy_binding_uuid": self.policy_binding_uuid.simple().to_string(),
            "target": self.target.simple().to_string(),
            "subject": subject,
            "enabled": self.enabled,
            "negate": self.negate,
            "timeout_secs": self.timeout.as_secs_f64(),
            "failure_result": self.failure_result,
            "order": self.order,
            "revision": self.revision,
        })
    }
}
