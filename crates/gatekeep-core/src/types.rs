//! Evaluation input/output value objects.

use std::collections::HashSet;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::cleanse::cleanse_value;
use crate::error::{GatekeepError, Result};

/// Subject of an evaluation.
///
/// Group membership is carried on the subject itself; how it gets populated
/// (directory sync, SCIM, ...) is outside the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct User {
    /// Primary key; `None` for the anonymous user.
    #[serde(default)]
    pub pk: Option<u64>,
    pub username: String,
    #[serde(default)]
    pub groups: HashSet<Uuid>,
}

impl User {
    pub fn new(pk: u64, username: impl Into<String>) -> Self {
        Self {
            pk: Some(pk),
            username: username.into(),
            groups: HashSet::new(),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            pk: None,
            username: "AnonymousUser".to_string(),
            groups: HashSet::new(),
        }
    }

    pub fn with_group(mut self, group: Uuid) -> Self {
        self.groups.insert(group);
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.pk.is_none()
    }

    pub fn is_member(&self, group: &Uuid) -> bool {
        self.groups.contains(group)
    }
}

/// Transport-level facts about the caller, when the evaluation originates from one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportContext {
    pub session_id: Option<String>,
    pub client_ip: Option<IpAddr>,
    pub path: Option<String>,
}

impl TransportContext {
    pub fn with_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::default()
        }
    }
}

/// Input of a single evaluation call.
///
/// Each worker receives its own clone, so facts a policy writes into `context`
/// are only visible to that policy.
#[derive(Debug, Clone)]
pub struct PolicyRequest {
    pub user: User,
    pub transport: Option<TransportContext>,
    /// Target being checked, when evaluating a persisted target.
    pub obj: Option<Uuid>,
    pub context: Map<String, Value>,
    /// Suppresses audit emission and disables caching.
    pub debug: bool,
}

impl PolicyRequest {
    pub fn new(user: User) -> Self {
        Self {
            user,
            transport: None,
            obj: None,
            context: Map::new(),
            debug: false,
        }
    }

    pub fn set_transport(&mut self, transport: TransportContext) {
        self.transport = Some(transport);
    }

    pub fn session_id(&self) -> Option<&str> {
        self.transport.as_ref().and_then(|t| t.session_id.as_deref())
    }

    pub fn client_ip(&self) -> Option<IpAddr> {
        self.transport.as_ref().and_then(|t| t.client_ip)
    }

    /// Results may only be cached for identified users outside debug mode.
    pub fn should_cache(&self) -> bool {
        !self.debug && !self.user.is_anonymous()
    }

    /// Shape check used by the worker before it accepts a request.
    pub fn validate(&self) -> Result<()> {
        if self.user.username.trim().is_empty() {
            return Err(GatekeepError::BadRequest(
                "policy request requires a username".into(),
            ));
        }
        if let Some(session) = self.session_id() {
            if session.is_empty() || session.contains('#') {
                return Err(GatekeepError::BadRequest(format!(
                    "invalid session identifier: {session:?}"
                )));
            }
        }
        Ok(())
    }

    /// JSON rendering for audit events, with sensitive context values masked.
    pub fn audit_value(&self) -> Value {
        json!({
            "user": { "pk": self.user.pk, "username": self.user.username },
            "obj": self.obj.map(|u| u.simple().to_string()),
            "context": cleanse_value(&Value::Object(self.context.clone())),
            "debug": self.debug,
        })
    }
}

/// Outcome of one policy check, or the folded outcome of many.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyResult {
    pub passing: bool,
    messages: Vec<String>,
    /// Constituent results, kept for diagnostics.
    #[serde(default)]
    pub source_results: Vec<PolicyResult>,
    /// Binding that produced this result.
    #[serde(default)]
    pub source_binding: Option<Uuid>,
}

impl PolicyResult {
    pub fn new(passing: bool) -> Self {
        Self {
            passing,
            messages: Vec::new(),
            source_results: Vec::new(),
            source_binding: None,
        }
    }

    pub fn with_messages<I, S>(passing: bool, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            messages: messages.into_iter().map(Into::into).collect(),
            ..Self::new(passing)
        }
    }

    /// Append a message while the result is still being built.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.messages.push(message.into());
        self
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn with_source_binding(mut self, binding: Uuid) -> Self {
        self.source_binding = Some(binding);
        self
    }
}
