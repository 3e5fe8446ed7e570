//! Audit events emitted by the worker.
//!
//! Emission is fire-and-forget: sinks must never block or fail an evaluation.

mod sink;

use serde::Serialize;
use serde_json::{json, Value};

use gatekeep_core::{Binding, PolicyRequest, PolicyResult};

pub use sink::{ChannelAuditSink, LogAuditSink, NullAuditSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    PolicyExecution,
    PolicyException,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::PolicyExecution => "policy_execution",
            AuditAction::PolicyException => "policy_exception",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub action: AuditAction,
    pub message: String,
    pub user: Value,
    pub client_ip: Option<String>,
    pub context: Value,
}

impl AuditEvent {
    fn base(action: AuditAction, message: String, binding: &Binding, request: &PolicyRequest) -> Self {
        let policy_uuid = binding.policy().map(|p| p.policy_uuid.simple().to_string());
        Self {
            action,
            message,
            user: json!({ "pk": request.user.pk, "username": request.user.username }),
            client_ip: request.client_ip().map(|ip| ip.to_string()),
            context: json!({
                "policy_uuid": policy_uuid,
                "binding": binding.describe(),
                "request": request.audit_value(),
            }),
        }
    }

    /// A policy with execution logging produced a decision.
    pub fn execution(binding: &Binding, request: &PolicyRequest, result: &PolicyResult) -> Self {
        let mut ev = Self::base(AuditAction::PolicyExecution, "Policy Execution".into(), binding, request);
        ev.context["result"] = json!({
            "passing": result.passing,
            "messages": result.messages(),
        });
        ev
    }

    /// A policy raised a recoverable error.
    pub fn exception(binding: &Binding, request: &PolicyRequest, message: &str) -> Self {
        let mut ev = Self::base(AuditAction::PolicyException, message.to_string(), binding, request);
        ev.context["message"] = Value::String(message.to_string());
        ev
    }

    pub fn policy_uuid(&self) -> Option<&str> {
        self.context["policy_uuid"].as_str()
    }
}

/// Destination for audit events.
pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}
