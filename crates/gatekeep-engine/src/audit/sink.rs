use std::sync::Arc;

use tokio::sync::mpsc;

use crate::obs::EngineMetrics;

use super::{AuditEvent, AuditSink};

/// Renders audit events as tracing events.
#[derive(Debug, Default)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn emit(&self, event: AuditEvent) {
        tracing::info!(
            target: "gatekeep::audit",
            action = event.action.as_str(),
            user = %event.user["username"],
            client_ip = event.client_ip.as_deref().unwrap_or("-"),
            context = %event.context,
            "{}",
            event.message
        );
    }
}

/// Forwards events into a bounded queue (lossy: drops when full).
pub struct ChannelAuditSink {
    tx: mpsc::Sender<AuditEvent>,
    metrics: Option<Arc<EngineMetrics>>,
}

impl ChannelAuditSink {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<AuditEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx, metrics: None }, rx)
    }

    pub fn with_metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

impl AuditSink for ChannelAuditSink {
    fn emit(&self, event: AuditEvent) {
        if let Err(e) = self.tx.try_send(event) {
            tracing::debug!(error=%e, "audit event dropped");
            if let Some(m) = &self.metrics {
                m.audit_dropped.inc(&[]);
            }
        }
    }
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn emit(&self, _event: AuditEvent) {}
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use gatekeep_core::{Binding, PolicyRequest, PolicyResult, User};

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let metrics = Arc::new(EngineMetrics::default());
        let (sink, mut rx) = ChannelAuditSink::new(1);
        let sink = sink.with_metrics(metrics.clone());

        let binding = Binding::detached(None);
        let req = PolicyRequest::new(User::new(1, "alice"));
        let res = PolicyResult::new(true);
        sink.emit(AuditEvent::execution(&binding, &req, &res));
        sink.emit(AuditEvent::execution(&binding, &req, &res));

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
        assert_eq!(metrics.audit_dropped.get(&[]), 1);
    }
}
