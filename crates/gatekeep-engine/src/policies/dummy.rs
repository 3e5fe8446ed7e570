//! Debugging policy: fixed result after a pseudo-random delay.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::Deserialize;

use gatekeep_core::error::{GatekeepError, Result};
use gatekeep_core::{PolicyCheck, PolicyException, PolicyRequest, PolicyResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DummyPolicy {
    #[serde(default)]
    pub result: bool,
    #[serde(default)]
    pub wait_min_ms: u64,
    #[serde(default)]
    pub wait_max_ms: u64,
}

impl DummyPolicy {
    pub const COMPONENT: &'static str = "dummy";

    pub fn new(result: bool) -> Self {
        Self {
            result,
            wait_min_ms: 0,
            wait_max_ms: 0,
        }
    }

    pub fn with_wait(mut self, min: Duration, max: Duration) -> Self {
        self.wait_min_ms = min.as_millis() as u64;
        self.wait_max_ms = max.as_millis() as u64;
        self
    }

    pub fn from_params(params: &serde_yaml::Value) -> Result<Arc<dyn PolicyCheck>> {
        let policy: DummyPolicy = if params.is_null() {
            DummyPolicy::new(false)
        } else {
            serde_yaml::from_value(params.clone())
                .map_err(|e| GatekeepError::BadRequest(format!("invalid dummy params: {e}")))?
        };
        if policy.wait_max_ms < policy.wait_min_ms {
            return Err(GatekeepError::BadRequest(
                "dummy.wait_max_ms must be >= wait_min_ms".into(),
            ));
        }
        Ok(Arc::new(policy))
    }

    fn wait(&self) -> Duration {
        let span = self.wait_max_ms.saturating_sub(self.wait_min_ms);
        if span == 0 {
            return Duration::from_millis(self.wait_min_ms);
        }
        // Spread only; no need for a real RNG here.
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos() as u64;
        Duration::from_millis(self.wait_min_ms + nanos % span)
    }
}

#[async_trait]
impl PolicyCheck for DummyPolicy {
    fn component(&self) -> &'static str {
        Self::COMPONENT
    }

    async fn passes(&self, _request: &PolicyRequest) -> std::result::Result<PolicyResult, PolicyException> {
        let wait = self.wait();
        tracing::debug!(delay_ms = wait.as_millis() as u64, "dummy policy waiting");
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        Ok(PolicyResult::new(self.result).with_message("dummy"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use gatekeep_core::User;

    #[tokio::test]
    async fn returns_configured_result() {
        let params: serde_yaml::Value = serde_yaml::from_str("result: true\nwait_max_ms: 5").unwrap();
        let policy = DummyPolicy::from_params(&params).unwrap();
        let res = policy.passes(&PolicyRequest::new(User::new(1, "a"))).await.unwrap();
        assert!(res.passing);
        assert_eq!(res.messages(), ["dummy".to_string()]);
    }

    #[test]
    fn inverted_wait_range_is_rejected() {
        let params: serde_yaml::Value = serde_yaml::from_str("wait_min_ms: 10\nwait_max_ms: 5").unwrap();
        assert!(DummyPolicy::from_params(&params).is_err());
    }
}
