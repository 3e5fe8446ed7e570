//! Cache layer for per-binding decisions.
//!
//! Keys are derived deterministically from (binding, session, subject) so that
//! invalidation can reconstruct every key a binding may have produced by prefix.
//! Values cross the store boundary as serialized bytes: a decision written by a
//! worker must be readable by any other evaluation without shared memory.

mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use gatekeep_core::error::{GatekeepError, Result};
use gatekeep_core::{Binding, PolicyRequest, PolicyResult};

pub use memory::MemoryCache;

/// Namespace for every policy decision key.
pub const CACHE_PREFIX: &str = "gatekeep/policies/";

/// Shared key-value store. Implementations must tolerate concurrent access
/// from many workers without caller-side locking; last write wins.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    /// All live keys starting with `prefix`.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Prefix shared by every key derived from one binding.
pub fn binding_prefix(binding_uuid: &Uuid) -> String {
    format!("{CACHE_PREFIX}{}", binding_uuid.simple())
}

/// Key for one (binding, session, subject) decision.
///
/// Layout: `<prefix><binding>.r<binding rev>-<policy rev>[_<session>]#<user pk>`.
/// The revisions make a worker that finishes after a catalog update write under
/// a key no later evaluation reads. Anonymous subjects use an empty pk segment;
/// they are never written because they cannot be cached.
pub fn cache_key(binding: &Binding, request: &PolicyRequest) -> String {
    let mut key = binding_prefix(&binding.policy_binding_uuid);
    let policy_rev = binding.policy().map(|p| p.revision).unwrap_or(0);
    key.push_str(&format!(".r{}-{}", binding.revision, policy_rev));
    if let Some(session) = request.session_id() {
        key.push('_');
        key.push_str(session);
    }
    key.push('#');
    if let Some(pk) = request.user.pk {
        key.push_str(&pk.to_string());
    }
    key
}

pub fn encode_result(result: &PolicyResult) -> Result<Bytes> {
    serde_json::to_vec(result)
        .map(Bytes::from)
        .map_err(|e| GatekeepError::Cache(format!("encode failed: {e}")))
}

pub fn decode_result(raw: &[u8]) -> Result<PolicyResult> {
    serde_json::from_slice(raw).map_err(|e| GatekeepError::Cache(format!("decode failed: {e}")))
}

/// Read a cached decision; undecodable entries are treated as a miss.
pub async fn lookup(cache: &Arc<dyn CacheStore>, key: &str) -> Result<Option<PolicyResult>> {
    let Some(raw) = cache.get(key).await? else {
        return Ok(None);
    };
    match decode_result(&raw) {
        Ok(res) => Ok(Some(res)),
        Err(e) => {
            tracing::warn!(%key, error=%e, "dropping undecodable cache entry");
            cache.delete(key).await?;
            Ok(None)
        }
    }
}

/// Delete every key derived from `binding_uuid`. Returns how many were removed.
pub async fn purge_binding(cache: &Arc<dyn CacheStore>, binding_uuid: &Uuid) -> Result<usize> {
    let keys = cache.keys(&binding_prefix(binding_uuid)).await?;
    for k in &keys {
        cache.delete(k).await?;
    }
    Ok(keys.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeep_core::{Policy, TransportContext, User};

    #[test]
    fn key_includes_session_when_present() {
        let binding = Binding::detached(None);
        let mut req = PolicyRequest::new(User::new(42, "alice"));
        let hex = binding.policy_binding_uuid.simple().to_string();

        assert_eq!(cache_key(&binding, &req), format!("{CACHE_PREFIX}{hex}.r0-0#42"));

        req.set_transport(TransportContext::with_session("sess1"));
        assert_eq!(cache_key(&binding, &req), format!("{CACHE_PREFIX}{hex}.r0-0_sess1#42"));
        assert!(cache_key(&binding, &req).starts_with(&binding_prefix(&binding.policy_binding_uuid)));
    }

    #[test]
    fn key_changes_with_revisions() {
        let mut policy = Policy::abstract_base("p");
        policy.revision = 3;
        let mut binding = Binding::detached(None);
        binding.subject = Some(gatekeep_core::BindingSubject::Policy(Arc::new(policy)));
        binding.revision = 2;
        let req = PolicyRequest::new(User::new(1, "alice"));

        let key = cache_key(&binding, &req);
        assert!(key.ends_with(".r2-3#1"));
        assert!(key.starts_with(&binding_prefix(&binding.policy_binding_uuid)));
    }
}
