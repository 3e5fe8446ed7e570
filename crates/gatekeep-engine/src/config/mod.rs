//! Engine config loader (strict parsing).

pub mod schema;

use std::fs;

use gatekeep_core::error::{GatekeepError, Result};

pub use schema::{
    AuditSection, AuditSinkKind, BindingConfig, EngineSection, GatekeepConfig, PolicyConfig,
    ServerSection, TargetConfig, TimeoutMode,
};

pub fn load_from_file(path: &str) -> Result<GatekeepConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| GatekeepError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<GatekeepConfig> {
    let cfg: GatekeepConfig = serde_yaml::from_str(s)
        .map_err(|e| GatekeepError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
