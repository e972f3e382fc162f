use std::fs;

use anyhow::{Context, Result};
use serde::Deserialize;
use validator::Validate;

use vlm_storage::Permission;
use vlm_vcenter::VcenterConfig;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EngineConfig {
    /// Quota every group and user falls back to when no override exists
    /// anywhere in the ancestry. Immutable for the process lifetime.
    #[validate(nested)]
    pub floor: Permission,
    #[validate(nested)]
    pub vcenter: VcenterConfig,
    #[serde(default = "default_rust_log")]
    pub rust_log: String,
}

fn default_rust_log() -> String {
    String::from("vlm=info")
}

pub fn load(cfg: &str) -> Result<EngineConfig> {
    let content =
        fs::read_to_string(cfg).context("could not read config file")?;
    let config: EngineConfig =
        toml::from_str(&content).context("could not parse config file")?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}
