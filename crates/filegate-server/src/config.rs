use std::path::Path;

use anyhow::{Context, Result};
use filegate_core::archive::DEFAULT_MAX_ARCHIVE_ENTRIES;
use filegate_core::filename::DEFAULT_MULTI_SUFFIX_ALLOWLIST;
use filegate_core::text_scan::DEFAULT_TEXT_SCAN_LIMIT;
use filegate_core::{GatePolicy, DEFAULT_MAX_UPLOAD_SIZE};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub received_dir: String,
    pub max_upload_size: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            received_dir: "Received".to_string(),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub multi_suffix_allowlist: Vec<String>,
    pub text_scan_limit: usize,
    pub max_archive_entries: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            multi_suffix_allowlist: DEFAULT_MULTI_SUFFIX_ALLOWLIST
                .iter()
                .map(|s| s.to_string())
                .collect(),
            text_scan_limit: DEFAULT_TEXT_SCAN_LIMIT,
            max_archive_entries: DEFAULT_MAX_ARCHIVE_ENTRIES,
        }
    }
}

impl PolicyConfig {
    pub fn to_gate_policy(&self) -> GatePolicy {
        GatePolicy {
            multi_suffix_allowlist: self.multi_suffix_allowlist.clone(),
            text_scan_limit: self.text_scan_limit,
            max_archive_entries: self.max_archive_entries,
        }
    }
}

impl Config {
    /// Load the TOML config at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        Self::parse(&raw).with_context(|| format!("Failed to parse config {:?}", path))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.server.max_upload_size == 0 {
            anyhow::bail!("server.max_upload_size must be greater than zero");
        }
        if self.policy.text_scan_limit == 0 {
            anyhow::bail!("policy.text_scan_limit must be greater than zero");
        }
        Ok(())
    }
}
