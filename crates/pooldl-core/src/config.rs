use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::EngineError;

/// Engine configuration loaded from `~/.config/pooldl/config.toml`.
/// Fixed for the lifetime of a `DownloadManager`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of transfers that may run at once. Further submissions wait in FIFO order.
    pub pool_size: usize,
    /// Upper bound on bytes written per loop iteration; bounds pause/cancel latency.
    pub chunk_size: usize,
    /// Delay after each chunk in milliseconds (bandwidth shaping). 0 disables it.
    pub throttle_ms: u64,
    /// Output root for finished files. Created on demand.
    pub output_dir: PathBuf,
    /// Connect timeout for the HEAD request and the GET.
    pub connect_timeout_secs: u64,
    /// User-Agent sent with every request.
    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_size: 4,
            chunk_size: 1024,
            throttle_ms: 500,
            output_dir: PathBuf::from("downloads"),
            connect_timeout_secs: 15,
            user_agent: concat!("pooldl/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl EngineConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.pool_size == 0 {
            return Err(EngineError::Config("pool_size must be at least 1".into()));
        }
        if self.chunk_size == 0 {
            return Err(EngineError::Config("chunk_size must be at least 1".into()));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(EngineError::Config("output_dir must not be empty".into()));
        }
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("pooldl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<EngineConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = EngineConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: EngineConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.pool_size, 4);
        assert_eq!(cfg.chunk_size, 1024);
        assert_eq!(cfg.throttle(), Duration::from_millis(500));
        assert_eq!(cfg.output_dir, PathBuf::from("downloads"));
        assert!(cfg.user_agent.starts_with("pooldl/"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = EngineConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: EngineConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_toml_partial_overrides_keep_defaults() {
        let toml = r#"
            pool_size = 2
            throttle_ms = 0
        "#;
        let cfg: EngineConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.pool_size, 2);
        assert_eq!(cfg.throttle_ms, 0);
        assert_eq!(cfg.chunk_size, 1024);
        assert_eq!(cfg.output_dir, PathBuf::from("downloads"));
    }

    #[test]
    fn validate_rejects_zero_sizes() {
        let mut cfg = EngineConfig::default();
        cfg.pool_size = 0;
        assert!(matches!(cfg.validate(), Err(EngineError::Config(_))));

        let mut cfg = EngineConfig::default();
        cfg.chunk_size = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.output_dir = PathBuf::new();
        assert!(cfg.validate().is_err());
    }
}
