//! `pooldl config` – show where the config lives and what is in effect.

use anyhow::{Context, Result};
use pooldl_core::config::{self, EngineConfig};

pub fn run_config(cfg: &EngineConfig) -> Result<()> {
    let path = config::config_path()?;
    println!("config file: {}", path.display());
    let rendered = toml::to_string_pretty(cfg).context("cannot render config")?;
    print!("{}", rendered);
    if let Err(e) = cfg.validate() {
        println!("# warning: {}", e);
    }
    Ok(())
}
