//! CLI for the pooldl download engine.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pooldl_core::config::{self, EngineConfig};
use std::path::PathBuf;

use commands::{run_config, run_get};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "pooldl")]
#[command(about = "pooldl: concurrent downloads with pause, resume and cancel", long_about = None)]
pub struct Cli {
    /// Log at debug level (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download one or more URLs through the worker pool.
    ///
    /// While running, stdin accepts: `p <id>` pause/resume, `c <id>` cancel,
    /// `s` status, `q` cancel everything and quit.
    Get {
        /// Direct HTTP/HTTPS URLs to download.
        #[arg(required = true, value_name = "URL")]
        urls: Vec<String>,

        /// Number of transfers that run at once.
        #[arg(long, value_name = "N")]
        pool_size: Option<usize>,

        /// Bytes written per step; smaller means faster pause/cancel response.
        #[arg(long, value_name = "BYTES")]
        chunk_size: Option<usize>,

        /// Delay after each chunk, in milliseconds. 0 disables throttling.
        #[arg(long, value_name = "MS")]
        throttle_ms: Option<u64>,

        /// Directory for finished files.
        #[arg(long, short = 'o', value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },

    /// Show the config file path and the effective settings.
    Config,
}

/// Flag values that take precedence over the config file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Overrides {
    pub pool_size: Option<usize>,
    pub chunk_size: Option<usize>,
    pub throttle_ms: Option<u64>,
    pub output_dir: Option<PathBuf>,
}

impl Overrides {
    pub fn apply(self, cfg: &mut EngineConfig) {
        if let Some(n) = self.pool_size {
            cfg.pool_size = n;
        }
        if let Some(n) = self.chunk_size {
            cfg.chunk_size = n;
        }
        if let Some(ms) = self.throttle_ms {
            cfg.throttle_ms = ms;
        }
        if let Some(dir) = self.output_dir {
            cfg.output_dir = dir;
        }
    }
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let mut cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match self.command {
            CliCommand::Get {
                urls,
                pool_size,
                chunk_size,
                throttle_ms,
                output_dir,
            } => {
                Overrides {
                    pool_size,
                    chunk_size,
                    throttle_ms,
                    output_dir,
                }
                .apply(&mut cfg);
                run_get(cfg, &urls).await?;
            }
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}
