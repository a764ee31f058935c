//! Command-line interface for episode-dl.
//!
//! Every locator given on the command line runs through one shared pipeline,
//! which is drained and shut down before the process exits.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::config::Config;
use crate::pipeline::Pipeline;

/// episode-dl - download episodes into zip containers
#[derive(Parser, Debug)]
#[command(name = "episode-dl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Artist, album or episode locators (full URLs or artist/album/episode paths)
    #[arg(required = true)]
    pub locators: Vec<String>,

    /// Directory episodes are written under [default: .]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of pages fetched concurrently [default: 4]
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// JSON configuration file; flags override its values
    #[arg(long, env = "EPISODE_DL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Base address of the remote site
    #[arg(long, env = "EPISODE_DL_BASE_URL")]
    pub base_url: Option<String>,

    /// Log per-page progress
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = self.load_config()?;
        let pipeline = Pipeline::start(config).context("Failed to start download pipeline")?;

        let failures = pipeline.download_all(&self.locators).await;
        pipeline.wait().await;
        pipeline
            .shutdown()
            .await
            .context("Failed to shut down download pipeline")?;

        if !failures.is_empty() {
            anyhow::bail!(
                "{} of {} locators failed to download",
                failures.len(),
                self.locators.len()
            );
        }
        Ok(())
    }

    /// Build the effective configuration: defaults, then the config file, then flags.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_json_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(output) = &self.output {
            config.download.output_dir = output.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.download.concurrency = concurrency;
        }
        if let Some(base_url) = &self.base_url {
            config.site.base_url = base_url.clone();
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}
