//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use path_fetcher::config::Settings;

use crate::commands;

/// Path Fetcher - Copy local source trees into a content-addressed store
#[derive(Parser, Debug)]
#[command(name = "path-fetcher")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Settings file (YAML).
    #[arg(long, global = true, value_name = "FILE", env = "PATH_FETCHER_CONFIG")]
    config: Option<PathBuf>,

    /// Root directory of the store.
    ///
    /// Defaults to `~/.local/share/path-fetcher/store` on Linux.
    #[arg(long, global = true, value_name = "DIR", env = "PATH_FETCHER_STORE")]
    store_root: Option<PathBuf>,

    /// Directory of the fetch cache.
    ///
    /// Defaults to the system cache directory (`~/.cache/path-fetcher` on
    /// Linux, `~/Library/Caches/path-fetcher` on macOS).
    #[arg(long, global = true, value_name = "DIR", env = "PATH_FETCHER_CACHE")]
    cache_root: Option<PathBuf>,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy an input into the store
    Fetch(commands::fetch::FetchArgs),

    /// Print the fingerprint of an input, if it has a stable one
    Fingerprint(commands::fingerprint::FingerprintArgs),

    /// Parse a URL and print its canonical form and attributes
    Normalize(commands::normalize::NormalizeArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        env_logger::Builder::new()
            .parse_filters(&self.log_level)
            .format_timestamp(None)
            .try_init()
            .ok();

        let settings = self.settings()?;

        match self.command {
            Commands::Fetch(args) => commands::fetch::execute(args, settings),
            Commands::Fingerprint(args) => commands::fingerprint::execute(args, settings),
            Commands::Normalize(args) => commands::normalize::execute(args, settings),
        }
    }

    /// Settings from the config file, with the command-line roots on top.
    fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::from_file(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => Settings::default(),
        };
        if let Some(store_root) = &self.store_root {
            settings.store_root = Some(store_root.clone());
        }
        if let Some(cache_root) = &self.cache_root {
            settings.cache_root = Some(cache_root.clone());
        }
        Ok(settings)
    }
}
