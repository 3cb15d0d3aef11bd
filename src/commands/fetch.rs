//! # Fetch Command Implementation
//!
//! This module implements the `fetch` subcommand, which copies the input
//! named by a URL into the store and reports where it ended up.
//!
//! Paths already inside the store are reused without copying; anything else
//! is archived and registered as a new `source` object. A relative path is
//! taken relative to the current directory.

use anyhow::{Context, Result};
use clap::Args;

use path_fetcher::config::Settings;
use path_fetcher::fetcher::{FetchResult, Fetcher};

/// Copy an input into the store
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Input URL, e.g. `path:/srv/src?lastModified=1585388205`
    #[arg(value_name = "URL")]
    pub url: String,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the `fetch` command.
pub fn execute(args: FetchArgs, settings: Settings) -> Result<()> {
    let fetcher = Fetcher::open(settings).context("Failed to open the store")?;
    let cwd = std::env::current_dir().context("Failed to determine the current directory")?;
    let result = fetcher
        .fetch_url_in(&args.url, &cwd)
        .with_context(|| format!("Failed to fetch '{}'", args.url))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        display_result(&result);
    }
    Ok(())
}

fn display_result(result: &FetchResult) {
    println!("{}", result.store_path);
    println!("  locked URL:    {}", result.locked_url);
    if let Some(last_modified) = result.last_modified {
        println!("  last modified: {}", last_modified);
    }
    if let Some(nar_hash) = &result.nar_hash {
        println!("  NAR hash:      {}", nar_hash);
    }
}
