//! # Fingerprint Command Implementation
//!
//! Prints the cache fingerprint of an input. Only inputs whose content
//! cannot change have one; for everything else `(none)` is printed.

use anyhow::{Context, Result};
use clap::Args;

use path_fetcher::config::Settings;
use path_fetcher::fetcher::Fetcher;

/// Print the fingerprint of an input
#[derive(Args, Debug)]
pub struct FingerprintArgs {
    /// Input URL
    #[arg(value_name = "URL")]
    pub url: String,
}

/// Execute the `fingerprint` command.
pub fn execute(args: FingerprintArgs, settings: Settings) -> Result<()> {
    let fetcher = Fetcher::open(settings).context("Failed to open the store")?;
    let fingerprint = fetcher
        .fingerprint(&args.url)
        .with_context(|| format!("Failed to parse '{}'", args.url))?;
    println!("{}", fingerprint.as_deref().unwrap_or("(none)"));
    Ok(())
}
