//! # Normalize Command Implementation
//!
//! Parses a URL through the scheme registry and prints the canonical URL
//! followed by the input's attributes. Nothing is fetched and the store is
//! not touched.

use anyhow::{Context, Result};
use clap::Args;

use path_fetcher::config::Settings;
use path_fetcher::input::Input;
use path_fetcher::registry::InputSchemes;

/// Print the canonical form of an input URL
#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// Input URL
    #[arg(value_name = "URL")]
    pub url: String,

    /// Print the attributes as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the `normalize` command.
pub fn execute(args: NormalizeArgs, settings: Settings) -> Result<()> {
    let schemes = InputSchemes::with_defaults(settings);
    let input = schemes
        .input_from_url_str(&args.url)
        .with_context(|| format!("Failed to parse '{}'", args.url))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&input.attrs)?);
        return Ok(());
    }

    println!("{}", schemes.to_url(&input)?);
    display_attrs(&input);
    if let Some(path) = schemes.is_relative(&input) {
        println!("\nnote: '{}' is relative; fetch resolves it against the current directory", path);
    }
    Ok(())
}

fn display_attrs(input: &Input) {
    for (name, value) in &input.attrs {
        println!("  {} = {} ({})", name, value, value.kind());
    }
}
