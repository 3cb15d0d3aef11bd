//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `path-fetcher` command-line tool. Each subcommand is defined in its own
//! file.
//!
//! ## Structure
//!
//! Each command module contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` plus the resolved
//!   settings and calls into the `path_fetcher` library.

pub mod fetch;
pub mod fingerprint;
pub mod normalize;
