//! # Settings
//!
//! This module defines the fetcher settings, loaded from an optional YAML
//! file such as:
//!
//! ```yaml
//! store-root: /var/lib/path-fetcher
//! cache-root: /var/cache/path-fetcher
//! experimental-features:
//!   - flakes
//! ```
//!
//! ## Key Components
//!
//! - **`Settings`**: Where the store and fetch cache live and which
//!   experimental features are enabled. Every field is optional; missing
//!   roots fall back to the platform defaults in [`crate::defaults`].
//!
//! - **`ExperimentalFeature`**: Feature flags that gate input schemes. A
//!   scheme that names a feature is only considered by the dispatcher when
//!   that feature is enabled.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::{Error, Result};

/// Feature flags that input schemes can be gated behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExperimentalFeature {
    Flakes,
    FetchTree,
}

impl ExperimentalFeature {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Flakes => "flakes",
            Self::FetchTree => "fetch-tree",
        }
    }
}

impl fmt::Display for ExperimentalFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fetcher settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Settings {
    /// Root directory of the local store.
    pub store_root: Option<PathBuf>,
    /// Directory of the persistent fetch cache.
    pub cache_root: Option<PathBuf>,
    pub experimental_features: BTreeSet<ExperimentalFeature>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_root: None,
            cache_root: None,
            experimental_features: BTreeSet::from([ExperimentalFeature::Flakes]),
        }
    }
}

impl Settings {
    /// Parse settings from a YAML string. An empty document yields defaults.
    pub fn parse(yaml_content: &str) -> Result<Self> {
        if yaml_content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml_content).map_err(|e| Error::Config {
            message: e.to_string(),
        })
    }

    /// Load settings from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse(&content)
    }

    pub fn is_enabled(&self, feature: ExperimentalFeature) -> bool {
        self.experimental_features.contains(&feature)
    }

    /// Configured store root, or the platform default.
    pub fn store_root(&self) -> PathBuf {
        self.store_root
            .clone()
            .unwrap_or_else(defaults::default_store_root)
    }

    /// Configured cache root, or the platform default.
    pub fn cache_root(&self) -> PathBuf {
        self.cache_root
            .clone()
            .unwrap_or_else(defaults::default_cache_root)
    }
}
