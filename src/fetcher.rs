//! # High-Level Fetching
//!
//! This module provides the [`Fetcher`], the entry point used by the CLI. It
//! ties together the scheme registry, a [`Store`] and a [`FetchCache`] so
//! that callers can go from a URL straight to a store object.
//!
//! ## Design
//!
//! The store and the cache are held as trait objects. [`Fetcher::open`]
//! wires up the on-disk [`LocalStore`] and [`DiskCache`] from [`Settings`];
//! tests inject in-memory implementations through [`Fetcher::new`] to observe
//! exactly which store operations a fetch performs.

use std::path::Path;
use std::sync::Arc;

use log::{debug, info};
use serde::Serialize;

use crate::accessor::SourceAccessor;
use crate::cache::{DiskCache, FetchCache};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::input::Input;
use crate::path::canon_path;
use crate::registry::InputSchemes;
use crate::store::{LocalStore, Store};

/// Outcome of a successful fetch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResult {
    /// Full path of the store object.
    pub store_path: String,
    /// The input with `lastModified` and `narHash` filled in.
    pub locked_url: String,
    pub last_modified: Option<u64>,
    pub nar_hash: Option<String>,
    #[serde(skip)]
    pub input: Input,
}

/// Fetches inputs into a store.
pub struct Fetcher {
    schemes: InputSchemes,
    store: Arc<dyn Store>,
    cache: Arc<dyn FetchCache>,
}

impl Fetcher {
    /// Creates a `Fetcher` from explicit collaborators.
    pub fn new(schemes: InputSchemes, store: Arc<dyn Store>, cache: Arc<dyn FetchCache>) -> Self {
        Self {
            schemes,
            store,
            cache,
        }
    }

    /// Creates a `Fetcher` backed by the local store and disk cache named in
    /// `settings`, with every built-in scheme registered.
    pub fn open(settings: Settings) -> Result<Self> {
        let store = LocalStore::open(settings.store_root())?;
        let cache = DiskCache::open(settings.cache_root())?;
        Ok(Self::new(
            InputSchemes::with_defaults(settings),
            Arc::new(store),
            Arc::new(cache),
        ))
    }

    pub fn schemes(&self) -> &InputSchemes {
        &self.schemes
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn cache(&self) -> &dyn FetchCache {
        self.cache.as_ref()
    }

    /// Parse `url` and fetch it.
    pub fn fetch_url(&self, url: &str) -> Result<FetchResult> {
        let input = self.schemes.input_from_url_str(url)?;
        self.fetch(&input)
    }

    /// Parse `url` and fetch it, resolving a relative path against
    /// `base_dir`.
    pub fn fetch_url_in(&self, url: &str, base_dir: &Path) -> Result<FetchResult> {
        let input = self.schemes.input_from_url_str(url)?;
        self.fetch(&self.anchor(input, base_dir))
    }

    /// Make a relative `path` attribute absolute by joining it to `base_dir`.
    ///
    /// Inputs that are already absolute are returned unchanged.
    pub fn anchor(&self, mut input: Input, base_dir: &Path) -> Input {
        if let Some(rel) = self.schemes.is_relative(&input) {
            let abs = canon_path(&format!("{}/{}", base_dir.to_string_lossy(), rel));
            debug!("anchored relative path '{}' at '{}'", rel, abs);
            input.set_attr("path", abs);
        }
        input
    }

    /// Fetch `input` and describe the resulting store object.
    pub fn fetch(&self, input: &Input) -> Result<FetchResult> {
        let (accessor, locked) = self.resolve(input)?;
        let store_path = accessor.store_path().ok_or_else(|| Error::Store {
            message: format!("input '{}' did not resolve to a store object", input),
        })?;
        let printed = self.store.print_store_path(store_path);
        info!("fetched '{}' to {}", input, printed);

        Ok(FetchResult {
            store_path: printed,
            locked_url: self.schemes.to_url(&locked)?.to_string(),
            last_modified: locked.get_last_modified()?,
            nar_hash: locked.get_nar_hash()?.map(|h| h.to_string()),
            input: locked,
        })
    }

    /// Materialise `input` and return a view of its content.
    pub fn resolve(&self, input: &Input) -> Result<(Box<dyn SourceAccessor>, Input)> {
        self.schemes
            .get_accessor(&self.store, self.cache.as_ref(), input)
    }

    /// Fingerprint of the input named by `url`, if it has a stable one.
    pub fn fingerprint(&self, url: &str) -> Result<Option<String>> {
        let input = self.schemes.input_from_url_str(url)?;
        Ok(self.schemes.get_fingerprint(self.store.as_ref(), &input))
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("schemes", &self.schemes)
            .field("store_dir", &self.store.store_dir())
            .finish()
    }
}
