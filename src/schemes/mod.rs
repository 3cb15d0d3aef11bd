//! # Input Schemes
//!
//! An input scheme is one strategy for turning a reference (a URL or an
//! attribute set) into fetched content. Every scheme implements the
//! [`InputScheme`] trait, which lets the dispatcher in [`crate::registry`]
//! treat them uniformly:
//!
//! - **Normalisation**: `input_from_url`, `input_from_attrs` and `to_url`
//!   convert between the URL form and the canonical [`Input`]. A scheme
//!   that does not recognise a URL returns `Ok(None)` so that another scheme
//!   can claim it.
//! - **Materialisation**: `get_accessor` produces a read-only view of the
//!   content plus the updated input, and `get_fingerprint` says whether the
//!   result may be cached.
//! - **Introspection**: `is_locked`, `is_relative`, `get_source_path` and the
//!   optional `put_file` write-back.
//!
//! Only the `path` scheme lives here today.

pub mod path;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::accessor::SourceAccessor;
use crate::attrs::Attrs;
use crate::cache::FetchCache;
use crate::config::ExperimentalFeature;
use crate::error::{Error, Result};
use crate::input::Input;
use crate::path::CanonPath;
use crate::store::Store;
use crate::url::ParsedUrl;

pub use path::PathInputScheme;

/// The capability set shared by all input schemes.
pub trait InputScheme: Send + Sync {
    /// The URL scheme and `type` attribute this scheme owns.
    fn scheme_name(&self) -> &'static str;

    /// Build an input from a URL, or `Ok(None)` if the URL belongs to some
    /// other scheme.
    fn input_from_url(&self, url: &ParsedUrl) -> Result<Option<Input>>;

    /// Build an input from attributes that already passed the
    /// [`allowed_attrs`](Self::allowed_attrs) check.
    fn input_from_attrs(&self, attrs: &Attrs) -> Result<Option<Input>>;

    fn to_url(&self, input: &Input) -> Result<ParsedUrl>;

    /// Attribute names accepted in addition to `type`.
    fn allowed_attrs(&self) -> BTreeSet<&'static str>;

    /// Materialise `input` and return a view of its content together with
    /// the updated input.
    fn get_accessor(
        &self,
        store: &Arc<dyn Store>,
        cache: &dyn FetchCache,
        input: &Input,
    ) -> Result<(Box<dyn SourceAccessor>, Input)>;

    /// A cache key that is guaranteed not to go stale, if one exists.
    fn get_fingerprint(&self, _store: &dyn Store, _input: &Input) -> Option<String> {
        None
    }

    /// Whether the input pins its content so it can be reused without
    /// fetching again.
    fn is_locked(&self, _input: &Input) -> bool {
        false
    }

    /// The input's path if it is relative and must be anchored by the caller.
    fn is_relative(&self, _input: &Input) -> Option<String> {
        None
    }

    /// A directly usable filesystem path for the input, if the scheme has one.
    fn get_source_path(&self, _input: &Input) -> Result<Option<PathBuf>> {
        Ok(None)
    }

    /// Write `contents` to `path` inside the input's source.
    fn put_file(
        &self,
        _input: &Input,
        _path: &CanonPath,
        _contents: &[u8],
        _commit_msg: Option<&str>,
    ) -> Result<()> {
        Err(Error::NotSupported {
            scheme: self.scheme_name().to_string(),
            operation: "writing files".to_string(),
        })
    }

    /// Feature that must be enabled for the dispatcher to use this scheme.
    fn experimental_feature(&self) -> Option<ExperimentalFeature> {
        None
    }
}
