//! # Path Fetcher Library
//!
//! This library implements the `path` input scheme of a content-addressed
//! source fetcher: it turns references such as `path:/srv/src?rev=abc` into
//! objects in a local store, deduplicating work for content that is already
//! there. It powers the `path-fetcher` command-line tool but is usable on its
//! own.
//!
//! ## Quick Example
//!
//! ```
//! use path_fetcher::config::Settings;
//! use path_fetcher::registry::InputSchemes;
//!
//! let schemes = InputSchemes::with_defaults(Settings::default());
//!
//! let input = schemes
//!     .input_from_url_str("path:/srv/src?lastModified=1585388205")
//!     .unwrap();
//! assert_eq!(input.get_last_modified().unwrap(), Some(1585388205));
//! assert_eq!(
//!     schemes.to_url(&input).unwrap().to_string(),
//!     "path:/srv/src?lastModified=1585388205"
//! );
//! ```
//!
//! ## Core Concepts
//!
//! - **Inputs (`input`, `attrs`, `url`)**: A fetch request is an attribute
//!   map with a `type` naming its scheme. URLs and attribute sets both
//!   normalise to the same [`input::Input`].
//! - **Schemes (`schemes`, `registry`)**: Each scheme implements
//!   [`schemes::InputScheme`]; [`registry::InputSchemes`] dispatches to the
//!   right one and verifies locked inputs.
//! - **Store (`store`, `archive`, `hash`)**: Trees are serialised into a
//!   deterministic archive, hashed, and registered under a content-derived
//!   name.
//! - **Cache (`cache`)**: Maps fingerprints to store objects so that stable
//!   content is never copied twice.
//! - **Access (`accessor`, `path`)**: Resolved inputs are read through a
//!   [`accessor::SourceAccessor`] rooted at their store object.
//!
//! The [`fetcher::Fetcher`] ties a registry, store and cache together.

pub mod accessor;
pub mod archive;
pub mod attrs;
pub mod cache;
pub mod config;
pub mod defaults;
pub mod error;
pub mod fetcher;
pub mod hash;
pub mod input;
pub mod path;
pub mod registry;
pub mod schemes;
pub mod store;
pub mod url;

#[cfg(test)]
mod url_proptest;
