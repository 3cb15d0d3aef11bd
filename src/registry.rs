//! # Input Scheme Registry
//!
//! [`InputSchemes`] is the dispatcher that sits in front of the individual
//! [`InputScheme`] implementations. It is built explicitly by the caller
//! (there is no global registration) and owns the [`Settings`] that decide
//! which schemes are usable.
//!
//! ## Responsibilities
//!
//! - **Parsing**: offer a URL to every enabled scheme until one claims it, or
//!   route an attribute set by its `type` attribute after checking it only
//!   uses attributes the scheme allows.
//! - **Feature gating**: schemes that name an experimental feature are
//!   skipped while that feature is disabled, and addressing one directly
//!   fails with [`Error::FeatureDisabled`].
//! - **Lock verification**: an input that carries a `narHash` must resolve
//!   to a store object with exactly that hash.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, warn};

use crate::accessor::SourceAccessor;
use crate::attrs::{maybe_get_str_attr, Attrs};
use crate::cache::{CacheKey, ContentAddressMethod, FetchCache};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::input::Input;
use crate::path::CanonPath;
use crate::schemes::{InputScheme, PathInputScheme};
use crate::store::{Store, StorePath};
use crate::url::ParsedUrl;

/// Attributes every scheme accepts on top of its own allow-list.
const COMMON_ATTRS: [&str; 2] = ["type", "__final"];

/// The set of known input schemes.
pub struct InputSchemes {
    settings: Settings,
    schemes: Vec<Box<dyn InputScheme>>,
}

impl InputSchemes {
    /// An empty registry.
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            schemes: Vec::new(),
        }
    }

    /// A registry with every built-in scheme.
    pub fn with_defaults(settings: Settings) -> Self {
        let mut schemes = Self::new(settings);
        schemes.register(Box::new(PathInputScheme::new()));
        schemes
    }

    /// Add a scheme. Later registrations are tried after earlier ones.
    pub fn register(&mut self, scheme: Box<dyn InputScheme>) {
        debug!("registered input scheme '{}'", scheme.scheme_name());
        self.schemes.push(scheme);
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Look up a registered scheme by name, whether or not it is enabled.
    pub fn get(&self, name: &str) -> Option<&dyn InputScheme> {
        self.schemes
            .iter()
            .find(|s| s.scheme_name() == name)
            .map(|s| s.as_ref())
    }

    fn is_enabled(&self, scheme: &dyn InputScheme) -> bool {
        scheme
            .experimental_feature()
            .map_or(true, |feature| self.settings.is_enabled(feature))
    }

    fn check_enabled(&self, scheme: &dyn InputScheme) -> Result<()> {
        match scheme.experimental_feature() {
            Some(feature) if !self.settings.is_enabled(feature) => Err(Error::FeatureDisabled {
                feature: feature.to_string(),
                scheme: scheme.scheme_name().to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// The enabled scheme that owns `input`.
    fn scheme_for(&self, input: &Input) -> Result<&dyn InputScheme> {
        let ty = input.scheme_type().ok_or_else(|| Error::MissingAttribute {
            name: "type".to_string(),
        })?;
        let scheme = self.get(ty).ok_or_else(|| Error::UnsupportedScheme {
            url: input.to_string(),
        })?;
        self.check_enabled(scheme)?;
        Ok(scheme)
    }

    /// Parse a URL string into an input.
    pub fn input_from_url_str(&self, url: &str) -> Result<Input> {
        self.input_from_url(&ParsedUrl::parse(url)?)
    }

    /// Offer `url` to each enabled scheme in registration order.
    pub fn input_from_url(&self, url: &ParsedUrl) -> Result<Input> {
        for scheme in self.schemes.iter().filter(|s| self.is_enabled(s.as_ref())) {
            if let Some(input) = scheme.input_from_url(url)? {
                return Ok(input);
            }
        }

        // Give a precise error when a disabled scheme would have matched.
        if let Some(scheme) = self.get(&url.scheme) {
            self.check_enabled(scheme)?;
        }

        Err(Error::UnsupportedScheme {
            url: url.to_string(),
        })
    }

    /// Build an input from attributes, routed by their `type`.
    pub fn input_from_attrs(&self, attrs: &Attrs) -> Result<Input> {
        let ty = maybe_get_str_attr(attrs, "type")?.ok_or_else(|| Error::MissingAttribute {
            name: "type".to_string(),
        })?;
        let scheme = self.get(ty).ok_or_else(|| Error::UnsupportedScheme {
            url: format!("{}:", ty),
        })?;
        self.check_enabled(scheme)?;

        let allowed: BTreeSet<&str> = scheme
            .allowed_attrs()
            .into_iter()
            .chain(COMMON_ATTRS)
            .collect();
        if let Some(name) = attrs.keys().find(|name| !allowed.contains(name.as_str())) {
            return Err(Error::UnsupportedAttribute {
                context: format!("input of type '{}'", ty),
                name: name.clone(),
            });
        }

        scheme
            .input_from_attrs(attrs)?
            .ok_or_else(|| Error::UnsupportedScheme {
                url: format!("{}:", ty),
            })
    }

    /// Render `input` in its canonical URL form.
    pub fn to_url(&self, input: &Input) -> Result<ParsedUrl> {
        self.scheme_for(input)?.to_url(input)
    }

    /// Materialise `input`, verifying its `narHash` if it has one.
    ///
    /// The returned input has `lastModified` and `narHash` filled in.
    pub fn get_accessor(
        &self,
        store: &Arc<dyn Store>,
        cache: &dyn FetchCache,
        input: &Input,
    ) -> Result<(Box<dyn SourceAccessor>, Input)> {
        let scheme = self.scheme_for(input)?;
        let expected = input.get_nar_hash()?;

        let (accessor, mut result) = scheme.get_accessor(store, cache, input)?;

        if let Some(store_path) = accessor.store_path() {
            let actual = store.query_path_info(store_path)?.nar_hash;
            match expected {
                Some(expected) if expected != actual => {
                    warn!("'{}' resolved to unexpected content", input);
                    return Err(Error::NarHashMismatch {
                        input: input.to_string(),
                        expected: expected.to_string(),
                        actual: actual.to_string(),
                    });
                }
                Some(_) => {}
                None => result.set_attr("narHash", actual.to_string()),
            }
        }

        Ok((accessor, result))
    }

    /// Fingerprint of `input`, if its scheme can give a stable one.
    pub fn get_fingerprint(&self, store: &dyn Store, input: &Input) -> Option<String> {
        self.scheme_for(input).ok()?.get_fingerprint(store, input)
    }

    /// Store object previously recorded for `input`'s fingerprint.
    pub fn lookup_cached(
        &self,
        store: &dyn Store,
        cache: &dyn FetchCache,
        input: &Input,
    ) -> Result<Option<StorePath>> {
        let fingerprint = match self.get_fingerprint(store, input) {
            Some(fingerprint) => fingerprint,
            None => return Ok(None),
        };
        let key = CacheKey::fetch_to_store(
            input.get_name(),
            &fingerprint,
            ContentAddressMethod::NixArchive,
            "/",
        );
        Ok(cache
            .lookup_store_path(&key, store)?
            .map(|entry| entry.store_path))
    }

    pub fn is_locked(&self, input: &Input) -> bool {
        self.scheme_for(input)
            .map(|s| s.is_locked(input))
            .unwrap_or(false)
    }

    pub fn is_relative(&self, input: &Input) -> Option<String> {
        self.scheme_for(input).ok()?.is_relative(input)
    }

    pub fn get_source_path(&self, input: &Input) -> Result<Option<PathBuf>> {
        self.scheme_for(input)?.get_source_path(input)
    }

    pub fn put_file(
        &self,
        input: &Input,
        path: &CanonPath,
        contents: &[u8],
        commit_msg: Option<&str>,
    ) -> Result<()> {
        self.scheme_for(input)?
            .put_file(input, path, contents, commit_msg)
    }
}

impl std::fmt::Debug for InputSchemes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.schemes.iter().map(|s| s.scheme_name()).collect();
        f.debug_struct("InputSchemes")
            .field("settings", &self.settings)
            .field("schemes", &names)
            .finish()
    }
}
