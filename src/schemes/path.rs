//! # The `path` Input Scheme
//!
//! Fetches a directory tree (or single file) from the local filesystem, e.g.
//! `path:/srv/src` or `{type = "path"; path = "/srv/src";}`.
//!
//! ## Resolution
//!
//! The path is copied into the store as an object named `source`, unless it
//! already *is* a valid `source` object in the store, in which case it is
//! used as is. Either way, when the path lies inside the store the object's
//! hash gives a stable fingerprint and a `fetchToStore` cache entry is
//! written, so later fetches of the same content skip archiving entirely.
//!
//! Paths outside the store are never fingerprinted: their content can change
//! at any moment, so a cache entry for them could go stale.
//!
//! ## Pinning attributes
//!
//! `rev`, `revCount`, `lastModified` and `narHash` are accepted as "fake"
//! tree information. This lets a tree that was exported from a repository
//! behave the same as the repository itself, e.g.
//! `path:/store/<hash>-source?lastModified=1585388205&rev=b0c285…`.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};

use crate::accessor::{SourceAccessor, StorePathAccessor};
use crate::archive;
use crate::attrs::{get_str_attr, maybe_get_str_attr, Attrs};
use crate::cache::{CacheKey, ContentAddressMethod, FetchCache};
use crate::config::ExperimentalFeature;
use crate::error::{Error, Result};
use crate::input::{attrs_to_url, Input};
use crate::path::{canon_path, is_absolute, CanonPath};
use crate::schemes::InputScheme;
use crate::store::Store;
use crate::url::ParsedUrl;

const SCHEME: &str = "path";

/// Name given to every store object this scheme creates.
const SOURCE_NAME: &str = "source";

/// The `path` input scheme.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathInputScheme;

impl PathInputScheme {
    pub fn new() -> Self {
        Self
    }

    /// The input's path, canonicalised. Fails for relative paths.
    pub fn get_abs_path(&self, input: &Input) -> Result<String> {
        let path = get_str_attr(&input.attrs, "path")?;
        if is_absolute(path) {
            Ok(canon_path(path))
        } else {
            Err(Error::RelativePathNotSupported {
                input: input.to_string(),
            })
        }
    }
}

impl InputScheme for PathInputScheme {
    fn scheme_name(&self) -> &'static str {
        SCHEME
    }

    fn input_from_url(&self, url: &ParsedUrl) -> Result<Option<Input>> {
        if url.scheme != SCHEME {
            return Ok(None);
        }

        if url.has_authority() {
            return Err(Error::MalformedInput {
                url: url.to_string(),
                message: format!(
                    "path URL should not have an authority ('{}')",
                    url.authority.as_deref().unwrap_or_default()
                ),
            });
        }

        let mut input = Input::default();
        input.set_attr("type", SCHEME);
        input.set_attr("path", url.path.as_str());

        for (name, value) in &url.query {
            match name.as_str() {
                "rev" | "narHash" => input.set_attr(name, value.as_str()),
                "revCount" | "lastModified" => {
                    let n = value.parse::<u64>().map_err(|_| Error::MalformedInput {
                        url: url.to_string(),
                        message: format!("path URL has invalid parameter '{}'", name),
                    })?;
                    input.set_attr(name, n);
                }
                _ => {
                    return Err(Error::UnsupportedAttribute {
                        context: format!("path URL '{}'", url),
                        name: name.clone(),
                    })
                }
            }
        }

        Ok(Some(input))
    }

    fn input_from_attrs(&self, attrs: &Attrs) -> Result<Option<Input>> {
        if let Some(ty) = maybe_get_str_attr(attrs, "type")? {
            if ty != SCHEME {
                return Ok(None);
            }
        }
        get_str_attr(attrs, "path")?;

        let mut input = Input::new(attrs.clone());
        input.set_attr("type", SCHEME);
        Ok(Some(input))
    }

    fn to_url(&self, input: &Input) -> Result<ParsedUrl> {
        let path = get_str_attr(&input.attrs, "path")?;
        Ok(attrs_to_url(SCHEME, path, &input.attrs))
    }

    fn allowed_attrs(&self) -> BTreeSet<&'static str> {
        BTreeSet::from(["path", "rev", "revCount", "lastModified", "narHash"])
    }

    fn get_accessor(
        &self,
        store: &Arc<dyn Store>,
        cache: &dyn FetchCache,
        original: &Input,
    ) -> Result<(Box<dyn SourceAccessor>, Input)> {
        let mut input = original.clone();
        let abs_path = self.get_abs_path(&input)?;

        debug!("copying '{}' to the store", abs_path);

        // TODO: check whether access to the path is allowed once fetch
        // settings carry an allow-list of readable roots.
        let existing = store.maybe_parse_store_path(&abs_path);
        if let Some(store_path) = &existing {
            store.add_temp_root(store_path)?;
        }

        let reusable = match &existing {
            Some(store_path) => store_path.name() == SOURCE_NAME && store.is_valid_path(store_path)?,
            None => false,
        };

        let mut mtime = 0;
        let store_path = match existing {
            Some(store_path) if reusable => {
                debug!("'{}' is already a valid store object", abs_path);
                store_path
            }
            _ => {
                let mut dump = Vec::new();
                mtime = archive::dump_path_and_get_mtime(
                    Path::new(&abs_path),
                    &mut dump,
                    &archive::default_path_filter,
                )?;
                store.add_to_store_from_dump(&mut dump.as_slice(), SOURCE_NAME)?
            }
        };

        // Record the result so that fetching the same content again does not
        // need to re-derive the store path.
        if let Some(fingerprint) = self.get_fingerprint(&**store, original) {
            let key = CacheKey::fetch_to_store(
                original.get_name(),
                &fingerprint,
                ContentAddressMethod::NixArchive,
                "/",
            );
            cache.upsert(&key, &**store, Attrs::new(), &store_path)?;
        }

        // A caller-supplied lastModified is trusted; it is not a security
        // relevant attribute.
        if input.get_last_modified()?.is_none() {
            input.set_attr("lastModified", mtime);
        }

        let accessor = StorePathAccessor::new(Arc::clone(store), store_path);
        Ok((Box::new(accessor), input))
    }

    fn get_fingerprint(&self, store: &dyn Store, input: &Input) -> Option<String> {
        if self.is_relative(input).is_some() {
            return None;
        }

        // Only paths inside the store have content that cannot change under
        // us: use the hash of the store object plus the sub-path.
        let path = self.get_abs_path(input).ok()?;
        let (store_path, sub_path) = store.to_store_path(&path).ok()?;
        let info = store.query_path_info(&store_path).ok()?;
        Some(format!("path:{}:{}", info.nar_hash.to_base16(), sub_path))
    }

    fn is_locked(&self, input: &Input) -> bool {
        matches!(input.get_nar_hash(), Ok(Some(_)))
    }

    fn is_relative(&self, input: &Input) -> Option<String> {
        let path = get_str_attr(&input.attrs, "path").ok()?;
        if is_absolute(path) {
            None
        } else {
            Some(path.to_string())
        }
    }

    fn get_source_path(&self, input: &Input) -> Result<Option<PathBuf>> {
        Ok(Some(PathBuf::from(self.get_abs_path(input)?)))
    }

    fn put_file(
        &self,
        input: &Input,
        path: &CanonPath,
        contents: &[u8],
        _commit_msg: Option<&str>,
    ) -> Result<()> {
        let target = Path::new(&self.get_abs_path(input)?).join(path.rel());
        fs::write(&target, contents).map_err(|e| Error::io(&target, e))?;
        info!("wrote {}", target.display());
        Ok(())
    }

    fn experimental_feature(&self) -> Option<ExperimentalFeature> {
        Some(ExperimentalFeature::Flakes)
    }
}
