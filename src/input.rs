//! # Inputs
//!
//! An [`Input`] is a fetch request in canonical attribute form, e.g.
//! `{type = "path"; path = "/srv/src"; lastModified = 1585388205;}`. It is
//! built once by an input scheme from a URL or an attribute set. Resolution
//! returns an updated copy (for instance with `lastModified` filled in),
//! which callers should use from then on.

use std::fmt;

use crate::attrs::{
    attrs_to_query, maybe_get_bool_attr, maybe_get_int_attr, maybe_get_str_attr, Attr, Attrs,
};
use crate::error::Result;
use crate::hash::ContentHash;
use crate::url::ParsedUrl;

/// Attributes that are positional or internal and never rendered into a
/// URL query.
const NON_QUERY_ATTRS: [&str; 3] = ["path", "type", "__final"];

/// A fetch request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Input {
    pub attrs: Attrs,
}

impl Input {
    pub fn new(attrs: Attrs) -> Self {
        Self { attrs }
    }

    /// The `type` attribute, naming the scheme that owns this input.
    pub fn scheme_type(&self) -> Option<&str> {
        maybe_get_str_attr(&self.attrs, "type").ok().flatten()
    }

    /// Logical name of the fetched tree in the store.
    pub fn get_name(&self) -> &str {
        maybe_get_str_attr(&self.attrs, "name")
            .ok()
            .flatten()
            .unwrap_or("source")
    }

    pub fn get_rev(&self) -> Result<Option<&str>> {
        maybe_get_str_attr(&self.attrs, "rev")
    }

    pub fn get_rev_count(&self) -> Result<Option<u64>> {
        maybe_get_int_attr(&self.attrs, "revCount")
    }

    pub fn get_last_modified(&self) -> Result<Option<u64>> {
        maybe_get_int_attr(&self.attrs, "lastModified")
    }

    /// The caller-asserted content hash, if any.
    pub fn get_nar_hash(&self) -> Result<Option<ContentHash>> {
        maybe_get_str_attr(&self.attrs, "narHash")?
            .map(ContentHash::parse)
            .transpose()
    }

    /// Whether the input has been marked as fully resolved.
    pub fn is_final(&self) -> bool {
        matches!(maybe_get_bool_attr(&self.attrs, "__final"), Ok(Some(true)))
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<Attr>) {
        self.attrs.insert(name.to_string(), value.into());
    }

    /// Generic URL rendering: `<type>:<path>?<other attrs>`.
    pub fn to_url(&self) -> ParsedUrl {
        let path = maybe_get_str_attr(&self.attrs, "path")
            .ok()
            .flatten()
            .unwrap_or_default();
        attrs_to_url(self.scheme_type().unwrap_or_default(), path, &self.attrs)
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_url())
    }
}

/// Build a URL whose query holds every attribute except the positional and
/// internal ones.
pub fn attrs_to_url(scheme: &str, path: &str, attrs: &Attrs) -> ParsedUrl {
    let mut query = attrs_to_query(attrs);
    for name in NON_QUERY_ATTRS {
        query.remove(name);
    }
    ParsedUrl {
        scheme: scheme.to_string(),
        authority: None,
        path: path.to_string(),
        query,
        fragment: String::new(),
    }
}
