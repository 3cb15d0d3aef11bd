//! Attribute maps: the canonical key/value form of a fetch request.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Attr {
    String(String),
    Int(u64),
    /// Only used for internal markers such as `__final`.
    Bool(bool),
}

impl Attr {
    /// Short name of the value kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Attr::String(_) => "string",
            Attr::Int(_) => "integer",
            Attr::Bool(_) => "Boolean",
        }
    }

    /// Render the value as it appears in a URL query string.
    pub fn to_query_value(&self) -> String {
        match self {
            Attr::String(s) => s.clone(),
            Attr::Int(n) => n.to_string(),
            Attr::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        }
    }
}

impl fmt::Display for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attr::String(s) => write!(f, "{:?}", s),
            Attr::Int(n) => write!(f, "{}", n),
            Attr::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for Attr {
    fn from(value: &str) -> Self {
        Attr::String(value.to_string())
    }
}

impl From<String> for Attr {
    fn from(value: String) -> Self {
        Attr::String(value)
    }
}

impl From<u64> for Attr {
    fn from(value: u64) -> Self {
        Attr::Int(value)
    }
}

impl From<bool> for Attr {
    fn from(value: bool) -> Self {
        Attr::Bool(value)
    }
}

/// Name to value mapping. Ordered so that rendering is deterministic.
pub type Attrs = BTreeMap<String, Attr>;

/// Get a string attribute, or `None` if it is absent.
///
/// Fails if the attribute is present with a non-string value.
pub fn maybe_get_str_attr<'a>(attrs: &'a Attrs, name: &str) -> Result<Option<&'a str>> {
    match attrs.get(name) {
        None => Ok(None),
        Some(Attr::String(s)) => Ok(Some(s)),
        Some(_) => Err(Error::AttributeType {
            name: name.to_string(),
            expected: "string",
        }),
    }
}

/// Get a required string attribute.
pub fn get_str_attr<'a>(attrs: &'a Attrs, name: &str) -> Result<&'a str> {
    maybe_get_str_attr(attrs, name)?.ok_or_else(|| Error::MissingAttribute {
        name: name.to_string(),
    })
}

/// Get an integer attribute, or `None` if it is absent.
pub fn maybe_get_int_attr(attrs: &Attrs, name: &str) -> Result<Option<u64>> {
    match attrs.get(name) {
        None => Ok(None),
        Some(Attr::Int(n)) => Ok(Some(*n)),
        Some(_) => Err(Error::AttributeType {
            name: name.to_string(),
            expected: "integer",
        }),
    }
}

/// Get a Boolean attribute, or `None` if it is absent.
pub fn maybe_get_bool_attr(attrs: &Attrs, name: &str) -> Result<Option<bool>> {
    match attrs.get(name) {
        None => Ok(None),
        Some(Attr::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(Error::AttributeType {
            name: name.to_string(),
            expected: "Boolean",
        }),
    }
}

/// Render every attribute as a query parameter.
pub fn attrs_to_query(attrs: &Attrs) -> BTreeMap<String, String> {
    attrs
        .iter()
        .map(|(name, value)| (name.clone(), value.to_query_value()))
        .collect()
}
