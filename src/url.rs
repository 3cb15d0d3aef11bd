//! # URL Codec
//!
//! `ParsedUrl` is the decomposed form of an input reference such as
//! `path:/srv/src?lastModified=1585388205&rev=b0c285`. Parsing is done with
//! the `url` crate; the path and the query are percent-decoded (a `+` is a
//! literal plus, not a space) and the query lands in an ordered map, so that
//! rendering is deterministic and `ParsedUrl::parse(&url.to_string())` yields
//! the same value back.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::{Error, Result};

/// A URL broken into the parts input schemes care about.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedUrl {
    pub scheme: String,
    /// `None` when the URL has no `//` part, `Some("")` when it is empty.
    pub authority: Option<String>,
    /// Percent-decoded path.
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub fragment: String,
}

impl ParsedUrl {
    /// Parse a URL string.
    pub fn parse(s: &str) -> Result<Self> {
        let url = Url::parse(s)?;

        let path = percent_decode(url.path()).ok_or_else(|| Error::MalformedInput {
            url: s.to_string(),
            message: "path is not valid percent-encoded UTF-8".to_string(),
        })?;

        Ok(Self {
            scheme: url.scheme().to_string(),
            authority: authority_of(&url),
            path,
            query: decode_query(url.query().unwrap_or_default()).ok_or_else(|| {
                Error::MalformedInput {
                    url: s.to_string(),
                    message: "query is not valid percent-encoded UTF-8".to_string(),
                }
            })?,
            fragment: url.fragment().unwrap_or_default().to_string(),
        })
    }

    /// Whether the URL carries a non-empty authority component.
    pub fn has_authority(&self) -> bool {
        self.authority.as_deref().is_some_and(|a| !a.is_empty())
    }
}

impl FromStr for ParsedUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ParsedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme)?;
        match &self.authority {
            Some(authority) => write!(f, "//{}", authority)?,
            // Keep a path that starts with `//` from being read as an authority
            None if self.path.starts_with("//") => f.write_str("//")?,
            None => {}
        }
        f.write_str(&percent_encode_path(&self.path))?;
        if !self.query.is_empty() {
            let query: Vec<String> = self
                .query
                .iter()
                .map(|(name, value)| {
                    format!("{}={}", percent_encode_query(name), percent_encode_query(value))
                })
                .collect();
            write!(f, "?{}", query.join("&"))?;
        }
        if !self.fragment.is_empty() {
            write!(f, "#{}", self.fragment)?;
        }
        Ok(())
    }
}

fn authority_of(url: &Url) -> Option<String> {
    if !url.has_authority() {
        return None;
    }
    let mut authority = String::new();
    if !url.username().is_empty() || url.password().is_some() {
        authority.push_str(url.username());
        if let Some(password) = url.password() {
            authority.push(':');
            authority.push_str(password);
        }
        authority.push('@');
    }
    if let Some(host) = url.host_str() {
        authority.push_str(host);
    }
    if let Some(port) = url.port() {
        authority.push_str(&format!(":{}", port));
    }
    Some(authority)
}

fn is_path_safe(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"/-._~!$&'()*+,;=:@".contains(&b)
}

/// Percent-encode every byte of `path` outside the safe path set.
pub fn percent_encode_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for &b in path.as_bytes() {
        if is_path_safe(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

fn is_query_safe(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"/-._~!$'()*,;:@?".contains(&b)
}

/// Percent-encode a query name or value; `&`, `=`, `+`, `#` and `%` are
/// always escaped.
pub fn percent_encode_query(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        if is_query_safe(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

/// Split a raw query into percent-decoded name/value pairs.
///
/// A pair without `=` has an empty value. Later duplicates win.
fn decode_query(query: &str) -> Option<BTreeMap<String, String>> {
    let mut pairs = BTreeMap::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        pairs.insert(percent_decode(name)?, percent_decode(value)?);
    }
    Some(pairs)
}

/// Decode `%XX` escapes. Returns `None` if the result is not UTF-8.
///
/// Malformed escapes are kept literally.
pub fn percent_decode(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .filter(|hex| hex.bytes().all(|c| c.is_ascii_hexdigit()))
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(b) = decoded {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).ok()
}
