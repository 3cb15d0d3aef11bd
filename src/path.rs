//! Path manipulation utilities for path-fetcher
//!
//! All canonicalisation here is lexical: `.` and `..` components and
//! repeated separators are removed without consulting the filesystem, so
//! symlinks are never resolved.

use std::fmt;

/// Whether `path` is an absolute filesystem path.
pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}

/// Lexically canonicalise an absolute path.
///
/// `..` at the root stays at the root. The result never ends in `/` unless
/// it is the root itself.
pub fn canon_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

/// A canonical path relative to the root of some tree, e.g. inside a
/// source accessor. Always starts with `/`; can never escape the root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonPath(String);

impl CanonPath {
    /// The root path `/`.
    pub fn root() -> Self {
        CanonPath("/".to_string())
    }

    /// Canonicalise `path`, treating it as relative to the root whether or
    /// not it starts with `/`.
    pub fn new(path: &str) -> Self {
        CanonPath(canon_path(path))
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// The absolute form, e.g. `/src/main.rs`.
    pub fn abs(&self) -> &str {
        &self.0
    }

    /// The relative form, e.g. `src/main.rs` (empty for the root).
    pub fn rel(&self) -> &str {
        &self.0[1..]
    }

    /// Append a single path component or a relative path.
    pub fn join(&self, rel: &str) -> Self {
        CanonPath::new(&format!("{}/{}", self.0, rel))
    }

    /// The last component, or `None` for the root.
    pub fn base_name(&self) -> Option<&str> {
        if self.is_root() {
            None
        } else {
            self.0.rsplit('/').next()
        }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let idx = self.0.rfind('/').unwrap_or(0);
        Some(CanonPath::new(&self.0[..idx]))
    }
}

impl fmt::Display for CanonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
