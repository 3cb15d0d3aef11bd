//! SHA-256 content hashes.

use std::fmt;
use std::str::FromStr;

use base64::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

const PREFIX: &str = "sha256:";
const SRI_PREFIX: &str = "sha256-";

/// A SHA-256 digest. Renders as `sha256:<base16>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash a byte string.
    pub fn sha256(data: &[u8]) -> Self {
        ContentHash(Sha256::digest(data).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex digest without the algorithm prefix.
    pub fn to_base16(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Base64 digest in SRI form, e.g. `sha256-ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0=`.
    pub fn to_sri(&self) -> String {
        format!("{}{}", SRI_PREFIX, BASE64_STANDARD.encode(self.0))
    }

    /// Parse a SHA-256 hash.
    ///
    /// Accepts `sha256:<hex>`, `sha256:<base64>`, the SRI form
    /// `sha256-<base64>` and a bare 64-character hex digest.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || Error::MalformedInput {
            url: s.to_string(),
            message: "expected a SHA-256 hash in base16 or base64".to_string(),
        };

        if let Some(b64) = s.strip_prefix(SRI_PREFIX) {
            return Self::from_base64(b64).ok_or_else(invalid);
        }

        let digest = s.strip_prefix(PREFIX).unwrap_or(s);
        if digest.len() != 64 {
            if digest.len() != s.len() {
                return Self::from_base64(digest).ok_or_else(invalid);
            }
            return Err(invalid());
        }
        if !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let mut bytes = [0u8; 32];
        for (i, out) in bytes.iter_mut().enumerate() {
            *out = u8::from_str_radix(&digest[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        Ok(ContentHash(bytes))
    }

    fn from_base64(s: &str) -> Option<Self> {
        let bytes = BASE64_STANDARD.decode(s).ok()?;
        <[u8; 32]>::try_from(bytes.as_slice()).ok().map(ContentHash)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", PREFIX, self.to_base16())
    }
}

impl FromStr for ContentHash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ContentHash> for String {
    fn from(value: ContentHash) -> Self {
        value.to_string()
    }
}
