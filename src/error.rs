//! # Error Handling
//!
//! This module defines the centralized error type for `path-fetcher`. It uses
//! the `thiserror` library to create a single `Error` enum covering every
//! failure mode of input parsing, resolution and the store/cache
//! collaborators.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. Each variant carries enough context (the
//!   offending URL, attribute name or filesystem path) to produce a useful
//!   message without further wrapping.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! Fingerprinting is the one operation that never produces an `Error`: an
//! input that cannot be safely fingerprinted simply yields `None`.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for path-fetcher operations
#[derive(Error, Debug)]
pub enum Error {
    /// A URL had the wrong shape (authority present, unparseable integer).
    #[error("Malformed input '{url}': {message}")]
    MalformedInput { url: String, message: String },

    /// A query parameter or attribute that the scheme does not understand.
    #[error("Unsupported attribute '{name}' in {context}")]
    UnsupportedAttribute { context: String, name: String },

    /// A required attribute was absent.
    #[error("Missing required attribute '{name}'")]
    MissingAttribute { name: String },

    /// An attribute was present but carried the wrong kind of value.
    #[error("Attribute '{name}' should be a {expected}")]
    AttributeType {
        name: String,
        expected: &'static str,
    },

    /// Resolution was attempted on an input whose path has not been anchored.
    #[error("Cannot fetch input '{input}' because it uses a relative path")]
    RelativePathNotSupported { input: String },

    /// A filesystem operation failed on a specific path.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A string could not be interpreted as a store path.
    #[error("Invalid store path '{path}': {message}")]
    InvalidStorePath { path: String, message: String },

    /// A store operation failed.
    #[error("Store error: {message}")]
    Store { message: String },

    /// A fetch cache operation failed.
    #[error("Cache operation error: {message}")]
    Cache { message: String },

    /// A directory archive could not be written or read back.
    #[error("Archive error: {message}")]
    Archive { message: String },

    /// No registered scheme claimed the URL or `type` attribute.
    #[error("Input '{url}' is not supported by any input scheme")]
    UnsupportedScheme { url: String },

    /// The scheme exists but is gated behind a feature that is not enabled.
    #[error("Input scheme '{scheme}' requires experimental feature '{feature}' to be enabled")]
    FeatureDisabled { feature: String, scheme: String },

    /// A locked input resolved to content with a different hash.
    #[error("NAR hash mismatch in input '{input}': expected '{expected}', got '{actual}'")]
    NarHashMismatch {
        input: String,
        expected: String,
        actual: String,
    },

    /// The scheme does not implement the requested operation.
    #[error("Input scheme '{scheme}' does not support {operation}")]
    NotSupported { scheme: String, operation: String },

    /// An error indicating that a mutex or other lock has been poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },

    /// The settings file could not be loaded.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Attach a path to an `std::io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_malformed_input() {
        let error = Error::MalformedInput {
            url: "path://host/tmp".to_string(),
            message: "should not have an authority ('host')".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("Malformed input"));
        assert!(display.contains("path://host/tmp"));
        assert!(display.contains("'host'"));
    }

    #[test]
    fn test_error_display_unsupported_attribute() {
        let error = Error::UnsupportedAttribute {
            context: "path URL 'path:/x?foo=1'".to_string(),
            name: "foo".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("Unsupported attribute 'foo'"));
    }

    #[test]
    fn test_error_display_relative_path() {
        let error = Error::RelativePathNotSupported {
            input: "path:relative/dir".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("relative path"));
        assert!(display.contains("path:relative/dir"));
    }

    #[test]
    fn test_error_io_carries_path() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = Error::io("/tmp/secret", io_error);
        let display = format!("{}", error);
        assert!(display.contains("/tmp/secret"));
        assert!(display.contains("denied"));
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_error_from_url_parse_error() {
        let error: Error = url::Url::parse("no scheme").unwrap_err().into();
        assert!(format!("{}", error).contains("URL parsing error"));
    }

    #[test]
    fn test_error_from_yaml_error() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: [unclosed").unwrap_err();
        let error: Error = yaml_error.into();
        assert!(format!("{}", error).contains("YAML parsing error"));
    }

    #[test]
    fn test_error_feature_disabled() {
        let error = Error::FeatureDisabled {
            feature: "flakes".to_string(),
            scheme: "path".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("'flakes'"));
        assert!(display.contains("'path'"));
    }
}
