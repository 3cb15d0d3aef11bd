//! Shared test utilities for integration and E2E tests.
//!
//! This module provides a fixture with a source tree, a store root and a
//! cache root in one temporary directory.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! let fixture = TestFixture::new().with_file("README", "hello");
//! fixture.command().arg("fetch").arg(fixture.source_url()).assert().success();
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};

/// Re-export commonly used test dependencies for convenience.
#[allow(unused_imports)]
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    pub use predicates::prelude::*;

    pub use super::TestFixture;
}

/// A temporary directory holding `src/`, `store/` and `cache/`.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    /// Create a fixture with an empty source directory.
    pub fn new() -> Self {
        let temp_dir = assert_fs::TempDir::new().expect("Failed to create temp directory");
        temp_dir
            .child("src")
            .create_dir_all()
            .expect("Failed to create source directory");
        Self { temp_dir }
    }

    /// Add a file below the source directory.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child("src")
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Canonical path of the source directory.
    pub fn source_path(&self) -> PathBuf {
        std::fs::canonicalize(self.temp_dir.path().join("src"))
            .expect("Failed to canonicalize source directory")
    }

    /// `path:` URL of the source directory.
    pub fn source_url(&self) -> String {
        format!("path:{}", self.source_path().display())
    }

    pub fn store_root(&self) -> PathBuf {
        self.temp_dir.path().join("store")
    }

    pub fn cache_root(&self) -> PathBuf {
        self.temp_dir.path().join("cache")
    }

    /// Create a command whose store and cache live in this fixture.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("path-fetcher");
        cmd.current_dir(self.path())
            .env("PATH_FETCHER_STORE", self.store_root())
            .env("PATH_FETCHER_CACHE", self.cache_root())
            .env_remove("PATH_FETCHER_CONFIG");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
