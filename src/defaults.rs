//! Default values for path-fetcher configuration.
//!
//! This module provides centralized default locations used by the settings
//! and the CLI, ensuring consistency and avoiding duplication.

use std::path::PathBuf;

/// Returns the default fetch cache directory.
///
/// Uses the platform-appropriate cache directory:
/// - Linux: `~/.cache/path-fetcher` (XDG Base Directory)
/// - macOS: `~/Library/Caches/path-fetcher`
/// - Windows: `{FOLDERID_LocalAppData}\path-fetcher`
///
/// Falls back to `.path-fetcher-cache` in the current directory if the
/// platform cache directory cannot be determined.
///
/// This can be overridden by the `--cache-root` CLI flag or the
/// `PATH_FETCHER_CACHE` environment variable.
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".path-fetcher-cache"))
        .join("path-fetcher")
}

/// Returns the default store root.
///
/// Lives under the platform data directory (`~/.local/share/path-fetcher/store`
/// on Linux), falling back to `.path-fetcher/store` in the current directory.
///
/// This can be overridden by the `--store-root` CLI flag or the
/// `PATH_FETCHER_STORE` environment variable.
pub fn default_store_root() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("path-fetcher"))
        .unwrap_or_else(|| PathBuf::from(".path-fetcher"))
        .join("store")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cache_root_returns_path() {
        let cache_root = default_cache_root();
        assert!(cache_root.ends_with("path-fetcher"));
    }

    #[test]
    fn test_default_store_root_returns_path() {
        let store_root = default_store_root();
        assert!(store_root.ends_with("store"));
        assert!(
            store_root.is_absolute() || store_root.starts_with(".path-fetcher"),
            "Expected absolute path or fallback, got: {:?}",
            store_root
        );
    }
}
