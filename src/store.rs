//! # Content-Addressed Store
//!
//! The store is where fetched trees end up. Objects live directly under the
//! store directory and are named `<hash>-<name>`, where the hash is derived
//! from the archive of their content, so two identical trees always map to
//! the same location.
//!
//! ## Design
//!
//! Fetching code only talks to the store through the [`Store`] trait, which
//! covers exactly what input schemes need:
//!
//! - recognising paths that point into the store ([`Store::maybe_parse_store_path`],
//!   [`Store::to_store_path`]),
//! - checking that an object is present and registered ([`Store::is_valid_path`],
//!   [`Store::query_path_info`]),
//! - pinning an object against garbage collection ([`Store::add_temp_root`]),
//! - adding a serialized tree ([`Store::add_to_store_from_dump`]).
//!
//! [`LocalStore`] is a small on-disk implementation. Its layout below the
//! root directory is:
//!
//! ```text
//! store/<hash>-<name>     materialised objects
//! info/<hash>.json        registration records (PathInfo)
//! temproots/<pid>         temporary roots held by a process
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::archive;
use crate::error::{Error, Result};
use crate::hash::ContentHash;
use crate::path::canon_path;

/// Length of the hash part of a store path base name.
pub const HASH_PART_LEN: usize = 32;

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9+\-_?=][A-Za-z0-9+\-._?=]*$").expect("valid regex"))
}

/// Check that `name` can be used as the name part of a store path.
pub fn check_name(name: &str) -> Result<()> {
    if name.len() > 211 {
        return Err(Error::InvalidStorePath {
            path: name.to_string(),
            message: "name is longer than 211 characters".to_string(),
        });
    }
    if !name_regex().is_match(name) {
        return Err(Error::InvalidStorePath {
            path: name.to_string(),
            message: "name contains illegal characters or starts with '.'".to_string(),
        });
    }
    Ok(())
}

/// The base name of a store object, e.g. `0a1b…-source`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StorePath {
    hash_part: String,
    name: String,
}

impl StorePath {
    /// Parse a base name of the form `<hash>-<name>`.
    pub fn from_base_name(base_name: &str) -> Result<Self> {
        let invalid = |message: &str| Error::InvalidStorePath {
            path: base_name.to_string(),
            message: message.to_string(),
        };
        if base_name.len() < HASH_PART_LEN + 2 || !base_name.is_char_boundary(HASH_PART_LEN) {
            return Err(invalid("too short"));
        }
        let (hash_part, rest) = base_name.split_at(HASH_PART_LEN);
        if !hash_part
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(invalid("hash part is not lowercase base16"));
        }
        let name = rest
            .strip_prefix('-')
            .ok_or_else(|| invalid("missing '-' after hash part"))?;
        check_name(name)?;
        Ok(Self {
            hash_part: hash_part.to_string(),
            name: name.to_string(),
        })
    }

    /// The store path of an object with the given archive hash and name.
    pub fn from_nar_hash(nar_hash: &ContentHash, name: &str) -> Result<Self> {
        check_name(name)?;
        let fingerprint = format!("source:{}:{}", nar_hash, name);
        let digest = ContentHash::sha256(fingerprint.as_bytes()).to_base16();
        Ok(Self {
            hash_part: digest[..HASH_PART_LEN].to_string(),
            name: name.to_string(),
        })
    }

    pub fn hash_part(&self) -> &str {
        &self.hash_part
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.hash_part, self.name)
    }
}

/// Registration record of a valid store object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathInfo {
    /// Base name of the object.
    pub path: String,
    pub nar_hash: ContentHash,
    pub nar_size: u64,
    pub registration_time: u64,
}

/// Interface to a content-addressed store.
pub trait Store: Send + Sync {
    /// Absolute, canonical directory holding the store objects.
    fn store_dir(&self) -> &Path;

    /// Whether `path` names a store object that is present and registered.
    fn is_valid_path(&self, path: &StorePath) -> Result<bool>;

    /// Registration record of a valid object.
    fn query_path_info(&self, path: &StorePath) -> Result<PathInfo>;

    /// Keep `path` from being garbage-collected for the rest of this process.
    fn add_temp_root(&self, path: &StorePath) -> Result<()>;

    /// Register a serialized tree (see [`crate::archive`]) under `name`.
    ///
    /// Adding content that is already present must return the existing
    /// path without error.
    fn add_to_store_from_dump(&self, dump: &mut dyn Read, name: &str) -> Result<StorePath>;

    /// Full filesystem path of a store object.
    fn print_store_path(&self, path: &StorePath) -> String {
        format!("{}/{}", self.store_dir().display(), path)
    }

    /// Where the object's content can be read on disk.
    fn to_real_path(&self, path: &StorePath) -> PathBuf {
        self.store_dir().join(path.to_string())
    }

    /// Parse an absolute path that must name a store object exactly.
    fn parse_store_path(&self, path: &str) -> Result<StorePath> {
        let (store_path, sub_path) = self.to_store_path(path)?;
        if !sub_path.is_empty() {
            return Err(Error::InvalidStorePath {
                path: path.to_string(),
                message: "path points inside a store object".to_string(),
            });
        }
        Ok(store_path)
    }

    fn maybe_parse_store_path(&self, path: &str) -> Option<StorePath> {
        self.parse_store_path(path).ok()
    }

    /// Split a path inside the store into the containing object and the
    /// remainder, e.g. `("<hash>-source", "/sub/dir")`.
    fn to_store_path(&self, path: &str) -> Result<(StorePath, String)> {
        let path = canon_path(path);
        let store_dir = self.store_dir().to_string_lossy();
        let rest = path
            .strip_prefix(store_dir.as_ref())
            .and_then(|r| r.strip_prefix('/'))
            .filter(|r| !r.is_empty())
            .ok_or_else(|| Error::InvalidStorePath {
                path: path.clone(),
                message: format!("path is not in the store '{}'", store_dir),
            })?;
        let (base_name, sub_path) = match rest.find('/') {
            Some(idx) => rest.split_at(idx),
            None => (rest, ""),
        };
        Ok((StorePath::from_base_name(base_name)?, sub_path.to_string()))
    }
}

/// A store kept in a local directory.
#[derive(Debug)]
pub struct LocalStore {
    root: PathBuf,
    store_dir: PathBuf,
    temp_roots: Mutex<BTreeSet<StorePath>>,
    add_lock: Mutex<()>,
}

impl LocalStore {
    /// Open the store rooted at `root`, creating its directories if needed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        for dir in ["store", "info", "temproots"] {
            let dir = root.join(dir);
            fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        }
        let root = fs::canonicalize(root).map_err(|e| Error::io(root, e))?;
        if root.to_str().is_none() {
            return Err(Error::Store {
                message: format!("store root {} is not valid UTF-8", root.display()),
            });
        }
        debug!("opened store at {}", root.display());
        Ok(Self {
            store_dir: root.join("store"),
            root,
            temp_roots: Mutex::new(BTreeSet::new()),
            add_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn info_path(&self, path: &StorePath) -> PathBuf {
        self.root
            .join("info")
            .join(format!("{}.json", path.hash_part()))
    }

    /// Temporary roots registered by this process, in sorted order.
    pub fn temp_roots(&self) -> Result<Vec<StorePath>> {
        let roots = self.temp_roots.lock().map_err(|_| Error::LockPoisoned {
            context: "store temp roots".to_string(),
        })?;
        Ok(roots.iter().cloned().collect())
    }

    fn write_info(&self, info: &PathInfo, path: &StorePath) -> Result<()> {
        let target = self.info_path(path);
        let tmp = target.with_extension(format!("json.tmp-{}", std::process::id()));
        let json = serde_json::to_vec_pretty(info)?;
        fs::write(&tmp, json).map_err(|e| Error::io(&tmp, e))?;
        fs::rename(&tmp, &target).map_err(|e| Error::io(&target, e))
    }
}

fn remove_any(path: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::io(path, e)),
    };
    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| Error::io(path, e))
}

impl Store for LocalStore {
    fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    fn is_valid_path(&self, path: &StorePath) -> Result<bool> {
        Ok(self.info_path(path).is_file() && fs::symlink_metadata(self.to_real_path(path)).is_ok())
    }

    fn query_path_info(&self, path: &StorePath) -> Result<PathInfo> {
        let info_path = self.info_path(path);
        let data = match fs::read(&info_path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::InvalidStorePath {
                    path: self.print_store_path(path),
                    message: "path is not valid".to_string(),
                })
            }
            Err(e) => return Err(Error::io(&info_path, e)),
        };
        let info: PathInfo = serde_json::from_slice(&data)?;
        if info.path != path.to_string() {
            return Err(Error::Store {
                message: format!(
                    "registration record {} belongs to '{}'",
                    info_path.display(),
                    info.path
                ),
            });
        }
        Ok(info)
    }

    fn add_temp_root(&self, path: &StorePath) -> Result<()> {
        let mut roots = self.temp_roots.lock().map_err(|_| Error::LockPoisoned {
            context: "store temp roots".to_string(),
        })?;
        if !roots.insert(path.clone()) {
            return Ok(());
        }
        let file = self
            .root
            .join("temproots")
            .join(std::process::id().to_string());
        let mut out = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file)
            .map_err(|e| Error::io(&file, e))?;
        writeln!(out, "{}", self.print_store_path(path)).map_err(|e| Error::io(&file, e))?;
        debug!("added temporary root {}", path);
        Ok(())
    }

    fn add_to_store_from_dump(&self, dump: &mut dyn Read, name: &str) -> Result<StorePath> {
        let mut bytes = Vec::new();
        dump.read_to_end(&mut bytes).map_err(|e| Error::Store {
            message: format!("reading archive for '{}': {}", name, e),
        })?;
        let nar_hash = ContentHash::sha256(&bytes);
        let store_path = StorePath::from_nar_hash(&nar_hash, name)?;

        let _guard = self.add_lock.lock().map_err(|_| Error::LockPoisoned {
            context: "store add lock".to_string(),
        })?;

        self.add_temp_root(&store_path)?;
        if self.is_valid_path(&store_path)? {
            debug!("{} is already valid", store_path);
            return Ok(store_path);
        }

        let scratch = tempfile::Builder::new()
            .prefix(".add-")
            .tempdir_in(&self.root)
            .map_err(|e| Error::io(&self.root, e))?;
        let staged = scratch.path().join("out");
        archive::restore_path(&staged, &mut bytes.as_slice())?;

        let real_path = self.to_real_path(&store_path);
        remove_any(&real_path)?;
        fs::rename(&staged, &real_path).map_err(|e| Error::io(&real_path, e))?;

        let registration_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let info = PathInfo {
            path: store_path.to_string(),
            nar_hash,
            nar_size: bytes.len() as u64,
            registration_time,
        };
        self.write_info(&info, &store_path)?;

        info!("added {} to the store", self.print_store_path(&store_path));
        Ok(store_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, LocalStore) {
        let temp = TempDir::new().unwrap();
        let store = LocalStore::open(temp.path().join("root")).unwrap();
        (temp, store)
    }

    fn dump_dir(dir: &Path) -> Vec<u8> {
        archive::dump_path(dir, &archive::default_path_filter).unwrap()
    }

    #[test]
    fn test_store_path_round_trip() {
        let hash = ContentHash::sha256(b"content");
        let sp = StorePath::from_nar_hash(&hash, "source").unwrap();
        assert_eq!(sp.hash_part().len(), HASH_PART_LEN);
        assert_eq!(sp.name(), "source");
        assert_eq!(StorePath::from_base_name(&sp.to_string()).unwrap(), sp);
    }

    #[test]
    fn test_store_path_rejects_bad_names() {
        let hash = "0".repeat(HASH_PART_LEN);
        assert!(StorePath::from_base_name(&format!("{}-.hidden", hash)).is_err());
        assert!(StorePath::from_base_name(&format!("{}-a b", hash)).is_err());
        assert!(StorePath::from_base_name(&format!("{}source", hash)).is_err());
        assert!(StorePath::from_base_name("short-source").is_err());
        assert!(StorePath::from_base_name(&format!("{}-source", "Z".repeat(HASH_PART_LEN))).is_err());
        assert!(StorePath::from_base_name(&format!("{}-source", hash)).is_ok());
    }

    #[test]
    fn test_to_store_path_splits_sub_path() {
        let (_temp, store) = open_store();
        let sp = StorePath::from_nar_hash(&ContentHash::sha256(b"x"), "source").unwrap();
        let full = format!("{}/sub/dir", store.print_store_path(&sp));

        let (parsed, sub) = store.to_store_path(&full).unwrap();
        assert_eq!(parsed, sp);
        assert_eq!(sub, "/sub/dir");

        assert!(store.parse_store_path(&full).is_err());
        assert_eq!(
            store.maybe_parse_store_path(&store.print_store_path(&sp)),
            Some(sp)
        );
        assert!(store.to_store_path("/somewhere/else").is_err());
        assert!(store
            .to_store_path(&store.store_dir().to_string_lossy())
            .is_err());
    }

    #[test]
    fn test_add_to_store_registers_object() {
        let (temp, store) = open_store();
        let src = temp.path().join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("a.txt"), "alpha").unwrap();

        let dump = dump_dir(&src);
        let sp = store
            .add_to_store_from_dump(&mut dump.as_slice(), "source")
            .unwrap();

        assert!(store.is_valid_path(&sp).unwrap());
        let info = store.query_path_info(&sp).unwrap();
        assert_eq!(info.nar_hash, ContentHash::sha256(&dump));
        assert_eq!(info.nar_size, dump.len() as u64);
        assert_eq!(
            fs::read_to_string(store.to_real_path(&sp).join("a.txt")).unwrap(),
            "alpha"
        );
        assert!(store.temp_roots().unwrap().contains(&sp));
    }

    #[test]
    fn test_add_to_store_is_idempotent() {
        let (temp, store) = open_store();
        let src = temp.path().join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("a.txt"), "alpha").unwrap();
        let dump = dump_dir(&src);

        let first = store
            .add_to_store_from_dump(&mut dump.as_slice(), "source")
            .unwrap();
        let second = store
            .add_to_store_from_dump(&mut dump.as_slice(), "source")
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_path_is_reported() {
        let (_temp, store) = open_store();
        let sp = StorePath::from_nar_hash(&ContentHash::sha256(b"missing"), "source").unwrap();
        assert!(!store.is_valid_path(&sp).unwrap());
        assert!(matches!(
            store.query_path_info(&sp),
            Err(Error::InvalidStorePath { .. })
        ));
    }

    #[test]
    fn test_temp_roots_are_recorded_once() {
        let (_temp, store) = open_store();
        let sp = StorePath::from_nar_hash(&ContentHash::sha256(b"pinned"), "source").unwrap();
        store.add_temp_root(&sp).unwrap();
        store.add_temp_root(&sp).unwrap();

        let file = store
            .root()
            .join("temproots")
            .join(std::process::id().to_string());
        let contents = fs::read_to_string(file).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert_eq!(store.temp_roots().unwrap(), vec![sp]);
    }
}
