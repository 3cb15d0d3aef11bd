//! Read-only views of fetched trees.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::path::CanonPath;
use crate::store::{Store, StorePath};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Regular,
    Directory,
    Symlink,
    /// Sockets, devices and the like.
    Misc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub file_type: FileType,
    /// Only set for regular files.
    pub file_size: Option<u64>,
    pub is_executable: bool,
}

/// Directory listing: entry name to type (if cheaply known).
pub type DirEntries = BTreeMap<String, Option<FileType>>;

/// A read-only, hierarchical view of some content.
pub trait SourceAccessor: Send + Sync + std::fmt::Debug {
    fn read_file(&self, path: &CanonPath) -> Result<Vec<u8>>;

    /// Stat without following a final symlink; `None` if nothing is there.
    fn maybe_lstat(&self, path: &CanonPath) -> Result<Option<Stat>>;

    fn read_directory(&self, path: &CanonPath) -> Result<DirEntries>;

    fn read_link(&self, path: &CanonPath) -> Result<String>;

    /// Human-readable rendering of `path` for messages.
    fn show_path(&self, path: &CanonPath) -> String;

    /// The store object backing this accessor, if there is one.
    fn store_path(&self) -> Option<&StorePath> {
        None
    }

    fn path_exists(&self, path: &CanonPath) -> Result<bool> {
        Ok(self.maybe_lstat(path)?.is_some())
    }

    fn lstat(&self, path: &CanonPath) -> Result<Stat> {
        self.maybe_lstat(path)?.ok_or_else(|| Error::io(
            self.show_path(path),
            std::io::Error::new(std::io::ErrorKind::NotFound, "path does not exist"),
        ))
    }
}

/// Accessor over a single store object.
pub struct StorePathAccessor {
    store: Arc<dyn Store>,
    store_path: StorePath,
    root: PathBuf,
}

impl StorePathAccessor {
    pub fn new(store: Arc<dyn Store>, store_path: StorePath) -> Self {
        let root = store.to_real_path(&store_path);
        Self {
            store,
            store_path,
            root,
        }
    }

    fn real_path(&self, path: &CanonPath) -> PathBuf {
        if path.is_root() {
            self.root.clone()
        } else {
            self.root.join(path.rel())
        }
    }

    /// Resolve `path` to a host path, refusing to traverse symlinks.
    ///
    /// Every component is checked with `symlink_metadata`. The final one may
    /// be a symlink only when `allow_final_link` is set, so that `lstat` and
    /// `read_link` can still see links without following them.
    fn checked_path(&self, path: &CanonPath, allow_final_link: bool) -> Result<PathBuf> {
        let components: Vec<&str> = path.rel().split('/').filter(|c| !c.is_empty()).collect();
        let mut current = self.root.clone();
        for (i, component) in components.iter().enumerate() {
            current.push(component);
            let is_last = i + 1 == components.len();
            match fs::symlink_metadata(&current) {
                Ok(m) if m.file_type().is_symlink() && !(is_last && allow_final_link) => {
                    return Err(Error::io(
                        &current,
                        std::io::Error::new(
                            std::io::ErrorKind::InvalidInput,
                            "refusing to follow symlink",
                        ),
                    ));
                }
                Ok(_) => {}
                // Let the caller report a missing path the usual way
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Ok(self.real_path(path));
                }
                Err(e) => return Err(Error::io(&current, e)),
            }
        }
        Ok(current)
    }
}

impl std::fmt::Debug for StorePathAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorePathAccessor")
            .field("store_path", &self.store_path)
            .field("root", &self.root)
            .finish()
    }
}

#[cfg(unix)]
fn executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.is_file() && metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn executable(_metadata: &fs::Metadata) -> bool {
    false
}

fn file_type_of(ft: fs::FileType) -> FileType {
    if ft.is_file() {
        FileType::Regular
    } else if ft.is_dir() {
        FileType::Directory
    } else if ft.is_symlink() {
        FileType::Symlink
    } else {
        FileType::Misc
    }
}

impl SourceAccessor for StorePathAccessor {
    fn store_path(&self) -> Option<&StorePath> {
        Some(&self.store_path)
    }

    fn read_file(&self, path: &CanonPath) -> Result<Vec<u8>> {
        let real = self.checked_path(path, false)?;
        fs::read(&real).map_err(|e| Error::io(real, e))
    }

    fn maybe_lstat(&self, path: &CanonPath) -> Result<Option<Stat>> {
        let real = self.checked_path(path, true)?;
        let metadata = match fs::symlink_metadata(&real) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(real, e)),
        };
        let file_type = file_type_of(metadata.file_type());
        Ok(Some(Stat {
            file_type,
            file_size: (file_type == FileType::Regular).then(|| metadata.len()),
            is_executable: executable(&metadata),
        }))
    }

    fn read_directory(&self, path: &CanonPath) -> Result<DirEntries> {
        let real = self.checked_path(path, false)?;
        let mut entries = DirEntries::new();
        for entry in fs::read_dir(&real).map_err(|e| Error::io(&real, e))? {
            let entry = entry.map_err(|e| Error::io(&real, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.insert(name, entry.file_type().ok().map(file_type_of));
        }
        Ok(entries)
    }

    fn read_link(&self, path: &CanonPath) -> Result<String> {
        let real = self.checked_path(path, true)?;
        let target = fs::read_link(&real).map_err(|e| Error::io(&real, e))?;
        Ok(target.to_string_lossy().into_owned())
    }

    fn show_path(&self, path: &CanonPath) -> String {
        let base = self.store.print_store_path(&self.store_path);
        if path.is_root() {
            base
        } else {
            format!("{}{}", base, path.abs())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive;
    use crate::store::LocalStore;
    use tempfile::TempDir;

    fn accessor_for(files: &[(&str, &str)]) -> (TempDir, StorePathAccessor) {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        for (name, contents) in files {
            let path = src.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }
        let store: Arc<dyn Store> = Arc::new(LocalStore::open(temp.path().join("store")).unwrap());
        let dump = archive::dump_path(&src, &archive::default_path_filter).unwrap();
        let sp = store
            .add_to_store_from_dump(&mut dump.as_slice(), "source")
            .unwrap();
        (temp, StorePathAccessor::new(store, sp))
    }

    #[test]
    fn test_read_file_and_directory() {
        let (_temp, accessor) = accessor_for(&[("a.txt", "alpha"), ("dir/b.txt", "beta")]);

        assert_eq!(accessor.read_file(&CanonPath::new("a.txt")).unwrap(), b"alpha");
        assert_eq!(accessor.read_file(&CanonPath::new("/dir/b.txt")).unwrap(), b"beta");

        let root = accessor.read_directory(&CanonPath::root()).unwrap();
        assert_eq!(root.keys().collect::<Vec<_>>(), vec!["a.txt", "dir"]);
        assert_eq!(root["dir"], Some(FileType::Directory));
    }

    #[test]
    fn test_lstat() {
        let (_temp, accessor) = accessor_for(&[("a.txt", "alpha")]);

        let stat = accessor.lstat(&CanonPath::new("a.txt")).unwrap();
        assert_eq!(stat.file_type, FileType::Regular);
        assert_eq!(stat.file_size, Some(5));
        assert!(!stat.is_executable);

        assert!(accessor.path_exists(&CanonPath::root()).unwrap());
        assert!(!accessor.path_exists(&CanonPath::new("missing")).unwrap());
        assert!(accessor.lstat(&CanonPath::new("missing")).is_err());
    }

    #[test]
    fn test_dot_dot_stays_inside_root() {
        let (_temp, accessor) = accessor_for(&[("a.txt", "alpha")]);
        assert_eq!(
            accessor.read_file(&CanonPath::new("../../a.txt")).unwrap(),
            b"alpha"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_followed() {
        let temp = TempDir::new().unwrap();
        let secret = temp.path().join("secret.txt");
        fs::write(&secret, "outside").unwrap();
        let outside_dir = temp.path().join("outside");
        fs::create_dir(&outside_dir).unwrap();
        fs::write(outside_dir.join("b.txt"), "beta").unwrap();

        let src = temp.path().join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("a.txt"), "alpha").unwrap();
        std::os::unix::fs::symlink(&secret, src.join("leak")).unwrap();
        std::os::unix::fs::symlink(&outside_dir, src.join("dir")).unwrap();

        let store: Arc<dyn Store> = Arc::new(LocalStore::open(temp.path().join("store")).unwrap());
        let dump = archive::dump_path(&src, &archive::default_path_filter).unwrap();
        let sp = store
            .add_to_store_from_dump(&mut dump.as_slice(), "source")
            .unwrap();
        let accessor = StorePathAccessor::new(store, sp);

        assert!(accessor.read_file(&CanonPath::new("leak")).is_err());
        assert!(accessor.read_file(&CanonPath::new("dir/b.txt")).is_err());
        assert!(accessor.read_directory(&CanonPath::new("dir")).is_err());
        assert!(accessor.lstat(&CanonPath::new("dir/b.txt")).is_err());

        // The links themselves are still visible
        let stat = accessor.lstat(&CanonPath::new("leak")).unwrap();
        assert_eq!(stat.file_type, FileType::Symlink);
        assert_eq!(
            accessor.read_link(&CanonPath::new("leak")).unwrap(),
            secret.to_string_lossy()
        );
        assert_eq!(accessor.read_file(&CanonPath::new("a.txt")).unwrap(), b"alpha");
    }

    #[test]
    fn test_show_path() {
        let (_temp, accessor) = accessor_for(&[("a.txt", "alpha")]);
        let shown = accessor.show_path(&CanonPath::new("a.txt"));
        let sp = accessor.store_path().unwrap();
        assert!(shown.ends_with(&format!("{}/a.txt", sp)));
    }
}
