//! # Directory Archives
//!
//! A deterministic serialization of a filesystem tree, used both for hashing
//! content into the store and for transporting it there. Every token is a
//! length-prefixed string (little-endian `u64` length, then the bytes, then
//! zero padding up to a multiple of eight):
//!
//! ```text
//! archive   := "dirarchive-1" node
//! node      := "(" "type" ( regular | directory | symlink ) ")"
//! regular   := "regular" [ "executable" "" ] "contents" <bytes>
//! symlink   := "symlink" "target" <target>
//! directory := "directory" { "entry" "(" "name" <name> "node" node ")" }
//! ```
//!
//! Directory entries appear in byte-wise name order, so the same tree
//! always produces the same bytes. Timestamps, ownership and permission
//! bits other than the executable bit are not recorded.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::time::UNIX_EPOCH;

use walkdir::WalkDir;

use crate::error::{Error, Result};

const MAGIC: &str = "dirarchive-1";

/// Decides whether a path below the root is included in an archive.
pub type PathFilter = dyn Fn(&Path) -> bool;

/// Accepts every path.
pub fn default_path_filter(_path: &Path) -> bool {
    true
}

fn padding(len: u64) -> usize {
    ((8 - (len % 8)) % 8) as usize
}

fn write_bytes(sink: &mut dyn Write, bytes: &[u8]) -> std::io::Result<()> {
    sink.write_all(&(bytes.len() as u64).to_le_bytes())?;
    sink.write_all(bytes)?;
    sink.write_all(&[0u8; 8][..padding(bytes.len() as u64)])
}

fn write_str(sink: &mut dyn Write, s: &str) -> std::io::Result<()> {
    write_bytes(sink, s.as_bytes())
}

fn write_tokens(sink: &mut dyn Write, tokens: &[&str]) -> std::io::Result<()> {
    tokens.iter().try_for_each(|t| write_str(sink, t))
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    false
}

fn mtime_secs(metadata: &fs::Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn walk_error(root: &Path, err: walkdir::Error) -> Error {
    let path = err.path().unwrap_or(root).to_path_buf();
    match err.into_io_error() {
        Some(source) => Error::io(path, source),
        None => Error::Archive {
            message: format!("filesystem loop detected at {}", path.display()),
        },
    }
}

/// Closes a node opened at `depth`; entries below the root also close their
/// surrounding `entry (`.
fn close_node(sink: &mut dyn Write, depth: usize) -> std::io::Result<()> {
    write_str(sink, ")")?;
    if depth > 0 {
        write_str(sink, ")")?;
    }
    Ok(())
}

/// Serialize the tree at `path` into `sink` and return the newest
/// modification time (seconds since the epoch) seen during the walk.
///
/// Symlinks are archived as links, never followed.
pub fn dump_path_and_get_mtime(
    path: &Path,
    sink: &mut dyn Write,
    filter: &PathFilter,
) -> Result<u64> {
    let mut mtime = 0u64;
    let mut open_dirs: Vec<usize> = Vec::new();

    write_str(sink, MAGIC).map_err(|e| Error::io(path, e))?;

    let walker = WalkDir::new(path)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || filter(e.path()));

    for entry in walker {
        let entry = entry.map_err(|e| walk_error(path, e))?;
        let entry_path = entry.path();
        let depth = entry.depth();
        let io_err = |e| Error::io(entry_path, e);

        while let Some(&open) = open_dirs.last() {
            if open < depth {
                break;
            }
            open_dirs.pop();
            close_node(sink, open).map_err(io_err)?;
        }

        if depth > 0 {
            let name = entry.file_name().to_str().ok_or_else(|| Error::Archive {
                message: format!("file name is not valid UTF-8: {}", entry_path.display()),
            })?;
            write_tokens(sink, &["entry", "(", "name", name, "node"]).map_err(io_err)?;
        }

        let metadata = entry.metadata().map_err(|e| walk_error(path, e))?;
        mtime = mtime.max(mtime_secs(&metadata));
        let file_type = entry.file_type();

        write_tokens(sink, &["(", "type"]).map_err(io_err)?;
        if file_type.is_dir() {
            write_str(sink, "directory").map_err(io_err)?;
            open_dirs.push(depth);
        } else if file_type.is_file() {
            write_str(sink, "regular").map_err(io_err)?;
            if is_executable(&metadata) {
                write_tokens(sink, &["executable", ""]).map_err(io_err)?;
            }
            let contents = fs::read(entry_path).map_err(io_err)?;
            write_str(sink, "contents").map_err(io_err)?;
            write_bytes(sink, &contents).map_err(io_err)?;
            close_node(sink, depth).map_err(io_err)?;
        } else if file_type.is_symlink() {
            let target = fs::read_link(entry_path).map_err(io_err)?;
            let target = target.to_str().ok_or_else(|| Error::Archive {
                message: format!("symlink target is not valid UTF-8: {}", entry_path.display()),
            })?;
            write_tokens(sink, &["symlink", "target", target]).map_err(io_err)?;
            close_node(sink, depth).map_err(io_err)?;
        } else {
            return Err(Error::Archive {
                message: format!("unsupported file type at {}", entry_path.display()),
            });
        }
    }

    while let Some(open) = open_dirs.pop() {
        close_node(sink, open).map_err(|e| Error::io(path, e))?;
    }

    Ok(mtime)
}

/// Serialize the tree at `path` into a byte vector.
pub fn dump_path(path: &Path, filter: &PathFilter) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    dump_path_and_get_mtime(path, &mut buf, filter)?;
    Ok(buf)
}

struct ArchiveReader<'a> {
    source: &'a mut dyn Read,
}

impl ArchiveReader<'_> {
    fn corrupt(message: impl Into<String>) -> Error {
        Error::Archive {
            message: message.into(),
        }
    }

    fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.source
            .read_exact(&mut buf)
            .map_err(|_| Self::corrupt("unexpected end of archive"))?;
        Ok(u64::from_le_bytes(buf))
    }

    fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_u64()?;
        let mut bytes = Vec::new();
        let read = (&mut *self.source)
            .take(len)
            .read_to_end(&mut bytes)
            .map_err(|e| Self::corrupt(e.to_string()))?;
        if read as u64 != len {
            return Err(Self::corrupt("unexpected end of archive"));
        }
        let mut pad = [0u8; 8];
        let pad = &mut pad[..padding(len)];
        self.source
            .read_exact(pad)
            .map_err(|_| Self::corrupt("unexpected end of archive"))?;
        if pad.iter().any(|&b| b != 0) {
            return Err(Self::corrupt("non-zero padding"));
        }
        Ok(bytes)
    }

    fn read_string(&mut self) -> Result<String> {
        String::from_utf8(self.read_bytes()?).map_err(|_| Self::corrupt("token is not UTF-8"))
    }

    fn expect(&mut self, token: &str) -> Result<()> {
        let got = self.read_string()?;
        if got != token {
            return Err(Self::corrupt(format!("expected '{}', got '{}'", token, got)));
        }
        Ok(())
    }

    fn restore_node(&mut self, path: &Path) -> Result<()> {
        self.expect("(")?;
        self.expect("type")?;
        match self.read_string()?.as_str() {
            "regular" => {
                let mut tag = self.read_string()?;
                let mut executable = false;
                if tag == "executable" {
                    self.expect("")?;
                    executable = true;
                    tag = self.read_string()?;
                }
                if tag != "contents" {
                    return Err(Self::corrupt(format!("expected 'contents', got '{}'", tag)));
                }
                let contents = self.read_bytes()?;
                fs::write(path, contents).map_err(|e| Error::io(path, e))?;
                if executable {
                    set_executable(path)?;
                }
                self.expect(")")
            }
            "symlink" => {
                self.expect("target")?;
                let target = self.read_string()?;
                make_symlink(&target, path)?;
                self.expect(")")
            }
            "directory" => {
                fs::create_dir(path).map_err(|e| Error::io(path, e))?;
                let mut prev: Option<String> = None;
                loop {
                    match self.read_string()?.as_str() {
                        ")" => return Ok(()),
                        "entry" => {}
                        other => {
                            return Err(Self::corrupt(format!("expected 'entry', got '{}'", other)))
                        }
                    }
                    self.expect("(")?;
                    self.expect("name")?;
                    let name = self.read_string()?;
                    if name.is_empty()
                        || name == "."
                        || name == ".."
                        || name.contains('/')
                        || name.contains('\0')
                    {
                        return Err(Self::corrupt(format!("invalid entry name '{}'", name)));
                    }
                    if prev.as_deref().is_some_and(|p| p.as_bytes() >= name.as_bytes()) {
                        return Err(Self::corrupt(format!(
                            "entry '{}' is not in sorted order",
                            name
                        )));
                    }
                    self.expect("node")?;
                    self.restore_node(&path.join(&name))?;
                    self.expect(")")?;
                    prev = Some(name);
                }
            }
            other => Err(Self::corrupt(format!("unknown node type '{}'", other))),
        }
    }
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(|e| Error::io(path, e))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn make_symlink(target: &str, path: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, path).map_err(|e| Error::io(path, e))
}

#[cfg(not(unix))]
fn make_symlink(_target: &str, path: &Path) -> Result<()> {
    Err(Error::Archive {
        message: format!("cannot restore symlink {} on this platform", path.display()),
    })
}

/// Materialise an archive read from `source` at `path`, which must not
/// exist yet.
pub fn restore_path(path: &Path, source: &mut dyn Read) -> Result<()> {
    let mut reader = ArchiveReader { source };
    reader.expect(MAGIC)?;
    reader.restore_node(path)?;
    let mut trailing = [0u8; 1];
    match reader.source.read(&mut trailing) {
        Ok(0) => Ok(()),
        _ => Err(ArchiveReader::corrupt("trailing data after archive")),
    }
}
