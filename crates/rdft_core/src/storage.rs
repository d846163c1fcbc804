//! File-system adapter: path-sandboxed read/write/list/delete, with
//! directory payloads framed as ZIP archives.

use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::RdftError;

/// One block of a `list` response: either a directory or a file, carrying
/// just enough metadata to render a plain-column listing client-side.
#[derive(Debug, Clone, PartialEq)]
pub enum ListEntry {
    Directory { name: String, mtime: f64 },
    File { name: String, mtime: f64, size: u64 },
}

/// A canonicalized, existence-checked subtree of the filesystem that request
/// handlers are confined to.
///
/// Every public method takes paths relative to this root; [`StorageRoot`]
/// resolves and validates them before touching the filesystem, so a handler
/// can never be tricked into reading or writing outside its root via `..`
/// components or symlinks.
#[derive(Debug, Clone)]
pub struct StorageRoot {
    root: PathBuf,
    max_path_len: usize,
}

impl StorageRoot {
    /// Opens (creating if necessary) a storage root at `root`.
    pub fn open(root: impl AsRef<Path>, max_path_len: usize) -> Result<Self, RdftError> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        let root = root.canonicalize()?;
        Ok(Self { root, max_path_len })
    }

    /// The canonicalized root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, RdftError> {
        if path.len() > self.max_path_len {
            return Err(RdftError::InvalidArgument(format!(
                "path exceeds maximum length of {} bytes",
                self.max_path_len
            )));
        }
        let candidate = self.root.join(path.trim_start_matches(['/', '\\']));
        Ok(candidate)
    }

    /// Returns `true` iff `path`, once canonicalized, lies within this root.
    ///
    /// A path that does not exist yet (e.g. an upload destination) is
    /// checked against its nearest existing ancestor instead, since
    /// `canonicalize` requires the target to exist.
    #[must_use]
    pub fn in_storage(&self, path: &Path) -> bool {
        let mut probe = path.to_path_buf();
        loop {
            if let Ok(canonical) = probe.canonicalize() {
                return canonical.starts_with(&self.root);
            }
            if !probe.pop() {
                return false;
            }
        }
    }

    fn resolve_checked(&self, path: &str) -> Result<PathBuf, RdftError> {
        let resolved = self.resolve(path)?;
        if !self.in_storage(&resolved) {
            warn!(path, "rejected path escaping storage root");
            return Err(RdftError::PermissionDenied);
        }
        Ok(resolved)
    }

    /// Reads `path`. Returns the payload prefixed with a leading
    /// `is_file` flag: a file's raw bytes, or a directory zipped up with
    /// entries relative to the directory root.
    pub fn read(&self, path: &str) -> Result<(bool, Vec<u8>), RdftError> {
        let resolved = self.resolve_checked(path)?;
        let metadata = fs::metadata(&resolved).map_err(|_| RdftError::NotFound)?;

        if metadata.is_file() {
            Ok((true, fs::read(&resolved)?))
        } else {
            Ok((false, zip_directory(&resolved)?))
        }
    }

    /// Writes `payload` to `path`. `is_file` selects whether `payload` is
    /// raw file bytes or a ZIP archive to extract. Any existing file or
    /// directory at `path` is removed first; parent directories are
    /// created as needed.
    pub fn write(&self, path: &str, is_file: bool, payload: &[u8]) -> Result<(), RdftError> {
        let resolved = self.resolve_checked(path)?;
        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent)?;
        }
        remove_if_exists(&resolved)?;

        if is_file {
            fs::write(&resolved, payload)?;
        } else {
            fs::create_dir_all(&resolved)?;
            unzip_directory(payload, &resolved)?;
        }
        debug!(path, is_file, bytes = payload.len(), "wrote upload");
        Ok(())
    }

    /// Lists the contents of `path`, optionally recursing into
    /// subdirectories. Directories are emitted before the files of the same
    /// parent, and both are sorted lexicographically by name; a recursed
    /// directory's children follow immediately after its own block.
    pub fn list(&self, path: &str, recursive: bool) -> Result<Vec<ListEntry>, RdftError> {
        let resolved = self.resolve_checked(path)?;
        if !resolved.is_dir() {
            return Err(RdftError::NotFound);
        }
        list_dir(&resolved, &resolved, recursive)
    }

    /// Deletes `path`. If `path` is the storage root itself, only its
    /// contents are removed, never the root directory.
    pub fn delete(&self, path: &str) -> Result<bool, RdftError> {
        let resolved = self.resolve_checked(path)?;
        let metadata = fs::metadata(&resolved).map_err(|_| RdftError::NotFound)?;

        if resolved == self.root {
            for entry in fs::read_dir(&resolved)? {
                remove_if_exists(&entry?.path())?;
            }
            return Ok(false);
        }

        if metadata.is_file() {
            fs::remove_file(&resolved)?;
            Ok(true)
        } else {
            fs::remove_dir_all(&resolved)?;
            Ok(false)
        }
    }
}

fn remove_if_exists(path: &Path) -> Result<(), RdftError> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path)?,
        Ok(_) => fs::remove_file(path)?,
        Err(_) => {}
    }
    Ok(())
}

fn mtime_secs(metadata: &fs::Metadata) -> f64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0.0, |d| d.as_secs_f64())
}

fn list_dir(dir: &Path, root: &Path, recursive: bool) -> Result<Vec<ListEntry>, RdftError> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        let name = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(&entry.path())
            .to_string_lossy()
            .into_owned();
        if metadata.is_dir() {
            dirs.push((entry.path(), name, mtime_secs(&metadata)));
        } else {
            files.push((name, mtime_secs(&metadata), metadata.len()));
        }
    }
    dirs.sort_by(|a, b| a.1.cmp(&b.1));
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut out = Vec::with_capacity(dirs.len() + files.len());
    for (child_path, name, mtime) in dirs {
        out.push(ListEntry::Directory {
            name,
            mtime,
        });
        if recursive {
            out.extend(list_dir(&child_path, root, recursive)?);
        }
    }
    for (name, mtime, size) in files {
        out.push(ListEntry::File { name, mtime, size });
    }
    Ok(out)
}

fn zip_directory(dir: &Path) -> Result<Vec<u8>, RdftError> {
    let mut buf = Vec::new();
    {
        // Scoped so the writer (and its internal deflate state) is flushed
        // and dropped before `buf` is handed back to the caller.
        let mut writer = ZipWriter::new(Cursor::new(&mut buf));
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
            let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
            if relative.as_os_str().is_empty() {
                continue;
            }
            let name = relative.to_string_lossy().replace('\\', "/");

            if entry.file_type().is_dir() {
                writer.add_directory(format!("{name}/"), options)?;
            } else if entry.file_type().is_file() {
                writer.start_file(name, options)?;
                let mut f = fs::File::open(entry.path())?;
                std::io::copy(&mut f, &mut writer)?;
            }
        }
        writer.finish()?;
    }
    Ok(buf)
}

fn unzip_directory(payload: &[u8], dest: &Path) -> Result<(), RdftError> {
    let mut archive = ZipArchive::new(Cursor::new(payload))?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
        } else {
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = fs::File::create(&out_path)?;
            let mut contents = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut contents)?;
            out.write_all(&contents)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> (tempfile::TempDir, StorageRoot) {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = StorageRoot::open(dir.path(), 256).expect("open storage root");
        (dir, storage)
    }

    #[test]
    fn writes_and_reads_back_a_file() {
        let (_dir, storage) = root();
        storage.write("notes.txt", true, b"hello world").unwrap();
        let (is_file, payload) = storage.read("notes.txt").unwrap();
        assert!(is_file);
        assert_eq!(payload, b"hello world");
    }

    #[test]
    fn rejects_path_escaping_root() {
        let (_dir, storage) = root();
        storage.write("a.txt", true, b"x").unwrap();
        let err = storage.read("../a.txt").unwrap_err();
        assert!(matches!(err, RdftError::PermissionDenied));
    }

    #[test]
    fn round_trips_a_directory_through_zip() {
        let (_dir, storage) = root();
        storage.write("docs/a.txt", true, b"1").unwrap();
        storage.write("docs/sub/b.txt", true, b"22").unwrap();

        let (is_file, zipped) = storage.read("docs").unwrap();
        assert!(!is_file);

        storage.write("restored", false, &zipped).unwrap();
        let (_, a) = storage.read("restored/a.txt").unwrap();
        let (_, b) = storage.read("restored/sub/b.txt").unwrap();
        assert_eq!(a, b"1");
        assert_eq!(b, b"22");
    }

    #[test]
    fn lists_recursively_in_directories_then_files_order() {
        let (_dir, storage) = root();
        storage.write("a/c.txt", true, b"x").unwrap();
        storage.write("b.txt", true, b"y").unwrap();

        let entries = storage.list("", true).unwrap();
        let names: Vec<String> = entries
            .iter()
            .map(|e| match e {
                ListEntry::Directory { name, .. } => name.clone(),
                ListEntry::File { name, .. } => name.clone(),
            })
            .collect();
        assert_eq!(names, vec!["a", "a/c.txt", "b.txt"]);
    }

    #[test]
    fn delete_root_clears_contents_but_keeps_root() {
        let (_dir, storage) = root();
        storage.write("x.txt", true, b"x").unwrap();
        storage.delete("").unwrap();
        assert!(storage.root().exists());
        assert!(storage.list("", false).unwrap().is_empty());
    }
}
