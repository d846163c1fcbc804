//! Local-filesystem counterpart of `rdft_core::storage`'s directory zipping:
//! the client has no storage root to sandbox paths under, so this operates
//! directly on whatever local path the user named.

use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Zips the contents of `dir` (entries relative to `dir` itself).
pub fn zip_directory(dir: &Path) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    {
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
                let mut f = fs::File::open(entry.path())
                    .with_context(|| format!("opening {}", entry.path().display()))?;
                std::io::copy(&mut f, &mut writer)?;
            }
        }
        writer.finish()?;
    }
    Ok(buf)
}

/// Extracts a ZIP archive produced by [`zip_directory`] into `dest`, creating
/// it (and any parents) first.
pub fn unzip_directory(payload: &[u8], dest: &Path) -> Result<()> {
    fs::create_dir_all(dest)?;
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

    #[test]
    fn zips_and_unzips_a_directory_tree() {
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("a.txt"), b"1").unwrap();
        fs::create_dir(src.path().join("sub")).unwrap();
        fs::write(src.path().join("sub/b.txt"), b"22").unwrap();

        let zipped = zip_directory(src.path()).unwrap();

        let dest = tempfile::tempdir().unwrap();
        unzip_directory(&zipped, dest.path()).unwrap();

        assert_eq!(fs::read(dest.path().join("a.txt")).unwrap(), b"1");
        assert_eq!(fs::read(dest.path().join("sub/b.txt")).unwrap(), b"22");
    }
}
