//! Zip compression and expansion of file trees.
//!
//! Entry names use forward slashes and UTF-8 regardless of the host
//! separator. File bodies are streamed; nothing is buffered whole.

use kukini_common::{Error, Result};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// True if `path` is a regular file named like a zip archive.
///
/// Pure extension sniffing; the content is not inspected.
pub fn is_compressed(path: &Path) -> bool {
    path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("zip")
}

/// Expand the zip at `source` into a sibling directory named after the
/// archive's file stem. Returns the directory the entries were written to.
pub fn expand(source: &Path) -> Result<PathBuf> {
    let parent = source.parent().unwrap_or_else(|| Path::new("."));
    expand_into(source, parent)
}

/// Expand the zip at `source` into `<parent_dir>/<stem>`.
///
/// Directory entries are recreated so empty directories round-trip.
/// Entries that would escape the destination are rejected.
pub fn expand_into(source: &Path, parent_dir: &Path) -> Result<PathBuf> {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            Error::InvalidBag(format!(
                "cannot derive a directory name from {}",
                source.display()
            ))
        })?;
    let dest = parent_dir.join(stem);

    let file = File::open(source)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;
    fs::create_dir_all(&dest)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let rel = entry.enclosed_name().ok_or_else(|| {
            Error::Zip(format!("zip entry escapes the archive root: {}", entry.name()))
        })?;
        let target = dest.join(rel);
        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
    }
    debug!("Expanded {:?} to {:?}", source, dest);
    Ok(dest)
}

/// Compress `sources` into a zip archive.
///
/// With no explicit destination the archive is created next to the first
/// source, named `<stem>.zip`. Directory sources contribute entries
/// relative to the source root (no enclosing parent path); file sources
/// contribute their file name. Empty directories get explicit entries.
/// Refuses to overwrite an existing destination.
pub fn compress(destination: Option<&Path>, sources: &[&Path]) -> Result<PathBuf> {
    let first = *sources
        .first()
        .ok_or_else(|| Error::Other("nothing to compress".to_string()))?;
    let dest = match destination {
        Some(d) => d.to_path_buf(),
        None => {
            let stem = first.file_stem().and_then(|s| s.to_str()).ok_or_else(|| {
                Error::InvalidBag(format!(
                    "cannot derive an archive name from {}",
                    first.display()
                ))
            })?;
            first.with_file_name(format!("{stem}.zip"))
        }
    };
    if dest.exists() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", dest.display()),
        )));
    }

    let file = File::create(&dest)?;
    let mut writer = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().unix_permissions(0o644);

    for source in sources {
        if source.is_dir() {
            add_tree(&mut writer, source, options)?;
        } else {
            let name = source
                .file_name()
                .and_then(|s| s.to_str())
                .ok_or_else(|| {
                    Error::InvalidBag(format!("{} has no file name", source.display()))
                })?;
            let mut input = File::open(source)?;
            writer.start_file(name, options)?;
            io::copy(&mut input, &mut writer)?;
        }
    }
    writer.finish()?;
    info!("Compressed {} source(s) to {:?}", sources.len(), dest);
    Ok(dest)
}

fn add_tree<W: Write + Seek>(
    writer: &mut ZipWriter<W>,
    root: &Path,
    options: SimpleFileOptions,
) -> Result<()> {
    for entry in WalkDir::new(root) {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| Error::Other(e.to_string()))?;
        if rel.as_os_str().is_empty() {
            continue;
        }
        let name = crate::store::rel_name(rel);
        if entry.file_type().is_dir() {
            // only empty directories need their own entry to round-trip
            if fs::read_dir(entry.path())?.next().is_none() {
                writer.add_directory(format!("{name}/"), options)?;
            }
        } else if entry.file_type().is_file() {
            let mut input = File::open(entry.path())?;
            writer.start_file(name, options)?;
            io::copy(&mut input, &mut *writer)?;
        }
    }
    Ok(())
}

/// Recursively copy a file or directory tree into `dest_dir`, preserving
/// relative structure. The source lands under `dest_dir` by its own name.
pub fn copy_tree(source: &Path, dest_dir: &Path) -> Result<()> {
    let name = source.file_name().ok_or_else(|| {
        Error::InvalidBag(format!("{} has no file name", source.display()))
    })?;
    let target_root = dest_dir.join(name);
    if source.is_dir() {
        for entry in WalkDir::new(source) {
            let entry = entry?;
            let rel = entry
                .path()
                .strip_prefix(source)
                .map_err(|e| Error::Other(e.to_string()))?;
            let target = target_root.join(rel);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)?;
            } else if entry.file_type().is_file() {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(entry.path(), &target)?;
            }
        }
    } else {
        fs::create_dir_all(dest_dir)?;
        fs::copy(source, &target_root)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    fn build_tree(root: &Path) {
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::write(root.join("a.txt"), "alpha").unwrap();
        fs::write(root.join("sub/b.txt"), "beta").unwrap();
        fs::write(root.join("sub/deeper/c.txt"), "gamma").unwrap();
    }

    fn relative_files(root: &Path) -> BTreeSet<String> {
        WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                crate::store::rel_name(e.path().strip_prefix(root).unwrap())
            })
            .collect()
    }

    #[test]
    fn test_is_compressed() {
        let dir = tempdir().unwrap();
        let zip = dir.path().join("bag.zip");
        fs::write(&zip, "not really a zip").unwrap();
        assert!(is_compressed(&zip));
        assert!(!is_compressed(dir.path()));
        let txt = dir.path().join("bag.txt");
        fs::write(&txt, "x").unwrap();
        assert!(!is_compressed(&txt));
        assert!(!is_compressed(&dir.path().join("missing.zip")));
    }

    #[test]
    fn test_compress_expand_round_trip() {
        let dir = tempdir().unwrap();
        let tree = dir.path().join("tree");
        build_tree(&tree);

        let archive = compress(None, &[&tree]).unwrap();
        assert_eq!(archive, dir.path().join("tree.zip"));

        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();
        let expanded = expand_into(&archive, &out).unwrap();
        assert_eq!(expanded, out.join("tree"));

        assert_eq!(relative_files(&tree), relative_files(&expanded));
        assert_eq!(
            fs::read_to_string(expanded.join("sub/deeper/c.txt")).unwrap(),
            "gamma"
        );
        // empty directories round-trip
        assert!(expanded.join("empty").is_dir());
    }

    #[test]
    fn test_expand_into_sibling_directory() {
        let dir = tempdir().unwrap();
        let tree = dir.path().join("tree");
        build_tree(&tree);
        let archive = compress(None, &[&tree]).unwrap();
        fs::remove_dir_all(&tree).unwrap();

        let expanded = expand(&archive).unwrap();
        assert_eq!(expanded, dir.path().join("tree"));
        assert!(expanded.join("a.txt").is_file());
    }

    #[test]
    fn test_compress_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let tree = dir.path().join("tree");
        build_tree(&tree);
        compress(None, &[&tree]).unwrap();

        let err = compress(None, &[&tree]).unwrap_err();
        assert!(matches!(err, Error::Io(_)), "expected IO error, got {err:?}");
    }

    #[test]
    fn test_compress_single_file_uses_file_name() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("note.txt");
        fs::write(&file, "hello").unwrap();
        let archive = compress(Some(&dir.path().join("note-archive.zip")), &[&file]).unwrap();

        let reader = BufReader::new(File::open(&archive).unwrap());
        let mut zip = ZipArchive::new(reader).unwrap();
        assert_eq!(zip.len(), 1);
        assert!(zip.by_name("note.txt").is_ok());
    }

    #[test]
    fn test_copy_tree() {
        let dir = tempdir().unwrap();
        let tree = dir.path().join("tree");
        build_tree(&tree);
        let dest = dir.path().join("dest");
        fs::create_dir_all(&dest).unwrap();

        copy_tree(&tree, &dest).unwrap();
        assert_eq!(relative_files(&tree), relative_files(&dest.join("tree")));
        assert!(dest.join("tree/empty").is_dir());
    }
}
