//! Read access to a bag, whether stored as a directory or a zip archive.
//!
//! Bags have no long-lived in-memory representation: every operation opens
//! the bag fresh, reads what it needs, and drops the handle. Zip bags keep
//! the bag contents at the archive root, which is what compressing a bag
//! directory produces.

use kukini_common::{DigestAlgorithm, Error, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::archive;
use crate::manifest;

/// The payload directory name.
pub const DATA_DIR: &str = "data";

/// A read-only view over the two bag encodings.
pub enum BagStore {
    Dir(PathBuf),
    Zip(ZipArchive<BufReader<File>>),
}

impl BagStore {
    /// Open the bag rooted at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if path.is_dir() {
            Ok(BagStore::Dir(path.to_path_buf()))
        } else if archive::is_compressed(path) {
            let file = File::open(path)?;
            let archive = ZipArchive::new(BufReader::new(file))?;
            Ok(BagStore::Zip(archive))
        } else {
            Err(Error::InvalidBag(format!(
                "{} is neither a directory nor a zip archive",
                path.display()
            )))
        }
    }

    /// True if the bag holds a regular file at the relative path `rel`.
    pub fn contains(&mut self, rel: &str) -> bool {
        match self {
            BagStore::Dir(root) => dir_path(root, rel).is_file(),
            BagStore::Zip(archive) => match archive.by_name(rel) {
                Ok(entry) => !entry.is_dir(),
                Err(_) => false,
            },
        }
    }

    /// Read the file at `rel` as UTF-8 text.
    pub fn read_to_string(&mut self, rel: &str) -> Result<String> {
        match self {
            BagStore::Dir(root) => Ok(std::fs::read_to_string(dir_path(root, rel))?),
            BagStore::Zip(archive) => {
                let mut entry = archive.by_name(rel)?;
                let mut text = String::new();
                entry.read_to_string(&mut text)?;
                Ok(text)
            }
        }
    }

    /// Digest the file at `rel`, streaming its content.
    pub fn digest_of(&mut self, algorithm: DigestAlgorithm, rel: &str) -> Result<String> {
        match self {
            BagStore::Dir(root) => algorithm.digest_file(&dir_path(root, rel)),
            BagStore::Zip(archive) => {
                let entry = archive.by_name(rel)?;
                Ok(algorithm.digest_reader(entry)?)
            }
        }
    }

    /// Every regular file under `data/`, as forward-slash relative paths.
    pub fn payload_files(&mut self) -> Result<Vec<String>> {
        Ok(self
            .all_files()?
            .into_iter()
            .filter(|f| f.starts_with("data/"))
            .collect())
    }

    /// Every regular file outside `data/`, as forward-slash relative paths.
    pub fn tag_files(&mut self) -> Result<Vec<String>> {
        Ok(self
            .all_files()?
            .into_iter()
            .filter(|f| !f.starts_with("data/"))
            .collect())
    }

    /// Payload manifest files present at the bag root.
    pub fn manifest_files(&mut self) -> Result<Vec<String>> {
        Ok(self
            .root_files()?
            .into_iter()
            .filter(|n| manifest::is_payload_manifest(n))
            .collect())
    }

    /// Tag manifest files present at the bag root.
    pub fn tag_manifest_files(&mut self) -> Result<Vec<String>> {
        Ok(self
            .root_files()?
            .into_iter()
            .filter(|n| manifest::is_tag_manifest(n))
            .collect())
    }

    fn root_files(&mut self) -> Result<Vec<String>> {
        Ok(self
            .all_files()?
            .into_iter()
            .filter(|f| !f.contains('/'))
            .collect())
    }

    fn all_files(&mut self) -> Result<Vec<String>> {
        match self {
            BagStore::Dir(root) => {
                let mut files = Vec::new();
                for entry in WalkDir::new(&*root) {
                    let entry = entry?;
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let rel = entry
                        .path()
                        .strip_prefix(&*root)
                        .map_err(|e| Error::Other(e.to_string()))?;
                    files.push(rel_name(rel));
                }
                files.sort();
                Ok(files)
            }
            BagStore::Zip(archive) => {
                let mut files: Vec<String> = archive
                    .file_names()
                    .filter(|n| !n.ends_with('/'))
                    .map(str::to_string)
                    .collect();
                files.sort();
                Ok(files)
            }
        }
    }
}

/// Join a forward-slash relative path onto a directory root.
fn dir_path(root: &Path, rel: &str) -> PathBuf {
    let mut out = root.to_path_buf();
    for part in rel.split('/').filter(|p| !p.is_empty()) {
        out.push(part);
    }
    out
}

/// Render a relative path with forward slashes.
pub(crate) fn rel_name(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn sample_bag(root: &Path) {
        fs::create_dir_all(root.join("data/sub")).unwrap();
        fs::write(root.join("bagit.txt"), "decl").unwrap();
        fs::write(root.join("manifest-md5.txt"), "").unwrap();
        fs::write(root.join("tagmanifest-md5.txt"), "").unwrap();
        fs::write(root.join("data/one.txt"), "one").unwrap();
        fs::write(root.join("data/sub/two.txt"), "two").unwrap();
    }

    #[test]
    fn test_dir_store_listing() {
        let dir = tempdir().unwrap();
        sample_bag(dir.path());
        let mut store = BagStore::open(dir.path()).unwrap();

        assert_eq!(
            store.payload_files().unwrap(),
            vec!["data/one.txt", "data/sub/two.txt"]
        );
        assert_eq!(
            store.tag_files().unwrap(),
            vec!["bagit.txt", "manifest-md5.txt", "tagmanifest-md5.txt"]
        );
        assert_eq!(store.manifest_files().unwrap(), vec!["manifest-md5.txt"]);
        assert_eq!(
            store.tag_manifest_files().unwrap(),
            vec!["tagmanifest-md5.txt"]
        );
        assert!(store.contains("data/one.txt"));
        assert!(!store.contains("data/missing.txt"));
    }

    #[test]
    fn test_zip_store_matches_dir_store() {
        let dir = tempdir().unwrap();
        let bag = dir.path().join("bag");
        sample_bag(&bag);
        let archive = crate::archive::compress(None, &[&bag]).unwrap();

        let mut store = BagStore::open(&archive).unwrap();
        assert_eq!(
            store.payload_files().unwrap(),
            vec!["data/one.txt", "data/sub/two.txt"]
        );
        assert_eq!(store.read_to_string("data/one.txt").unwrap(), "one");
        assert_eq!(
            store.digest_of(DigestAlgorithm::Md5, "data/one.txt").unwrap(),
            DigestAlgorithm::Md5.digest_bytes(b"one")
        );
    }

    #[test]
    fn test_open_rejects_other_files() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("bag.tar");
        fs::write(&file, "x").unwrap();
        assert!(matches!(
            BagStore::open(&file),
            Err(Error::InvalidBag(_))
        ));
    }
}
