//! Payload and tag manifest files.
//!
//! One entry per line: `<hex-digest>  <path>`, two spaces, matching the
//! BagIt reference implementation. Manifest files are rewritten in full on
//! every mutation.

use kukini_common::{DigestAlgorithm, Error, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Prefix of payload manifest file names.
pub const MANIFEST_PREFIX: &str = "manifest-";

/// Prefix of tag manifest file names.
pub const TAG_MANIFEST_PREFIX: &str = "tagmanifest-";

/// An in-memory manifest: relative bag paths mapped to hex digests.
///
/// Entries stay sorted so rewritten manifest files are deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    algorithm: DigestAlgorithm,
    entries: BTreeMap<String, String>,
}

impl Manifest {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self {
            algorithm,
            entries: BTreeMap::new(),
        }
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn insert(&mut self, path: impl Into<String>, digest: impl Into<String>) {
        self.entries.insert(path.into(), digest.into());
    }

    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.entries.remove(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn digest_for(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(p, d)| (p.as_str(), d.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse manifest text.
    ///
    /// The digest is everything up to the first space or tab; the path is
    /// the remainder after the separator run, so paths may contain spaces.
    pub fn parse(algorithm: DigestAlgorithm, text: &str) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim_end();
            if line.is_empty() {
                continue;
            }
            let split = line
                .find([' ', '\t'])
                .ok_or_else(|| malformed(index, line))?;
            let digest = &line[..split];
            let path = line[split..].trim_start_matches([' ', '\t']);
            if digest.is_empty() || path.is_empty() {
                return Err(malformed(index, line));
            }
            entries.insert(path.replace('\\', "/"), digest.to_ascii_lowercase());
        }
        Ok(Self { algorithm, entries })
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (path, digest) in &self.entries {
            out.push_str(digest);
            out.push_str("  ");
            out.push_str(path);
            out.push('\n');
        }
        out
    }

    pub fn load(algorithm: DigestAlgorithm, path: &Path) -> Result<Self> {
        Self::parse(algorithm, &fs::read_to_string(path)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_text())?;
        Ok(())
    }
}

fn malformed(index: usize, line: &str) -> Error {
    Error::InvalidBag(format!("malformed manifest line {}: {line}", index + 1))
}

/// True if `name` is a payload manifest file name for a known algorithm.
pub fn is_payload_manifest(name: &str) -> bool {
    name.starts_with(MANIFEST_PREFIX)
        && DigestAlgorithm::from_manifest_file_name(name).is_some()
}

/// True if `name` is a tag manifest file name for a known algorithm.
pub fn is_tag_manifest(name: &str) -> bool {
    name.starts_with(TAG_MANIFEST_PREFIX)
        && DigestAlgorithm::from_manifest_file_name(name).is_some()
}
