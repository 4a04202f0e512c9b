//! Digest utilities for manifest fixity.
//!
//! Files are digested through a fixed-size buffer so multi-gigabyte
//! payloads never have to fit in memory.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

/// A digest algorithm usable in BagIt manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    Md5,
    Sha256,
    Sha512,
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestAlgorithm::Md5 => write!(f, "md5"),
            DigestAlgorithm::Sha256 => write!(f, "sha256"),
            DigestAlgorithm::Sha512 => write!(f, "sha512"),
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "md5" => Ok(DigestAlgorithm::Md5),
            "sha256" => Ok(DigestAlgorithm::Sha256),
            "sha512" => Ok(DigestAlgorithm::Sha512),
            _ => Err(crate::Error::UnknownAlgorithm(s.to_string())),
        }
    }
}

impl DigestAlgorithm {
    /// Payload manifest file name for this algorithm, e.g. `manifest-md5.txt`.
    pub fn manifest_file_name(self) -> String {
        format!("manifest-{self}.txt")
    }

    /// Tag manifest file name for this algorithm, e.g. `tagmanifest-md5.txt`.
    pub fn tag_manifest_file_name(self) -> String {
        format!("tagmanifest-{self}.txt")
    }

    /// Recover the algorithm from a payload or tag manifest file name.
    pub fn from_manifest_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(".txt")?;
        let algo = stem
            .strip_prefix("tagmanifest-")
            .or_else(|| stem.strip_prefix("manifest-"))?;
        algo.parse().ok()
    }

    /// Compute the digest of a reader, as a lowercase hex string.
    pub fn digest_reader<R: Read>(self, mut reader: R) -> std::io::Result<String> {
        let mut hasher = Hasher::new(self);
        let mut buffer = [0u8; 8192];
        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
        Ok(hasher.finish())
    }

    /// Compute the digest of a file, as a lowercase hex string.
    pub fn digest_file(self, path: &Path) -> crate::Result<String> {
        let file = File::open(path)?;
        Ok(self.digest_reader(BufReader::new(file))?)
    }

    /// Compute the digest of a byte slice, as a lowercase hex string.
    pub fn digest_bytes(self, data: &[u8]) -> String {
        let mut hasher = Hasher::new(self);
        hasher.update(data);
        hasher.finish()
    }
}

enum Hasher {
    Md5(md5::Context),
    Sha256(Sha256),
    Sha512(Sha512),
}

impl Hasher {
    fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Md5 => Hasher::Md5(md5::Context::new()),
            DigestAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
            DigestAlgorithm::Sha512 => Hasher::Sha512(Sha512::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Md5(ctx) => ctx.consume(data),
            Hasher::Sha256(h) => h.update(data),
            Hasher::Sha512(h) => h.update(data),
        }
    }

    fn finish(self) -> String {
        match self {
            Hasher::Md5(ctx) => format!("{:x}", ctx.compute()),
            Hasher::Sha256(h) => hex::encode(h.finalize()),
            Hasher::Sha512(h) => hex::encode(h.finalize()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_bytes() {
        let hash = DigestAlgorithm::Sha256.digest_bytes(b"hello world");
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_md5_bytes() {
        let hash = DigestAlgorithm::Md5.digest_bytes(b"hello world");
        assert_eq!(hash, "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn test_digest_reader_matches_bytes() {
        let data = b"some longer payload that crosses nothing special".as_slice();
        let from_reader = DigestAlgorithm::Sha512.digest_reader(data).unwrap();
        let from_bytes = DigestAlgorithm::Sha512.digest_bytes(data);
        assert_eq!(from_reader, from_bytes);
    }

    #[test]
    fn test_parse_algorithm() {
        assert_eq!(
            DigestAlgorithm::from_str("md5").unwrap(),
            DigestAlgorithm::Md5
        );
        assert_eq!(
            DigestAlgorithm::from_str("SHA256").unwrap(),
            DigestAlgorithm::Sha256
        );
        assert!(DigestAlgorithm::from_str("crc32").is_err());
    }

    #[test]
    fn test_manifest_file_names() {
        assert_eq!(DigestAlgorithm::Md5.manifest_file_name(), "manifest-md5.txt");
        assert_eq!(
            DigestAlgorithm::Sha256.tag_manifest_file_name(),
            "tagmanifest-sha256.txt"
        );
        assert_eq!(
            DigestAlgorithm::from_manifest_file_name("manifest-sha512.txt"),
            Some(DigestAlgorithm::Sha512)
        );
        assert_eq!(
            DigestAlgorithm::from_manifest_file_name("tagmanifest-md5.txt"),
            Some(DigestAlgorithm::Md5)
        );
        assert_eq!(DigestAlgorithm::from_manifest_file_name("manifest.txt"), None);
        assert_eq!(
            DigestAlgorithm::from_manifest_file_name("manifest-crc32.txt"),
            None
        );
    }
}
