//! Bag validation: declaration, manifest fixity, payload completeness.
//!
//! An invalid bag is not an error. Validation returns `Ok` with a list of
//! human-readable violations; `Err` is reserved for failures to read the
//! bag at all.

use kukini_common::{DigestAlgorithm, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

use crate::declaration;
use crate::manifest::{self, Manifest};
use crate::store::BagStore;

/// Result of validating a bag. No violations means the bag is valid.
#[derive(Debug, Default, Serialize)]
pub struct ValidationResult {
    pub violations: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    fn add(&mut self, violation: String) {
        self.violations.push(violation);
    }
}

/// Validate the bag at `bag_path`.
///
/// Checks run in a fixed order: the declaration first, then every payload
/// manifest entry (existence and fixity), then payload completeness, then
/// the tag manifests.
pub fn validate(bag_path: &Path) -> Result<ValidationResult> {
    let mut store = BagStore::open(bag_path)?;
    let mut result = ValidationResult::new();

    check_declaration(&mut store, &mut result)?;
    check_payload_manifests(&mut store, &mut result)?;
    check_tag_manifests(&mut store, &mut result)?;

    debug!(
        "Validated {:?}: {} violation(s)",
        bag_path,
        result.violations.len()
    );
    Ok(result)
}

/// True if the bag at `bag_path` is valid.
pub fn is_valid(bag_path: &Path) -> Result<bool> {
    Ok(validate(bag_path)?.is_valid())
}

/// Like [`is_valid`], appending each violation to the caller's list.
pub fn is_valid_with(bag_path: &Path, violations: &mut Vec<String>) -> Result<bool> {
    let result = validate(bag_path)?;
    let valid = result.is_valid();
    violations.extend(result.violations);
    Ok(valid)
}

fn check_declaration(store: &mut BagStore, result: &mut ValidationResult) -> Result<()> {
    if !store.contains(declaration::BAGIT_TXT) {
        result.add("bagit.txt was missing".to_string());
        return Ok(());
    }
    let content = store.read_to_string(declaration::BAGIT_TXT)?;
    if !declaration::is_declaration(&content) {
        result.add("bagit.txt was invalid".to_string());
    }
    Ok(())
}

fn check_payload_manifests(store: &mut BagStore, result: &mut ValidationResult) -> Result<()> {
    let manifest_names = store.manifest_files()?;
    if manifest_names.is_empty() {
        result.add("no payload manifest found".to_string());
    }

    let mut listed: BTreeSet<String> = BTreeSet::new();
    for name in &manifest_names {
        check_manifest(store, name, result, &mut listed)?;
    }

    for file in store.payload_files()? {
        if !listed.contains(&file) {
            result.add(format!("{file} is not listed in any payload manifest"));
        }
    }
    Ok(())
}

fn check_tag_manifests(store: &mut BagStore, result: &mut ValidationResult) -> Result<()> {
    let tag_manifest_names = store.tag_manifest_files()?;
    let mut listed: BTreeSet<String> = BTreeSet::new();
    for name in &tag_manifest_names {
        check_manifest(store, name, result, &mut listed)?;
    }

    // tag manifests never list themselves; completeness is only required
    // once the bag carries a tag manifest at all
    if !tag_manifest_names.is_empty() {
        for file in store.tag_files()? {
            if !file.contains('/') && manifest::is_tag_manifest(&file) {
                continue;
            }
            if !listed.contains(&file) {
                result.add(format!("{file} is not listed in any tag manifest"));
            }
        }
    }
    Ok(())
}

fn check_manifest(
    store: &mut BagStore,
    name: &str,
    result: &mut ValidationResult,
    listed: &mut BTreeSet<String>,
) -> Result<()> {
    let Some(algorithm) = DigestAlgorithm::from_manifest_file_name(name) else {
        return Ok(());
    };
    let text = store.read_to_string(name)?;
    let man = match Manifest::parse(algorithm, &text) {
        Ok(m) => m,
        Err(e) => {
            result.add(format!("{name} was malformed: {e}"));
            return Ok(());
        }
    };
    for (path, expected) in man.entries() {
        listed.insert(path.to_string());
        if !store.contains(path) {
            result.add(format!("{name} lists {path} but the file does not exist"));
            continue;
        }
        let actual = store.digest_of(algorithm, path)?;
        if actual != expected {
            result.add(format!(
                "checksum mismatch for {path}: expected {expected}, got {actual}"
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    // a minimal hand-built bag, no tag manifest
    fn minimal_bag(root: &Path) {
        fs::create_dir_all(root.join("data/testfiles")).unwrap();
        fs::write(root.join("bagit.txt"), declaration::declaration()).unwrap();
        let body = b"rain on the windward side";
        fs::write(root.join("data/testfiles/monsoon.txt"), body).unwrap();
        let digest = DigestAlgorithm::Md5.digest_bytes(body);
        fs::write(
            root.join("manifest-md5.txt"),
            format!("{digest}  data/testfiles/monsoon.txt\n"),
        )
        .unwrap();
    }

    #[test]
    fn test_minimal_bag_is_valid() {
        let dir = tempdir().unwrap();
        minimal_bag(dir.path());
        let result = validate(dir.path()).unwrap();
        assert!(result.is_valid(), "violations: {:?}", result.violations);
    }

    #[test]
    fn test_missing_listed_file_names_the_path() {
        let dir = tempdir().unwrap();
        minimal_bag(dir.path());
        fs::remove_file(dir.path().join("data/testfiles/monsoon.txt")).unwrap();

        let result = validate(dir.path()).unwrap();
        assert!(!result.is_valid());
        assert!(
            result
                .violations
                .iter()
                .any(|v| v.contains("data/testfiles/monsoon.txt")),
            "violations: {:?}",
            result.violations
        );
    }

    #[test]
    fn test_bad_declaration_is_first_violation() {
        let dir = tempdir().unwrap();
        minimal_bag(dir.path());
        fs::write(dir.path().join("bagit.txt"), "BagIt-Version: 9.9\n").unwrap();

        let result = validate(dir.path()).unwrap();
        assert!(!result.is_valid());
        assert_eq!(result.violations[0], "bagit.txt was invalid");
    }

    #[test]
    fn test_missing_declaration_reported() {
        let dir = tempdir().unwrap();
        minimal_bag(dir.path());
        fs::remove_file(dir.path().join("bagit.txt")).unwrap();

        let mut violations = Vec::new();
        assert!(!is_valid_with(dir.path(), &mut violations).unwrap());
        assert_eq!(violations[0], "bagit.txt was missing");
    }

    #[test]
    fn test_altered_checksum_reported() {
        let dir = tempdir().unwrap();
        minimal_bag(dir.path());
        fs::write(dir.path().join("data/testfiles/monsoon.txt"), b"dry season").unwrap();

        let result = validate(dir.path()).unwrap();
        assert!(!result.is_valid());
        assert!(
            result
                .violations
                .iter()
                .any(|v| v.starts_with("checksum mismatch for data/testfiles/monsoon.txt")),
            "violations: {:?}",
            result.violations
        );
    }

    #[test]
    fn test_unlisted_payload_file_reported() {
        let dir = tempdir().unwrap();
        minimal_bag(dir.path());
        fs::write(dir.path().join("data/stray.txt"), "stray").unwrap();

        let result = validate(dir.path()).unwrap();
        assert!(result
            .violations
            .iter()
            .any(|v| v == "data/stray.txt is not listed in any payload manifest"));
    }

    #[test]
    fn test_bag_without_manifest_is_invalid() {
        let dir = tempdir().unwrap();
        minimal_bag(dir.path());
        fs::remove_file(dir.path().join("manifest-md5.txt")).unwrap();

        let result = validate(dir.path()).unwrap();
        assert!(!result.is_valid());
        assert!(result
            .violations
            .iter()
            .any(|v| v == "no payload manifest found"));
    }

    #[test]
    fn test_validation_result_serializes() {
        let mut result = ValidationResult::new();
        result.add("bagit.txt was invalid".to_string());
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("bagit.txt was invalid"));
    }
}
