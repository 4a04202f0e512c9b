//! Bag operations: creation, completion, manifest maintenance, payload and
//! tag file mutation, and whole-bag relocation.
//!
//! Every operation takes a path, opens the bag, mutates it, and closes it.
//! Zip-encoded bags are mutated by expanding into a staging directory,
//! applying the directory logic, recompressing, and renaming the new
//! archive over the original.

use kukini_common::{DigestAlgorithm, Error, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::archive;
use crate::declaration;
use crate::manifest::{self, Manifest};
use crate::store::{rel_name, DATA_DIR};

/// Default digest algorithm for new bags.
pub const DEFAULT_ALGORITHM: DigestAlgorithm = DigestAlgorithm::Md5;

/// Build a new bag at `destination` from the contents of `source_dir`.
///
/// The source's contents are copied under `data/`, a payload manifest is
/// generated with the default algorithm, and `bagit.txt`, `bag-info.txt`,
/// and a tag manifest are written. With `compress` the finished bag is
/// zipped to a sibling `<destination>.zip` and the directory removed.
/// Returns the path of the finished bag.
pub fn create_bag(source_dir: &Path, destination: &Path, compress: bool) -> Result<PathBuf> {
    if !source_dir.is_dir() {
        return Err(Error::InvalidBag(format!(
            "{} is not a directory",
            source_dir.display()
        )));
    }
    if destination.exists() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", destination.display()),
        )));
    }

    let data_dir = destination.join(DATA_DIR);
    fs::create_dir_all(&data_dir)?;
    for entry in fs::read_dir(source_dir)? {
        let entry = entry?;
        archive::copy_tree(&entry.path(), &data_dir)?;
    }

    scan_payload(destination, DEFAULT_ALGORITHM)?
        .save(&destination.join(DEFAULT_ALGORITHM.manifest_file_name()))?;
    declaration::write_declaration(destination)?;
    let (bytes, count) = payload_oxum(destination)?;
    declaration::write_bag_info(destination, bytes, count)?;
    scan_tags(destination, DEFAULT_ALGORITHM)?
        .save(&destination.join(DEFAULT_ALGORITHM.tag_manifest_file_name()))?;
    info!("Created bag at {:?}", destination);

    if compress {
        let zipped = archive::compress(None, &[destination])?;
        fs::remove_dir_all(destination)?;
        return Ok(zipped);
    }
    Ok(destination.to_path_buf())
}

/// Regenerate whatever required pieces of the bag are missing: the
/// declaration, a payload manifest, a tag manifest. Present content is
/// left untouched.
pub fn make_complete(bag_path: &Path) -> Result<()> {
    with_bag_dir(bag_path, |root| {
        if !root.join(declaration::BAGIT_TXT).is_file() {
            declaration::write_declaration(root)?;
            debug!("Restored missing bagit.txt in {:?}", root);
        }
        if payload_manifest_names(root)?.is_empty() {
            scan_payload(root, DEFAULT_ALGORITHM)?
                .save(&root.join(DEFAULT_ALGORITHM.manifest_file_name()))?;
            // existing tag manifests must cover the rewritten manifest file
            refresh_tag_manifests(root)?;
            debug!("Regenerated payload manifest in {:?}", root);
        }
        if tag_manifest_names(root)?.is_empty() {
            scan_tags(root, DEFAULT_ALGORITHM)?
                .save(&root.join(DEFAULT_ALGORITHM.tag_manifest_file_name()))?;
            debug!("Regenerated tag manifest in {:?}", root);
        }
        Ok(())
    })
}

/// Rescan `data/` and rewrite every payload manifest: entries for vanished
/// files are dropped, new files added, and every digest recomputed. Tag
/// manifests are refreshed so they cover the rewritten manifest files.
pub fn update_all_manifests(bag_path: &Path) -> Result<()> {
    with_bag_dir(bag_path, |root| {
        rewrite_payload_manifests(root)?;
        refresh_tag_manifests(root)?;
        info!("Updated manifests in {:?}", root);
        Ok(())
    })
}

/// Copy `file` into the payload under `relative_dest_dir` (empty for
/// `data/` itself) and rewrite the payload manifests.
pub fn add_data_to_bag(bag_path: &Path, relative_dest_dir: &str, file: &Path) -> Result<()> {
    with_bag_dir(bag_path, |root| {
        let dest_dir = resolve_relative(&root.join(DATA_DIR), relative_dest_dir)?;
        fs::create_dir_all(&dest_dir)?;
        archive::copy_tree(file, &dest_dir)?;
        rewrite_payload_manifests(root)?;
        refresh_tag_manifests(root)?;
        info!("Added {:?} to bag {:?}", file, bag_path);
        Ok(())
    })
}

/// Remove a single payload file and its manifest entries.
///
/// `relative_file` is relative to the bag root, e.g. `data/sub/file.txt`;
/// the `data/` prefix may be omitted.
pub fn remove_data_from_bag(bag_path: &Path, relative_file: &str) -> Result<()> {
    with_bag_dir(bag_path, |root| {
        let rel = payload_rel(relative_file);
        let target = resolve_relative(root, &rel)?;
        if !target.is_file() {
            return Err(Error::InvalidBag(format!(
                "{rel} is not a payload file in this bag"
            )));
        }
        fs::remove_file(&target)?;
        for mut man in load_payload_manifests(root)? {
            man.remove(&rel);
            man.save(&root.join(man.algorithm().manifest_file_name()))?;
        }
        refresh_tag_manifests(root)?;
        info!("Removed {rel} from bag {:?}", bag_path);
        Ok(())
    })
}

/// Copy tag files to the bag root and refresh the tag manifests.
pub fn add_tag_files_to_bag(bag_path: &Path, files: &[&Path]) -> Result<()> {
    with_bag_dir(bag_path, |root| {
        for file in files {
            archive::copy_tree(file, root)?;
        }
        refresh_tag_manifests(root)?;
        info!("Added {} tag file(s) to bag {:?}", files.len(), bag_path);
        Ok(())
    })
}

/// Remove tag files by name from the bag root and refresh the tag
/// manifests. Payload files cannot be removed this way.
pub fn remove_tag_files_from_bag(bag_path: &Path, names: &[&str]) -> Result<()> {
    with_bag_dir(bag_path, |root| {
        for name in names {
            if *name == DATA_DIR || name.starts_with("data/") {
                return Err(Error::InvalidBag(format!(
                    "{name} is a payload path, not a tag file"
                )));
            }
            let target = resolve_relative(root, name)?;
            if !target.is_file() {
                return Err(Error::InvalidBag(format!(
                    "{name} is not a tag file in this bag"
                )));
            }
            fs::remove_file(&target)?;
        }
        refresh_tag_manifests(root)?;
        info!("Removed {} tag file(s) from bag {:?}", names.len(), bag_path);
        Ok(())
    })
}

/// Move a bag (directory or zip archive) into `dest_dir` as a unit.
/// Fails without touching the source when source and destination resolve
/// to the same path.
pub fn move_bag(src: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let target = relocation_target(src, dest_dir)?;
    fs::create_dir_all(dest_dir)?;
    if fs::rename(src, &target).is_err() {
        // cross-device move: copy then delete
        archive::copy_tree(src, dest_dir)?;
        if src.is_dir() {
            fs::remove_dir_all(src)?;
        } else {
            fs::remove_file(src)?;
        }
    }
    info!("Moved bag {:?} to {:?}", src, target);
    Ok(target)
}

/// Duplicate a bag (directory or zip archive) into `dest_dir` as a unit.
/// Fails without touching the source when source and destination resolve
/// to the same path.
pub fn copy_bag(src: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let target = relocation_target(src, dest_dir)?;
    fs::create_dir_all(dest_dir)?;
    archive::copy_tree(src, dest_dir)?;
    info!("Copied bag {:?} to {:?}", src, target);
    Ok(target)
}

/// Run a directory-bag mutation against a bag that may be zip-encoded.
fn with_bag_dir<F>(bag_path: &Path, mutate: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    if bag_path.is_dir() {
        return mutate(bag_path);
    }
    if !archive::is_compressed(bag_path) {
        return Err(Error::InvalidBag(format!(
            "{} is neither a directory nor a zip archive",
            bag_path.display()
        )));
    }

    let staging = tempfile::tempdir()?;
    let expanded = archive::expand_into(bag_path, staging.path())?;
    mutate(&expanded)?;

    let repacked = staging.path().join("repacked.zip");
    archive::compress(Some(&repacked), &[&expanded])?;
    if fs::rename(&repacked, bag_path).is_err() {
        // staging may live on another filesystem
        fs::copy(&repacked, bag_path)?;
    }
    debug!("Repacked zip bag {:?}", bag_path);
    Ok(())
}

fn relocation_target(src: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let name = src.file_name().ok_or_else(|| {
        Error::InvalidBag(format!("{} has no file name", src.display()))
    })?;
    let target = dest_dir.join(name);

    if let Ok(src_real) = src.canonicalize() {
        let clash = match target.canonicalize() {
            Ok(target_real) => target_real == src_real,
            // destination inside the source tree is just as fatal
            Err(_) => dest_dir
                .canonicalize()
                .map(|d| d.starts_with(&src_real))
                .unwrap_or(false),
        };
        if clash {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("source and destination are the same bag: {}", src.display()),
            )));
        }
    }
    if target.exists() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", target.display()),
        )));
    }
    Ok(target)
}

/// Scan `data/` into a fresh payload manifest.
fn scan_payload(bag_root: &Path, algorithm: DigestAlgorithm) -> Result<Manifest> {
    let mut man = Manifest::new(algorithm);
    let data = bag_root.join(DATA_DIR);
    if data.is_dir() {
        for entry in WalkDir::new(&data) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(bag_root)
                .map_err(|e| Error::Other(e.to_string()))?;
            let digest = algorithm.digest_file(entry.path())?;
            man.insert(rel_name(rel), digest);
        }
    }
    Ok(man)
}

/// Scan the tag files (everything outside `data/`, excluding the tag
/// manifests themselves) into a fresh tag manifest.
fn scan_tags(bag_root: &Path, algorithm: DigestAlgorithm) -> Result<Manifest> {
    let mut man = Manifest::new(algorithm);
    for entry in WalkDir::new(bag_root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(bag_root)
            .map_err(|e| Error::Other(e.to_string()))?;
        let name = rel_name(rel);
        if name.starts_with("data/") {
            continue;
        }
        if !name.contains('/') && manifest::is_tag_manifest(&name) {
            continue;
        }
        let digest = algorithm.digest_file(entry.path())?;
        man.insert(name, digest);
    }
    Ok(man)
}

fn rewrite_payload_manifests(root: &Path) -> Result<()> {
    let mut manifests = load_payload_manifests(root)?;
    if manifests.is_empty() {
        manifests.push(Manifest::new(DEFAULT_ALGORITHM));
    }
    for man in &manifests {
        let algorithm = man.algorithm();
        scan_payload(root, algorithm)?.save(&root.join(algorithm.manifest_file_name()))?;
    }
    Ok(())
}

fn refresh_tag_manifests(root: &Path) -> Result<()> {
    for name in tag_manifest_names(root)? {
        let Some(algorithm) = DigestAlgorithm::from_manifest_file_name(&name) else {
            continue;
        };
        scan_tags(root, algorithm)?.save(&root.join(&name))?;
    }
    Ok(())
}

fn load_payload_manifests(root: &Path) -> Result<Vec<Manifest>> {
    let mut manifests = Vec::new();
    for name in payload_manifest_names(root)? {
        let Some(algorithm) = DigestAlgorithm::from_manifest_file_name(&name) else {
            continue;
        };
        manifests.push(Manifest::load(algorithm, &root.join(&name))?);
    }
    Ok(manifests)
}

fn payload_manifest_names(root: &Path) -> Result<Vec<String>> {
    root_file_names(root, manifest::is_payload_manifest)
}

fn tag_manifest_names(root: &Path) -> Result<Vec<String>> {
    root_file_names(root, manifest::is_tag_manifest)
}

fn root_file_names(root: &Path, keep: fn(&str) -> bool) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if keep(&name) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

fn payload_oxum(root: &Path) -> Result<(u64, u64)> {
    let mut bytes = 0u64;
    let mut count = 0u64;
    let data = root.join(DATA_DIR);
    if data.is_dir() {
        for entry in WalkDir::new(&data) {
            let entry = entry?;
            if entry.file_type().is_file() {
                bytes += entry.metadata()?.len();
                count += 1;
            }
        }
    }
    Ok((bytes, count))
}

fn payload_rel(relative_file: &str) -> String {
    let rel = relative_file.trim_start_matches("./");
    if rel == DATA_DIR || rel.starts_with("data/") {
        rel.to_string()
    } else {
        format!("data/{rel}")
    }
}

/// Join a forward-slash relative path onto `base`, rejecting escapes.
fn resolve_relative(base: &Path, rel: &str) -> Result<PathBuf> {
    let mut out = base.to_path_buf();
    for part in rel.split('/').filter(|p| !p.is_empty() && *p != ".") {
        if part == ".." {
            return Err(Error::InvalidBag(format!("path escapes the bag: {rel}")));
        }
        out.push(part);
    }
    Ok(out)
}
