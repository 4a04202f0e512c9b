//! The `bagit.txt` declaration and `bag-info.txt` metadata files.

use chrono::Utc;
use kukini_common::Result;
use std::fs;
use std::path::Path;

/// BagIt version written into new bags.
pub const BAGIT_VERSION: &str = "0.97";

/// File name of the bag declaration.
pub const BAGIT_TXT: &str = "bagit.txt";

/// File name of the bag metadata file.
pub const BAG_INFO_TXT: &str = "bag-info.txt";

/// The expected content of `bagit.txt`.
pub fn declaration() -> String {
    format!("BagIt-Version: {BAGIT_VERSION}\nTag-File-Character-Encoding: UTF-8\n")
}

/// Check whether the content of a `bagit.txt` matches the declaration.
///
/// Trailing whitespace on each line is ignored; any other difference is a
/// mismatch.
pub fn is_declaration(content: &str) -> bool {
    let expected = declaration();
    let got: Vec<&str> = content.lines().map(str::trim_end).collect();
    let want: Vec<&str> = expected.lines().map(str::trim_end).collect();
    got == want
}

/// Write a fresh `bagit.txt` at the bag root.
pub fn write_declaration(bag_root: &Path) -> Result<()> {
    fs::write(bag_root.join(BAGIT_TXT), declaration())?;
    Ok(())
}

/// Write `bag-info.txt` with the bagging date and payload oxum.
pub fn write_bag_info(bag_root: &Path, payload_bytes: u64, payload_count: u64) -> Result<()> {
    let content = format!(
        "Bagging-Date: {}\nPayload-Oxum: {payload_bytes}.{payload_count}\n",
        Utc::now().format("%Y-%m-%d")
    );
    fs::write(bag_root.join(BAG_INFO_TXT), content)?;
    Ok(())
}
