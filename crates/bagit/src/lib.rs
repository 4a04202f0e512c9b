//! Kukini BagIt core - creation, validation, and maintenance of BagIt bags.
//!
//! A bag is a directory or zip archive laid out per the BagIt
//! specification: a `bagit.txt` declaration, a `data/` payload directory,
//! one or more `manifest-<algorithm>.txt` payload manifests, and optional
//! tag files with `tagmanifest-<algorithm>.txt` manifests. Every operation
//! here opens the bag, works on it, and closes it; the filesystem (or the
//! archive) is the only durable state.

pub mod archive;
pub mod bag;
pub mod declaration;
pub mod manifest;
pub mod store;
pub mod validate;

pub use archive::{compress, copy_tree, expand, is_compressed};
pub use bag::{
    add_data_to_bag, add_tag_files_to_bag, copy_bag, create_bag, make_complete, move_bag,
    remove_data_from_bag, remove_tag_files_from_bag, update_all_manifests, DEFAULT_ALGORITHM,
};
pub use manifest::Manifest;
pub use validate::{is_valid, is_valid_with, validate, ValidationResult};
