//! Common utilities and types shared across kukini crates.

pub mod digest;
pub mod error;

pub use digest::DigestAlgorithm;
pub use error::{Error, Result};
