//! Shared utilities across bootpack modules.

pub mod staging;

pub use staging::{copy_file, ensure_dir, remove_tree, StagingDir};
