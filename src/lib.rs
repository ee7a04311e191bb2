//! bootpack library exports.
//!
//! The CLI in `main.rs` is a thin layer over these modules; integration
//! tests drive them directly.

pub mod common;
pub mod config;
pub mod image;
pub mod initrd;
pub mod preflight;
pub mod process;
pub mod remote;
pub mod timing;
