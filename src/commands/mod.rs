//! CLI command handlers.
//!
//! Each submodule handles a specific CLI command:
//! - `build` - Build the initrd and the bootable image
//! - `remote` - Run the build pipeline on a remote host
//! - `inspect` - List and extract container files
//! - `clean` - Clean build outputs
//! - `show` - Display information
//! - `preflight` - Run preflight checks

pub mod build;
pub mod clean;
pub mod inspect;
mod preflight;
pub mod remote;
pub mod show;

pub use build::cmd_build;
pub use clean::cmd_clean;
pub use inspect::{cmd_extract, cmd_list};
pub use preflight::cmd_preflight;
pub use remote::cmd_remote;
pub use show::cmd_show;
