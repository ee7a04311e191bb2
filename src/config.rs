//! Configuration management for bootpack.
//!
//! Reads configuration from a `.env` file in the base directory and from the
//! process environment. Environment variables take precedence over `.env`.
//! The base directory is always passed in explicitly; nothing here reads the
//! current working directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::initrd::walker::DEFAULT_KERNEL_NAME;

pub const DEFAULT_INITRD_NAME: &str = "initrd";
pub const DEFAULT_ISO_NAME: &str = "firedrake.iso";
pub const DEFAULT_ISO_TOOL: &str = "grub-mkrescue";
pub const DEFAULT_ISO_MODULES: &str = "multiboot normal ext2 part_msdos";
pub const DEFAULT_REMOTE_HOST: &str = "localhost";
pub const DEFAULT_REMOTE_BIN: &str = "bootpack";

/// Bootpack configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Project root every relative path resolves against.
    pub base_dir: PathBuf,
    /// Compiled build tree scanned for binaries, libraries and the kernel.
    pub build_dir: PathBuf,
    /// Auxiliary configuration tree packed under /etc.
    pub etc_dir: PathBuf,
    /// Where the initrd, the ISO and symbol dumps are written.
    pub output_dir: PathBuf,
    pub kernel_name: String,
    pub initrd_name: String,
    pub iso_name: String,
    pub iso_tool: String,
    pub iso_modules: String,
    /// Run objdump/objcopy for every packed object file.
    pub dump_symbols: bool,
    pub remote_host: String,
    /// bootpack executable name on the remote host.
    pub remote_bin: String,
}

impl Config {
    /// Load configuration from `<base_dir>/.env` and the environment.
    pub fn load(base_dir: &Path) -> Self {
        let mut env_vars = HashMap::new();

        let env_path = base_dir.join(".env");
        if env_path.exists() {
            match dotenvy::from_path_iter(&env_path) {
                Ok(iter) => {
                    for item in iter {
                        match item {
                            Ok((key, value)) => {
                                env_vars.insert(key, value);
                            }
                            Err(e) => {
                                tracing::warn!(path = %env_path.display(), "skipping .env line: {}", e)
                            }
                        }
                    }
                }
                Err(e) => tracing::warn!(path = %env_path.display(), "could not read .env: {}", e),
            }
        }

        for (key, value) in std::env::vars() {
            env_vars.insert(key, value);
        }

        Self::from_vars(base_dir, &env_vars)
    }

    /// Build a configuration from an explicit variable map.
    pub fn from_vars(base_dir: &Path, vars: &HashMap<String, String>) -> Self {
        let path = |key: &str, default: &str| {
            let raw = vars.get(key).map(String::as_str).unwrap_or(default);
            let path = PathBuf::from(raw);
            if path.is_absolute() {
                path
            } else {
                base_dir.join(path)
            }
        };
        let string = |key: &str, default: &str| {
            vars.get(key)
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            base_dir: base_dir.to_path_buf(),
            build_dir: path("BOOTPACK_BUILD_DIR", "build"),
            etc_dir: path("BOOTPACK_ETC_DIR", "etc"),
            output_dir: path("BOOTPACK_OUTPUT_DIR", "output"),
            kernel_name: string("BOOTPACK_KERNEL_NAME", DEFAULT_KERNEL_NAME),
            initrd_name: string("BOOTPACK_INITRD_NAME", DEFAULT_INITRD_NAME),
            iso_name: string("BOOTPACK_ISO_NAME", DEFAULT_ISO_NAME),
            iso_tool: string("BOOTPACK_ISO_TOOL", DEFAULT_ISO_TOOL),
            iso_modules: string("BOOTPACK_ISO_MODULES", DEFAULT_ISO_MODULES),
            dump_symbols: vars
                .get("BOOTPACK_DUMP_SYMBOLS")
                .map(|v| is_truthy(v))
                .unwrap_or(false),
            remote_host: string("BOOTPACK_REMOTE_HOST", DEFAULT_REMOTE_HOST),
            remote_bin: string("BOOTPACK_REMOTE_BIN", DEFAULT_REMOTE_BIN),
        }
    }

    pub fn initrd_path(&self) -> PathBuf {
        self.output_dir.join(&self.initrd_name)
    }

    pub fn iso_path(&self) -> PathBuf {
        self.output_dir.join(&self.iso_name)
    }

    pub fn dump_dir(&self) -> PathBuf {
        self.output_dir.join("dumps")
    }

    /// The built kernel image inside the build tree.
    pub fn kernel_path(&self) -> PathBuf {
        self.build_dir.join(&self.kernel_name)
    }

    /// Print configuration for `bootpack show config`.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  BASE_DIR:              {}", self.base_dir.display());
        println!("  BOOTPACK_BUILD_DIR:    {}", self.build_dir.display());
        println!("  BOOTPACK_ETC_DIR:      {}", self.etc_dir.display());
        println!("  BOOTPACK_OUTPUT_DIR:   {}", self.output_dir.display());
        println!("  BOOTPACK_KERNEL_NAME:  {}", self.kernel_name);
        println!("  BOOTPACK_INITRD_NAME:  {}", self.initrd_name);
        println!("  BOOTPACK_ISO_NAME:     {}", self.iso_name);
        println!("  BOOTPACK_ISO_TOOL:     {}", self.iso_tool);
        println!("  BOOTPACK_ISO_MODULES:  {}", self.iso_modules);
        println!("  BOOTPACK_DUMP_SYMBOLS: {}", self.dump_symbols);
        println!("  BOOTPACK_REMOTE_HOST:  {}", self.remote_host);
        println!("  BOOTPACK_REMOTE_BIN:   {}", self.remote_bin);
        if self.build_dir.is_dir() {
            println!("  Build tree: FOUND");
        } else {
            println!("  Build tree: NOT FOUND (run the kernel build first)");
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
