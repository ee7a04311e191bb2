//! Bootable image assembly.
//!
//! Stages the bootloader descriptor, kernel and initrd under
//! `<output>/iso-staging` and hands the tree to an external ISO tool
//! (`grub-mkrescue` by default). ISO layout is entirely the tool's business.

use anyhow::{bail, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::common::{copy_file, ensure_dir, StagingDir};
use crate::config::Config;
use crate::process::Cmd;

pub const STAGING_DIR_NAME: &str = "iso-staging";

/// Module name the kernel looks up the initrd by.
pub const INITRD_MODULE_NAME: &str = "initrd";

/// GRUB configuration booting `kernel_name` via multiboot with the initrd
/// loaded as a module.
pub fn grub_config(kernel_name: &str) -> String {
    format!(
        r#"set timeout=0
set default=0

menuentry "{kernel}" {{
    multiboot /boot/{kernel}
    module /boot/{initrd} {initrd}
    boot
}}
"#,
        kernel = kernel_name,
        initrd = INITRD_MODULE_NAME,
    )
}

/// Lay out the boot tree under `staging`.
pub fn stage_image(staging: &Path, kernel: &Path, kernel_name: &str, initrd: &Path) -> Result<()> {
    let boot = staging.join("boot");
    ensure_dir(&boot.join("grub"))?;

    fs::write(boot.join("grub/grub.cfg"), grub_config(kernel_name))?;
    copy_file(kernel, &boot.join(kernel_name))?;
    copy_file(initrd, &boot.join(INITRD_MODULE_NAME))?;
    Ok(())
}

/// Build the ISO described by `config`. Returns the output path.
///
/// Requires the kernel in the build tree and an initrd from `build initrd`.
/// The staging tree is removed whether or not the tool succeeds.
pub fn create_image(config: &Config) -> Result<PathBuf> {
    println!("=== Assembling Image ===\n");

    let kernel = config.kernel_path();
    let initrd = config.initrd_path();
    let iso = config.iso_path();

    if !kernel.is_file() {
        bail!(
            "Kernel not found at {}.\n\
             Build the kernel first (or set BOOTPACK_KERNEL_NAME).",
            kernel.display()
        );
    }
    if !initrd.is_file() {
        bail!(
            "Initrd not found at {}.\n\
             Run 'bootpack build initrd' first.",
            initrd.display()
        );
    }

    ensure_dir(&config.output_dir)?;
    let staging = StagingDir::prepare(&config.output_dir, STAGING_DIR_NAME)?;
    stage_image(staging.path(), &kernel, &config.kernel_name, &initrd)?;

    println!("Running {}...", config.iso_tool);
    let result = Cmd::new(&config.iso_tool)
        .arg(format!("--modules={}", config.iso_modules))
        .arg("-o")
        .arg_path(&iso)
        .arg_path(staging.path())
        .error_msg(format!("{} failed", config.iso_tool))
        .run_interactive();

    drop(staging);
    result?;

    println!("\n=== Image Complete ===");
    println!("  Output: {}", iso.display());
    if let Ok(meta) = fs::metadata(&iso) {
        println!("  Size:   {} MB", meta.len() / 1024 / 1024);
    }

    Ok(iso)
}
