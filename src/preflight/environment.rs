//! Input tree and output directory checks.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::config::Config;

use super::types::{Check, Stage};

/// Check the build tree, kernel, /etc tree and output directory.
pub fn check_build_environment(config: &Config) -> Vec<Check> {
    let mut results = Vec::new();

    if config.build_dir.is_dir() {
        let files = count_files(&config.build_dir);
        results.push(Check::ok(
            Stage::Initrd,
            "build tree",
            format!("{} ({} files)", config.build_dir.display(), files),
        ));
    } else {
        results.push(Check::blocking(
            Stage::Initrd,
            "build tree",
            format!(
                "{} not found - compile the kernel and programs first",
                config.build_dir.display()
            ),
        ));
    }

    let kernel = config.kernel_path();
    match fs::metadata(&kernel) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => {
            results.push(Check::ok(
                Stage::Image,
                "kernel image",
                format!("{} ({} bytes)", kernel.display(), meta.len()),
            ));
        }
        Ok(_) => {
            results.push(Check::blocking(
                Stage::Image,
                "kernel image",
                format!("{} is empty or not a regular file", kernel.display()),
            ));
        }
        Err(_) => {
            results.push(Check::warning(
                Stage::Image,
                "kernel image",
                format!(
                    "{} not found - 'build image' will fail",
                    kernel.display()
                ),
            ));
        }
    }

    if config.etc_dir.is_dir() {
        results.push(Check::ok(
            Stage::Initrd,
            "etc tree",
            config.etc_dir.display().to_string(),
        ));
    } else {
        results.push(Check::warning(
            Stage::Initrd,
            "etc tree",
            format!(
                "{} not found - initrd will have no /etc",
                config.etc_dir.display()
            ),
        ));
    }

    results.push(check_writable("output dir", &config.output_dir));

    results
}

/// Check that `dir` exists (creating it if needed) and accepts writes.
fn check_writable(name: &str, dir: &Path) -> Check {
    if let Err(e) = fs::create_dir_all(dir) {
        return Check::blocking(
            Stage::Initrd,
            name,
            format!("cannot create {}: {}", dir.display(), e),
        );
    }

    let test_file = dir.join(".preflight-test");
    match fs::write(&test_file, "test") {
        Ok(()) => {
            let _ = fs::remove_file(&test_file);
            Check::ok(Stage::Initrd, name, dir.display().to_string())
        }
        Err(e) => Check::blocking(
            Stage::Initrd,
            name,
            format!("cannot write to {}: {}", dir.display(), e),
        ),
    }
}

fn count_files(root: &Path) -> usize {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count()
}
