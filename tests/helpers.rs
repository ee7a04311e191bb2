//! Shared test utilities for bootpack tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use bootpack::config::Config;

/// Test environment with a temporary project root.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Project root simulation
    pub base_dir: PathBuf,
    /// Mock compiled build tree
    pub build_dir: PathBuf,
    /// Mock /etc tree
    pub etc_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl TestEnv {
    /// Create a new test environment with empty build and etc trees.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base_dir = temp_dir.path().to_path_buf();

        let build_dir = base_dir.join("build");
        let etc_dir = base_dir.join("etc");
        let output_dir = base_dir.join("output");

        fs::create_dir_all(&build_dir).expect("Failed to create build dir");
        fs::create_dir_all(&etc_dir).expect("Failed to create etc dir");

        Self {
            _temp_dir: temp_dir,
            base_dir,
            build_dir,
            etc_dir,
            output_dir,
        }
    }

    /// Configuration rooted at this environment, ignoring the process env.
    pub fn config(&self) -> Config {
        self.config_with(&[])
    }

    pub fn config_with(&self, vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(&self.base_dir, &vars)
    }
}

/// Populate a build tree the way the kernel build leaves it.
pub fn create_mock_build_tree(build_dir: &Path) {
    write_file(&build_dir.join("firedrake"), b"\x7fELF kernel");
    write_file(&build_dir.join("Programs/shell/shell.bin"), b"\x7fELF shell");
    write_file(&build_dir.join("Programs/test/test.bin"), b"\x7fELF test");
    write_file(&build_dir.join("lib/libc/libc.so"), b"\x7fELF libc");
    write_file(&build_dir.join("lib/libm/libm.so.1"), b"\x7fELF libm");
    write_file(&build_dir.join("CMakeFiles/Makefile.cmake"), b"# generated");
    write_file(&build_dir.join("Programs/shell/main.o"), b"object");
    write_file(&build_dir.join(".git/HEAD"), b"ref: refs/heads/master\n");
}

/// Populate an /etc tree.
pub fn create_mock_etc_tree(etc_dir: &Path) {
    write_file(&etc_dir.join("motd"), b"Welcome\n");
    write_file(&etc_dir.join("init/services.conf"), b"shell\n");
    write_file(&etc_dir.join("empty"), b"");
}

pub fn write_file(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    fs::write(path, contents).expect("Failed to write file");
}

/// Write an executable shell script.
pub fn create_script(path: &Path, body: &str) {
    write_file(path, format!("#!/bin/sh\n{}\n", body).as_bytes());
    let mut perms = fs::metadata(path).expect("Failed to get metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("Failed to set permissions");
}

/// Assert that a file contains expected content.
pub fn assert_file_contains(path: &Path, expected: &str) {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read file {}: {}", path.display(), e));
    assert!(
        content.contains(expected),
        "File {} does not contain expected content.\nExpected to find: {}\nActual content: {}",
        path.display(),
        expected,
        content
    );
}

/// Assert that a file exists.
pub fn assert_file_exists(path: &Path) {
    assert!(path.exists(), "Expected file to exist: {}", path.display());
}

/// Assert that a path does not exist.
pub fn assert_not_exists(path: &Path) {
    assert!(!path.exists(), "Expected path to be gone: {}", path.display());
}
