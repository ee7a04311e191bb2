//! Source tree traversal and classification.
//!
//! Walking is split from framing: `collect_candidates` only looks at the
//! directory tree and returns what would be packed, in the order it would be
//! packed. The builder then frames each candidate and runs optional tooling.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use super::entry::join_container_path;

/// Version-control directory that is never descended into.
pub const SKIPPED_DIR: &str = ".git";

/// Default kernel image name packed at the container root.
pub const DEFAULT_KERNEL_NAME: &str = "firedrake";

/// How a pass decides which files to pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkMode {
    /// Pack only files matching the classification rules, flattened into
    /// their target directories.
    Classified,
    /// Pack every regular file, preserving the relative directory layout.
    Subtree,
}

/// What a candidate was classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    Binary,
    Library,
    Kernel,
    Auxiliary,
}

impl CandidateKind {
    /// Compiled output that the symbol tooling applies to.
    pub fn is_object(self) -> bool {
        !matches!(self, CandidateKind::Auxiliary)
    }
}

/// One (root, prefix, mode) walker invocation.
#[derive(Debug, Clone)]
pub struct Pass {
    pub root: PathBuf,
    pub prefix: String,
    pub mode: WalkMode,
}

impl Pass {
    pub fn classified(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.into(),
            mode: WalkMode::Classified,
        }
    }

    pub fn subtree(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.into(),
            mode: WalkMode::Subtree,
        }
    }
}

/// A file selected for packing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub source: PathBuf,
    pub target: String,
    pub kind: CandidateKind,
}

/// Filename to target directory mapping for classified passes.
#[derive(Debug, Clone)]
pub struct ClassificationRules {
    pub kernel_name: String,
}

impl Default for ClassificationRules {
    fn default() -> Self {
        Self {
            kernel_name: DEFAULT_KERNEL_NAME.to_string(),
        }
    }
}

impl ClassificationRules {
    pub fn new(kernel_name: impl Into<String>) -> Self {
        Self {
            kernel_name: kernel_name.into(),
        }
    }

    /// Target directory and kind for a file name, or `None` to skip it.
    pub fn classify(&self, name: &str) -> Option<(&'static str, CandidateKind)> {
        if name.ends_with(".bin") {
            Some(("bin", CandidateKind::Binary))
        } else if name.ends_with(".so") || name.contains(".so.") {
            Some(("lib", CandidateKind::Library))
        } else if name == self.kernel_name {
            Some(("", CandidateKind::Kernel))
        } else {
            None
        }
    }
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == SKIPPED_DIR
}

/// Collect every file a pass would pack, sorted by source path.
///
/// Directory listing order is not stable across filesystems, so the result
/// is sorted to keep containers byte-for-byte reproducible.
pub fn collect_candidates(pass: &Pass, rules: &ClassificationRules) -> Result<Vec<Candidate>> {
    let mut candidates = Vec::new();

    let walker = WalkDir::new(&pass.root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e));

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", pass.root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        let candidate = match pass.mode {
            WalkMode::Classified => match rules.classify(&name) {
                Some((dir, kind)) => Candidate {
                    source: entry.path().to_path_buf(),
                    target: join_container_path(&pass.prefix, &[dir, &*name]),
                    kind,
                },
                None => continue,
            },
            WalkMode::Subtree => {
                let relative = relative_target(&pass.root, entry.path())?;
                Candidate {
                    source: entry.path().to_path_buf(),
                    target: join_container_path(&pass.prefix, &[relative.as_str()]),
                    kind: CandidateKind::Auxiliary,
                }
            }
        };
        candidates.push(candidate);
    }

    candidates.sort_by(|a, b| a.source.cmp(&b.source));
    Ok(candidates)
}

/// Relative path of `path` under `root`, joined with forward slashes.
fn relative_target(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .with_context(|| format!("{} is not under {}", path.display(), root.display()))?;

    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/"))
}
