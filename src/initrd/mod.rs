//! Initrd container builder.
//!
//! The container is the flat file the kernel unpacks at boot: a sequence of
//! length-prefixed (path, contents) records with nothing before, between or
//! after them. See [`entry`] for the record layout.
//!
//! A build is an ordered list of [`Pass`]es written to one output stream.
//! Entries from an earlier pass always precede entries from a later one.
//! Duplicate paths are written as they come; the kernel opens each path for
//! writing in order, so the last entry for a path is what ends up on its VFS.
//!
//! Nothing is rolled back. If a source file cannot be read the build stops
//! and the container on disk holds every entry written so far.

pub mod entry;
pub mod tooling;
pub mod walker;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::Config;
use entry::write_entry;
use tooling::{BinaryTooling, SymbolDumper};
use walker::collect_candidates;

pub use entry::{ContainerError, Entry, EntryReader};
pub use walker::{Candidate, CandidateKind, ClassificationRules, Pass, WalkMode};

/// Totals for a finished build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub entries: usize,
    pub bytes: u64,
}

/// Streams entries from one or more passes into a single writer.
pub struct ArchiveBuilder<W: Write> {
    out: W,
    rules: ClassificationRules,
    tooling: Option<Box<dyn BinaryTooling>>,
    summary: ArchiveSummary,
}

impl<W: Write> ArchiveBuilder<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            rules: ClassificationRules::default(),
            tooling: None,
            summary: ArchiveSummary::default(),
        }
    }

    pub fn with_rules(mut self, rules: ClassificationRules) -> Self {
        self.rules = rules;
        self
    }

    /// Run `tooling` for every candidate after it is framed.
    pub fn with_tooling(mut self, tooling: Box<dyn BinaryTooling>) -> Self {
        self.tooling = Some(tooling);
        self
    }

    /// Walk one pass and frame everything it selects.
    pub fn run_pass(&mut self, pass: &Pass) -> Result<ArchiveSummary> {
        let candidates = collect_candidates(pass, &self.rules)?;
        tracing::debug!(
            root = %pass.root.display(),
            prefix = %pass.prefix,
            count = candidates.len(),
            "pass collected"
        );

        let mut pass_summary = ArchiveSummary::default();
        for candidate in &candidates {
            let written = self.add_candidate(candidate)?;
            pass_summary.entries += 1;
            pass_summary.bytes += written;
        }
        Ok(pass_summary)
    }

    /// Frame a single candidate, then run tooling on it.
    pub fn add_candidate(&mut self, candidate: &Candidate) -> Result<u64> {
        let contents = fs::read(&candidate.source)
            .with_context(|| format!("Failed to read {}", candidate.source.display()))?;
        let written = self.add_bytes(&candidate.target, &contents)?;

        if let Some(tooling) = self.tooling.as_mut() {
            tooling.process(candidate);
        }
        Ok(written)
    }

    /// Frame an in-memory entry.
    pub fn add_bytes(&mut self, path: &str, contents: &[u8]) -> Result<u64> {
        tracing::debug!(path, size = contents.len(), "framing entry");
        let written = write_entry(&mut self.out, path, contents)
            .with_context(|| format!("Failed to write entry {}", path))?;
        self.summary.entries += 1;
        self.summary.bytes += written;
        Ok(written)
    }

    /// Flush and hand back the writer together with the totals.
    pub fn finish(mut self) -> Result<(W, ArchiveSummary)> {
        self.out.flush().context("Failed to flush container")?;
        Ok((self.out, self.summary))
    }
}

/// The passes a standard build runs: the build tree, then /etc if present.
pub fn default_passes(config: &Config) -> Vec<Pass> {
    let mut passes = vec![Pass::classified(&config.build_dir, "/")];
    if config.etc_dir.is_dir() {
        passes.push(Pass::subtree(&config.etc_dir, "/etc"));
    }
    passes
}

/// Build a container file at `output` from `passes`.
pub fn build_container(
    output: &Path,
    passes: &[Pass],
    rules: ClassificationRules,
    tooling: Option<Box<dyn BinaryTooling>>,
) -> Result<ArchiveSummary> {
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    let mut builder = ArchiveBuilder::new(BufWriter::new(file)).with_rules(rules);
    if let Some(tooling) = tooling {
        builder = builder.with_tooling(tooling);
    }

    for pass in passes {
        let pass_summary = builder.run_pass(pass)?;
        println!(
            "  {} -> {} ({} entries)",
            pass.root.display(),
            pass.prefix,
            pass_summary.entries
        );
    }

    let (_, summary) = builder.finish()?;
    Ok(summary)
}

/// Build the initrd described by `config`. Returns the output path.
pub fn build_initrd(config: &Config) -> Result<PathBuf> {
    println!("=== Building Initrd ===\n");

    if !config.build_dir.is_dir() {
        anyhow::bail!(
            "Build tree not found at {}.\n\
             Compile the kernel and programs first (or set BOOTPACK_BUILD_DIR).",
            config.build_dir.display()
        );
    }

    let output = config.initrd_path();
    let passes = default_passes(config);
    let rules = ClassificationRules::new(&config.kernel_name);

    let tooling: Option<Box<dyn BinaryTooling>> = if config.dump_symbols {
        println!("Symbol dumps enabled -> {}", config.dump_dir().display());
        Some(Box::new(SymbolDumper::new(&config.dump_dir())?))
    } else {
        None
    };

    let summary = build_container(&output, &passes, rules, tooling)?;

    println!("\n=== Initrd Complete ===");
    println!("  Output:  {}", output.display());
    println!("  Entries: {}", summary.entries);
    println!("  Size:    {} bytes", summary.bytes);
    match sha256_file(&output) {
        Ok(digest) => println!("  SHA256:  {}", digest),
        Err(e) => tracing::warn!("could not hash {}: {:#}", output.display(), e),
    }

    Ok(output)
}

/// Hex SHA-256 of a file.
pub fn sha256_file(path: &Path) -> Result<String> {
    let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(format!("{:x}", Sha256::digest(&content)))
}

/// Read every entry of a container file.
pub fn read_container(path: &Path) -> Result<Vec<Entry>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    EntryReader::new(std::io::BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read container {}", path.display()))
}
