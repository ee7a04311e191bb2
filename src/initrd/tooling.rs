//! Per-binary disassembly and debug-symbol dumps.
//!
//! Runs alongside packing when symbol dumps are enabled. The output is for
//! debugging the booted image; a failing tool never affects the container.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::walker::Candidate;
use crate::process::Cmd;

pub const DISASSEMBLER: &str = "objdump";
pub const SYMBOL_EXTRACTOR: &str = "objcopy";

/// Side effects to run for each packed object file.
pub trait BinaryTooling {
    fn process(&mut self, candidate: &Candidate);
}

/// `objdump -d` and `objcopy --only-keep-debug` into a dump directory.
pub struct SymbolDumper {
    dump_dir: PathBuf,
    failures: usize,
}

impl SymbolDumper {
    pub fn new(dump_dir: &Path) -> Result<Self> {
        fs::create_dir_all(dump_dir)
            .with_context(|| format!("Failed to create dump directory {}", dump_dir.display()))?;
        Ok(Self {
            dump_dir: dump_dir.to_path_buf(),
            failures: 0,
        })
    }

    /// Number of tool invocations that failed so far.
    pub fn failures(&self) -> usize {
        self.failures
    }

    fn disassemble(&self, source: &Path, name: &str) -> Result<()> {
        let result = Cmd::new(DISASSEMBLER)
            .arg("-d")
            .arg_path(source)
            .run()?;
        fs::write(self.dump_dir.join(format!("{}.dump", name)), &result.stdout)?;
        Ok(())
    }

    fn extract_symbols(&self, source: &Path, name: &str) -> Result<()> {
        Cmd::new(SYMBOL_EXTRACTOR)
            .arg("--only-keep-debug")
            .arg_path(source)
            .arg_path(&self.dump_dir.join(format!("{}.debug", name)))
            .run()?;
        Ok(())
    }
}

impl BinaryTooling for SymbolDumper {
    fn process(&mut self, candidate: &Candidate) {
        if !candidate.kind.is_object() {
            return;
        }

        let name = candidate
            .source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| candidate.target.replace('/', "_"));

        if let Err(e) = self.disassemble(&candidate.source, &name) {
            self.failures += 1;
            tracing::warn!(file = %candidate.source.display(), "disassembly failed: {:#}", e);
        }
        if let Err(e) = self.extract_symbols(&candidate.source, &name) {
            self.failures += 1;
            tracing::warn!(file = %candidate.source.display(), "symbol extraction failed: {:#}", e);
        }
    }
}
