//! List and extract commands - inspect a built container.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};

use bootpack::common::ensure_dir;
use bootpack::initrd::EntryReader;

#[derive(Debug, Serialize)]
struct ListedEntry {
    path: String,
    size: usize,
}

#[derive(Debug, Serialize)]
struct Listing {
    entries: Vec<ListedEntry>,
    total_bytes: u64,
}

fn open_reader(container: &Path) -> Result<EntryReader<BufReader<File>>> {
    let file = File::open(container)
        .with_context(|| format!("Failed to open container {}", container.display()))?;
    Ok(EntryReader::new(BufReader::new(file)))
}

/// Print every entry's path and size in container order.
pub fn cmd_list(container: &Path, json: bool) -> Result<()> {
    let mut listing = Listing {
        entries: Vec::new(),
        total_bytes: 0,
    };

    for entry in open_reader(container)? {
        let entry = entry.with_context(|| format!("Failed to read {}", container.display()))?;
        listing.total_bytes += entry.encoded_len();
        listing.entries.push(ListedEntry {
            size: entry.contents.len(),
            path: entry.path,
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    for entry in &listing.entries {
        println!("{:>10}  {}", entry.size, entry.path);
    }
    println!(
        "\n{} entries, {} bytes",
        listing.entries.len(),
        listing.total_bytes
    );
    Ok(())
}

/// Write every entry under `output`. Later entries overwrite earlier ones
/// with the same path, as they would on the kernel's VFS.
pub fn cmd_extract(container: &Path, output: &Path) -> Result<()> {
    ensure_dir(output)?;
    println!("Extracting {} to {}...", container.display(), output.display());

    let mut count = 0usize;
    for entry in open_reader(container)? {
        let entry = entry.with_context(|| format!("Failed to read {}", container.display()))?;
        let target = output.join(confined_path(&entry.path)?);
        if let Some(parent) = target.parent() {
            ensure_dir(parent)?;
        }
        fs::write(&target, &entry.contents)
            .with_context(|| format!("Failed to write {}", target.display()))?;
        count += 1;
    }

    println!("Extracted {} entries.", count);
    Ok(())
}

/// Container path made relative, refusing anything that leaves the root.
fn confined_path(path: &str) -> Result<PathBuf> {
    let mut relative = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::RootDir | Component::CurDir => {}
            Component::Normal(part) => relative.push(part),
            Component::ParentDir | Component::Prefix(_) => {
                bail!("Refusing to extract '{}': path escapes the output directory", path)
            }
        }
    }
    if relative.as_os_str().is_empty() {
        bail!("Refusing to extract '{}': no file name", path);
    }
    Ok(relative)
}
