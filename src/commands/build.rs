//! Build command - packs the initrd and assembles the image.

use anyhow::Result;
use std::time::Instant;

use bootpack::config::Config;
use bootpack::timing::{format_elapsed, Timer};
use bootpack::{image, initrd};

/// Build target for the build command.
pub enum BuildTarget {
    /// Initrd, then image
    All,
    /// Initrd container only
    Initrd,
    /// Bootable image only (needs an existing initrd)
    Image,
}

/// Execute the build command.
pub fn cmd_build(target: BuildTarget, config: &Config) -> Result<()> {
    match target {
        BuildTarget::All => build_all(config),
        BuildTarget::Initrd => {
            let timer = Timer::start("initrd");
            initrd::build_initrd(config)?;
            timer.finish();
            Ok(())
        }
        BuildTarget::Image => {
            let timer = Timer::start("image");
            image::create_image(config)?;
            timer.finish();
            Ok(())
        }
    }
}

fn build_all(config: &Config) -> Result<()> {
    let build_start = Instant::now();

    let timer = Timer::start("initrd");
    let container = initrd::build_initrd(config)?;
    timer.finish();
    println!();

    let timer = Timer::start("image");
    let iso = image::create_image(config)?;
    timer.finish();

    println!("\n=== Build Complete ({}) ===", format_elapsed(build_start.elapsed()));
    println!("  Initrd: {}", container.display());
    println!("  Image:  {}", iso.display());
    Ok(())
}
