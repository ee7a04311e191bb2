//! bootpack - initrd packer and remote build driver.
//!
//! Packs a compiled build tree into the flat initrd container the kernel
//! unpacks at boot, wraps kernel and initrd into a bootable ISO, and drives
//! the whole build on a remote host over ssh.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use bootpack::config::Config;

/// Environment variable holding the tracing filter.
const LOG_ENV: &str = "BOOTPACK_LOG";

#[derive(Parser)]
#[command(name = "bootpack")]
#[command(about = "Initrd packer and remote build driver")]
#[command(
    after_help = "QUICK START:\n  bootpack preflight            Check host tools and input trees\n  bootpack build                Build initrd and image\n  bootpack list output/initrd   Inspect the container\n  bootpack remote <path> <user> Build on a remote host"
)]
struct Cli {
    /// Project root that relative paths resolve against
    #[arg(long, global = true, default_value = ".")]
    base_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the initrd and the bootable image (default: both)
    Build {
        #[command(subcommand)]
        target: Option<BuildTarget>,
    },

    /// Run the build pipeline on a remote host: <path> <user> [password]
    Remote {
        /// Remote checkout path, user and optional password
        args: Vec<String>,

        /// Build host (default: BOOTPACK_REMOTE_HOST)
        #[arg(long)]
        host: Option<String>,

        /// ssh port
        #[arg(long)]
        port: Option<u16>,

        /// Run the pipeline in a local shell instead of over ssh
        #[arg(long)]
        local: bool,
    },

    /// List the entries of a container
    List {
        container: PathBuf,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Unpack a container into a directory
    Extract {
        container: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Run preflight checks (verify host tools and inputs before build)
    Preflight {
        /// Fail if any checks fail (exit code 1)
        #[arg(long)]
        strict: bool,
    },

    /// Remove the output directory
    Clean,

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowTarget,
    },
}

#[derive(Subcommand)]
enum BuildTarget {
    /// Pack the initrd container only
    Initrd,
    /// Assemble the ISO only (needs an initrd)
    Image,
}

#[derive(Subcommand)]
enum ShowTarget {
    /// Show current configuration
    Config,
    /// Show the walker passes `build initrd` runs
    Passes,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env from the working directory if present
    dotenvy::dotenv().ok();
    init_logging();

    let base_dir = std::path::absolute(&cli.base_dir)
        .with_context(|| format!("Invalid base directory {}", cli.base_dir.display()))?;
    let config = Config::load(&base_dir);

    match cli.command {
        Commands::Build { target } => {
            let build_target = match target {
                None => commands::build::BuildTarget::All,
                Some(BuildTarget::Initrd) => commands::build::BuildTarget::Initrd,
                Some(BuildTarget::Image) => commands::build::BuildTarget::Image,
            };
            commands::cmd_build(build_target, &config)?;
        }

        Commands::Remote {
            args,
            host,
            port,
            local,
        } => {
            let options = commands::remote::RemoteOptions { host, port, local };
            commands::cmd_remote(&args, options, &config)?;
        }

        Commands::List { container, json } => {
            commands::cmd_list(&container, json)?;
        }

        Commands::Extract { container, output } => {
            commands::cmd_extract(&container, &output)?;
        }

        Commands::Preflight { strict } => {
            commands::cmd_preflight(&config, strict)?;
        }

        Commands::Clean => {
            commands::cmd_clean(&config)?;
        }

        Commands::Show { what } => {
            let show_target = match what {
                ShowTarget::Config => commands::show::ShowTarget::Config,
                ShowTarget::Passes => commands::show::ShowTarget::Passes,
            };
            commands::cmd_show(show_target, &config)?;
        }
    }

    Ok(())
}
