//! diskbuf CLI
//!
//! Command-line tools for diskbuf buffer folders.
//!
//! # Commands
//!
//! - `inspect` - List buffer files and their read status
//! - `verify` - Check every buffer file for torn records and stray entries
//! - `evict` - Apply the age and size caps offline

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// diskbuf buffer folder tools.
#[derive(Parser)]
#[command(name = "diskbuf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the buffer root (the directory holding `spans`, `metrics`, `logs`)
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List buffer files with their age, size and read status
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Seconds a file accepts appends
        #[arg(long, default_value_t = 30)]
        write_age_secs: u64,

        /// Seconds before a file may be read
        #[arg(long, default_value_t = 33)]
        min_read_age_secs: u64,

        /// Seconds after which a file is discarded unread
        #[arg(long, default_value_t = 18 * 60 * 60)]
        max_read_age_secs: u64,
    },

    /// Verify that every buffer file parses cleanly
    Verify,

    /// Delete files past the max read age or over the folder size cap
    Evict {
        /// Seconds after which a file is discarded unread
        #[arg(long, default_value_t = 18 * 60 * 60)]
        max_read_age_secs: u64,

        /// Maximum bytes per signal folder
        #[arg(long, default_value_t = 10 * 1024 * 1024)]
        max_folder_size: u64,

        /// Dry run - show what would be done
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect {
            format,
            write_age_secs,
            min_read_age_secs,
            max_read_age_secs,
        } => {
            let path = cli.path.ok_or("Buffer root required for inspect")?;
            let thresholds = commands::inspect::Thresholds::from_secs(
                write_age_secs,
                min_read_age_secs,
                max_read_age_secs,
            );
            commands::inspect::run(&path, thresholds, &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Buffer root required for verify")?;
            commands::verify::run(&path)?;
        }
        Commands::Evict {
            max_read_age_secs,
            max_folder_size,
            dry_run,
        } => {
            let path = cli.path.ok_or("Buffer root required for evict")?;
            commands::evict::run(&path, max_folder_size, max_read_age_secs, dry_run)?;
        }
        Commands::Version => {
            println!("diskbuf CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("diskbuf core v{}", diskbuf_core::VERSION);
        }
    }

    Ok(())
}
