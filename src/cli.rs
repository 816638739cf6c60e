//! Command-line interface for dialign
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Align screenplay dialogue against recorded takes
#[derive(Parser, Debug)]
#[command(name = "dialign", version, about = "Align screenplay dialogue against recorded takes")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Path to the project manifest (default: ./dialign.toml)
    #[arg(long, short = 'p', global = true, value_name = "PATH")]
    pub project: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse a request timeout into whole seconds.
///
/// Accepts bare seconds (`90`) or any `humantime` duration (`90s`, `2m`).
fn parse_timeout_secs(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let secs = match s.parse::<u64>() {
        Ok(secs) => secs,
        Err(_) => humantime::parse_duration(s)
            .map(|d| d.as_secs())
            .map_err(|e| e.to_string())?,
    };
    if secs == 0 {
        return Err("timeout must be at least one second".to_string());
    }
    Ok(secs)
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add audio takes and scripts to the project
    Import {
        /// Files to import (audio: wav, mp3, flac, ogg, m4a; scripts: json)
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,
    },

    /// Run speech recognition on imported audio
    Transcribe {
        /// Maximum concurrent recognition requests
        #[arg(long, short = 'j', value_name = "N")]
        concurrency: Option<usize>,

        /// Per-request timeout (e.g., 90, 90s, 2m)
        #[arg(long, value_name = "DURATION", value_parser = parse_timeout_secs)]
        timeout: Option<u64>,

        /// Language hint for the recognizer
        #[arg(long, value_name = "LANG")]
        language: Option<String>,

        /// Re-run recognition even if a transcript is cached
        #[arg(long)]
        force: bool,
    },

    /// Assign speakers to tracks and align script lines
    Match {
        /// Script to match, by content hash or imported path (default: all)
        #[arg(long, short = 's', value_name = "HASH|PATH")]
        script: Option<String>,
    },

    /// Write matched timecodes as JSON
    Export {
        /// Output file (default: stdout)
        #[arg(long, short = 'o', value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Show project media and alignment results
    Report {
        /// Write the report to a file instead of stdout
        #[arg(long, short = 'o', value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Delete the project cache
    Clean,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}
