//! Command-line interface for voxlink
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Real-time voice session client
#[derive(Parser, Debug)]
#[command(
    name = "voxlink",
    version,
    about = "Real-time voice session client for conversational AI services"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: info, -vv: full diagnostics)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Audio input device (e.g., pipewire)
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<String>,

    /// Audio output device (default: system default)
    #[arg(long, value_name = "DEVICE")]
    pub output_device: Option<String>,

    /// Model identifier for the live session
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Prebuilt voice for audio responses (e.g., Zephyr)
    #[arg(long, value_name = "VOICE")]
    pub voice: Option<String>,

    /// System instruction override
    #[arg(long, value_name = "TEXT")]
    pub system: Option<String>,

    /// End the session after this long. Examples: 30s, 5m, 1h30m
    #[arg(long = "for", value_name = "DURATION", value_parser = parse_session_duration)]
    pub duration: Option<Duration>,
}

/// Parse a session duration string.
///
/// Supports any duration format accepted by `humantime`: bare numbers
/// (seconds), single-unit (`30s`, `5m`, `2h`), and compound (`1h30m`).
fn parse_session_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    // Bare number → seconds
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available audio input and output devices
    Devices,

    /// Check credentials and audio devices
    Check,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
