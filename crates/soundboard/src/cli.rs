use std::path::PathBuf;

use clap::Parser;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Play short clips from a live-reloaded directory, one at a time.
#[derive(Parser, Debug)]
#[command(name = "soundboard", version = VERSION)]
pub struct Args {
    /// Optional config file (TOML); flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory sound files are loaded from (default: sounds)
    #[arg(long)]
    pub registry: Option<PathBuf>,

    /// Output sample rate in Hz (default: 44100)
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// How many sounds may queue up at once (default: 8)
    #[arg(long)]
    pub queue_size: Option<usize>,

    /// Base-2 logarithmic volume, e.g. -1 halves the amplitude (default: device level)
    #[arg(long, allow_negative_numbers = true)]
    pub volume: Option<f32>,

    /// Minimum milliseconds between any two accepted commands (default: 2000)
    #[arg(long)]
    pub global_rate_limit_ms: Option<u64>,

    /// Minimum milliseconds between two accepted commands from one user (default: 10000)
    #[arg(long)]
    pub user_rate_limit_ms: Option<u64>,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,
}
