//! Configuration loading and resolution.
//!
//! Values come from, in increasing priority: built-in defaults, an optional
//! TOML file, then command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clip_player::config::SinkConfig;
use serde::Deserialize;

use crate::cli::Args;

/// Fully resolved soundboard configuration.
#[derive(Clone, Debug)]
pub struct SoundboardConfig {
    /// Directory holding `<name>.<ext>` clips.
    pub registry_path: PathBuf,
    /// Output device settings (rate, latency budget, device match).
    pub sink: SinkConfig,
    /// Maximum number of pending playback requests.
    pub queue_size: usize,
    /// Base-2 logarithmic volume; `None` plays at device level.
    pub volume: Option<f32>,
    /// Minimum time between any two accepted triggers.
    pub global_cooldown: Duration,
    /// Minimum time between two accepted triggers from one caller.
    pub user_cooldown: Duration,
    /// How long the watcher waits for a writer to release a new file.
    pub open_retry: RetryPolicy,
}

impl Default for SoundboardConfig {
    fn default() -> Self {
        Self {
            registry_path: PathBuf::from("sounds"),
            sink: SinkConfig::default(),
            queue_size: 8,
            volume: None,
            global_cooldown: Duration::from_secs(2),
            user_cooldown: Duration::from_secs(10),
            open_retry: RetryPolicy::default(),
        }
    }
}

impl SoundboardConfig {
    /// Output sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sink.sample_rate
    }

    /// Reject settings the soundboard cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.queue_size == 0 {
            return Err(anyhow!("queue size must be at least 1"));
        }
        if self.sink.sample_rate == 0 {
            return Err(anyhow!("sample rate must be positive"));
        }
        if let Some(volume) = self.volume {
            if !volume.is_finite() {
                return Err(anyhow!("volume must be a finite number"));
            }
        }
        Ok(())
    }

    /// Resolve defaults, the optional config file named by `args`, then flag overrides.
    pub fn resolve(args: &Args) -> Result<Self> {
        let file = match args.config.as_deref() {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        let mut cfg = Self::default();
        cfg.apply_file(file);
        cfg.apply_args(args);
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(path) = file.registry {
            self.registry_path = PathBuf::from(path);
        }
        if let Some(rate) = file.sample_rate {
            self.sink.sample_rate = rate;
        }
        if let Some(ms) = file.latency_ms {
            self.sink.latency = Duration::from_millis(ms);
        }
        if let Some(device) = file.device {
            self.sink.device = normalize_device_name(Some(device));
        }
        if let Some(size) = file.queue_size {
            self.queue_size = size;
        }
        if file.volume.is_some() {
            self.volume = file.volume;
        }
        if let Some(ms) = file.global_rate_limit_ms {
            self.global_cooldown = Duration::from_millis(ms);
        }
        if let Some(ms) = file.user_rate_limit_ms {
            self.user_cooldown = Duration::from_millis(ms);
        }
    }

    fn apply_args(&mut self, args: &Args) {
        if let Some(path) = args.registry.as_ref() {
            self.registry_path = path.clone();
        }
        if let Some(rate) = args.sample_rate {
            self.sink.sample_rate = rate;
        }
        if args.device.is_some() {
            self.sink.device = normalize_device_name(args.device.clone());
        }
        if let Some(size) = args.queue_size {
            self.queue_size = size;
        }
        if args.volume.is_some() {
            self.volume = args.volume;
        }
        if let Some(ms) = args.global_rate_limit_ms {
            self.global_cooldown = Duration::from_millis(ms);
        }
        if let Some(ms) = args.user_rate_limit_ms {
            self.user_cooldown = Duration::from_millis(ms);
        }
    }
}

/// Bounded exponential backoff for opening a file another process may still hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 6,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub const NONE: RetryPolicy = RetryPolicy {
        attempts: 1,
        initial_backoff: Duration::ZERO,
        max_backoff: Duration::ZERO,
    };

    /// Delay to sleep after failed attempt number `attempt` (zero-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// On-disk TOML configuration; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Registry directory.
    pub registry: Option<String>,
    /// Output sample rate (Hz).
    pub sample_rate: Option<u32>,
    /// Output buffer latency budget (ms).
    pub latency_ms: Option<u64>,
    /// Output device substring match.
    pub device: Option<String>,
    /// Playback queue capacity.
    pub queue_size: Option<usize>,
    /// Base-2 logarithmic volume.
    pub volume: Option<f32>,
    /// Global trigger cool-down (ms).
    pub global_rate_limit_ms: Option<u64>,
    /// Per-caller trigger cool-down (ms).
    pub user_rate_limit_ms: Option<u64>,
}

impl FileConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        Self::parse(&raw).with_context(|| format!("parse config {:?}", path))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str::<FileConfig>(raw)?)
    }
}

fn normalize_device_name(device: Option<String>) -> Option<String> {
    device.and_then(|name| {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
