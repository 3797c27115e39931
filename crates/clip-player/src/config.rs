use std::time::Duration;

/// Output sink parameters, fixed for the lifetime of the opened device.
#[derive(Clone, Debug)]
pub struct SinkConfig {
    /// Requested output sample rate in Hz.
    pub sample_rate: u32,
    /// Latency budget used to size the device buffer.
    pub latency: Duration,
    /// Output device substring match; `None` selects the host default.
    pub device: Option<String>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            latency: Duration::from_millis(100),
            device: None,
        }
    }
}

impl SinkConfig {
    /// Device buffer size in frames for the configured rate and latency budget.
    pub fn buffer_frames(&self) -> u32 {
        let frames = (self.sample_rate as f64 * self.latency.as_secs_f64()).ceil();
        (frames as u32).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_frames_follows_latency_budget() {
        let cfg = SinkConfig::default();
        assert_eq!(cfg.buffer_frames(), 4_410);
    }

    #[test]
    fn buffer_frames_never_zero() {
        let cfg = SinkConfig {
            latency: Duration::ZERO,
            ..SinkConfig::default()
        };
        assert_eq!(cfg.buffer_frames(), 1);
    }
}
