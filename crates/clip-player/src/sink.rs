//! The audio output sink.
//!
//! [`OutputSink`] owns the single CPAL output stream for the process. It is
//! opened once with a fixed rate and buffer and renders one clip at a time;
//! dropping it closes the device.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam_channel::RecvTimeoutError;

use crate::config::SinkConfig;
use crate::decode::DecodedClip;
use crate::device;
use crate::gain::Gain;
use crate::playback::{self, Voice, VoiceSlot};

/// Extra time a render may take beyond the clip length before it is abandoned.
const RENDER_GRACE: Duration = Duration::from_secs(2);

/// Something clips can be rendered through, one at a time.
pub trait Sink {
    /// Render `clip` from its first frame and block until it has been played out.
    fn render(&mut self, clip: &DecodedClip, gain: Gain) -> Result<()>;
}

/// The process audio output device.
///
/// The stream is not `Send` on every host, so the sink must be opened on the
/// thread that renders through it.
pub struct OutputSink {
    stream: cpal::Stream,
    slot: VoiceSlot,
    sample_rate: u32,
    device_name: String,
}

impl OutputSink {
    /// Open the output device described by `cfg` and start its stream.
    pub fn open(cfg: &SinkConfig) -> Result<Self> {
        let host = cpal::default_host();
        let device = device::pick_device(&host, cfg.device.as_deref())?;
        let device_name = device
            .description()
            .map(|d| d.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let config = device::pick_output_config(&device, cfg.sample_rate)
            .with_context(|| format!("query output configs for {device_name}"))?;
        let mut stream_config: cpal::StreamConfig = config.clone().into();
        if let Some(buf) = device::pick_buffer_size(&config, cfg.buffer_frames()) {
            stream_config.buffer_size = buf;
        }
        if stream_config.sample_rate != cfg.sample_rate {
            tracing::warn!(
                requested_hz = cfg.sample_rate,
                output_hz = stream_config.sample_rate,
                "output device does not support the requested sample rate"
            );
        }

        let slot: VoiceSlot = Default::default();
        let stream =
            playback::build_output_stream(&device, &stream_config, config.sample_format(), &slot)
                .with_context(|| format!("open output stream on {device_name}"))?;
        stream.play().context("start output stream")?;

        tracing::info!(
            device = %device_name,
            rate_hz = stream_config.sample_rate,
            channels = stream_config.channels,
            buffer_size = ?stream_config.buffer_size,
            "output sink opened"
        );

        Ok(Self {
            stream,
            slot,
            sample_rate: stream_config.sample_rate,
            device_name,
        })
    }

    fn clear_voice(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}

impl Sink for OutputSink {
    fn render(&mut self, clip: &DecodedClip, gain: Gain) -> Result<()> {
        let (voice, done) = Voice::new(clip.source(), gain);
        {
            let mut slot = self
                .slot
                .lock()
                .map_err(|_| anyhow!("voice slot poisoned"))?;
            *slot = Some(voice);
        }

        let budget = render_budget(clip.frames(), self.sample_rate);
        match done.recv_timeout(budget) {
            // The finished source is dropped here, off the audio thread.
            Ok(_finished) => Ok(()),
            Err(RecvTimeoutError::Timeout) => {
                self.clear_voice();
                Err(anyhow!("render did not complete within {budget:?}"))
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(anyhow!("output stream dropped the clip before it finished"))
            }
        }
    }
}

impl Drop for OutputSink {
    fn drop(&mut self) {
        self.clear_voice();
        if let Err(e) = self.stream.pause() {
            tracing::debug!("pause on close failed: {e}");
        }
        tracing::info!(device = %self.device_name, "output sink closed");
    }
}

/// Upper bound on how long rendering `frames` at the device rate may take.
fn render_budget(frames: usize, output_rate: u32) -> Duration {
    let playout = if output_rate == 0 {
        Duration::ZERO
    } else {
        Duration::from_secs_f64(frames as f64 / output_rate as f64)
    };
    playout + RENDER_GRACE
}
