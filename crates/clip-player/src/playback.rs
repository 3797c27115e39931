//! Playback stage (CPAL output stream).
//!
//! Builds the CPAL output stream and provides the real-time audio callback.
//! The callback:
//! - reads the single active [`Voice`] from a shared slot
//! - applies the voice gain and basic channel mapping (mono↔stereo, best-effort otherwise)
//! - converts `f32` samples to the device sample format
//! - hands the exhausted source back to the renderer and clears the slot, so
//!   clip memory is never freed on the audio thread

use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, Sender};
use cpal::traits::DeviceTrait;

use crate::decode::ClipSource;
use crate::gain::Gain;

/// One clip being played out, plus the channel its source is returned on when it ends.
pub struct Voice {
    source: ClipSource,
    gain: Gain,
    done: Sender<ClipSource>,
}

impl Voice {
    /// Create a voice and the receiver that yields its source once fully rendered.
    pub fn new(source: ClipSource, gain: Gain) -> (Self, Receiver<ClipSource>) {
        let (done, done_rx) = crossbeam_channel::bounded(1);
        (Self { source, gain, done }, done_rx)
    }

    fn finish(self) {
        let Voice { source, done, .. } = self;
        let _ = done.try_send(source);
    }
}

/// Slot holding the voice the callback is currently rendering.
pub type VoiceSlot = Arc<Mutex<Option<Voice>>>;

/// Build a CPAL output stream that renders whatever voice is placed in `slot`.
///
/// An empty slot produces silence. The stream is created paused or playing
/// depending on the host; callers should call `play()`.
pub fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    slot: &VoiceSlot,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, slot),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, slot),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, slot),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, slot),
        other => Err(anyhow!("Unsupported sample format: {other:?}")),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    slot: &VoiceSlot,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels_out = (config.channels as usize).max(1);
    let slot_cb = slot.clone();

    let err_fn = |err| tracing::warn!("stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| match slot_cb.lock() {
            Ok(mut voice) => fill_buffer(&mut voice, data, channels_out),
            Err(_) => data.fill(<T as cpal::Sample>::from_sample::<f32>(0.0)),
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

/// Render interleaved frames from the active voice into `data`.
///
/// When the voice runs out, its source goes back over the completion channel,
/// the slot is cleared and the rest of the buffer is silence.
pub(crate) fn fill_buffer<T>(slot: &mut Option<Voice>, data: &mut [T], channels_out: usize)
where
    T: cpal::Sample + cpal::FromSample<f32>,
{
    let silence = <T as cpal::Sample>::from_sample::<f32>(0.0);

    for out in data.chunks_mut(channels_out) {
        if out.len() < channels_out {
            out.fill(silence);
            continue;
        }
        let Some(voice) = slot.as_mut() else {
            out.fill(silence);
            continue;
        };
        let gain = voice.gain;
        match voice.source.next_frame() {
            Some(frame) => write_mapped(frame, out, gain),
            None => {
                if let Some(finished) = slot.take() {
                    finished.finish();
                }
                out.fill(silence);
            }
        }
    }

    // A clip that ends exactly on the buffer boundary completes here instead
    // of one callback later.
    if slot.as_ref().is_some_and(|v| v.source.is_exhausted()) {
        if let Some(finished) = slot.take() {
            finished.finish();
        }
    }
}

/// Write one source frame into one output frame.
///
/// Mapping rules:
/// - mono → any: duplicate channel 0
/// - stereo → mono: average L/R
/// - other layouts: clamp to the available source channels
fn write_mapped<T>(src: &[f32], out: &mut [T], gain: Gain)
where
    T: cpal::Sample + cpal::FromSample<f32>,
{
    let src_channels = src.len();
    let dst_channels = out.len();
    for (ch, sample) in out.iter_mut().enumerate() {
        let value = match (src_channels, dst_channels) {
            (2, 1) => 0.5 * (src[0] + src[1]),
            (1, _) => src[0],
            _ => src[ch.min(src_channels.saturating_sub(1))],
        };
        *sample = <T as cpal::Sample>::from_sample::<f32>(gain.apply(value));
    }
}
