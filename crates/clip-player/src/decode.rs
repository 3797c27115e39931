//! Codec dispatch and whole-clip decoding.
//!
//! Clips are short, so they are decoded once into memory as interleaved `f32`
//! and replayed from there. Symphonia does the container probing and decoding:
//! - the file extension selects one of the supported [`ClipCodec`]s
//! - the extension is passed as a probe hint
//! - every packet of the default track is decoded into one sample buffer

use std::fmt;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// The fixed set of clip encodings the player accepts, keyed by file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClipCodec {
    Flac,
    Mp3,
    Ogg,
    Wav,
}

impl ClipCodec {
    pub const ALL: [ClipCodec; 4] = [ClipCodec::Flac, ClipCodec::Mp3, ClipCodec::Ogg, ClipCodec::Wav];

    /// Map a file extension to a codec. Matching is exact (`"WAV"` is not `"wav"`).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "flac" => Some(ClipCodec::Flac),
            "mp3" => Some(ClipCodec::Mp3),
            "ogg" => Some(ClipCodec::Ogg),
            "wav" => Some(ClipCodec::Wav),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ClipCodec::Flac => "flac",
            ClipCodec::Mp3 => "mp3",
            ClipCodec::Ogg => "ogg",
            ClipCodec::Wav => "wav",
        }
    }

    fn hint(self) -> Hint {
        let mut hint = Hint::new();
        hint.with_extension(self.extension());
        hint
    }
}

impl fmt::Display for ClipCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ClipCodec::Flac => "FLAC",
            ClipCodec::Mp3 => "MP3",
            ClipCodec::Ogg => "OGG/VORBIS",
            ClipCodec::Wav => "WAV",
        };
        f.write_str(label)
    }
}

/// Native sample format of a decoded clip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClipFormat {
    pub sample_rate: u32,
    pub channels: usize,
}

/// A fully decoded clip held in memory as interleaved `f32` samples.
///
/// Cloning is cheap; the sample data is shared.
#[derive(Clone, Debug)]
pub struct DecodedClip {
    codec: ClipCodec,
    format: ClipFormat,
    samples: Arc<[f32]>,
}

impl DecodedClip {
    pub fn new(codec: ClipCodec, format: ClipFormat, samples: Vec<f32>) -> Self {
        Self {
            codec,
            format,
            samples: samples.into(),
        }
    }

    pub fn codec(&self) -> ClipCodec {
        self.codec
    }

    pub fn format(&self) -> ClipFormat {
        self.format
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.format.channels.max(1)
    }

    /// Playback length at the clip's native rate.
    pub fn duration(&self) -> Duration {
        if self.format.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.format.sample_rate as f64)
    }

    /// A read cursor over the clip, positioned at frame zero.
    pub fn source(&self) -> ClipSource {
        ClipSource {
            samples: self.samples.clone(),
            channels: self.format.channels.max(1),
            pos: 0,
        }
    }
}

/// Forward read cursor over a [`DecodedClip`].
#[derive(Clone, Debug)]
pub struct ClipSource {
    samples: Arc<[f32]>,
    channels: usize,
    pos: usize,
}

impl ClipSource {
    pub fn remaining_frames(&self) -> usize {
        (self.samples.len() - self.pos) / self.channels
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_frames() == 0
    }

    /// Return the next interleaved frame and advance, or `None` at the end.
    pub fn next_frame(&mut self) -> Option<&[f32]> {
        let end = self.pos + self.channels;
        if end > self.samples.len() {
            return None;
        }
        let start = self.pos;
        self.pos = end;
        Some(&self.samples[start..end])
    }
}

/// Open `path` and decode it as `codec`.
pub fn decode_file(path: &Path, codec: ClipCodec) -> Result<DecodedClip> {
    let file = File::open(path).with_context(|| format!("open {:?}", path))?;
    decode_media_source(Box::new(file), codec)
}

/// Decode an already opened source completely into memory.
///
/// Fails when the container cannot be probed, has no default track, does not
/// declare its rate or channel layout, or yields no audio at all.
pub fn decode_media_source(source: Box<dyn MediaSource>, codec: ClipCodec) -> Result<DecodedClip> {
    let mss = MediaSourceStream::new(source, Default::default());

    let probed = symphonia::default::get_probe().format(
        &codec.hint(),
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| anyhow!("No default audio track"))?;
    let track_id = track.id;

    let channels = track
        .codec_params
        .channels
        .ok_or_else(|| anyhow!("Unknown channels"))?
        .count();

    let rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| anyhow!("Unknown sample rate"))?;

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(_) => break, // EOF
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(_) => continue,
        };

        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, *decoded.spec());
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());
    }

    if samples.len() < channels {
        return Err(anyhow!("No audio decoded"));
    }

    Ok(DecodedClip::new(
        codec,
        ClipFormat {
            sample_rate: rate,
            channels,
        },
        samples,
    ))
}
