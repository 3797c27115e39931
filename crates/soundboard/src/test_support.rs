//! Fixtures shared by the unit tests.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use clip_player::decode::{ClipCodec, ClipFormat, DecodedClip};
use clip_player::gain::Gain;
use clip_player::sink::Sink;

use crate::registry::Clip;

pub(crate) fn temp_registry(tag: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!(
        "soundboard-{tag}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&root).unwrap();
    root
}

/// Build a 16-bit PCM mono WAV file in memory.
pub(crate) fn wav_bytes(rate: u32, samples: &[i16]) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&rate.to_le_bytes());
    out.extend_from_slice(&(rate * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

/// Write a short mono WAV clip whose first sample is `first`.
pub(crate) fn write_wav(dir: &Path, file_name: &str, first: i16) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, wav_bytes(44_100, &[first, 0, 0, 0])).unwrap();
    path
}

/// Write the 16-frame mono FLAC fixture; its first sample decodes to 0.5.
pub(crate) fn write_flac(dir: &Path, file_name: &str) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, include_bytes!("../../clip-player/testdata/tone.flac")).unwrap();
    path
}

pub(crate) fn clip(name: &str, samples: &[f32]) -> Clip {
    Clip::new(
        name,
        format!("{name}.wav"),
        DecodedClip::new(
            ClipCodec::Wav,
            ClipFormat {
                sample_rate: 44_100,
                channels: 1,
            },
            samples.to_vec(),
        ),
    )
}

/// One completed render as seen by [`RecordingSink`].
#[derive(Clone, Debug)]
pub(crate) struct Render {
    pub first_sample: Option<f32>,
    pub gain: Gain,
    pub started: Instant,
    pub finished: Instant,
}

#[derive(Default)]
struct RecorderState {
    renders: Vec<Render>,
    active: usize,
    max_active: usize,
    started: usize,
    held: bool,
}

/// Shared view onto what a [`RecordingSink`] rendered.
#[derive(Clone, Default)]
pub(crate) struct Recorder {
    state: Arc<(Mutex<RecorderState>, Condvar)>,
}

impl Recorder {
    pub(crate) fn sink(&self, render_time: Duration) -> RecordingSink {
        RecordingSink {
            recorder: self.clone(),
            render_time,
        }
    }

    /// Block renders at their start until [`Recorder::release`].
    pub(crate) fn hold(&self) {
        self.state.0.lock().unwrap().held = true;
    }

    pub(crate) fn release(&self) {
        let (lock, cv) = &*self.state;
        lock.lock().unwrap().held = false;
        cv.notify_all();
    }

    pub(crate) fn renders(&self) -> Vec<Render> {
        self.state.0.lock().unwrap().renders.clone()
    }

    pub(crate) fn max_active(&self) -> usize {
        self.state.0.lock().unwrap().max_active
    }

    /// Wait until at least `n` renders have started.
    pub(crate) fn wait_started(&self, n: usize, timeout: Duration) -> bool {
        self.wait_for(timeout, |s| s.started >= n)
    }

    /// Wait until at least `n` renders have completed.
    pub(crate) fn wait_finished(&self, n: usize, timeout: Duration) -> bool {
        self.wait_for(timeout, |s| s.renders.len() >= n)
    }

    fn wait_for(&self, timeout: Duration, done: impl Fn(&RecorderState) -> bool) -> bool {
        let (lock, cv) = &*self.state;
        let (guard, _) = cv
            .wait_timeout_while(lock.lock().unwrap(), timeout, |s| !done(s))
            .unwrap();
        done(&guard)
    }
}

/// Instrumented sink that records render windows instead of playing audio.
pub(crate) struct RecordingSink {
    recorder: Recorder,
    render_time: Duration,
}

impl Sink for RecordingSink {
    fn render(&mut self, clip: &DecodedClip, gain: Gain) -> Result<()> {
        let (lock, cv) = &*self.recorder.state;
        let started = {
            let mut s = lock.lock().unwrap();
            s.active += 1;
            s.max_active = s.max_active.max(s.active);
            s.started += 1;
            cv.notify_all();
            let _released = cv.wait_while(s, |s| s.held).unwrap();
            Instant::now()
        };

        let mut source = clip.source();
        let first_sample = source.next_frame().map(|f| f[0]);
        std::thread::sleep(self.render_time);

        let mut s = lock.lock().unwrap();
        s.active -= 1;
        s.renders.push(Render {
            first_sample,
            gain,
            started,
            finished: Instant::now(),
        });
        cv.notify_all();
        Ok(())
    }
}
