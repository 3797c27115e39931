//! Turning registry files into clips.
//!
//! Parses `<name>.<ext>` file names, dispatches to the decoder for the
//! extension, and reports the decoded format.

use std::fs::File;
use std::io::{self, ErrorKind};
use std::path::Path;

use anyhow::{Context, Result};
use clip_player::decode::{self, ClipCodec};

use crate::config::RetryPolicy;
use crate::registry::Clip;

/// A registry file name split at its last `.`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClipFileName {
    /// File stem; the clip's trigger name.
    pub name: String,
    /// Everything after the last `.`.
    pub ext: String,
}

impl ClipFileName {
    /// Split the final path component into name and extension.
    ///
    /// Returns `None` for names without a `.`, with an empty stem, or that are not UTF-8.
    pub fn parse(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        let (name, ext) = file_name.rsplit_once('.')?;
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            ext: ext.to_string(),
        })
    }

    pub fn codec(&self) -> Option<ClipCodec> {
        ClipCodec::from_extension(&self.ext)
    }
}

/// Decodes registry files and checks them against the output rate.
#[derive(Clone, Debug)]
pub struct ClipLoader {
    output_rate: u32,
}

impl ClipLoader {
    pub fn new(output_rate: u32) -> Self {
        Self { output_rate }
    }

    /// Open `path` (retrying per `retry` while another process holds it) and decode it.
    ///
    /// A sample-rate mismatch is only warned about; the clip is not resampled
    /// and will play at the wrong speed.
    pub fn load(&self, path: &Path, name: &str, codec: ClipCodec, retry: RetryPolicy) -> Result<Clip> {
        let file = open_with_retry(path, retry)?;
        let audio = decode::decode_media_source(Box::new(file), codec)
            .with_context(|| format!("decode {:?} as {codec}", path))?;

        let format = audio.format();
        tracing::debug!(
            path = %path.display(),
            format = %codec,
            rate_hz = format.sample_rate,
            channels = format.channels,
            frames = audio.frames(),
            "file report"
        );
        if format.sample_rate != self.output_rate {
            tracing::warn!(
                name,
                clip_hz = format.sample_rate,
                output_hz = self.output_rate,
                "sample rate mismatch: sound may play at an undesired rate"
            );
        }

        Ok(Clip::new(name, path, audio))
    }
}

/// Open a file, backing off between attempts while it is still locked by its writer.
///
/// A missing file is not retried.
fn open_with_retry(path: &Path, retry: RetryPolicy) -> Result<File> {
    retry_open(path, retry, |p: &Path| File::open(p))
}

fn retry_open<T>(
    path: &Path,
    retry: RetryPolicy,
    mut open: impl FnMut(&Path) -> io::Result<T>,
) -> Result<T> {
    let attempts = retry.attempts.max(1);
    let mut attempt = 0;
    loop {
        match open(path) {
            Ok(opened) => return Ok(opened),
            Err(e) if e.kind() != ErrorKind::NotFound && attempt + 1 < attempts => {
                let delay = retry.backoff(attempt);
                tracing::debug!(
                    path = %path.display(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "file not readable yet: {e}"
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err(e).with_context(|| format!("open {:?}", path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{temp_registry, wav_bytes, write_wav};
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    #[test]
    fn parse_splits_at_last_dot() {
        let parsed = ClipFileName::parse(Path::new("/srv/sounds/air.horn.mp3")).unwrap();
        assert_eq!(parsed.name, "air.horn");
        assert_eq!(parsed.ext, "mp3");
        assert_eq!(parsed.codec(), Some(ClipCodec::Mp3));
    }

    #[test]
    fn parse_rejects_malformed_names() {
        assert!(ClipFileName::parse(Path::new("sounds/README")).is_none());
        assert!(ClipFileName::parse(Path::new("sounds/.hidden")).is_none());
        assert!(ClipFileName::parse(Path::new("/")).is_none());
    }

    #[test]
    fn unknown_extension_has_no_codec() {
        let parsed = ClipFileName::parse(Path::new("c.txt")).unwrap();
        assert_eq!(parsed.codec(), None);
        let trailing = ClipFileName::parse(Path::new("d.")).unwrap();
        assert_eq!(trailing.ext, "");
        assert_eq!(trailing.codec(), None);
    }

    #[test]
    fn load_decodes_and_names_clip() {
        let dir = temp_registry("loader");
        let path = write_wav(&dir, "beep.wav", 16_384);
        let clip = ClipLoader::new(44_100)
            .load(&path, "beep", ClipCodec::Wav, RetryPolicy::NONE)
            .unwrap();
        assert_eq!(clip.name(), "beep");
        assert_eq!(clip.path(), path.as_path());
        assert_eq!(clip.audio().format().sample_rate, 44_100);
        assert_eq!(clip.audio().frames(), 4);
    }

    #[test]
    fn load_tolerates_sample_rate_mismatch() {
        let dir = temp_registry("loader-rate");
        let path = dir.join("slow.wav");
        std::fs::write(&path, wav_bytes(8_000, &[1, 2, 3])).unwrap();
        let clip = ClipLoader::new(44_100)
            .load(&path, "slow", ClipCodec::Wav, RetryPolicy::NONE)
            .unwrap();
        assert_eq!(clip.audio().format().sample_rate, 8_000);
    }

    #[test]
    fn load_fails_on_corrupt_file() {
        let dir = temp_registry("loader-bad");
        let path = dir.join("bad.wav");
        std::fs::write(&path, b"RIFF????").unwrap();
        assert!(
            ClipLoader::new(44_100)
                .load(&path, "bad", ClipCodec::Wav, RetryPolicy::NONE)
                .is_err()
        );
    }

    fn quick_retry(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    #[test]
    fn locked_file_is_retried_until_it_opens() {
        let mut calls = 0;
        let opened = retry_open(Path::new("held.wav"), quick_retry(5), |_| {
            calls += 1;
            if calls < 3 {
                Err(io::Error::from(ErrorKind::PermissionDenied))
            } else {
                Ok(calls)
            }
        })
        .unwrap();
        assert_eq!(opened, 3);
    }

    #[test]
    fn retry_gives_up_after_the_last_attempt() {
        let mut calls = 0;
        let result: Result<()> = retry_open(Path::new("held.wav"), quick_retry(4), |_| {
            calls += 1;
            Err(io::Error::from(ErrorKind::PermissionDenied))
        });
        assert!(result.is_err());
        assert_eq!(calls, 4);
    }

    #[test]
    fn missing_file_is_not_retried() {
        let path = PathBuf::from("/nonexistent/soundboard/gone.wav");
        let retry = RetryPolicy {
            attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(1),
        };
        let started = Instant::now();
        assert!(open_with_retry(&path, retry).is_err());
        assert!(started.elapsed() < Duration::from_millis(500));
    }
}
