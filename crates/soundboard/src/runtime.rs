//! The soundboard as a whole.
//!
//! [`Soundboard`] wires the store, scanner, watcher, rate limiter and playback
//! worker together and exposes the operations a chat client needs.

use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use clip_player::gain::Gain;
use clip_player::sink::{OutputSink, Sink};

use crate::config::SoundboardConfig;
use crate::listing::render_sound_list;
use crate::loader::ClipLoader;
use crate::player::{PlaybackQueue, WorkerHandle, playback_queue, spawn_worker};
use crate::rate_limit::RateLimiter;
use crate::registry::SoundStore;
use crate::scan::{ScanReport, scan_registry};
use crate::watch::{EventHandler, WatchHandle};

/// What happened to a trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Passed the rate limiter and was offered to the playback queue.
    ///
    /// The request may still be dropped if the queue is full or the name is unknown.
    Accepted,
    /// Rejected by the global or per-caller cool-down.
    RateLimited,
}

pub struct Soundboard {
    config: SoundboardConfig,
    store: SoundStore,
    loader: ClipLoader,
    queue: PlaybackQueue,
    limiter: RateLimiter,
    worker: Mutex<Option<WorkerHandle>>,
    watcher: Mutex<Option<WatchHandle>>,
}

impl Soundboard {
    /// Create the registry directory if needed and open the output device.
    pub fn open(config: SoundboardConfig) -> Result<Self> {
        let sink_config = config.sink.clone();
        Self::open_with_sink(config, move || OutputSink::open(&sink_config))
    }

    /// Like [`Soundboard::open`], rendering through the sink `open_sink` returns.
    ///
    /// `open_sink` is called once, on the playback worker thread.
    pub fn open_with_sink<S, F>(config: SoundboardConfig, open_sink: F) -> Result<Self>
    where
        S: Sink,
        F: FnOnce() -> Result<S> + Send + 'static,
    {
        config.validate()?;
        std::fs::create_dir_all(&config.registry_path).with_context(|| {
            format!(
                "failed to create registry directory {:?}",
                config.registry_path
            )
        })?;

        let store = SoundStore::new();
        let (queue, queue_rx) = playback_queue(config.queue_size);
        let gain = Gain::from_volume(config.volume);
        let worker = spawn_worker(store.clone(), queue_rx, gain, open_sink)?;
        tracing::info!(
            registry = %config.registry_path.display(),
            queue_size = config.queue_size,
            gain = gain.factor(),
            "soundboard ready"
        );

        Ok(Self {
            loader: ClipLoader::new(config.sample_rate()),
            limiter: RateLimiter::new(config.global_cooldown, config.user_cooldown),
            config,
            store,
            queue,
            worker: Mutex::new(Some(worker)),
            watcher: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &SoundboardConfig {
        &self.config
    }

    pub fn store(&self) -> &SoundStore {
        &self.store
    }

    /// Load every clip currently in the registry directory.
    pub fn scan(&self) -> Result<ScanReport> {
        let report = scan_registry(&self.config.registry_path, &self.store, &self.loader)?;
        tracing::info!(
            loaded = report.loaded,
            ignored = report.ignored,
            failed = report.failed,
            "registry scanned"
        );
        Ok(report)
    }

    /// Scan at startup. An unreadable registry is logged and leaves the store
    /// as it was; the watcher may still fill it later.
    pub fn initial_scan(&self) -> ScanReport {
        self.scan().unwrap_or_else(|e| {
            tracing::warn!("initial registry scan failed: {e:#}");
            ScanReport::default()
        })
    }

    /// Keep the store in sync with the registry directory.
    ///
    /// Fails if the subscription cannot be established. Calling it while
    /// already watching is a no-op; a watcher that died is replaced.
    pub fn start_watching(&self) -> Result<()> {
        let mut watcher = lock(&self.watcher);
        if watcher.as_ref().is_some_and(WatchHandle::is_running) {
            return Ok(());
        }
        if let Some(dead) = watcher.take() {
            if let Err(e) = dead.stop() {
                tracing::warn!("previous registry watcher ended with error: {e:#}");
            }
        }
        let handler = EventHandler::new(
            self.store.clone(),
            self.loader.clone(),
            self.config.open_retry,
        );
        *watcher = Some(WatchHandle::start(&self.config.registry_path, handler)?);
        Ok(())
    }

    /// Stop live reload. Returns the watcher's error if it had already died.
    pub fn stop_watching(&self) -> Result<()> {
        match lock(&self.watcher).take() {
            Some(handle) => handle.stop(),
            None => Ok(()),
        }
    }

    /// `true` while a watcher is subscribed and its loop is alive.
    pub fn is_watching(&self) -> bool {
        lock(&self.watcher)
            .as_ref()
            .is_some_and(WatchHandle::is_running)
    }

    /// Rate-limit `caller`, then queue `name` for playback.
    pub fn trigger(&self, caller: &str, name: &str) -> TriggerOutcome {
        if !self.admit(caller) {
            return TriggerOutcome::RateLimited;
        }
        self.queue.enqueue(name);
        TriggerOutcome::Accepted
    }

    /// Run `caller` through the cool-downs, recording the command if it passes.
    pub fn admit(&self, caller: &str) -> bool {
        let admitted = self.limiter.check_and_record(caller);
        if !admitted {
            tracing::debug!(caller, "rate limited");
        }
        admitted
    }

    /// Names of all loaded clips, in no particular order.
    pub fn list_names(&self) -> Vec<String> {
        self.store.names()
    }

    /// The markdown list of loaded clips.
    pub fn sound_list(&self) -> String {
        render_sound_list(&self.list_names())
    }

    /// Stop the watcher and the playback worker and close the output device.
    ///
    /// A clip that is playing finishes first; queued requests are discarded.
    /// Returns the watcher's error if it had died while running.
    pub fn shutdown(&self) -> Result<()> {
        let watch_result = self.stop_watching();
        if let Some(worker) = lock(&self.worker).take() {
            worker.stop();
            tracing::info!("playback worker stopped");
        }
        watch_result
    }
}

impl Drop for Soundboard {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!("registry watcher ended with error: {e:#}");
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
