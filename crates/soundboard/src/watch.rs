//! Live reload of the registry directory.
//!
//! A `notify` watcher feeds filesystem events into a channel; a dedicated
//! thread turns them into create/write/remove operations on the store:
//! - create: first registration of a name wins, later duplicates are ignored
//! - write: the file is reloaded and replaces the entry unconditionally
//! - remove: the entry loaded from that file is dropped
//!
//! The loop ends on [`WatchHandle::stop`], or with an error if the event
//! channel closes underneath it. Clips already loaded stay playable either way.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, Sender};
use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};

use crate::config::RetryPolicy;
use crate::loader::{ClipFileName, ClipLoader};
use crate::registry::SoundStore;

/// A filesystem change reduced to what the store cares about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryEvent {
    Created(PathBuf),
    Written(PathBuf),
    Removed(PathBuf),
}

/// Map a raw `notify` event onto registry events.
///
/// Renames become a removal of the old name and a creation of the new one.
/// Metadata changes and plain reads are ignored.
pub fn classify(event: &Event) -> Vec<RegistryEvent> {
    let each = |f: fn(PathBuf) -> RegistryEvent| -> Vec<RegistryEvent> {
        event.paths.iter().cloned().map(f).collect()
    };
    match &event.kind {
        EventKind::Create(_) => each(RegistryEvent::Created),
        EventKind::Remove(_) => each(RegistryEvent::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => each(RegistryEvent::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => each(RegistryEvent::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to] => vec![
                RegistryEvent::Removed(from.clone()),
                RegistryEvent::Created(to.clone()),
            ],
            _ => Vec::new(),
        },
        // Backends that cannot tell the two sides of a rename apart.
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|p| {
                if p.exists() {
                    RegistryEvent::Created(p.clone())
                } else {
                    RegistryEvent::Removed(p.clone())
                }
            })
            .collect(),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => each(RegistryEvent::Written),
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => each(RegistryEvent::Written),
        _ => Vec::new(),
    }
}

/// Applies registry events to the store.
#[derive(Clone, Debug)]
pub struct EventHandler {
    store: SoundStore,
    loader: ClipLoader,
    retry: RetryPolicy,
}

impl EventHandler {
    pub fn new(store: SoundStore, loader: ClipLoader, retry: RetryPolicy) -> Self {
        Self {
            store,
            loader,
            retry,
        }
    }

    pub fn handle(&self, event: RegistryEvent) {
        match event {
            RegistryEvent::Created(path) => self.handle_created(&path),
            RegistryEvent::Written(path) => self.handle_written(&path),
            RegistryEvent::Removed(path) => self.handle_removed(&path),
        }
    }

    fn handle_created(&self, path: &Path) {
        tracing::debug!(path = %path.display(), "received creation notification");
        let Some((file, codec)) = parse_sound_file(path) else {
            return;
        };
        if self.store.contains(&file.name) {
            tracing::debug!(path = %path.display(), name = %file.name, "ignored sound file: already registered");
            return;
        }

        match self.loader.load(path, &file.name, codec, self.retry) {
            Ok(clip) => {
                if self.store.put_if_absent(clip) {
                    tracing::info!(name = %file.name, path = %path.display(), "loaded sound");
                } else {
                    tracing::debug!(name = %file.name, "ignored sound file: registered while loading");
                }
            }
            Err(e) => tracing::warn!(path = %path.display(), "failed to load sound file: {e:#}"),
        }
    }

    fn handle_written(&self, path: &Path) {
        tracing::debug!(path = %path.display(), "received change notification");
        let Some((file, codec)) = parse_sound_file(path) else {
            return;
        };

        match self.loader.load(path, &file.name, codec, self.retry) {
            Ok(clip) => {
                let replaced = self.store.put(clip).is_some();
                tracing::info!(name = %file.name, path = %path.display(), replaced, "loaded sound");
            }
            Err(e) => tracing::warn!(path = %path.display(), "failed to load sound file: {e:#}"),
        }
    }

    fn handle_removed(&self, path: &Path) {
        tracing::debug!(path = %path.display(), "received removal notification");
        let Some((file, _)) = parse_sound_file(path) else {
            return;
        };
        if self.store.remove(&file.name).is_none() {
            tracing::debug!(path = %path.display(), "ignored removal: not registered");
            return;
        }
        tracing::info!(name = %file.name, path = %path.display(), "removed sound");
    }
}

/// Parse a watched path, silently skipping directories and unsupported names.
fn parse_sound_file(path: &Path) -> Option<(ClipFileName, clip_player::decode::ClipCodec)> {
    if path.is_dir() {
        return None;
    }
    let Some(file) = ClipFileName::parse(path) else {
        tracing::debug!(path = %path.display(), "ignored invalid sound file");
        return None;
    };
    let Some(codec) = file.codec() else {
        tracing::debug!(path = %path.display(), "ignored file of unknown type");
        return None;
    };
    Some((file, codec))
}

type EventResult = notify::Result<Event>;

/// Running registry watcher.
///
/// Dropping the handle stops the watcher and waits for its thread.
pub struct WatchHandle {
    shutdown_tx: Sender<()>,
    join: Option<JoinHandle<Result<()>>>,
    running: Arc<AtomicBool>,
}

impl WatchHandle {
    /// Subscribe to `dir` and start applying its events through `handler`.
    ///
    /// Fails if the notification subscription cannot be established.
    pub fn start(dir: &Path, handler: EventHandler) -> Result<Self> {
        let (event_tx, event_rx) = crossbeam_channel::unbounded::<EventResult>();
        let mut watcher = notify::recommended_watcher(move |res: EventResult| {
            let _ = event_tx.send(res);
        })
        .context("failed to create registry watcher")?;
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to register registry watcher on {:?}", dir))?;

        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let running = Arc::new(AtomicBool::new(true));
        let running_for_thread = running.clone();
        let join = thread::Builder::new()
            .name("registry-watch".into())
            .spawn(move || {
                let result = watch_loop(watcher, &event_rx, &shutdown_rx, &handler);
                running_for_thread.store(false, Ordering::Release);
                result
            })
            .context("spawn registry watcher thread")?;

        tracing::info!(dir = %dir.display(), "listening to registry updates");
        Ok(Self {
            shutdown_tx,
            join: Some(join),
            running,
        })
    }

    /// `false` once the loop has exited, whether stopped or failed.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop the loop and return how it ended.
    ///
    /// An `Err` means the loop had already died because its event channel closed.
    pub fn stop(mut self) -> Result<()> {
        let _ = self.shutdown_tx.try_send(());
        self.join_loop()
    }

    fn join_loop(&mut self) -> Result<()> {
        match self.join.take() {
            Some(join) => join
                .join()
                .map_err(|_| anyhow!("registry watcher thread panicked"))?,
            None => Ok(()),
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.try_send(());
        if let Err(e) = self.join_loop() {
            tracing::warn!("registry watcher ended with error: {e:#}");
        }
    }
}

/// Apply events until shutdown is requested or the event channel closes.
///
/// `_watcher` is held so the subscription lives exactly as long as the loop.
fn watch_loop<W>(
    _watcher: W,
    events: &Receiver<EventResult>,
    shutdown: &Receiver<()>,
    handler: &EventHandler,
) -> Result<()> {
    loop {
        crossbeam_channel::select! {
            recv(shutdown) -> _ => {
                tracing::info!("registry watcher stopped");
                return Ok(());
            }
            recv(events) -> msg => match msg {
                Ok(Ok(event)) => {
                    for change in classify(&event) {
                        handler.handle(change);
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!("error encountered while polling registry events: {e}");
                }
                Err(_) => {
                    tracing::warn!("failed to poll for registry events - live reload aborted");
                    return Err(anyhow!("registry event channel closed"));
                }
            },
        }
    }
}
