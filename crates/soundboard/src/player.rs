//! Playback queue and worker.
//!
//! Triggers push clip names into a bounded queue without ever blocking; when
//! the queue is full the newest request is dropped. A single worker thread
//! owns the output sink and renders queued clips strictly one after another.

use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, anyhow};
use clip_player::gain::Gain;
use clip_player::sink::Sink;
use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};

use crate::registry::SoundStore;

/// Producer side of the playback queue. Cheap to clone.
#[derive(Clone, Debug)]
pub struct PlaybackQueue {
    tx: Sender<String>,
    capacity: usize,
}

/// Create a queue holding at most `capacity` pending names, and its consumer end.
pub fn playback_queue(capacity: usize) -> (PlaybackQueue, Receiver<String>) {
    let capacity = capacity.max(1);
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    (PlaybackQueue { tx, capacity }, rx)
}

impl PlaybackQueue {
    /// Try to append `name`. Never blocks; a full queue drops the request and returns `false`.
    pub fn enqueue(&self, name: &str) -> bool {
        match self.tx.try_send(name.to_string()) {
            Ok(()) => {
                tracing::debug!(name, "queued sound");
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::debug!(name, "queue overflow - ignoring sound request");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::debug!(name, "playback worker stopped - ignoring sound request");
                false
            }
        }
    }

    /// Pending requests (best-effort snapshot).
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Handle to the playback worker thread.
///
/// Dropping the handle stops the worker the same way [`WorkerHandle::stop`] does.
pub struct WorkerHandle {
    shutdown_tx: Sender<()>,
    join: Option<JoinHandle<()>>,
}

/// Spawn the playback worker.
///
/// `open_sink` runs on the worker thread so the sink never leaves it; this
/// call returns only after the sink opened, or with its error.
pub fn spawn_worker<S, F>(
    store: SoundStore,
    queue: Receiver<String>,
    gain: Gain,
    open_sink: F,
) -> Result<WorkerHandle>
where
    S: Sink,
    F: FnOnce() -> Result<S> + Send + 'static,
{
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
    let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<()>>(1);

    let join = thread::Builder::new()
        .name("playback-worker".into())
        .spawn(move || {
            let mut sink = match open_sink() {
                Ok(sink) => {
                    let _ = ready_tx.send(Ok(()));
                    sink
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            worker_loop(&mut sink, &store, &queue, &shutdown_rx, gain);
        })
        .context("spawn playback worker thread")?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(WorkerHandle {
            shutdown_tx,
            join: Some(join),
        }),
        Ok(Err(e)) => {
            let _ = join.join();
            Err(e.context("failed to open speaker"))
        }
        Err(_) => {
            let _ = join.join();
            Err(anyhow!("playback worker exited during startup"))
        }
    }
}

impl WorkerHandle {
    /// Stop the worker after the current render (if any) finishes.
    ///
    /// Requests still queued are discarded. The sink is closed when this returns.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.shutdown_tx.try_send(());
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                tracing::warn!("playback worker panicked");
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop<S: Sink>(
    sink: &mut S,
    store: &SoundStore,
    queue: &Receiver<String>,
    shutdown: &Receiver<()>,
    gain: Gain,
) {
    tracing::info!("starting play queue");

    loop {
        // A pending shutdown wins over queued requests.
        if !matches!(shutdown.try_recv(), Err(TryRecvError::Empty)) {
            break;
        }
        crossbeam_channel::select! {
            recv(shutdown) -> _ => break,
            recv(queue) -> msg => match msg {
                Ok(name) => play(sink, store, &name, gain),
                Err(_) => break,
            },
        }
    }

    let discarded = queue.try_iter().count();
    tracing::info!(discarded, "play queue stopped");
}

/// Render one clip by name; unknown names are skipped.
fn play<S: Sink>(sink: &mut S, store: &SoundStore, name: &str, gain: Gain) {
    let Some(clip) = store.get(name) else {
        tracing::debug!(name, "ignoring play request - no such sound");
        return;
    };

    tracing::info!(name, "playing sound");
    if let Err(e) = sink.render(clip.audio(), gain) {
        tracing::warn!(name, "failed to play sound: {e:#}");
    }
}
