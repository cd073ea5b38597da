//! Buffered sound-object adapter.
//!
//! The engine reports one combined [`SoundStatus`] per polling tick. A tick
//! produced before a seek/play/pause/loop command took effect would otherwise
//! drag the UI back to the old value for one interval, so every successful
//! command records an optimistic value that wins over disagreeing snapshots
//! until the snapshot catches up or the optimistic window expires.

use super::{AdapterEvent, BackendAdapter, EventSink, HandleId, StatusUpdate};
use crate::error::{PlaybackError, Result};
use async_trait::async_trait;
use bridge_traits::{
    BackendKind, BridgeError, InitialSoundStatus, SoundEngine, SoundObject, SoundStatus,
    SoundStatusCallback,
};
use core_runtime::config::PlaybackConfig;
use core_runtime::logging::redact_uri;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy)]
struct Pending<T> {
    value: T,
    at: Instant,
}

impl<T: Copy> Pending<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            at: Instant::now(),
        }
    }
}

/// Values the store changed recently and the engine may not reflect yet.
#[derive(Debug, Default)]
struct Reconciler {
    looping: bool,
    position: Option<Pending<f64>>,
    playing: Option<Pending<bool>>,
    looping_override: Option<Pending<bool>>,
    /// Seek requested before the sound existed.
    deferred_seek: Option<f64>,
    /// Bumped by every `seek_to`; a deferred seek is replayed only if no
    /// newer seek arrived while load was still talking to the engine.
    seeks: u64,
}

impl Reconciler {
    /// Merges one engine snapshot with the pending optimistic values.
    fn reconcile(
        &mut self,
        status: &SoundStatus,
        now: Instant,
        window: Duration,
        tolerance: f64,
    ) -> StatusUpdate {
        let fresh = |at: Instant| now.saturating_duration_since(at) < window;

        let snapshot_position = status.position_secs();
        let position = match self.position {
            Some(p) if fresh(p.at) && (snapshot_position - p.value).abs() > tolerance => p.value,
            _ => {
                self.position = None;
                snapshot_position
            }
        };

        let is_playing = match self.playing {
            Some(p) if fresh(p.at) && status.is_playing != p.value => p.value,
            _ => {
                self.playing = None;
                status.is_playing
            }
        };

        let is_looping = match self.looping_override {
            Some(p) if fresh(p.at) && status.is_looping != p.value => p.value,
            _ => {
                self.looping_override = None;
                status.is_looping
            }
        };

        StatusUpdate {
            position,
            duration: status.duration.map(|d| d.as_secs_f64()),
            is_playing: Some(is_playing),
            is_looping: Some(is_looping),
        }
    }
}

struct Inner {
    id: HandleId,
    sink: Mutex<Option<EventSink>>,
    sound: Mutex<Option<Arc<dyn SoundObject>>>,
    released: AtomicBool,
    reconciler: Mutex<Reconciler>,
    window: Duration,
    tolerance: f64,
}

impl Inner {
    fn emit(&self, event: AdapterEvent) {
        let sink = self.sink.lock().clone();
        if let Some(sink) = sink {
            sink.emit(event);
        }
    }

    fn on_status(&self, status: SoundStatus) {
        if self.released.load(Ordering::Acquire) || !status.is_loaded {
            return;
        }

        let (update, ended) = {
            let mut reconciler = self.reconciler.lock();
            let mut update =
                reconciler.reconcile(&status, Instant::now(), self.window, self.tolerance);
            let looping = update.is_looping.unwrap_or(reconciler.looping);
            let ended = status.did_just_finish && !looping;
            if ended {
                reconciler.playing = None;
                update.is_playing = Some(false);
            }
            (update, ended)
        };

        trace!(handle = %self.id, position = update.position, "Sound status");
        self.emit(AdapterEvent::Status(update));
        if ended {
            self.emit(AdapterEvent::Ended);
        }
    }

    fn current_sound(&self) -> Option<Arc<dyn SoundObject>> {
        if self.released.load(Ordering::Acquire) {
            return None;
        }
        self.sound.lock().clone()
    }
}

/// Drives one buffered [`SoundObject`].
///
/// The sound is only created in [`load`](BackendAdapter::load); until then
/// seeks and loop changes are remembered and applied once it exists.
pub struct BufferedAdapter {
    engine: Arc<dyn SoundEngine>,
    uri: String,
    config: PlaybackConfig,
    inner: Arc<Inner>,
}

impl BufferedAdapter {
    pub fn new(
        engine: Arc<dyn SoundEngine>,
        uri: &str,
        looping: bool,
        config: PlaybackConfig,
    ) -> Self {
        let inner = Arc::new(Inner {
            id: HandleId::new(),
            sink: Mutex::new(None),
            sound: Mutex::new(None),
            released: AtomicBool::new(false),
            reconciler: Mutex::new(Reconciler {
                looping,
                ..Default::default()
            }),
            window: config.optimistic_window,
            tolerance: config.seek_tolerance,
        });

        Self {
            engine,
            uri: uri.to_string(),
            config,
            inner,
        }
    }

    fn status_callback(&self) -> SoundStatusCallback {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        Arc::new(move |status| {
            if let Some(inner) = inner.upgrade() {
                inner.on_status(status);
            }
        })
    }

    async fn release_sound(id: HandleId, sound: Arc<dyn SoundObject>) {
        if let Err(err) = sound.stop().await {
            log_release_error(id, "stop", err);
        }
        if let Err(err) = sound.unload().await {
            log_release_error(id, "unload", err);
        }
    }
}

/// Classifies a failed release step. An already released sound is the
/// desired end state and yields `None`.
fn release_error(step: &'static str, err: BridgeError) -> Option<PlaybackError> {
    if err.is_already_released() {
        None
    } else {
        Some(PlaybackError::UnloadFailed(format!("{}: {}", step, err)))
    }
}

fn log_release_error(id: HandleId, step: &'static str, err: BridgeError) {
    match release_error(step, err) {
        None => debug!(handle = %id, step, "Sound already released"),
        Some(err) => warn!(handle = %id, step, error = %err, "Failed to release sound"),
    }
}

#[async_trait]
impl BackendAdapter for BufferedAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Buffered
    }

    fn handle_id(&self) -> HandleId {
        self.inner.id
    }

    fn subscribe(&self, sink: EventSink) {
        *self.inner.sink.lock() = Some(sink);
    }

    async fn load(&self) -> Result<()> {
        let id = self.inner.id;
        if self.inner.released.load(Ordering::Acquire) {
            return Ok(());
        }

        if let Err(err) = self.engine.set_audio_mode(self.config.audio_mode).await {
            let err = PlaybackError::from(err);
            warn!(handle = %id, error = %err, "Failed to configure audio session");
        }

        let looping = self.inner.reconciler.lock().looping;
        let initial = InitialSoundStatus {
            should_play: false,
            is_looping: looping,
            progress_update_interval: self.config.status_interval,
        };

        debug!(handle = %id, uri = redact_uri(&self.uri), "Creating sound");
        let sound = self
            .engine
            .create_sound(&self.uri, initial, self.status_callback())
            .await
            .map_err(|err| PlaybackError::LoadFailed {
                uri: redact_uri(&self.uri).to_string(),
                reason: err.to_string(),
            })?;

        // `unload` flips `released` and `seek_to` decides to defer while
        // holding the slot lock, so the deferred seek is taken exactly once
        let deferred = {
            let mut slot = self.inner.sound.lock();
            if self.inner.released.load(Ordering::Acquire) {
                None
            } else {
                *slot = Some(Arc::clone(&sound));
                let mut reconciler = self.inner.reconciler.lock();
                let seek = reconciler.deferred_seek.take();
                if let Some(seconds) = seek {
                    reconciler.position = Some(Pending::new(seconds));
                }
                Some((seek, reconciler.seeks))
            }
        };
        let Some((deferred_seek, seeks)) = deferred else {
            debug!(handle = %id, "Released while loading, discarding sound");
            Self::release_sound(id, sound).await;
            return Ok(());
        };

        if let Some(seconds) = deferred_seek {
            if self.inner.reconciler.lock().seeks != seeks {
                debug!(handle = %id, seconds, "Deferred seek superseded");
            } else if let Err(err) = sound.set_position(Duration::from_secs_f64(seconds)).await {
                let err = PlaybackError::from(err);
                warn!(handle = %id, error = %err, "Failed to apply deferred seek");
            }
        }

        let current_looping = self.inner.reconciler.lock().looping;
        if current_looping != looping {
            if let Err(err) = sound.set_is_looping(current_looping).await {
                let err = PlaybackError::from(err);
                warn!(handle = %id, error = %err, "Failed to apply loop flag after load");
            }
        }

        let duration = match sound.status().await.map_err(PlaybackError::from) {
            Ok(status) => status.duration_secs(),
            Err(err) => {
                warn!(handle = %id, error = %err, "Sound status unavailable after load");
                0.0
            }
        };

        self.inner.emit(AdapterEvent::Loaded { duration });
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        if self.inner.released.load(Ordering::Acquire) {
            return Ok(());
        }
        let sound = self
            .inner
            .current_sound()
            .ok_or_else(|| PlaybackError::command("play", "sound is not loaded"))?;

        sound
            .play()
            .await
            .map_err(|err| PlaybackError::command("play", err))?;
        self.inner.reconciler.lock().playing = Some(Pending::new(true));
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        let Some(sound) = self.inner.current_sound() else {
            return Ok(());
        };

        sound
            .pause()
            .await
            .map_err(|err| PlaybackError::command("pause", err))?;
        self.inner.reconciler.lock().playing = Some(Pending::new(false));
        Ok(())
    }

    async fn seek_to(&self, seconds: f64) -> Result<()> {
        let sound = {
            let slot = self.inner.sound.lock();
            let mut reconciler = self.inner.reconciler.lock();
            reconciler.seeks += 1;
            match slot.as_ref() {
                Some(sound) if !self.inner.released.load(Ordering::Acquire) => {
                    reconciler.deferred_seek = None;
                    Arc::clone(sound)
                }
                _ => {
                    reconciler.deferred_seek = Some(seconds);
                    return Ok(());
                }
            }
        };

        sound
            .set_position(Duration::from_secs_f64(seconds.max(0.0)))
            .await
            .map_err(|err| PlaybackError::command("seek", err))?;
        self.inner.reconciler.lock().position = Some(Pending::new(seconds));
        Ok(())
    }

    async fn set_loop(&self, looping: bool) -> Result<()> {
        let Some(sound) = self.inner.current_sound() else {
            self.inner.reconciler.lock().looping = looping;
            return Ok(());
        };

        sound
            .set_is_looping(looping)
            .await
            .map_err(|err| PlaybackError::command("set_loop", err))?;
        let mut reconciler = self.inner.reconciler.lock();
        reconciler.looping = looping;
        reconciler.looping_override = Some(Pending::new(looping));
        Ok(())
    }

    async fn unload(&self) {
        let id = self.inner.id;
        let sound = {
            let mut slot = self.inner.sound.lock();
            if self.inner.released.swap(true, Ordering::AcqRel) {
                debug!(handle = %id, "Sound adapter already released");
                return;
            }
            slot.take()
        };
        self.inner.sink.lock().take();

        match sound {
            Some(sound) => {
                Self::release_sound(id, sound).await;
                debug!(handle = %id, "Released sound");
            }
            None => debug!(handle = %id, "Released before sound was created"),
        }
    }
}
