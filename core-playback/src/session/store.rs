//! # Session Store
//!
//! The single owner of "what is playing".
//!
//! ## Architecture
//!
//! ```text
//!  SessionStore (cloneable handle)          session task
//!  ┌──────────────────────────┐   mpsc    ┌───────────────────────────┐
//!  │ set_track / play / ...   ├──────────>│ SessionState + adapter    │
//!  └──────────────────────────┘           │                           │
//!  adapter EventSink (generation-tagged)──>│ drop stale generations    │
//!                                          └──────┬──────────┬─────────┘
//!                          watch snapshot <───────┘          └──> subscribers, EventBus
//! ```
//!
//! Commands and engine events share one queue and are applied by one task,
//! so state is never touched concurrently. Every adapter is created under a
//! generation; its events carry that number and are discarded once a newer
//! track or a reset has superseded it. There is no other cancellation.
//!
//! Load runs in a spawned task and is never timed out. Every other engine
//! command is awaited on the session task, bounded by
//! [`PlaybackConfig::command_timeout`], so commands reach the engine in
//! issue order.

use super::notify::{Subscribers, Subscription};
use super::state::SessionState;
use crate::adapter::{AdapterEvent, AdapterFactory, BackendAdapter, EventSink, Generation};
use crate::error::{PlaybackError, Result};
use crate::track::Track;
use bridge_traits::BackendKind;
use core_runtime::config::PlaybackConfig;
use core_runtime::events::{EventBus, PlaybackEvent};
use core_runtime::logging::redact_uri;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

enum Command {
    SetTrack(Track),
    OpenTrack(Track),
    Play,
    Pause,
    TogglePlayPause,
    ToggleLoop,
    SeekTo(f64),
    Reset,
}

enum Message {
    Command(Command),
    Adapter {
        generation: Generation,
        event: AdapterEvent,
    },
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to the playback session.
///
/// Cheap to clone. Command methods never block and never fail: they queue
/// the command and return. Engine failures are logged and leave the state
/// consistent. The session task stops when the last handle is dropped or
/// [`shutdown`](SessionStore::shutdown) is called, releasing the engine.
#[derive(Clone)]
pub struct SessionStore {
    tx: mpsc::UnboundedSender<Message>,
    state: watch::Receiver<SessionState>,
    subscribers: Arc<Subscribers>,
    kind: BackendKind,
}

impl SessionStore {
    /// Starts the session task on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::RuntimeUnavailable`] outside a tokio runtime
    /// - [`PlaybackError::InvalidConfig`] if `config` does not validate
    pub fn start(
        factory: Arc<dyn AdapterFactory>,
        config: PlaybackConfig,
        events: Option<EventBus>,
    ) -> Result<Self> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| PlaybackError::RuntimeUnavailable)?;
        config.validate()?;

        let kind = factory.kind();
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::default());
        let subscribers = Arc::new(Subscribers::default());

        let actor = SessionActor {
            state: SessionState::default(),
            active: None,
            play_intent: false,
            factory,
            config,
            kind,
            events,
            tx: tx.downgrade(),
            published: state_tx,
            subscribers: Arc::clone(&subscribers),
        };
        runtime.spawn(actor.run(rx));

        info!(backend = %kind, "Playback session started");

        Ok(Self {
            tx,
            state: state_rx,
            subscribers,
            kind,
        })
    }

    pub fn backend(&self) -> BackendKind {
        self.kind
    }

    fn send(&self, command: Command) {
        if self.tx.send(Message::Command(command)).is_err() {
            debug!("Playback session closed, command dropped");
        }
    }

    /// Makes `track` current and starts loading it. Playback stays paused
    /// until [`play`](Self::play).
    pub fn set_track(&self, track: Track) {
        self.send(Command::SetTrack(track));
    }

    /// Like [`set_track`](Self::set_track), but keeps the session untouched
    /// when `track` is already current.
    pub fn open_track(&self, track: Track) {
        self.send(Command::OpenTrack(track));
    }

    /// Idempotent. On the buffered engine a play issued while loading is
    /// remembered and applied once the track is loaded.
    pub fn play(&self) {
        self.send(Command::Play);
    }

    pub fn pause(&self) {
        self.send(Command::Pause);
    }

    pub fn toggle_play_pause(&self) {
        self.send(Command::TogglePlayPause);
    }

    pub fn toggle_loop(&self) {
        self.send(Command::ToggleLoop);
    }

    /// Seeks to `seconds`, clamped to `[0, duration]`. Non-finite input is
    /// ignored.
    pub fn seek_to(&self, seconds: f64) {
        self.send(Command::SeekTo(seconds));
    }

    /// Releases the engine and returns to the empty state.
    pub fn reset(&self) {
        self.send(Command::Reset);
    }

    /// Latest published state.
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// A receiver that observes every published state.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Calls `callback` with the selected slice whenever it changes.
    ///
    /// The callback runs on the session task and must not block.
    pub fn subscribe<T, S, F>(&self, selector: S, callback: F) -> Subscription
    where
        T: PartialEq + Send + 'static,
        S: Fn(&SessionState) -> T + Send + 'static,
        F: FnMut(&T) + Send + 'static,
    {
        let state = self.state.clone();
        self.subscribers
            .subscribe(move || state.borrow().clone(), selector, callback)
    }

    /// Resolves once every message queued before this call was processed.
    pub async fn flush(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(Message::Flush(ack))
            .map_err(|_| PlaybackError::SessionClosed)?;
        done.await.map_err(|_| PlaybackError::SessionClosed)
    }

    /// Waits until a published state satisfies `predicate`.
    pub async fn wait_for<F>(&self, predicate: F) -> Result<SessionState>
    where
        F: FnMut(&SessionState) -> bool,
    {
        let mut rx = self.state.clone();
        let state = rx
            .wait_for(predicate)
            .await
            .map_err(|_| PlaybackError::SessionClosed)?;
        Ok(state.clone())
    }

    /// Releases the engine and stops the session task. Later commands are
    /// dropped.
    pub async fn shutdown(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(Message::Shutdown(ack))
            .map_err(|_| PlaybackError::SessionClosed)?;
        done.await.map_err(|_| PlaybackError::SessionClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("backend", &self.kind)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

struct SessionActor {
    state: SessionState,
    active: Option<Arc<dyn BackendAdapter>>,
    /// `play` arrived before the buffered engine finished loading.
    play_intent: bool,
    factory: Arc<dyn AdapterFactory>,
    config: PlaybackConfig,
    kind: BackendKind,
    events: Option<EventBus>,
    tx: mpsc::WeakUnboundedSender<Message>,
    published: watch::Sender<SessionState>,
    subscribers: Arc<Subscribers>,
}

impl SessionActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Message>) {
        while let Some(message) = rx.recv().await {
            match message {
                Message::Command(command) => self.handle_command(command).await,
                Message::Adapter { generation, event } => {
                    self.handle_adapter_event(generation, event).await
                }
                Message::Flush(ack) => {
                    let _ = ack.send(());
                    continue;
                }
                Message::Shutdown(ack) => {
                    self.release_active().await;
                    self.publish();
                    info!("Playback session shut down");
                    let _ = ack.send(());
                    return;
                }
            }
            self.publish();
        }

        self.release_active().await;
        debug!("Playback session handles dropped, session stopped");
    }

    fn publish(&self) {
        let changed = self.published.send_if_modified(|current| {
            if *current == self.state {
                false
            } else {
                *current = self.state.clone();
                true
            }
        });
        if changed {
            self.subscribers.notify(&self.state);
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.events {
            bus.emit_playback(event);
        }
    }

    fn track_id(&self) -> String {
        self.state
            .current_track_id()
            .unwrap_or_default()
            .to_string()
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::SetTrack(track) => self.set_track(track).await,
            Command::OpenTrack(track) => {
                if self.state.current_track_id() == Some(track.id.as_str()) {
                    debug!(track_id = %track.id, "Track already current");
                } else {
                    self.set_track(track).await;
                }
            }
            Command::Play => self.play().await,
            Command::Pause => self.pause().await,
            Command::TogglePlayPause => {
                if self.state.is_playing || self.play_intent {
                    self.pause().await;
                } else {
                    self.play().await;
                }
            }
            Command::ToggleLoop => self.toggle_loop().await,
            Command::SeekTo(seconds) => self.seek_to(seconds).await,
            Command::Reset => self.reset().await,
        }
    }

    async fn set_track(&mut self, track: Track) {
        let track = track.sanitized(&self.config);
        self.state.generation += 1;
        let generation = self.state.generation;

        self.release_active().await;

        self.play_intent = false;
        self.state.is_playing = false;
        self.state.is_loaded = false;
        self.state.position = 0.0;
        self.state.duration = track.duration;
        self.state.current_track = Some(track.clone());

        info!(
            generation,
            track_id = %track.id,
            backend = %self.kind,
            uri = redact_uri(&track.audio_url),
            "Track changed"
        );
        self.emit(PlaybackEvent::TrackChanged {
            track_id: track.id.clone(),
            title: track.title.clone(),
            generation,
        });

        let adapter = match self.factory.create(&track, self.state.is_looping) {
            Ok(adapter) => adapter,
            Err(err) => {
                warn!(generation, track_id = %track.id, error = %err, "Failed to create engine");
                self.emit(PlaybackEvent::Error {
                    track_id: Some(track.id.clone()),
                    message: err.to_string(),
                    recoverable: true,
                });
                return;
            }
        };

        adapter.subscribe(self.sink(generation));
        self.active = Some(Arc::clone(&adapter));

        let tx = self.tx.clone();
        tokio::spawn(async move {
            if let Err(err) = adapter.load().await {
                if let Some(tx) = tx.upgrade() {
                    let _ = tx.send(Message::Adapter {
                        generation,
                        event: AdapterEvent::LoadFailed {
                            message: err.to_string(),
                        },
                    });
                }
            }
        });
    }

    fn sink(&self, generation: Generation) -> EventSink {
        let tx = self.tx.clone();
        EventSink::new(generation, move |generation, event| {
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Message::Adapter { generation, event });
            }
        })
    }

    /// Runs one engine command with the configured timeout. Failures are
    /// logged and reported as `false`.
    async fn run_command<F>(&self, command: &'static str, fut: F) -> bool
    where
        F: Future<Output = Result<()>>,
    {
        let generation = self.state.generation;
        match timeout(self.config.command_timeout, fut).await {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                warn!(generation, command, error = %err, "Engine command failed");
                false
            }
            Err(_) => {
                let err = PlaybackError::CommandTimedOut {
                    command,
                    timeout_ms: self.config.command_timeout.as_millis() as u64,
                };
                warn!(generation, command, error = %err, "Engine command timed out");
                false
            }
        }
    }

    async fn release_active(&mut self) {
        let Some(adapter) = self.active.take() else {
            return;
        };

        let handle = adapter.handle_id();
        debug!(%handle, "Releasing engine handle");
        if timeout(self.config.command_timeout, adapter.unload())
            .await
            .is_err()
        {
            warn!(%handle, "Engine release timed out");
        }
    }

    async fn play(&mut self) {
        if self.state.is_playing {
            return;
        }
        let Some(adapter) = self.active.clone() else {
            debug!("Play ignored, no track");
            return;
        };

        if self.kind.requires_load_before_play() && !self.state.is_loaded {
            debug!(generation = self.state.generation, "Play deferred until loaded");
            self.play_intent = true;
            return;
        }

        if self.run_command("play", adapter.play()).await {
            self.play_intent = false;
            self.state.is_playing = true;
            self.emit(PlaybackEvent::Started {
                track_id: self.track_id(),
            });
        }
    }

    async fn pause(&mut self) {
        self.play_intent = false;
        let Some(adapter) = self.active.clone() else {
            self.state.is_playing = false;
            return;
        };

        if self.run_command("pause", adapter.pause()).await {
            let was_playing = std::mem::replace(&mut self.state.is_playing, false);
            if was_playing {
                self.emit(PlaybackEvent::Paused {
                    track_id: self.track_id(),
                    position_ms: (self.state.position * 1000.0) as u64,
                });
            }
        }
    }

    async fn toggle_loop(&mut self) {
        let looping = !self.state.is_looping;
        match self.active.clone() {
            Some(adapter) => {
                if self.run_command("set_loop", adapter.set_loop(looping)).await {
                    self.state.is_looping = looping;
                }
            }
            None => self.state.is_looping = looping,
        }
    }

    async fn seek_to(&mut self, seconds: f64) {
        if !seconds.is_finite() {
            debug!(seconds, "Ignoring non-finite seek");
            return;
        }

        let target = seconds.clamp(0.0, self.state.duration.max(0.0));
        if let Some(adapter) = self.active.clone() {
            if !self.run_command("seek", adapter.seek_to(target)).await {
                return;
            }
        }
        self.state.position = target;
    }

    async fn reset(&mut self) {
        self.release_active().await;
        self.play_intent = false;
        self.state = SessionState {
            generation: self.state.generation + 1,
            ..Default::default()
        };
        info!(generation = self.state.generation, "Session reset");
        self.emit(PlaybackEvent::Reset);
    }

    async fn handle_adapter_event(&mut self, generation: Generation, event: AdapterEvent) {
        if generation != self.state.generation {
            trace!(
                generation,
                current = self.state.generation,
                ?event,
                "Dropping stale engine event"
            );
            return;
        }

        match event {
            AdapterEvent::Loaded { duration } => {
                self.state.is_loaded = true;
                if duration.is_finite() && duration > 0.0 {
                    self.state.duration = duration;
                }
                self.state.position = self.state.position.clamp(0.0, self.state.duration);
                debug!(generation, duration, "Track loaded");
                self.emit(PlaybackEvent::Loaded {
                    track_id: self.track_id(),
                    duration_ms: (self.state.duration * 1000.0) as u64,
                });

                if self.play_intent {
                    self.play_intent = false;
                    self.play().await;
                }
            }
            AdapterEvent::Status(update) => {
                if self.state.is_loaded {
                    if let Some(duration) = update.duration {
                        if duration.is_finite() && duration > 0.0 {
                            self.state.duration = duration;
                        }
                    }
                }
                if update.position.is_finite() {
                    let position = update.position.max(0.0);
                    self.state.position = if self.state.is_loaded {
                        position.min(self.state.duration)
                    } else {
                        position
                    };
                }
                if let Some(playing) = update.is_playing {
                    if self.state.is_loaded || !self.kind.requires_load_before_play() {
                        self.state.is_playing = playing;
                    }
                }
                if let Some(looping) = update.is_looping {
                    self.state.is_looping = looping;
                }
            }
            AdapterEvent::Ended => {
                if self.state.is_looping {
                    return;
                }
                self.state.is_playing = false;
                debug!(generation, "Track completed");
                self.emit(PlaybackEvent::Completed {
                    track_id: self.track_id(),
                });
            }
            AdapterEvent::LoadFailed { message } => {
                warn!(
                    generation,
                    track_id = %self.track_id(),
                    error = %message,
                    "Track failed to load"
                );
                self.play_intent = false;
                self.state.is_playing = false;
                self.emit(PlaybackEvent::Error {
                    track_id: self.state.current_track_id().map(str::to_string),
                    message,
                    recoverable: true,
                });
            }
        }
    }
}
