//! # Backend Adapters
//!
//! One contract over the two native media engines.
//!
//! ## Architecture
//!
//! The session store never talks to a host engine directly. It asks an
//! [`AdapterFactory`] for one [`BackendAdapter`] per track and drives it
//! through a uniform load/play/pause/seek/loop/unload surface. Engine
//! callbacks are normalized into [`AdapterEvent`]s and pushed through the
//! [`EventSink`] the store installed, tagged with the generation the adapter
//! was created under.
//!
//! - [`StreamingAdapter`] wraps a streaming [`MediaElement`](bridge_traits::MediaElement).
//!   Metadata, time updates and end-of-media arrive as separate events;
//!   looping is the element's native repeat flag.
//! - [`BufferedAdapter`] wraps a buffered [`SoundObject`](bridge_traits::SoundObject).
//!   One combined status snapshot arrives per polling tick and is reconciled
//!   against values the store changed optimistically.
//!
//! ## Threading Model
//!
//! Adapters are `Send + Sync` and may be called from the store task while a
//! spawned load is still in flight. Engine callbacks may fire on any thread;
//! the sink forwards them into the store's queue without touching state.

mod buffered;
mod streaming;

pub use buffered::BufferedAdapter;
pub use streaming::StreamingAdapter;

use crate::error::{PlaybackError, Result};
use crate::track::Track;
use async_trait::async_trait;
use bridge_traits::{BackendKind, MediaElementFactory, SoundEngine};
use core_runtime::config::{CoreConfig, PlaybackConfig};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Load epoch. Incremented by the store on every track change and reset.
pub type Generation = u64;

/// Identifies one adapter instance in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(Uuid);

impl HandleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HandleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.0.simple().to_string();
        f.write_str(&id[..8])
    }
}

/// Playback fields reported by the engine. Times are in seconds.
///
/// The streaming element only reports `position`; the buffered engine
/// reports every field on each tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StatusUpdate {
    pub position: f64,
    pub duration: Option<f64>,
    pub is_playing: Option<bool>,
    pub is_looping: Option<bool>,
}

impl StatusUpdate {
    pub fn position(position: f64) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }
}

/// Normalized engine event.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    /// Metadata is known; `duration` in seconds, `0.0` when the engine could
    /// not tell.
    Loaded { duration: f64 },
    Status(StatusUpdate),
    /// Natural end of media with looping disabled.
    Ended,
    /// The resource could not be fetched or decoded.
    LoadFailed { message: String },
}

type Deliver = Arc<dyn Fn(Generation, AdapterEvent) + Send + Sync>;

/// Destination for one adapter's events, stamped with its generation.
#[derive(Clone)]
pub struct EventSink {
    generation: Generation,
    deliver: Deliver,
}

impl EventSink {
    pub fn new<F>(generation: Generation, deliver: F) -> Self
    where
        F: Fn(Generation, AdapterEvent) + Send + Sync + 'static,
    {
        Self {
            generation,
            deliver: Arc::new(deliver),
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn emit(&self, event: AdapterEvent) {
        (self.deliver)(self.generation, event);
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("generation", &self.generation)
            .finish()
    }
}

/// Uniform control surface over one native media engine instance.
///
/// One adapter exists per track. The store creates it, installs a sink with
/// [`subscribe`](BackendAdapter::subscribe), starts [`load`](BackendAdapter::load)
/// in the background and releases it with [`unload`](BackendAdapter::unload)
/// when the track is replaced or the session resets.
///
/// ## Implementation Notes
///
/// - Control commands may be issued while `load` is still running.
/// - After `unload` no further events may be emitted and every command
///   becomes a no-op.
/// - `unload` is idempotent and never fails. Engine errors during release
///   are logged by the adapter.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn handle_id(&self) -> HandleId;

    /// Install the event sink. Events emitted before this call are lost.
    fn subscribe(&self, sink: EventSink);

    /// Begin loading the track.
    ///
    /// The streaming element returns as soon as the fetch is started and
    /// reports [`AdapterEvent::Loaded`] once metadata arrives. The buffered
    /// engine returns after the sound is decoded and has emitted `Loaded`.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::LoadFailed`] if the engine cannot create the sound.
    async fn load(&self) -> Result<()>;

    /// # Errors
    ///
    /// [`PlaybackError::CommandFailed`] if the engine rejects playback
    /// (autoplay policy, interrupted session).
    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    /// Move the playhead to `seconds` (already clamped by the caller).
    async fn seek_to(&self, seconds: f64) -> Result<()>;

    async fn set_loop(&self, looping: bool) -> Result<()>;

    /// Release the engine instance.
    async fn unload(&self);
}

/// Creates the adapter for the backend chosen at startup.
pub trait AdapterFactory: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Construct an adapter for an already sanitized `track`.
    fn create(&self, track: &Track, looping: bool) -> Result<Arc<dyn BackendAdapter>>;
}

#[derive(Clone)]
enum Engine {
    Streaming(Arc<dyn MediaElementFactory>),
    Buffered(Arc<dyn SoundEngine>),
}

/// [`AdapterFactory`] backed by the host engines from [`CoreConfig`].
#[derive(Clone)]
pub struct EngineAdapterFactory {
    engine: Engine,
    config: PlaybackConfig,
}

impl EngineAdapterFactory {
    pub fn streaming(factory: Arc<dyn MediaElementFactory>, config: PlaybackConfig) -> Self {
        Self {
            engine: Engine::Streaming(factory),
            config,
        }
    }

    pub fn buffered(engine: Arc<dyn SoundEngine>, config: PlaybackConfig) -> Self {
        Self {
            engine: Engine::Buffered(engine),
            config,
        }
    }

    /// Picks the engine matching `config.backend`.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::InvalidConfig`] when that engine was not supplied.
    pub fn from_config(config: &CoreConfig) -> Result<Self> {
        match config.backend {
            BackendKind::Streaming => config
                .media_element_factory
                .clone()
                .map(|factory| Self::streaming(factory, config.playback.clone()))
                .ok_or_else(|| {
                    PlaybackError::InvalidConfig("streaming backend needs a MediaElementFactory".into())
                }),
            BackendKind::Buffered => config
                .sound_engine
                .clone()
                .map(|engine| Self::buffered(engine, config.playback.clone()))
                .ok_or_else(|| {
                    PlaybackError::InvalidConfig("buffered backend needs a SoundEngine".into())
                }),
        }
    }
}

impl AdapterFactory for EngineAdapterFactory {
    fn kind(&self) -> BackendKind {
        match self.engine {
            Engine::Streaming(_) => BackendKind::Streaming,
            Engine::Buffered(_) => BackendKind::Buffered,
        }
    }

    fn create(&self, track: &Track, looping: bool) -> Result<Arc<dyn BackendAdapter>> {
        match &self.engine {
            Engine::Streaming(factory) => Ok(Arc::new(StreamingAdapter::new(
                factory.as_ref(),
                &track.audio_url,
                looping,
            )?)),
            Engine::Buffered(engine) => Ok(Arc::new(BufferedAdapter::new(
                Arc::clone(engine),
                &track.audio_url,
                looping,
                self.config.clone(),
            ))),
        }
    }
}

impl fmt::Debug for EngineAdapterFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineAdapterFactory")
            .field("kind", &self.kind())
            .finish()
    }
}
