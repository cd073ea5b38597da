//! Native media engine contracts.
//!
//! The core drives one of two structurally different engines, both supplied
//! by the host:
//!
//! - a **streaming element** ([`MediaElementFactory`] / [`MediaElement`]) that
//!   buffers internally and raises one event per field (metadata, time update,
//!   ended), in the style of an HTML audio element;
//! - a **buffered sound object** ([`SoundEngine`] / [`SoundObject`]) that must
//!   be fully created before it can play and reports one combined
//!   [`SoundStatus`] snapshot per polling tick.
//!
//! Implementations only translate calls to the native engine. Generation
//! tracking, reconciliation and error policy live in `core-playback`.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Which engine family backs the playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Streaming element; may start playing before metadata is known.
    Streaming,
    /// Buffered sound object; cannot play until decoding finished.
    #[default]
    Buffered,
}

impl BackendKind {
    /// Returns `true` if the engine rejects `play` before it reports loaded.
    pub fn requires_load_before_play(self) -> bool {
        matches!(self, BackendKind::Buffered)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Streaming => "streaming",
            BackendKind::Buffered => "buffered",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Streaming element
// ============================================================================

/// Events raised by a [`MediaElement`]. Times are in seconds.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaElementEvent {
    /// Metadata finished loading; `duration` may be non-finite for live sources.
    LoadedMetadata { duration: f64 },
    /// Periodic playhead update.
    TimeUpdate { current_time: f64 },
    /// Playback reached the end of the media without the native loop flag.
    Ended,
    /// The element failed to fetch or decode its source.
    Error { message: String },
}

/// Listener installed on a [`MediaElement`].
pub type MediaElementListener = Arc<dyn Fn(MediaElementEvent) + Send + Sync>;

/// Creates one [`MediaElement`] per track.
pub trait MediaElementFactory: Send + Sync {
    /// Construct an element pointing at `src`. Loading starts on [`MediaElement::load`].
    fn create(&self, src: &str) -> Result<Arc<dyn MediaElement>>;
}

/// A single streaming media element.
///
/// All setters are fire-and-forget; only [`MediaElement::play`] reports
/// rejection, mirroring the promise returned by browser audio elements.
#[async_trait::async_trait]
pub trait MediaElement: Send + Sync {
    /// Install the event listener. Replaces any previous listener.
    fn set_listener(&self, listener: MediaElementListener);

    /// Set the native repeat flag.
    fn set_loop(&self, looping: bool);

    /// Begin fetching the source.
    fn load(&self);

    /// Start or resume playback.
    async fn play(&self) -> Result<()>;

    fn pause(&self);

    /// Move the playhead to `seconds`.
    fn set_current_time(&self, seconds: f64);

    /// Drop the source and abort any network activity.
    fn release(&self);
}

// ============================================================================
// Buffered sound object
// ============================================================================

/// Platform audio session configuration applied before creating sounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioMode {
    /// Keep playing when the device mute switch is on.
    pub plays_in_silent_mode: bool,
    /// Keep the session alive while the app is backgrounded.
    pub stays_active_in_background: bool,
    /// Lower other apps' audio instead of stopping it.
    pub duck_others: bool,
}

impl Default for AudioMode {
    fn default() -> Self {
        Self {
            plays_in_silent_mode: true,
            stays_active_in_background: true,
            duck_others: true,
        }
    }
}

/// Status requested when a sound is created.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitialSoundStatus {
    pub should_play: bool,
    pub is_looping: bool,
    /// How often the engine should invoke the status callback.
    pub progress_update_interval: Duration,
}

/// One combined snapshot reported by a [`SoundObject`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SoundStatus {
    pub is_loaded: bool,
    pub position: Duration,
    pub duration: Option<Duration>,
    pub is_playing: bool,
    pub is_looping: bool,
    /// Set on the tick where playback reached the end.
    pub did_just_finish: bool,
}

impl SoundStatus {
    pub fn position_secs(&self) -> f64 {
        self.position.as_secs_f64()
    }

    /// Duration in seconds, `0.0` while unknown.
    pub fn duration_secs(&self) -> f64 {
        self.duration.map(|d| d.as_secs_f64()).unwrap_or(0.0)
    }
}

/// Status callback installed when a sound is created.
pub type SoundStatusCallback = Arc<dyn Fn(SoundStatus) + Send + Sync>;

/// Factory and session owner for buffered sound objects.
#[async_trait::async_trait]
pub trait SoundEngine: Send + Sync {
    /// Configure the platform audio session.
    async fn set_audio_mode(&self, mode: AudioMode) -> Result<()>;

    /// Fetch and decode `uri`. Resolves once the sound is ready to play.
    async fn create_sound(
        &self,
        uri: &str,
        initial: InitialSoundStatus,
        on_status: SoundStatusCallback,
    ) -> Result<Arc<dyn SoundObject>>;
}

/// A decoded, ready-to-play sound.
#[async_trait::async_trait]
pub trait SoundObject: Send + Sync {
    async fn status(&self) -> Result<SoundStatus>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn set_position(&self, position: Duration) -> Result<()>;

    async fn set_is_looping(&self, looping: bool) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// Free native resources. Returns [`BridgeError::AlreadyReleased`](crate::BridgeError::AlreadyReleased)
    /// when called twice.
    async fn unload(&self) -> Result<()>;
}
