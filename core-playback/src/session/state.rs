use crate::track::Track;
use serde::Serialize;

/// Read-only view of the playback session.
///
/// Published atomically after every processed command or engine event, so
/// fields changed together are always observed together.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub current_track: Option<Track>,
    pub is_playing: bool,
    pub is_looping: bool,
    pub is_loaded: bool,
    /// Seconds. Within `[0, duration]` whenever `is_loaded`.
    pub position: f64,
    /// Seconds. The catalog's nominal value until the engine reports metadata.
    pub duration: f64,
    #[serde(skip)]
    pub(crate) generation: u64,
}

/// Coarse lifecycle phase derived from [`SessionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackPhase {
    Empty,
    Loading,
    Paused,
    Playing,
}

/// The slice the mini-indicator and tab badge render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub track_id: String,
    pub title: String,
    pub is_playing: bool,
}

impl SessionState {
    /// Load epoch of the current track. Starts at 0 and increases on every
    /// track change and reset.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn phase(&self) -> PlaybackPhase {
        match (&self.current_track, self.is_loaded, self.is_playing) {
            (None, _, _) => PlaybackPhase::Empty,
            (Some(_), _, true) => PlaybackPhase::Playing,
            (Some(_), false, false) => PlaybackPhase::Loading,
            (Some(_), true, false) => PlaybackPhase::Paused,
        }
    }

    /// `position / duration` in `[0, 1]`; 0 while the duration is unknown.
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 && self.position.is_finite() {
            (self.position / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn now_playing(&self) -> Option<NowPlaying> {
        self.current_track.as_ref().map(|track| NowPlaying {
            track_id: track.id.clone(),
            title: track.title.clone(),
            is_playing: self.is_playing,
        })
    }

    pub fn current_track_id(&self) -> Option<&str> {
        self.current_track.as_ref().map(|track| track.id.as_str())
    }
}
