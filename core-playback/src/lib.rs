//! # Playback Session Module
//!
//! The shared audio playback session: one process-wide authority over what
//! is currently playing, consumed by several independent UI surfaces.
//!
//! ## Overview
//!
//! This module handles:
//! - The [`Track`] value object and sanitizing of catalog/navigation input
//! - Two [`BackendAdapter`] variants over the host's streaming element and
//!   buffered sound engine
//! - The [`SessionStore`] state machine with generation-tagged engine events
//! - Selector-based change notification for UI consumers
//!
//! ## Usage
//!
//! ```ignore
//! use core_playback::{EngineAdapterFactory, SessionStore, Track};
//! use core_runtime::config::PlaybackConfig;
//! use std::sync::Arc;
//!
//! let factory = EngineAdapterFactory::buffered(sound_engine, PlaybackConfig::default());
//! let store = SessionStore::start(Arc::new(factory), PlaybackConfig::default(), None)?;
//!
//! let _badge = store.subscribe(|s| s.now_playing(), |slice| render_badge(slice));
//! store.set_track(Track::new("rain", "Rain", 180.0, "https://cdn.example.com/rain.mp3"));
//! store.play();
//! ```

pub mod adapter;
pub mod error;
pub mod session;
pub mod track;

pub use adapter::{
    AdapterEvent, AdapterFactory, BackendAdapter, BufferedAdapter, EngineAdapterFactory,
    EventSink, Generation, HandleId, StatusUpdate, StreamingAdapter,
};
pub use error::{PlaybackError, Result};
pub use session::{NowPlaying, PlaybackPhase, SessionState, SessionStore, Subscription};
pub use track::{format_time, Track, TrackParams};
