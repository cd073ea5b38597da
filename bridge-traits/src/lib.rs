//! # Host Bridge Traits
//!
//! Contracts the host application implements so the audio session core can
//! drive native media engines without knowing which platform it runs on.
//!
//! ## Traits
//!
//! ### Media engines
//! - [`MediaElementFactory`](playback::MediaElementFactory) / [`MediaElement`](playback::MediaElement) -
//!   streaming element with per-field events and a native repeat flag
//! - [`SoundEngine`](playback::SoundEngine) / [`SoundObject`](playback::SoundObject) -
//!   buffered sound object with combined status snapshots
//!
//! ### Utilities
//! - [`LoggerSink`](log::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! Engines report failures as [`BridgeError`](error::BridgeError). The core
//! never surfaces these to UI consumers; it logs them and keeps the session
//! state consistent. Releasing an already-released handle should return
//! [`BridgeError::AlreadyReleased`] so the core can treat it as success.
//!
//! ## Thread Safety
//!
//! Every trait requires `Send + Sync`. Engine callbacks may fire from any
//! thread; the core marshals them onto its own task before touching state.

pub mod error;
pub mod log;
pub mod playback;

pub use error::BridgeError;

pub use log::{LogEntry, LogLevel, LoggerSink};
pub use playback::{
    AudioMode, BackendKind, InitialSoundStatus, MediaElement, MediaElementEvent,
    MediaElementFactory, MediaElementListener, SoundEngine, SoundObject, SoundStatus,
    SoundStatusCallback,
};
