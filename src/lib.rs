//! Workspace umbrella crate.
//!
//! Re-exports the workspace crates so a host application can depend on
//! `audio-session-workspace` alone: implement the [`bridge`] engine traits,
//! build a [`runtime::config::CoreConfig`] and start the session through
//! [`service`].

pub use bridge_traits as bridge;
pub use core_playback as playback;
pub use core_runtime as runtime;
pub use core_service as service;

pub use core_playback::{SessionState, SessionStore, Track, TrackParams};
pub use core_service::{CoreError, CoreService};
