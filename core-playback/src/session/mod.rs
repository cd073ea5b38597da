//! Playback session: state, store and change notification.

mod notify;
mod state;
mod store;

pub use notify::Subscription;
pub use state::{NowPlaying, PlaybackPhase, SessionState};
pub use store::SessionStore;
