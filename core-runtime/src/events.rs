//! # Playback Event Bus
//!
//! Coarse lifecycle notifications for the audio session, published on a
//! `tokio::sync::broadcast` channel.
//!
//! ## Overview
//!
//! The session store keeps fine-grained state (position ticks, loaded flags)
//! behind its own snapshot and subscription API. The bus only carries the
//! moments other parts of a host care about: a track was chosen, it finished
//! loading, it started, paused, completed, the session was reset, or an
//! engine failed. Analytics, now-playing integrations and toasts listen here.
//!
//! ```text
//! ┌──────────────┐   emit    ┌───────────┐  subscribe  ┌─────────────┐
//! │ SessionStore ├──────────>│ EventBus  ├────────────>│ EventStream │
//! └──────────────┘           │(broadcast)│             └─────────────┘
//!                            └───────────┘
//! ```
//!
//! Emission is best-effort. Having no subscribers is normal and callers
//! ignore the `SendError` it produces.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, EventStream, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(32);
//! let mut completions = EventStream::new(bus.subscribe())
//!     .filter(|event| matches!(event, CoreEvent::Playback(PlaybackEvent::Completed { .. })));
//!
//! bus.emit(CoreEvent::Playback(PlaybackEvent::Completed {
//!     track_id: "rain".to_string(),
//! }))
//! .ok();
//!
//! let event = completions.recv().await.unwrap();
//! assert_eq!(event.description(), "Track completed");
//! # }
//! ```
//!
//! ## Lagging
//!
//! A subscriber that falls more than `capacity` events behind receives
//! `RecvError::Lagged(n)` and keeps going from the oldest retained event.
//! `RecvError::Closed` means every sender was dropped (the session shut down).

use bridge_traits::BackendKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Event types
// ============================================================================

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Lifecycle of the current track.
    Playback(PlaybackEvent),
    /// Lifecycle of the session itself.
    Session(SessionEvent),
}

impl CoreEvent {
    /// Human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Session(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error {
                recoverable: false, ..
            }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::TrackChanged { .. })
            | CoreEvent::Playback(PlaybackEvent::Completed { .. })
            | CoreEvent::Session(_) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// The track the event concerns, if any.
    pub fn track_id(&self) -> Option<&str> {
        match self {
            CoreEvent::Playback(e) => e.track_id(),
            CoreEvent::Session(_) => None,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Lifecycle of the current track.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A new track became current. Playback is stopped until `play`.
    TrackChanged {
        track_id: String,
        title: String,
        /// Load epoch of the new track.
        generation: u64,
    },
    /// The engine finished loading the current track.
    Loaded {
        track_id: String,
        /// Authoritative duration reported by the engine (milliseconds).
        duration_ms: u64,
    },
    /// Playback started or resumed.
    Started { track_id: String },
    /// Playback paused.
    Paused {
        track_id: String,
        /// Position when paused (milliseconds).
        position_ms: u64,
    },
    /// Track reached its natural end with looping disabled.
    Completed { track_id: String },
    /// Session returned to the empty state.
    Reset,
    /// An engine failure that the session absorbed.
    Error {
        track_id: Option<String>,
        message: String,
        /// `true` when picking the track again may succeed.
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::TrackChanged { .. } => "Track changed",
            PlaybackEvent::Loaded { .. } => "Track loaded",
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Completed { .. } => "Track completed",
            PlaybackEvent::Reset => "Session reset",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }

    fn track_id(&self) -> Option<&str> {
        match self {
            PlaybackEvent::TrackChanged { track_id, .. }
            | PlaybackEvent::Loaded { track_id, .. }
            | PlaybackEvent::Started { track_id }
            | PlaybackEvent::Paused { track_id, .. }
            | PlaybackEvent::Completed { track_id } => Some(track_id),
            PlaybackEvent::Error { track_id, .. } => track_id.as_deref(),
            PlaybackEvent::Reset => None,
        }
    }
}

/// Lifecycle of the session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum SessionEvent {
    Initialized { backend: BackendKind },
    ShutDown,
}

impl SessionEvent {
    fn description(&self) -> &str {
        match self {
            SessionEvent::Initialized { .. } => "Session initialized",
            SessionEvent::ShutDown => "Session shut down",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast channel shared by the session and its listeners.
///
/// Cloning the bus clones the sender; every [`EventBus::subscribe`] call
/// creates an independent receiver that sees events emitted after it.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a bus that buffers up to `capacity` events per subscriber.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero (a `broadcast` channel requirement).
    /// [`CoreConfig`](crate::config::CoreConfig) rejects a zero buffer size
    /// before it reaches here.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event, returning how many subscribers received it.
    ///
    /// Fails only when nobody is subscribed.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Convenience for [`CoreEvent::Playback`] emission that ignores the
    /// no-subscriber case.
    pub fn emit_playback(&self, event: PlaybackEvent) {
        let _ = self.sender.send(CoreEvent::Playback(event));
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned from `recv`/`try_recv`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Waits for the next matching event.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the stream fell `n` events behind,
    /// `RecvError::Closed` once every sender is gone.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Returns the next matching event already queued, or `None`.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn started(id: &str) -> CoreEvent {
        CoreEvent::Playback(PlaybackEvent::Started {
            track_id: id.to_string(),
        })
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_an_error() {
        let bus = EventBus::new(8);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.emit(started("a")).is_err());

        // emit_playback swallows the same condition
        bus.emit_playback(PlaybackEvent::Reset);
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_event() {
        let bus = EventBus::default();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        assert_eq!(bus.emit(started("a")).unwrap(), 2);
        assert_eq!(first.recv().await.unwrap(), started("a"));
        assert_eq!(second.recv().await.unwrap(), started("a"));
    }

    #[tokio::test]
    async fn test_stream_filter_skips_non_matching() {
        let bus = EventBus::new(8);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| event.severity() >= EventSeverity::Info);

        bus.emit(started("a")).unwrap();
        bus.emit(CoreEvent::Playback(PlaybackEvent::Completed {
            track_id: "a".to_string(),
        }))
        .unwrap();

        let event = stream.recv().await.unwrap();
        assert_eq!(event.description(), "Track completed");
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber_reports_missed_events() {
        let bus = EventBus::new(2);
        let mut stream = EventStream::new(bus.subscribe());

        for id in ["a", "b", "c", "d"] {
            bus.emit(started(id)).unwrap();
        }

        match stream.try_recv() {
            Some(Err(RecvError::Lagged(n))) => assert_eq!(n, 2),
            other => panic!("expected lag, got {:?}", other),
        }
        assert_eq!(stream.try_recv().unwrap().unwrap(), started("c"));
    }

    #[tokio::test]
    async fn test_closed_when_bus_dropped() {
        let bus = EventBus::new(2);
        let mut stream = EventStream::new(bus.subscribe());
        drop(bus);
        assert!(matches!(stream.recv().await, Err(RecvError::Closed)));
    }

    #[test]
    fn test_error_severity_depends_on_recoverability() {
        let recoverable = CoreEvent::Playback(PlaybackEvent::Error {
            track_id: Some("a".to_string()),
            message: "network".to_string(),
            recoverable: true,
        });
        let fatal = CoreEvent::Playback(PlaybackEvent::Error {
            track_id: None,
            message: "decoder".to_string(),
            recoverable: false,
        });

        assert_eq!(recoverable.severity(), EventSeverity::Warning);
        assert_eq!(fatal.severity(), EventSeverity::Error);
        assert_eq!(recoverable.track_id(), Some("a"));
        assert_eq!(fatal.track_id(), None);
        assert_eq!(
            CoreEvent::Playback(PlaybackEvent::Reset).severity(),
            EventSeverity::Debug
        );
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = CoreEvent::Playback(PlaybackEvent::TrackChanged {
            track_id: "rain".to_string(),
            title: "Rain".to_string(),
            generation: 3,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Playback");
        assert_eq!(json["payload"]["event"], "TrackChanged");
        assert_eq!(json["payload"]["generation"], 3);

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);

        let session = CoreEvent::Session(SessionEvent::Initialized {
            backend: BackendKind::Streaming,
        });
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["payload"]["backend"], "streaming");
    }
}
