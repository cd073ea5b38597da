//! Streaming-element adapter.

use super::{AdapterEvent, BackendAdapter, EventSink, HandleId, StatusUpdate};
use crate::error::{PlaybackError, Result};
use async_trait::async_trait;
use bridge_traits::{BackendKind, MediaElement, MediaElementEvent, MediaElementFactory};
use core_runtime::logging::redact_uri;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Drives one streaming [`MediaElement`].
///
/// The element buffers internally, so `play` is forwarded even before
/// metadata arrives. Looping is the element's native repeat flag: with it
/// set the element never raises `Ended`.
pub struct StreamingAdapter {
    id: HandleId,
    element: Arc<dyn MediaElement>,
    src: String,
    shared: Arc<Shared>,
}

struct Shared {
    id: HandleId,
    sink: Mutex<Option<EventSink>>,
    looping: AtomicBool,
    loaded: AtomicBool,
    released: AtomicBool,
}

impl Shared {
    fn emit(&self, event: AdapterEvent) {
        let sink = self.sink.lock().clone();
        if let Some(sink) = sink {
            sink.emit(event);
        }
    }

    fn on_element_event(&self, event: MediaElementEvent) {
        if self.released.load(Ordering::Acquire) {
            return;
        }

        match event {
            MediaElementEvent::LoadedMetadata { duration } => {
                self.loaded.store(true, Ordering::Release);
                let duration = if duration.is_finite() && duration > 0.0 {
                    duration
                } else {
                    0.0
                };
                self.emit(AdapterEvent::Loaded { duration });
            }
            MediaElementEvent::TimeUpdate { current_time } if current_time.is_finite() => {
                self.emit(AdapterEvent::Status(StatusUpdate::position(current_time)));
            }
            MediaElementEvent::TimeUpdate { .. } => {}
            MediaElementEvent::Ended => {
                if !self.looping.load(Ordering::Acquire) {
                    self.emit(AdapterEvent::Ended);
                }
            }
            MediaElementEvent::Error { message } => {
                if self.loaded.load(Ordering::Acquire) {
                    warn!(handle = %self.id, error = %message, "Media element error after load");
                } else {
                    self.emit(AdapterEvent::LoadFailed { message });
                }
            }
        }
    }
}

impl StreamingAdapter {
    /// Creates the element for `src` and installs the event listener.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::LoadFailed`] if the host cannot construct an element.
    pub fn new(factory: &dyn MediaElementFactory, src: &str, looping: bool) -> Result<Self> {
        let element = factory
            .create(src)
            .map_err(|err| PlaybackError::LoadFailed {
                uri: redact_uri(src).to_string(),
                reason: err.to_string(),
            })?;

        let id = HandleId::new();
        let shared = Arc::new(Shared {
            id,
            sink: Mutex::new(None),
            looping: AtomicBool::new(looping),
            loaded: AtomicBool::new(false),
            released: AtomicBool::new(false),
        });

        element.set_loop(looping);
        let listener_shared = Arc::clone(&shared);
        element.set_listener(Arc::new(move |event| listener_shared.on_element_event(event)));

        debug!(handle = %id, src = redact_uri(src), "Created media element");

        Ok(Self {
            id,
            element,
            src: src.to_string(),
            shared,
        })
    }

    fn released(&self) -> bool {
        self.shared.released.load(Ordering::Acquire)
    }
}

#[async_trait]
impl BackendAdapter for StreamingAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Streaming
    }

    fn handle_id(&self) -> HandleId {
        self.id
    }

    fn subscribe(&self, sink: EventSink) {
        *self.shared.sink.lock() = Some(sink);
    }

    async fn load(&self) -> Result<()> {
        if !self.released() {
            debug!(handle = %self.id, src = redact_uri(&self.src), "Loading media element");
            self.element.load();
        }
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        if self.released() {
            return Ok(());
        }
        self.element
            .play()
            .await
            .map_err(|err| PlaybackError::command("play", err))
    }

    async fn pause(&self) -> Result<()> {
        if !self.released() {
            self.element.pause();
        }
        Ok(())
    }

    async fn seek_to(&self, seconds: f64) -> Result<()> {
        if !self.released() {
            self.element.set_current_time(seconds);
        }
        Ok(())
    }

    async fn set_loop(&self, looping: bool) -> Result<()> {
        if !self.released() {
            self.shared.looping.store(looping, Ordering::Release);
            self.element.set_loop(looping);
        }
        Ok(())
    }

    async fn unload(&self) {
        if self.shared.released.swap(true, Ordering::AcqRel) {
            debug!(handle = %self.id, "Media element already released");
            return;
        }

        self.shared.sink.lock().take();
        self.element.pause();
        self.element.release();
        debug!(handle = %self.id, "Released media element");
    }
}
