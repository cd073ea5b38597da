//! Core service façade and process-wide session lifecycle.
//!
//! This crate wires a [`CoreConfig`] (host-provided media engine plus
//! playback tunables) into a running [`SessionStore`]. Hosts either own a
//! [`CoreService`] directly or use the module-level [`init`] / [`session`] /
//! [`shutdown`] functions, which hold exactly one service for the process.
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use bridge_traits::BackendKind;
//!
//! let config = CoreConfig::builder()
//!     .backend(BackendKind::Buffered)
//!     .sound_engine(engine)
//!     .build()?;
//! let store = core_service::init(config)?;
//!
//! // any screen, any time later
//! core_service::session()?.play();
//! ```

pub mod error;

pub use error::{CoreError, Result};

use bridge_traits::BackendKind;
use core_playback::{EngineAdapterFactory, SessionStore};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, EventStream, SessionEvent};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

/// Primary façade exposed to host applications.
#[derive(Clone, Debug)]
pub struct CoreService {
    session: SessionStore,
    events: EventBus,
    backend: BackendKind,
}

impl CoreService {
    /// Validates `config` and starts the playback session on the current
    /// tokio runtime.
    pub fn new(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        let backend = config.backend;
        let events = EventBus::new(config.event_buffer_size);
        let factory = EngineAdapterFactory::from_config(&config)?;
        let session = SessionStore::start(
            Arc::new(factory),
            config.playback.clone(),
            Some(events.clone()),
        )
        .map_err(|err| CoreError::InitializationFailed(err.to_string()))?;

        let _ = events.emit(CoreEvent::Session(SessionEvent::Initialized { backend }));
        info!(%backend, "Core service initialized");

        Ok(Self {
            session,
            events,
            backend,
        })
    }

    /// Handle to the shared playback session.
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// A fresh receiver over the lifecycle event bus; see [`EventStream::filter`].
    pub fn event_stream(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Releases the active engine handle and stops the session.
    pub async fn shutdown(&self) -> Result<()> {
        self.session.shutdown().await?;
        let _ = self.events.emit(CoreEvent::Session(SessionEvent::ShutDown));
        info!(backend = %self.backend, "Core service shut down");
        Ok(())
    }
}

// ============================================================================
// Process-wide session
// ============================================================================

static SERVICE: Lazy<Mutex<Option<CoreService>>> = Lazy::new(|| Mutex::new(None));

/// Starts the process-wide session and returns a handle to it.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// - [`CoreError::AlreadyInitialized`] if a session is already running
/// - [`CoreError::Runtime`] if `config` is invalid
/// - [`CoreError::InitializationFailed`] outside a tokio runtime
pub fn init(config: CoreConfig) -> Result<SessionStore> {
    let mut slot = SERVICE.lock();
    if slot.is_some() {
        warn!("Core service init called twice");
        return Err(CoreError::AlreadyInitialized);
    }

    let service = CoreService::new(config)?;
    let session = service.session().clone();
    *slot = Some(service);
    Ok(session)
}

/// Handle to the process-wide session.
pub fn session() -> Result<SessionStore> {
    SERVICE
        .lock()
        .as_ref()
        .map(|service| service.session().clone())
        .ok_or(CoreError::NotInitialized)
}

/// The process-wide lifecycle event bus.
pub fn events() -> Result<EventBus> {
    SERVICE
        .lock()
        .as_ref()
        .map(|service| service.events().clone())
        .ok_or(CoreError::NotInitialized)
}

pub fn is_initialized() -> bool {
    SERVICE.lock().is_some()
}

/// Shuts the process-wide session down. A later [`init`] starts a fresh one.
pub async fn shutdown() -> Result<()> {
    let service = SERVICE.lock().take().ok_or(CoreError::NotInitialized)?;
    service.shutdown().await
}
