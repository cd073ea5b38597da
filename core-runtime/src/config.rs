//! # Core Configuration Module
//!
//! Configuration for the audio session core.
//!
//! ## Overview
//!
//! [`CoreConfig`] bundles the host-provided media engine for the selected
//! [`BackendKind`] together with the tunables in [`PlaybackConfig`]. The
//! builder fails fast when the engine the backend needs was not injected, so
//! a misconfigured host learns about it at startup instead of on first play.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, PlaybackConfig};
//! use bridge_traits::BackendKind;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .backend(BackendKind::Buffered)
//!     .sound_engine(Arc::new(MySoundEngine::new()))
//!     .playback(PlaybackConfig::responsive())
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//! use bridge_traits::BackendKind;
//!
//! // Streaming backend without a MediaElementFactory
//! let config = CoreConfig::builder()
//!     .backend(BackendKind::Streaming)
//!     .build()
//!     .expect("Should fail - missing media element factory");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{AudioMode, BackendKind, MediaElementFactory, SoundEngine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Known-good audio resource substituted for missing or unusable track URIs.
pub const FALLBACK_AUDIO_URI: &str =
    "https://svucbacxrtupvpftprjp.supabase.co/storage/v1/object/public/meditations/stress-relief.mp3";

/// Artwork substituted for missing or relative image URIs.
pub const PLACEHOLDER_IMAGE_URI: &str =
    "https://images.unsplash.com/photo-1506126613408-eca07ce68773?q=80&w=1000";

/// Returns `true` for absolute `http://` or `https://` URIs.
pub fn has_http_scheme(uri: &str) -> bool {
    let uri = uri.trim();
    let lower = uri.get(..8).unwrap_or(uri).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

// ============================================================================
// Playback tunables
// ============================================================================

/// Playback session tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Audio URI loaded when a track's own URI is missing or not absolute.
    #[serde(default = "default_fallback_audio_uri")]
    pub fallback_audio_uri: String,

    /// Image URI used when a track's artwork is missing or not absolute.
    #[serde(default = "default_placeholder_image_uri")]
    pub placeholder_image_uri: String,

    /// Polling tick requested from the buffered engine.
    ///
    /// Default: 500 ms.
    #[serde(default = "default_status_interval")]
    pub status_interval: Duration,

    /// How long an optimistic seek/play/loop value wins over engine snapshots
    /// that disagree with it.
    ///
    /// Default: one status interval.
    #[serde(default = "default_status_interval")]
    pub optimistic_window: Duration,

    /// Snapshot positions within this many seconds of an optimistic seek
    /// target count as agreeing with it.
    ///
    /// Default: 0.75 s.
    #[serde(default = "default_seek_tolerance")]
    pub seek_tolerance: f64,

    /// Upper bound for any engine command other than load.
    ///
    /// Default: 5 seconds.
    #[serde(default = "default_command_timeout")]
    pub command_timeout: Duration,

    /// Audio session applied before the buffered engine creates a sound.
    #[serde(default)]
    pub audio_mode: AudioMode,
}

fn default_fallback_audio_uri() -> String {
    FALLBACK_AUDIO_URI.to_string()
}

fn default_placeholder_image_uri() -> String {
    PLACEHOLDER_IMAGE_URI.to_string()
}

fn default_status_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_seek_tolerance() -> f64 {
    0.75
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            fallback_audio_uri: default_fallback_audio_uri(),
            placeholder_image_uri: default_placeholder_image_uri(),
            status_interval: default_status_interval(),
            optimistic_window: default_status_interval(),
            seek_tolerance: default_seek_tolerance(),
            command_timeout: default_command_timeout(),
            audio_mode: AudioMode::default(),
        }
    }
}

impl PlaybackConfig {
    /// Faster status ticks for screens with a scrubbable progress bar.
    pub fn responsive() -> Self {
        Self {
            status_interval: Duration::from_millis(250),
            optimistic_window: Duration::from_millis(250),
            seek_tolerance: 0.5,
            ..Default::default()
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if !has_http_scheme(&self.fallback_audio_uri) {
            return Err(Error::Config(format!(
                "fallback_audio_uri must be an absolute http(s) URI, got {:?}",
                self.fallback_audio_uri
            )));
        }

        if !has_http_scheme(&self.placeholder_image_uri) {
            return Err(Error::Config(format!(
                "placeholder_image_uri must be an absolute http(s) URI, got {:?}",
                self.placeholder_image_uri
            )));
        }

        if self.status_interval.is_zero() {
            return Err(Error::Config("status_interval must be > 0".to_string()));
        }

        if self.command_timeout.is_zero() {
            return Err(Error::Config("command_timeout must be > 0".to_string()));
        }

        if !self.seek_tolerance.is_finite() || self.seek_tolerance < 0.0 {
            return Err(Error::Config(
                "seek_tolerance must be a non-negative number of seconds".to_string(),
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Core configuration
// ============================================================================

/// Everything needed to start the audio session core.
#[derive(Clone)]
pub struct CoreConfig {
    /// Engine family the session drives.
    pub backend: BackendKind,

    /// Streaming element factory (required for [`BackendKind::Streaming`]).
    pub media_element_factory: Option<Arc<dyn MediaElementFactory>>,

    /// Buffered sound engine (required for [`BackendKind::Buffered`]).
    pub sound_engine: Option<Arc<dyn SoundEngine>>,

    pub playback: PlaybackConfig,

    /// Capacity of the playback event bus.
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("backend", &self.backend)
            .field(
                "media_element_factory",
                &self
                    .media_element_factory
                    .as_ref()
                    .map(|_| "MediaElementFactory { ... }"),
            )
            .field(
                "sound_engine",
                &self.sound_engine.as_ref().map(|_| "SoundEngine { ... }"),
            )
            .field("playback", &self.playback)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Checks that the engine for the selected backend is present and the
    /// playback tunables are sane.
    pub fn validate(&self) -> Result<()> {
        match self.backend {
            BackendKind::Streaming if self.media_element_factory.is_none() => {
                return Err(Error::capability_missing(
                    "MediaElementFactory",
                    "The streaming backend drives a host media element. \
                     Inject a MediaElementFactory or select BackendKind::Buffered.",
                ));
            }
            BackendKind::Buffered if self.sound_engine.is_none() => {
                return Err(Error::capability_missing(
                    "SoundEngine",
                    "The buffered backend drives a host sound engine. \
                     Inject a SoundEngine or select BackendKind::Streaming.",
                ));
            }
            _ => {}
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "event_buffer_size must be greater than 0".to_string(),
            ));
        }

        self.playback.validate()
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    backend: Option<BackendKind>,
    media_element_factory: Option<Arc<dyn MediaElementFactory>>,
    sound_engine: Option<Arc<dyn SoundEngine>>,
    playback: Option<PlaybackConfig>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Selects the engine family. Defaults to [`BackendKind::Buffered`].
    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn media_element_factory(mut self, factory: Arc<dyn MediaElementFactory>) -> Self {
        self.media_element_factory = Some(factory);
        self
    }

    pub fn sound_engine(mut self, engine: Arc<dyn SoundEngine>) -> Self {
        self.sound_engine = Some(engine);
        self
    }

    pub fn playback(mut self, playback: PlaybackConfig) -> Self {
        self.playback = Some(playback);
        self
    }

    /// Default: [`DEFAULT_EVENT_BUFFER_SIZE`](crate::events::DEFAULT_EVENT_BUFFER_SIZE).
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when the selected backend's engine is absent
    /// - [`Error::Config`] when a tunable is out of range
    pub fn build(self) -> Result<CoreConfig> {
        let config = CoreConfig {
            backend: self.backend.unwrap_or_default(),
            media_element_factory: self.media_element_factory,
            sound_engine: self.sound_engine,
            playback: self.playback.unwrap_or_default(),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{InitialSoundStatus, MediaElement, SoundObject, SoundStatusCallback};
    use mockall::mock;

    mock! {
        Engine {}

        #[async_trait::async_trait]
        impl SoundEngine for Engine {
            async fn set_audio_mode(&self, mode: AudioMode) -> BridgeResult<()>;
            async fn create_sound(
                &self,
                uri: &str,
                initial: InitialSoundStatus,
                on_status: SoundStatusCallback,
            ) -> BridgeResult<Arc<dyn SoundObject>>;
        }
    }

    mock! {
        ElementFactory {}

        impl MediaElementFactory for ElementFactory {
            fn create(&self, src: &str) -> BridgeResult<Arc<dyn MediaElement>>;
        }
    }

    #[test]
    fn test_http_scheme_detection() {
        assert!(has_http_scheme("https://cdn.example.com/a.mp3"));
        assert!(has_http_scheme("HTTP://cdn.example.com/a.mp3"));
        assert!(has_http_scheme("  http://cdn.example.com/a.mp3"));
        assert!(!has_http_scheme(""));
        assert!(!has_http_scheme("file:///tmp/a.mp3"));
        assert!(!has_http_scheme("/relative/a.mp3"));
        assert!(!has_http_scheme("http"));
    }

    #[test]
    fn test_playback_config_defaults() {
        let config = PlaybackConfig::default();
        assert_eq!(config.fallback_audio_uri, FALLBACK_AUDIO_URI);
        assert_eq!(config.placeholder_image_uri, PLACEHOLDER_IMAGE_URI);
        assert_eq!(config.status_interval, Duration::from_millis(500));
        assert_eq!(config.optimistic_window, config.status_interval);
        assert_eq!(config.command_timeout, Duration::from_secs(5));
        assert!(config.validate().is_ok());
        assert!(PlaybackConfig::responsive().validate().is_ok());
    }

    #[test]
    fn test_playback_config_rejects_relative_fallback() {
        let config = PlaybackConfig {
            fallback_audio_uri: "sounds/rain.mp3".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_playback_config_rejects_zero_interval() {
        let config = PlaybackConfig {
            status_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PlaybackConfig {
            seek_tolerance: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_playback_config_deserializes_with_defaults() {
        let config: PlaybackConfig =
            serde_json::from_str(r#"{ "seek_tolerance": 0.25 }"#).unwrap();
        assert_eq!(config.seek_tolerance, 0.25);
        assert_eq!(config.fallback_audio_uri, FALLBACK_AUDIO_URI);
        assert_eq!(config.audio_mode, AudioMode::default());
    }

    #[test]
    fn test_builder_requires_sound_engine_for_buffered() {
        let result = CoreConfig::builder().backend(BackendKind::Buffered).build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "SoundEngine")
            }
            other => panic!("expected missing SoundEngine, got {:?}", other),
        }
    }

    #[test]
    fn test_builder_requires_element_factory_for_streaming() {
        let result = CoreConfig::builder()
            .backend(BackendKind::Streaming)
            .sound_engine(Arc::new(MockEngine::new()))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "MediaElementFactory")
            }
            other => panic!("expected missing MediaElementFactory, got {:?}", other),
        }
    }

    #[test]
    fn test_builder_with_streaming_engine() {
        let config = CoreConfig::builder()
            .backend(BackendKind::Streaming)
            .media_element_factory(Arc::new(MockElementFactory::new()))
            .event_buffer_size(16)
            .build()
            .unwrap();

        assert_eq!(config.backend, BackendKind::Streaming);
        assert_eq!(config.event_buffer_size, 16);
        assert!(config.sound_engine.is_none());
        assert!(format!("{:?}", config).contains("MediaElementFactory { ... }"));
    }

    #[test]
    fn test_builder_defaults_to_buffered() {
        let config = CoreConfig::builder()
            .sound_engine(Arc::new(MockEngine::new()))
            .build()
            .unwrap();

        assert_eq!(config.backend, BackendKind::Buffered);
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
        assert_eq!(config.playback, PlaybackConfig::default());
    }

    #[test]
    fn test_builder_rejects_invalid_playback_config() {
        let result = CoreConfig::builder()
            .sound_engine(Arc::new(MockEngine::new()))
            .playback(PlaybackConfig {
                command_timeout: Duration::ZERO,
                ..Default::default()
            })
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_rejects_zero_event_buffer() {
        let result = CoreConfig::builder()
            .sound_engine(Arc::new(MockEngine::new()))
            .event_buffer_size(0)
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }
}
