//! Track value object and input sanitizing.
//!
//! Tracks reach the session from a catalog listing or from navigation
//! parameters. Either source may carry relative, empty or missing URIs, so
//! every track is passed through [`Track::sanitized`] before an engine ever
//! sees it.

use core_runtime::config::{has_http_scheme, PlaybackConfig};
use serde::{Deserialize, Serialize};

pub use core_runtime::config::{FALLBACK_AUDIO_URI, PLACEHOLDER_IMAGE_URI};

pub const DEFAULT_TRACK_ID: &str = "fallback";
pub const DEFAULT_TITLE: &str = "Meditation Sound";
pub const DEFAULT_DESCRIPTION: &str = "A calming meditation sound";
pub const DEFAULT_CATEGORY: &str = "Meditation";
/// Nominal duration in seconds when the parameters carry none.
pub const DEFAULT_DURATION_SECS: f64 = 300.0;

/// One playable media item. Never mutated by the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Nominal duration in seconds, as listed by the catalog.
    pub duration: f64,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub audio_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Track {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        duration: f64,
        audio_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            duration,
            image_url: String::new(),
            audio_url: audio_url.into(),
            category: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = image_url.into();
        self
    }

    /// Copy with unusable URIs replaced and the duration forced non-negative.
    pub fn sanitized(&self, config: &PlaybackConfig) -> Track {
        Track {
            audio_url: resolve_audio_uri(&self.audio_url, &config.fallback_audio_uri),
            image_url: resolve_image_uri(&self.image_url, &config.placeholder_image_uri),
            duration: if self.duration.is_finite() && self.duration > 0.0 {
                self.duration
            } else {
                0.0
            },
            ..self.clone()
        }
    }

    /// String parameters that reopen this track in the full player.
    pub fn to_params(&self) -> TrackParams {
        TrackParams {
            id: Some(self.id.clone()),
            title: Some(self.title.clone()),
            description: Some(
                self.description
                    .clone()
                    .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            ),
            duration: Some(self.duration.to_string()),
            image_url: Some(self.image_url.clone()),
            audio_url: Some(self.audio_url.clone()),
            category: Some(
                self.category
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            ),
        }
    }
}

/// Untyped track parameters as carried by navigation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackParams {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration: Option<String>,
    pub image_url: Option<String>,
    pub audio_url: Option<String>,
    pub category: Option<String>,
}

impl TrackParams {
    /// Builds a track, filling gaps with the built-in defaults.
    pub fn into_track(self) -> Track {
        self.into_track_with(&PlaybackConfig::default())
    }

    /// Builds a track using the fallback and placeholder URIs of `config`.
    pub fn into_track_with(self, config: &PlaybackConfig) -> Track {
        let duration = non_empty(self.duration)
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .unwrap_or(DEFAULT_DURATION_SECS);

        Track {
            id: non_empty(self.id).unwrap_or_else(|| DEFAULT_TRACK_ID.to_string()),
            title: non_empty(self.title).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            description: Some(
                non_empty(self.description).unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            ),
            duration,
            image_url: resolve_image_uri(
                self.image_url.as_deref().unwrap_or_default(),
                &config.placeholder_image_uri,
            ),
            audio_url: resolve_audio_uri(
                self.audio_url.as_deref().unwrap_or_default(),
                &config.fallback_audio_uri,
            ),
            category: Some(
                non_empty(self.category).unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            ),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// `uri` trimmed if it is an absolute http(s) URI, `fallback` otherwise.
pub fn resolve_audio_uri(uri: &str, fallback: &str) -> String {
    let uri = uri.trim();
    if !uri.is_empty() && has_http_scheme(uri) {
        uri.to_string()
    } else {
        fallback.to_string()
    }
}

/// `uri` if it is an absolute http(s) URI, `placeholder` otherwise.
pub fn resolve_image_uri(uri: &str, placeholder: &str) -> String {
    if has_http_scheme(uri) {
        uri.trim().to_string()
    } else {
        placeholder.to_string()
    }
}

/// Renders seconds as zero-padded `mm:ss`. Minutes do not wrap at 60.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "00:00".to_string();
    }

    let total = seconds.floor() as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}
