//! # Playback Error Types
//!
//! Failures raised at the engine adapter boundary.
//!
//! The session store catches every one of these, logs it and keeps its state
//! consistent. None of them reach UI consumers as return values.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Load Errors
    // ========================================================================
    /// The engine could not fetch or decode the track's audio resource.
    #[error("Failed to load {uri}: {reason}")]
    LoadFailed { uri: String, reason: String },

    // ========================================================================
    // Command Errors
    // ========================================================================
    /// The engine rejected a play/pause/seek/loop command.
    #[error("Command {command} failed: {reason}")]
    CommandFailed {
        command: &'static str,
        reason: String,
    },

    /// The engine did not answer a command in time.
    #[error("Command {command} timed out after {timeout_ms} ms")]
    CommandTimedOut {
        command: &'static str,
        timeout_ms: u64,
    },

    // ========================================================================
    // Release Errors
    // ========================================================================
    /// Releasing the engine handle failed for a reason other than it
    /// already being released.
    #[error("Failed to release engine handle: {0}")]
    UnloadFailed(String),

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// The session actor has stopped.
    #[error("Playback session is closed")]
    SessionClosed,

    /// The store was started outside a tokio runtime.
    #[error("No tokio runtime available to drive the playback session")]
    RuntimeUnavailable,

    #[error("Invalid playback configuration: {0}")]
    InvalidConfig(String),

    /// Error reported by a host engine.
    #[error("Engine error: {0}")]
    Bridge(#[from] BridgeError),
}

impl PlaybackError {
    pub(crate) fn command(command: &'static str, err: impl std::fmt::Display) -> Self {
        PlaybackError::CommandFailed {
            command,
            reason: err.to_string(),
        }
    }

    /// Returns `true` if the track's resource could not be made playable.
    pub fn is_load_failure(&self) -> bool {
        matches!(self, PlaybackError::LoadFailed { .. })
    }

    /// Returns `true` if a single control command failed.
    pub fn is_command_failure(&self) -> bool {
        matches!(
            self,
            PlaybackError::CommandFailed { .. } | PlaybackError::CommandTimedOut { .. }
        )
    }

    /// Returns `true` if retrying (re-selecting the track, pressing play
    /// again) may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            PlaybackError::LoadFailed { .. }
            | PlaybackError::CommandFailed { .. }
            | PlaybackError::CommandTimedOut { .. } => true,
            PlaybackError::Bridge(err) => matches!(
                err,
                BridgeError::NotAvailable(_) | BridgeError::OperationFailed(_)
            ),
            _ => false,
        }
    }
}

impl From<core_runtime::Error> for PlaybackError {
    fn from(err: core_runtime::Error) -> Self {
        PlaybackError::InvalidConfig(err.to_string())
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
