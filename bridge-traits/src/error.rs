use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// The engine refused the request in its current state (e.g. autoplay
    /// policy, interrupted audio session).
    #[error("Engine rejected request: {0}")]
    Rejected(String),

    #[error("Engine handle already released")]
    AlreadyReleased,
}

impl BridgeError {
    /// Returns `true` when the error only says the resource is already gone.
    pub fn is_already_released(&self) -> bool {
        matches!(self, BridgeError::AlreadyReleased)
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
