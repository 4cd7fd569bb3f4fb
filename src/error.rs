use thiserror::Error;

/// Custom error types for the room synchronization service
#[derive(Debug, Error)]
pub enum SyncError {
    /// Room and membership errors
    #[error("Room {0} not found")]
    RoomNotFound(String),

    #[error("Session {0} is not a member of room {1}")]
    NotAMember(String, String),

    #[error("Session {0} not found")]
    SessionNotFound(String),

    /// Protocol errors
    #[error("Invalid event payload: {0}")]
    InvalidPayload(String),

    #[error("Failed to serialize event: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// Catalog errors
    #[error("Failed to load catalog: {0}")]
    CatalogLoad(String),
}

/// Convenience type alias for Results using SyncError
pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// Helper to create InvalidPayload errors
    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        SyncError::InvalidPayload(msg.into())
    }
}
