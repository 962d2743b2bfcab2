//! Error types for stocklink-core

use thiserror::Error;

/// Result type alias using stocklink-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in stocklink-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Could not reach the sync server, or it returned a non-success status
    #[error("Connection failure while attempting to sync: {0}")]
    ConnectionFailure(String),

    /// The sync site name or password were missing or rejected
    #[error("Invalid sync credentials: {0}")]
    InvalidCredentials(String),

    /// The server returned an explicit error payload
    #[error("Server rejected sync request: {0}")]
    ServerRejected(String),

    /// The server response could not be parsed
    #[error("Unexpected response from sync server: {0}")]
    UnexpectedResponse(String),

    /// A queued record's type has no outgoing translation
    #[error("Sync out record type not supported: {0}")]
    UnsupportedRecordType(String),

    /// A queued record no longer exists in the local store
    #[error("{record_type} with id = {record_id} missing")]
    MissingRecord {
        record_type: String,
        record_id: String,
    },

    /// An incoming record failed its required-field sanity check
    #[error("Malformed incoming {0} record")]
    MalformedIncomingRecord(String),

    /// Sync was attempted before a successful initialisation
    #[error("Sync has not been initialised")]
    NotInitialised,

    /// A sync session is already running
    #[error("A sync is already in progress")]
    SyncInProgress,
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Self::ConnectionFailure(error.to_string())
    }
}
