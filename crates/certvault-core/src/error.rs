//! Error types for certvault.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using certvault's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for certvault operations.
///
/// Every variant is recoverable at the orchestrator boundary: the caller
/// keeps its last known good record set and reports the failure instead of
/// tearing anything down.
#[derive(Error, Debug)]
pub enum Error {
    /// Container metadata could not be serialized
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    /// Container or index write did not complete
    #[error("Write failed for {}: {source}", .path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Container or index read failed below the decode layer
    #[error("Read failed for {}: {source}", .path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No container at the expected location
    #[error("Document not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Container bundle exists but its shape is wrong (a named part missing)
    #[error("Corrupt container at {}: {reason}", .path.display())]
    CorruptContainer { path: PathBuf, reason: String },

    /// Container metadata is present but does not decode
    #[error("Unreadable metadata at {}: {detail}", .path.display())]
    UnreadableMetadata { path: PathBuf, detail: String },

    /// Physical document move failed; the source is left in place
    #[error("Move failed from {} to {}: {reason}", .from.display(), .to.display())]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    /// Remote drive cannot be queried (signed out, root missing)
    #[error("Remote discovery unavailable: {0}")]
    DiscoveryUnavailable(String),

    /// Persisted index file exists but did not decode
    #[error("Index decode failed for {}: {detail}", .path.display())]
    IndexDecodeFailed { path: PathBuf, detail: String },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Plain-language description for surfacing to the user, stating what
    /// failed and whether their documents are still safe.
    pub fn user_message(&self) -> String {
        match self {
            Error::EncodingFailed(_) => {
                "The certificate could not be prepared for saving. Nothing was written.".into()
            }
            Error::WriteFailed { source, .. } => {
                if source.kind() == std::io::ErrorKind::StorageFull {
                    "There is not enough storage space to save the certificate. \
                     Any existing copy is unchanged."
                        .into()
                } else {
                    "The certificate could not be saved. Any existing copy is unchanged.".into()
                }
            }
            Error::ReadFailed { .. } => {
                "The certificate file could not be read. It has not been modified.".into()
            }
            Error::NotFound(_) => "The certificate file could not be found.".into(),
            Error::CorruptContainer { .. } | Error::UnreadableMetadata { .. } => {
                "The certificate file appears to be damaged and was skipped. \
                 Other certificates are unaffected."
                    .into()
            }
            Error::MoveFailed { .. } => {
                "The certificate could not be moved. It remains in its previous location.".into()
            }
            Error::DiscoveryUnavailable(_) => {
                "The synchronized drive is not available right now. \
                 Certificates stored on this device remain accessible."
                    .into()
            }
            Error::IndexDecodeFailed { .. } => {
                "The certificate index could not be read and will be rebuilt \
                 from the files on disk."
                    .into()
            }
            Error::Internal(_) => {
                "Something went wrong inside certificate storage. \
                 Your certificates have not been changed."
                    .into()
            }
            Error::Io(_) => "A storage operation failed. No certificates were changed.".into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::EncodingFailed(e.to_string())
    }
}
