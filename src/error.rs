//! Error types for the song relay

use thiserror::Error;

/// Descriptions the Bot API uses when a referenced message no longer exists.
const MESSAGE_GONE_MARKERS: &[&str] = &[
    "message to copy not found",
    "message to forward not found",
    "message to delete not found",
    "message not found",
    "message_id_invalid",
];

#[derive(Error, Debug)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Telegram API rejected {method}: {description} (code {code})")]
    RemoteRejection {
        method: String,
        code: i64,
        description: String,
    },

    #[error("Data integrity warning: {0}")]
    DataIntegrity(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Catalog is locked by another process")]
    CatalogLocked,

    #[error("Failed to acquire catalog lock: {0}")]
    LockError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Lyrics API error: {0}")]
    LyricsError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// How a caller should treat a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Worth retrying later (network trouble, rate limits, server errors).
    Transient,
    /// The referenced message is gone; the catalog entry should be pruned.
    MessageGone,
    /// Log and drop.
    Permanent,
}

impl Error {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Error::Transport(_) => FailureKind::Transient,
            Error::RemoteRejection {
                code, description, ..
            } => {
                let lowered = description.to_lowercase();
                if MESSAGE_GONE_MARKERS.iter().any(|m| lowered.contains(m)) {
                    FailureKind::MessageGone
                } else if *code == 429 || *code >= 500 {
                    FailureKind::Transient
                } else {
                    FailureKind::Permanent
                }
            }
            _ => FailureKind::Permanent,
        }
    }

    pub fn is_message_gone(&self) -> bool {
        self.failure_kind() == FailureKind::MessageGone
    }

    pub fn is_transient(&self) -> bool {
        self.failure_kind() == FailureKind::Transient
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}
