use thiserror::Error;

/// Errors surfaced by archive operations.
///
/// `NotFound` is only distinguished from `Transport` where callers care:
/// a missing source artifact during a copy is fatal either way, but scans
/// treat absent paths as ordinary (an empty listing is success).
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("path not found: {path}")]
    NotFound { path: String },

    #[error("transport error during {context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("malformed history archive state at {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode history archive state for {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("bad archive URL: {0}")]
    BadUrl(String),

    #[error("unknown URL scheme: '{scheme}'")]
    UnknownScheme { scheme: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl ArchiveError {
    pub fn not_found(path: impl Into<String>) -> Self {
        ArchiveError::NotFound { path: path.into() }
    }

    pub fn transport(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ArchiveError::Transport {
            context: context.into(),
            source: Box::new(source),
        }
    }

    pub fn decode(path: impl Into<String>, source: serde_json::Error) -> Self {
        ArchiveError::Decode {
            path: path.into(),
            source,
        }
    }

    pub fn encode(path: impl Into<String>, source: serde_json::Error) -> Self {
        ArchiveError::Encode {
            path: path.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ArchiveError::NotFound { .. })
    }
}
