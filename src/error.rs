use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Folio
#[derive(Error, Debug)]
pub enum FolioError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// Malformed caller input (non-positive ids, empty query, blank chunk text)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced folder or note does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// The embedding generator failed
    #[error("Embedding failed: {context}: {source}")]
    Embedding {
        context: String,
        #[source]
        source: ProviderError,
    },

    /// The completion service failed
    #[error("Completion failed: {context}: {source}")]
    Completion {
        context: String,
        #[source]
        source: ProviderError,
    },

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Connection pool errors (including checkout timeouts)
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Store-level failures that are not raw SQLite errors
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A step of an ingestion run failed
    #[error("Ingestion of note {note_id} failed at {stage}: {source}")]
    Ingestion {
        note_id: i64,
        stage: IngestStage,
        #[source]
        source: Box<FolioError>,
    },

    /// The background ingestion queue rejected a job
    #[error("Ingestion queue error: {0}")]
    Queue(String),

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },
}

impl FolioError {
    /// True when the store failed (insert, delete, query, pool checkout)
    pub fn is_persistence(&self) -> bool {
        match self {
            Self::Database(_) | Self::Pool(_) | Self::Persistence(_) => true,
            Self::Ingestion { source, .. } => source.is_persistence(),
            _ => false,
        }
    }

    /// True when an external embedding or completion provider failed
    pub fn is_provider(&self) -> bool {
        match self {
            Self::Embedding { .. } | Self::Completion { .. } => true,
            Self::Ingestion { source, .. } => source.is_provider(),
            _ => false,
        }
    }

    /// True for synchronous input validation failures
    pub fn is_validation(&self) -> bool {
        match self {
            Self::Validation(_) => true,
            Self::Ingestion { source, .. } => source.is_validation(),
            _ => false,
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }
}

/// Ingestion step at which a run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    DeletePrior,
    Embed { chunk_index: usize },
    Persist { chunk_index: usize },
    Commit,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeletePrior => write!(f, "delete of prior chunks"),
            Self::Embed { chunk_index } => write!(f, "embedding of chunk {}", chunk_index),
            Self::Persist { chunk_index } => write!(f, "insert of chunk {}", chunk_index),
            Self::Commit => write!(f, "commit of staged chunks"),
        }
    }
}

/// Failure of an external embedding or completion provider
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("API key not provided (expected in ${0})")]
    MissingCredentials(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode provider response: {0}")]
    Decode(String),

    #[error("Provider returned no result")]
    EmptyResult,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Provider initialization failed: {0}")]
    Initialization(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for Folio operations
pub type Result<T> = std::result::Result<T, FolioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingestion_error_classification() {
        let err = FolioError::Ingestion {
            note_id: 7,
            stage: IngestStage::Embed { chunk_index: 1 },
            source: Box::new(FolioError::Embedding {
                context: "chunk 1".to_string(),
                source: ProviderError::EmptyResult,
            }),
        };

        assert!(err.is_provider());
        assert!(!err.is_persistence());
        assert!(err.to_string().contains("note 7"));
        assert!(err.to_string().contains("embedding of chunk 1"));
    }

    #[test]
    fn test_persistence_classification() {
        let err = FolioError::Persistence("timeout".to_string());
        assert!(err.is_persistence());
        assert!(!err.is_validation());
    }

    #[test]
    fn test_context_keeps_the_typed_error() {
        use anyhow::Context;

        let failed: Result<()> = Err(FolioError::not_found("folder", 3));
        let err = failed.context("Failed to open note store").unwrap_err();

        assert_eq!(err.to_string(), "Failed to open note store");
        assert!(matches!(
            err.downcast_ref::<FolioError>(),
            Some(FolioError::NotFound { entity: "folder", id: 3 })
        ));
    }
}
