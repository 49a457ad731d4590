//! Error types for tsih operations.
//!
//! Every fallible operation returns [`TsihResult`]. Errors carry a structured
//! [`ErrorCode`] so callers can branch on the failure class without matching
//! on message text.

use thiserror::Error;

use crate::versioning::VersionNumber;

/// Result type alias for tsih operations.
pub type TsihResult<T> = Result<T, TsihError>;

/// Main error type for all tsih operations.
#[derive(Error, Debug)]
pub enum TsihError {
    /// No entry exists for the key at or before the requested version.
    #[error("Key not found: {message}")]
    KeyNotFound {
        message: String,
        code: ErrorCode,
        key: String,
        version: VersionNumber,
    },

    /// A key or value could not be encoded for durable storage.
    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The durable backend failed while loading or mirroring rows.
    #[error("Persistence error: {message}")]
    Persistence {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A version cannot be represented or advanced.
    #[error("Invalid version: {message}")]
    InvalidVersion {
        message: String,
        code: ErrorCode,
        version: Option<VersionNumber>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Lookup (KEY_xxx)
    KeyNotFound,
    KeyBeforeHistory,

    // Serialization (SER_xxx)
    SerEncodeFailed,

    // Persistence (PER_xxx)
    PerConnectionFailed,
    PerWriteFailed,
    PerLoadFailed,
    PerCorruptRow,

    // Version (VER_xxx)
    VerOutOfRange,
    VerOverflow,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::KeyNotFound => "KEY_001",
            ErrorCode::KeyBeforeHistory => "KEY_002",
            ErrorCode::SerEncodeFailed => "SER_001",
            ErrorCode::PerConnectionFailed => "PER_001",
            ErrorCode::PerWriteFailed => "PER_002",
            ErrorCode::PerLoadFailed => "PER_003",
            ErrorCode::PerCorruptRow => "PER_004",
            ErrorCode::VerOutOfRange => "VER_001",
            ErrorCode::VerOverflow => "VER_002",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl TsihError {
    /// Create a key-not-found error for a key that has never been written.
    pub fn key_not_found(key: impl Into<String>, version: VersionNumber) -> Self {
        let key = key.into();
        Self::KeyNotFound {
            message: format!("no entry for key {} at or before version {}", key, version),
            code: ErrorCode::KeyNotFound,
            key,
            version,
        }
    }

    /// Create a key-not-found error for a version below the key's first entry.
    pub fn before_history(
        key: impl Into<String>,
        version: VersionNumber,
        first: VersionNumber,
    ) -> Self {
        let key = key.into();
        Self::KeyNotFound {
            message: format!(
                "key {} was first written at version {}, requested version {}",
                key, first, version
            ),
            code: ErrorCode::KeyBeforeHistory,
            key,
            version,
        }
    }

    /// Create a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
            code: ErrorCode::SerEncodeFailed,
            source: None,
        }
    }

    /// Create a persistence error with an explicit code.
    pub fn persistence(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
            code,
            source: None,
        }
    }

    /// Create an error for a row that could not be decoded during load.
    pub fn corrupt_row(identifier: &str, message: impl Into<String>) -> Self {
        Self::Persistence {
            message: format!("corrupt row for '{}': {}", identifier, message.into()),
            code: ErrorCode::PerCorruptRow,
            source: None,
        }
    }

    /// Create an error for a version the backend cannot store.
    pub fn version_out_of_range(version: VersionNumber) -> Self {
        Self::InvalidVersion {
            message: format!("version {} exceeds the storable range", version),
            code: ErrorCode::VerOutOfRange,
            version: Some(version),
        }
    }

    /// Create an error for a cursor that cannot advance any further.
    pub fn version_overflow(version: VersionNumber) -> Self {
        Self::InvalidVersion {
            message: format!("cannot auto-advance past version {}", version),
            code: ErrorCode::VerOverflow,
            version: Some(version),
        }
    }

    /// Re-tag a persistence error with a more specific code.
    ///
    /// Non-persistence errors are returned unchanged.
    pub fn with_persistence_code(self, code: ErrorCode) -> Self {
        match self {
            Self::Persistence {
                message, source, ..
            } => Self::Persistence {
                message,
                code,
                source,
            },
            other => other,
        }
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::KeyNotFound { code, .. } => *code,
            Self::Serialization { code, .. } => *code,
            Self::Persistence { code, .. } => *code,
            Self::InvalidVersion { code, .. } => *code,
            _ => ErrorCode::Internal,
        }
    }

    /// Whether this error is a lookup miss rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound { .. })
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::KeyNotFound {
                code: ErrorCode::KeyBeforeHistory,
                ..
            } => Some("Read at a later version or check the current version of the map"),
            Self::KeyNotFound { .. } => Some("Check that the key has been written to this map"),
            Self::Persistence { .. } => Some("Check that the persistence target is reachable and writable"),
            Self::InvalidVersion { .. } => Some("Use a version between 0 and i64::MAX"),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for TsihError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Persistence {
            message: err.to_string(),
            code: ErrorCode::PerWriteFailed,
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_json::Error> for TsihError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
            code: ErrorCode::SerEncodeFailed,
            source: Some(Box::new(err)),
        }
    }
}
