use thiserror::Error;

/// Stage-level failures. Any of these aborts the stage that raised it and is
/// surfaced to the driver for retry.
#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Input file '{path}' could not be read: {source}")]
    Input {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV read failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Stage '{stage}' cannot run: {message}")]
    StageOrder { stage: &'static str, message: String },
}

/// Errors reported by a raw or canonical store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A concurrent writer inserted the same key between our check and our insert.
    #[error("duplicate key race on provider_booking_id '{0}'")]
    DuplicateKey(String),
}

impl From<StoreError> for EtlError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(message) => EtlError::StoreUnavailable(message),
            // Callers absorb races before they get here; anything left is a store fault.
            StoreError::DuplicateKey(key) => {
                EtlError::StoreUnavailable(format!("unresolved duplicate key '{}'", key))
            }
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
