use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transform failed: {0}")]
    Transform(String),

    #[error("Unexpected value in stored row: {0}")]
    Decode(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Unknown metric '{0}'")]
    UnknownMetric(String),

    #[error("Records for table '{expected}' cannot be inserted into '{actual}'")]
    RecordTableMismatch { expected: String, actual: String },

    #[error("Database connection is closed")]
    ConnectionClosed,

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Not yet supported: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, EtlError>;
