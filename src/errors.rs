use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Invalid predicate: {0}")]
    InvalidPredicate(String),

    #[error("Index conflict: {0}")]
    IndexConflict(String),

    #[error("Duplicate key in unique index {index}: {key}")]
    DuplicateKey { index: String, key: String },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Invalid update: {0}")]
    InvalidUpdate(String),

    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Collection not found: {0}")]
    NoSuchCollection(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

pub type DbResult<T> = Result<T, DbError>;
