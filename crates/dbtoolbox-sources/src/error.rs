use std::time::Duration;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while talking to a source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("unable to connect to source \"{name}\": {error}")]
    Connect {
        name: String,
        #[source]
        error: BoxError,
    },

    #[error("invalid configuration for source \"{name}\": {message}")]
    Config { name: String, message: String },

    #[error("unable to execute query: {0}")]
    Query(#[from] sqlx::Error),

    #[error("unable to execute query: {0}")]
    MsSql(#[from] tiberius::error::Error),

    #[error("unable to acquire connection: {0}")]
    Acquire(String),

    #[error("unable to execute query: timed out after {0:?}")]
    Timeout(Duration),

    #[error("unable to parse row: column \"{column}\": {error}")]
    Row {
        column: String,
        #[source]
        error: BoxError,
    },

    #[error("unable to bind parameter \"{name}\": {message}")]
    Bind { name: String, message: String },

    #[error("unable to interpolate parameters: {0}")]
    Interpolate(String),
}

pub type Result<T> = std::result::Result<T, SourceError>;
