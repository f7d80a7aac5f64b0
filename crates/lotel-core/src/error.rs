use thiserror::Error;

#[derive(Debug, Error)]
pub enum LotelError {
    #[error(
        "otelcol-contrib not found in PATH; install from https://github.com/open-telemetry/opentelemetry-collector-releases"
    )]
    NotInstalled,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("state error: {0}")]
    State(String),

    #[error("supervise error: {0}")]
    Supervise(String),

    #[error("storage error: {0}")]
    Store(String),

    #[error("ingest error: {0}")]
    Ingest(String),

    #[error("io error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, LotelError>;
