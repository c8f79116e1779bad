use thiserror::Error;

use seawatch_sources::SourceError;

/// Errors surfaced to the consumer.  Transport problems are dealt with inside a session and
/// never show up here.
///
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("Bad config file version v{0}, need {1}")]
    BadConfigVersion(usize, usize),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid radius {0}, must be finite and >= 0")]
    InvalidRadius(f64),
    #[error("No tokio runtime, sessions must be started from within one")]
    NoRuntime,
    #[error("No site defined in configuration.")]
    NoSiteDefined,
    #[error(transparent)]
    Source(#[from] SourceError),
}
