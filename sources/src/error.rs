use thiserror::Error;

/// Transport-level errors.  None of these is fatal for a tracking session, they only change the
/// way positions are acquired (push vs poll).
///
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SourceError {
    #[error("Can not connect to {0}")]
    Connect(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Bad status {0} from {1}")]
    Status(u16, String),
    #[error("Can not decode payload: {0}")]
    Decode(String),
    #[error("Channel closed: {0}")]
    Closed(String),
    #[error("Timeout after {0}ms")]
    Timeout(u128),
    #[error("No route for {0} in site {1}")]
    UnknownRoute(String, String),
    #[error("Source refused the request: {0}")]
    Refused(String),
}
