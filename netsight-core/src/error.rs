use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Unknown protocol: {0}")]
    UnknownProtocol(String),
}
