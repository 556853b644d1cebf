use thiserror::Error;

#[derive(Debug, Error)]
pub enum CallError {
    #[error("video sdk error: {0}")]
    Sdk(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid media frame: {0}")]
    InvalidFrame(String),
}
