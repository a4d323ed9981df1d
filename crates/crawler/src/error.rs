use podscope_storage::{AddressError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("invalid address: {0}")]
    Address(#[from] AddressError),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Failure of the credits feed. Aborts only the credits phase.
#[derive(Debug, Error)]
pub enum CreditsError {
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("http status {0}")]
    Status(u16),
    #[error("malformed feed: {0}")]
    Malformed(String),
    #[error("feed reported status {0:?}")]
    Unsuccessful(String),
}

impl CreditsError {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Transport(_) => "transport",
            Self::Status(_) => "status",
            Self::Malformed(_) => "malformed",
            Self::Unsuccessful(_) => "unsuccessful",
        }
    }
}

impl From<reqwest::Error> for CreditsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Transport(err)
        }
    }
}
