use thiserror::Error;

/// Reasons a call produced no data.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("http status {0}")]
    Status(u16),
    #[error("remote error {code}: {message}")]
    Remote { code: i64, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("response carried no result")]
    EmptyResult,
}

impl RpcError {
    /// Short label used for logs and metrics.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Transport(_) => "transport",
            Self::Status(_) => "status",
            Self::Remote { .. } => "remote",
            Self::Malformed(_) => "malformed",
            Self::EmptyResult => "empty",
        }
    }
}

impl From<reqwest::Error> for RpcError {
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
