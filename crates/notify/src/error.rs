use podscope_storage::StoreError;
use thiserror::Error;

/// Failure delivering one message.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("recipient {0} rejected the message")]
    Rejected(String),
    #[error("delivery failed: {0}")]
    Delivery(String),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid connect code {0:?}: expected {len} alphanumeric characters", len = crate::pairing::CONNECT_CODE_LEN)]
    InvalidCode(String),
}
