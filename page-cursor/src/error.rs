use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type FetchResult<T> = Result<T, FetchError>;

/// Any failure surfaced by the fetch capability, plus the cursor's own
/// refusal states. Errors reach only the caller currently awaiting the
/// failed fetch; nothing is retried automatically.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetch capability not implemented")]
    NotImplemented,
    #[error("cursor has not been reset")]
    NotReset,
    #[error("reset superseded by a newer reset")]
    Superseded,
    #[error("http status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),
    #[error("decode error: {0}")]
    Decode(#[source] BoxError),
}

impl FetchError {
    pub fn transport(err: impl Into<BoxError>) -> Self {
        FetchError::Transport(err.into())
    }

    pub fn decode(err: impl Into<BoxError>) -> Self {
        FetchError::Decode(err.into())
    }
}
