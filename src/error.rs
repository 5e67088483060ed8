use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    /// The underlying transport has no data available. The operation left
    /// the context unchanged and may be retried verbatim.
    #[error("transport not ready for reading")]
    ErrWantRead,
    /// The underlying transport cannot accept more data. The operation left
    /// the context unchanged and may be retried verbatim.
    #[error("transport not ready for writing")]
    ErrWantWrite,
    #[error("invalid record")]
    ErrInvalidRecord,
    #[error("invalid arguments")]
    ErrInvalidArgs,
    #[error("record authentication failed")]
    ErrAuthFailed,
    #[error("operation not expected in current state")]
    ErrUnexpectedOperation,
    #[error("epoch window exhausted")]
    ErrTooManyEpochs,
    #[error("unknown epoch")]
    ErrUnknownEpoch,
    #[error("sequence number overflow")]
    ErrCounterOverflow,
    #[error("out of data")]
    ErrOutOfData,
    #[error("buffer is too small")]
    ErrBufferTooSmall,
    #[error("record protection failed")]
    ErrTransformFailed,
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this is one of the `ErrWantRead`/`ErrWantWrite` signals that
    /// preserve the context and merely ask the caller to retry once the
    /// transport is ready.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ErrWantRead | Error::ErrWantWrite)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Other(e.to_string())
    }
}
