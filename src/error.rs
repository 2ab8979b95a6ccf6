use thiserror::Error;

/// Boxed error produced by a raw CAN backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    // Timing errors
    #[error("Timed out waiting for a frame")]
    Timeout,

    // Protocol errors
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),
    #[error("Unexpected {0} frame")]
    UnexpectedFrame(&'static str),
    #[error("Consecutive frame out of order: expected SN {expected}, got {actual}")]
    SequenceError { expected: u8, actual: u8 },
    #[error("Peer reported flow control overflow")]
    Overflow,
    #[error("Payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { len: usize, max: usize },
    #[error("Peer sent more than {0} wait flow control frames")]
    WaitLimitExceeded(u8),

    // Setup errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("CAN interface is not open")]
    NotOpen,

    // Raw CAN backend errors, passed through untouched
    #[error("Transport error: {0}")]
    Transport(#[source] BoxError),
}

impl Error {
    /// Wraps a backend error as [`Error::Transport`].
    pub fn transport<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Error::Transport(err.into())
    }

    /// True for conditions worth retrying (missing frames, flaky backend).
    ///
    /// Protocol violations return false: repeating the same exchange against
    /// the same peer will most likely fail the same way.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Timeout | Error::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
