//! Error types for hostcall client operations.

/// Alias for `Result<T, hostcall::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned when talking to a host.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The host ran the procedure and it failed.
    #[error("remote procedure failed: {0}")]
    Remote(String),

    /// The host declined to answer: unknown path or unhandled message.
    #[error("request was not handled by the host")]
    Unhandled,

    /// The host answered with something that is not a reply envelope.
    #[error("unexpected reply from host: {0}")]
    UnexpectedReply(String),

    /// An I/O error on the underlying channel.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
