use crate::protocol::ErrorCode;
use std::io::Error as IoError;
use thiserror::Error;

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    #[cfg(test)]
    #[error(transparent)]
    FromHexError(#[from] hex::FromHexError),

    #[error(transparent)]
    IoError(#[from] IoError),

    #[error(transparent)]
    Protocol(#[from] crate::protocol::Error),

    #[error("data parse error: {0}")]
    BinRwError(#[from] binrw::Error),

    /// The camera rejected or failed the command.
    #[error("camera reported error: {0}")]
    Device(ErrorCode),

    #[error("timeout waiting for response")]
    Timeout,

    /// Both VISCA sockets are in use, and the connection is configured to
    /// [fail fast][crate::SocketPolicy::FailFast].
    #[error("no free socket")]
    NoFreeSocket,

    /// The connection was closed, or was lost, before the request completed.
    #[error("disconnected")]
    Disconnected,

    #[error("unexpected reply")]
    UnexpectedReply,

    #[error("internal error")]
    Internal,
}
