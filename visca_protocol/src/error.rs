use thiserror::Error;

/// Error types.
#[derive(Debug, Error)]
pub enum Error {
    #[cfg(test)]
    #[error(transparent)]
    FromHexError(#[from] hex::FromHexError),

    #[error("invalid length")]
    InvalidLength,

    #[error("parameter out of valid range")]
    ParameterOutOfRange,

    #[error("invalid command: {0}")]
    InvalidCommand(&'static str),

    #[error("unknown value: {0:#04x}")]
    UnknownValue(u8),

    #[error("protocol decode error: {0}")]
    ProtocolDecode(&'static str),

    #[error("data parse error: {0}")]
    BinRwError(#[from] binrw::Error),
}
