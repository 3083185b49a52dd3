//! # Camera replies
//!
//! ## Packet format
//!
//! * `u8`: address, `0x80 | (device + 8) << 4`; `0x90` for camera 1
//! * `u8`: [ReplyStatus]: reply type (high nibble) and socket number (low
//!   nibble)
//! * payload: Completions of inquiries carry the answer; Errors carry an
//!   [ErrorCode]
//! * `0xff` terminator
//!
//! Type | Bytes
//! ---- | -----
//! ACK | `90 4y ff`
//! Completion | `90 5y ff`
//! Completion (inquiry) | `90 50 ... ff`
//! Error | `90 6y ee ff`
//!
//! Socket numbers `1` and `2` refer to commands which the camera accepted into
//! its command buffer. Replies which don't belong to a buffered command
//! (inquiry answers, and errors rejecting a command outright) use socket `0`.
use crate::{command::TERMINATOR, Error, Result};
use modular_bitfield::{bitfield, specifiers::B4};
use std::fmt::{Display, Formatter};

/// Address byte for replies from camera 1.
pub const REPLY_ADDRESS: u8 = 0x90;

const KIND_ACK: u8 = 0x4;
const KIND_COMPLETION: u8 = 0x5;
const KIND_ERROR: u8 = 0x6;

/// Second byte of every reply.
#[bitfield(bits = 8)]
#[repr(u8)]
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct ReplyStatus {
    /// Socket number the reply refers to.
    pub socket: B4,
    /// Reply type: `4` ACK, `5` Completion, `6` Error.
    pub kind: B4,
}

/// Error codes reported by the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    MessageLength,
    Syntax,
    /// The camera is already executing two commands. The command may be sent
    /// again later.
    CommandBufferFull,
    CommandCanceled,
    NoSocket,
    CommandNotExecutable,
    /// Vendor-specific error code.
    Unknown(u8),
}

impl From<u8> for ErrorCode {
    fn from(v: u8) -> Self {
        use ErrorCode::*;
        match v {
            0x01 => MessageLength,
            0x02 => Syntax,
            0x03 => CommandBufferFull,
            0x04 => CommandCanceled,
            0x05 => NoSocket,
            0x41 => CommandNotExecutable,
            v => Unknown(v),
        }
    }
}

impl From<ErrorCode> for u8 {
    fn from(v: ErrorCode) -> Self {
        use ErrorCode::*;
        match v {
            MessageLength => 0x01,
            Syntax => 0x02,
            CommandBufferFull => 0x03,
            CommandCanceled => 0x04,
            NoSocket => 0x05,
            CommandNotExecutable => 0x41,
            Unknown(v) => v,
        }
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use ErrorCode::*;
        match self {
            MessageLength => f.write_str("message length error"),
            Syntax => f.write_str("syntax error"),
            CommandBufferFull => f.write_str("command buffer full"),
            CommandCanceled => f.write_str("command canceled"),
            NoSocket => f.write_str("no socket"),
            CommandNotExecutable => f.write_str("command not executable"),
            Unknown(v) => write!(f, "unknown error code {v:#04x}"),
        }
    }
}

/// A reply from the camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The command was accepted into `socket`.
    Ack { socket: u8 },

    /// The command in `socket` finished executing.
    ///
    /// For inquiries, `payload` contains the answer and `socket` is `0`.
    Completion { socket: u8, payload: Vec<u8> },

    /// The command failed.
    Error { socket: u8, code: ErrorCode },
}

impl Reply {
    /// Classifies a single reply frame, including address byte and terminator.
    ///
    /// ## Errors
    ///
    /// * [`Error::ProtocolDecode`] for short or unterminated frames, bad
    ///   address bytes, unknown reply types, and ACK or Error replies of the
    ///   wrong length
    pub fn parse(b: &[u8]) -> Result<Self> {
        let [address, status, payload @ .., terminator] = b else {
            return Err(Error::ProtocolDecode("reply too short"));
        };

        if *terminator != TERMINATOR {
            return Err(Error::ProtocolDecode("missing terminator"));
        }

        if address & 0x8f != 0x80 || *address < REPLY_ADDRESS {
            return Err(Error::ProtocolDecode("bad reply address"));
        }

        let status = ReplyStatus::from(*status);
        let socket = status.socket();
        match (status.kind(), payload) {
            (KIND_ACK, []) => Ok(Self::Ack { socket }),
            (KIND_COMPLETION, payload) => Ok(Self::Completion {
                socket,
                payload: payload.to_vec(),
            }),
            (KIND_ERROR, [code]) => Ok(Self::Error {
                socket,
                code: (*code).into(),
            }),
            (KIND_ACK, _) => Err(Error::ProtocolDecode("ACK with payload")),
            (KIND_ERROR, _) => Err(Error::ProtocolDecode("error reply of wrong length")),
            _ => Err(Error::ProtocolDecode("unknown reply type")),
        }
    }

    /// Socket number the reply refers to.
    pub fn socket(&self) -> u8 {
        match self {
            Self::Ack { socket } | Self::Completion { socket, .. } | Self::Error { socket, .. } => {
                *socket
            }
        }
    }

    /// Encodes the reply as camera 1 would send it.
    pub fn to_bytes(&self) -> Vec<u8> {
        let (kind, socket, payload) = match self {
            Self::Ack { socket } => (KIND_ACK, *socket, vec![]),
            Self::Completion { socket, payload } => (KIND_COMPLETION, *socket, payload.clone()),
            Self::Error { socket, code } => (KIND_ERROR, *socket, vec![(*code).into()]),
        };

        let status = ReplyStatus::new().with_socket(socket & 0xf).with_kind(kind);
        let mut o = Vec::with_capacity(payload.len() + 3);
        o.push(REPLY_ADDRESS);
        o.push(status.into());
        o.extend(payload);
        o.push(TERMINATOR);
        o
    }
}
