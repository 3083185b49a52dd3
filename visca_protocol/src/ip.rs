//! # VISCA over IP
//!
//! Sony's VISCA over IP wraps each VISCA message in a UDP datagram with an
//! 8 byte header. This typically operates over port 52381.
//!
//! ## Packet format
//!
//! * `u16`: [payload type][PayloadType]
//! * `u16`: payload length
//! * `u32`: sequence number
//! * payload (1 to 16 bytes)
//!
//! All values are big-endian.
//!
//! The controller increments the sequence number for every message it sends,
//! and the camera echoes it back in its replies. The sequence number wraps at
//! `u32::MAX`, and is reset with a [control command][CONTROL_RESET].
use crate::{Error, Result};
use binrw::{binrw, BinRead, BinWrite};
use std::io::Cursor;

/// Default UDP port for VISCA over IP.
pub const DEFAULT_PORT: u16 = 52381;

/// Payload of a [PayloadType::ControlCommand] which resets the camera's
/// sequence number counter.
pub const CONTROL_RESET: [u8; 1] = [0x01];

/// VISCA over IP payload type.
#[binrw]
#[brw(repr = u16, big)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum PayloadType {
    /// VISCA command, from the controller.
    ViscaCommand = 0x0100,
    /// VISCA inquiry, from the controller.
    ViscaInquiry = 0x0110,
    /// VISCA reply (ACK, Completion or Error), from the camera.
    ViscaReply = 0x0111,
    /// VISCA device setting command.
    ViscaDeviceSetting = 0x0120,
    /// Sequence number control, from the controller.
    ControlCommand = 0x0200,
    /// Reply to a [PayloadType::ControlCommand], from the camera.
    ControlReply = 0x0201,
}

/// VISCA over IP header.
#[binrw]
#[brw(big)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViscaIpHeader {
    pub payload_type: PayloadType,
    pub payload_length: u16,
    pub sequence: u32,
}

impl ViscaIpHeader {
    pub const LENGTH: usize = 8;
}

/// A complete VISCA over IP datagram.
#[binrw]
#[brw(big)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViscaIpPacket {
    pub payload_type: PayloadType,

    #[br(temp, assert((1..=Self::MAX_PAYLOAD_LENGTH).contains(&payload_length)))]
    #[bw(try_calc(u16::try_from(payload.len())))]
    payload_length: u16,

    pub sequence: u32,

    #[br(count = payload_length)]
    pub payload: Vec<u8>,
}

impl ViscaIpPacket {
    /// Maximum length of a VISCA message.
    pub const MAX_PAYLOAD_LENGTH: u16 = 16;
    /// Maximum datagram size, including headers.
    pub const MAX_PACKET_LENGTH: usize = ViscaIpHeader::LENGTH + Self::MAX_PAYLOAD_LENGTH as usize;

    pub fn new(payload_type: PayloadType, sequence: u32, payload: Vec<u8>) -> Self {
        Self {
            payload_type,
            sequence,
            payload,
        }
    }

    /// Parses a single datagram.
    ///
    /// ## Errors
    ///
    /// * [`Error::BinRwError`] for unknown payload types and short datagrams
    /// * [`Error::InvalidLength`] when the datagram has trailing bytes
    pub fn from_bytes(b: &[u8]) -> Result<Self> {
        let mut c = Cursor::new(b);
        let pkt = Self::read(&mut c)?;
        if c.position() != b.len() as u64 {
            return Err(Error::InvalidLength);
        }
        Ok(pkt)
    }

    /// Serialises the datagram.
    ///
    /// ## Errors
    ///
    /// * [`Error::InvalidLength`] when the payload is empty or too long
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.payload.is_empty() || self.payload.len() > Self::MAX_PAYLOAD_LENGTH.into() {
            return Err(Error::InvalidLength);
        }
        let mut out = Cursor::new(Vec::with_capacity(ViscaIpHeader::LENGTH + self.payload.len()));
        self.write(&mut out)?;
        Ok(out.into_inner())
    }
}
