//! # Commands and inquiries
//!
//! Every VISCA message sent by the controller has the form:
//!
//! * `u8`: address, `0x80 | device`; this library only addresses camera `1`
//!   ([`CAMERA_ADDRESS`])
//! * `u8`: message category: `0x01` for commands, `0x09` for inquiries
//! * category bytes (eg: `0x06` for pan/tilt, `0x04` for camera)
//! * parameters, usually [nibble-packed][crate::codec]
//! * `0xff` terminator
//!
//! The exception is `Cancel` (`8x 2p ff`), which carries the command socket
//! in place of the category byte.
//!
//! ## Unimplemented commands
//!
//! Command | Bytes
//! ------- | -----
//! `IF_Clear` | `88 01 00 01 ff`
//! `AddressSet` | `88 30 01 ff`
//! `CAM_Preset` reset | `8x 01 04 3f 00 pp ff`
//! `CAM_WB` | `8x 01 04 35 0p ff`
use crate::{
    codec::{check_range, pack, unpack},
    Error, Result,
};
#[cfg(feature = "clap")]
use clap::ValueEnum;
use num_traits::FromPrimitive;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Address byte for messages from the controller to camera 1.
pub const CAMERA_ADDRESS: u8 = 0x81;

/// Terminator byte for every VISCA message.
pub const TERMINATOR: u8 = 0xff;

/// Maximum absolute pan or tilt speed.
pub const MAX_PAN_TILT_SPEED: i8 = 24;

/// Maximum absolute zoom or focus drive speed.
pub const MAX_ZOOM_FOCUS_SPEED: i8 = 7;

const CATEGORY_COMMAND: u8 = 0x01;
const CATEGORY_INQUIRY: u8 = 0x09;
const CANCEL: u8 = 0x20;

/// Highest command socket number.
pub const MAX_SOCKET: u8 = 2;

const PAN_TILTER: u8 = 0x06;
const CAMERA: u8 = 0x04;

/// Whether a [Message] is a command or an inquiry.
///
/// Commands are answered with an ACK and then a Completion (or an Error).
/// Inquiries skip the ACK, and are answered directly with a Completion
/// carrying the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Command,
    Inquiry,
}

/// An encoded VISCA message, ready for framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    kind: MessageKind,
    payload: Vec<u8>,
}

impl Message {
    fn new(kind: MessageKind, body: &[u8]) -> Self {
        let category = match kind {
            MessageKind::Command => CATEGORY_COMMAND,
            MessageKind::Inquiry => CATEGORY_INQUIRY,
        };
        let mut payload = Vec::with_capacity(body.len() + 3);
        payload.push(CAMERA_ADDRESS);
        payload.push(category);
        payload.extend_from_slice(body);
        payload.push(TERMINATOR);
        Self { kind, payload }
    }

    fn cancel(socket: u8) -> Self {
        Self {
            kind: MessageKind::Command,
            payload: vec![CAMERA_ADDRESS, CANCEL | socket, TERMINATOR],
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Returns `true` for [Command::Cancel], which the camera never
    /// acknowledges.
    pub fn is_cancel(&self) -> bool {
        self.kind == MessageKind::Command
            && self.payload.get(1).is_some_and(|b| b & 0xf0 == CANCEL)
    }

    /// The complete VISCA message, including address byte and terminator.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// Focus modes which can be set with [Command::FocusMode].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "clap", derive(ValueEnum))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FocusMode {
    /// Continuous auto-focus.
    Auto,
    Manual,
    /// Toggle between auto and manual focus.
    AutoManual,
    /// Focus once, then stay in manual focus.
    OnePushTrigger,
    /// Move focus to infinity.
    Infinity,
}

impl FocusMode {
    const fn bytes(&self) -> [u8; 2] {
        use FocusMode::*;
        match self {
            Auto => [0x38, 0x02],
            Manual => [0x38, 0x03],
            AutoManual => [0x38, 0x10],
            OnePushTrigger => [0x18, 0x01],
            Infinity => [0x18, 0x02],
        }
    }
}

/// Focus mode reported by [Inquiry::FocusMode].
#[derive(Debug, FromPrimitive, ToPrimitive, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum FocusModeStatus {
    Auto = 0x02,
    Manual = 0x03,
}

/// Power state reported by [Inquiry::Power].
#[derive(Debug, FromPrimitive, ToPrimitive, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum PowerStatus {
    On = 0x02,
    Standby = 0x03,
}

/// Camera commands.
///
/// Parameters are checked when the command is [encoded][Command::to_message].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `CAM_PanTiltDrive`: continuous movement.
    ///
    /// Speeds are `-24..=24`; negative pans left or tilts down, `0` stops
    /// that axis.
    PanTiltDrive { pan_speed: i8, tilt_speed: i8 },

    /// `CAM_PanTiltDrive` absolute position.
    ///
    /// Only the magnitude of the speeds is used.
    PanTiltAbsolute {
        pan_speed: i8,
        tilt_speed: i8,
        pan: i16,
        tilt: i16,
    },

    /// `CAM_PanTiltDrive` relative position.
    PanTiltRelative {
        pan_speed: i8,
        tilt_speed: i8,
        pan: i16,
        tilt: i16,
    },

    PanTiltHome,
    PanTiltReset,

    /// `CAM_Zoom` variable speed: `-7..=7`, positive zooms in (tele),
    /// negative zooms out (wide), `0` stops.
    Zoom(i8),

    /// `CAM_Zoom` direct position.
    ZoomDirect(u16),

    FocusMode(FocusMode),

    /// `CAM_Focus` variable speed: `-7..=7`, positive focuses near, negative
    /// focuses far, `0` stops.
    Focus(i8),

    PresetSave(u8),
    PresetRecall(u8),

    /// `CAM_Power`: `true` powers on, `false` enters standby.
    Power(bool),

    /// Aborts the command in a socket (`1..=2`).
    ///
    /// The camera answers with [`ErrorCode::CommandCanceled`] on that socket,
    /// or [`ErrorCode::NoSocket`] if it was empty.
    ///
    /// [`ErrorCode::CommandCanceled`]: crate::ErrorCode::CommandCanceled
    /// [`ErrorCode::NoSocket`]: crate::ErrorCode::NoSocket
    Cancel(u8),
}

impl Command {
    /// Stops all pan/tilt movement.
    pub const PAN_TILT_STOP: Self = Self::PanTiltDrive {
        pan_speed: 0,
        tilt_speed: 0,
    };

    pub const ZOOM_STOP: Self = Self::Zoom(0);

    /// Encodes the command.
    ///
    /// ## Errors
    ///
    /// * [`Error::ParameterOutOfRange`] when a speed is outside of its
    ///   protocol range
    pub fn to_message(&self) -> Result<Message> {
        let body = match *self {
            Self::Cancel(socket) => {
                return Ok(Message::cancel(check_range(socket, 1, MAX_SOCKET)?));
            }

            Self::PanTiltDrive {
                pan_speed,
                tilt_speed,
            } => {
                let (pan_speed, tilt_speed) = check_pan_tilt_speeds(pan_speed, tilt_speed)?;
                vec![
                    PAN_TILTER,
                    0x01,
                    pan_speed.unsigned_abs(),
                    tilt_speed.unsigned_abs(),
                    drive_direction(pan_speed),
                    drive_direction(tilt_speed),
                ]
            }

            Self::PanTiltAbsolute {
                pan_speed,
                tilt_speed,
                pan,
                tilt,
            } => position_body(0x02, pan_speed, tilt_speed, pan, tilt)?,

            Self::PanTiltRelative {
                pan_speed,
                tilt_speed,
                pan,
                tilt,
            } => position_body(0x03, pan_speed, tilt_speed, pan, tilt)?,

            Self::PanTiltHome => vec![PAN_TILTER, 0x04],
            Self::PanTiltReset => vec![PAN_TILTER, 0x05],

            // Tele is 0x2p, wide is 0x3p.
            Self::Zoom(speed) => vec![CAMERA, 0x07, variable_speed(speed, 0x20, 0x30)?],

            Self::ZoomDirect(position) => {
                let mut body = vec![CAMERA, 0x47];
                body.extend(pack(position.into(), 4, false)?);
                body
            }

            Self::FocusMode(mode) => {
                let mut body = vec![CAMERA];
                body.extend_from_slice(&mode.bytes());
                body
            }

            // Far is 0x2p, near is 0x3p.
            Self::Focus(speed) => vec![CAMERA, 0x08, variable_speed(speed, 0x30, 0x20)?],

            Self::PresetSave(preset) => vec![CAMERA, 0x3f, 0x01, preset],
            Self::PresetRecall(preset) => vec![CAMERA, 0x3f, 0x02, preset],

            Self::Power(on) => vec![CAMERA, 0x00, if on { 0x02 } else { 0x03 }],
        };

        Ok(Message::new(MessageKind::Command, &body))
    }
}

fn check_pan_tilt_speeds(pan_speed: i8, tilt_speed: i8) -> Result<(i8, i8)> {
    Ok((
        check_range(pan_speed, -MAX_PAN_TILT_SPEED, MAX_PAN_TILT_SPEED)?,
        check_range(tilt_speed, -MAX_PAN_TILT_SPEED, MAX_PAN_TILT_SPEED)?,
    ))
}

/// Direction byte for `CAM_PanTiltDrive`: `01` left/down, `02` right/up,
/// `03` stop.
const fn drive_direction(speed: i8) -> u8 {
    if speed < 0 {
        0x01
    } else if speed > 0 {
        0x02
    } else {
        0x03
    }
}

fn position_body(mode: u8, pan_speed: i8, tilt_speed: i8, pan: i16, tilt: i16) -> Result<Vec<u8>> {
    let (pan_speed, tilt_speed) = check_pan_tilt_speeds(pan_speed, tilt_speed)?;
    let mut body = vec![
        PAN_TILTER,
        mode,
        pan_speed.unsigned_abs(),
        tilt_speed.unsigned_abs(),
    ];
    body.extend(pack(pan.into(), 4, true)?);
    body.extend(pack(tilt.into(), 4, true)?);
    Ok(body)
}

/// Encodes a `-7..=7` drive speed into a single direction/speed byte.
fn variable_speed(speed: i8, positive: u8, negative: u8) -> Result<u8> {
    let speed = check_range(speed, -MAX_ZOOM_FOCUS_SPEED, MAX_ZOOM_FOCUS_SPEED)?;
    Ok(match speed {
        0 => 0x00,
        s if s > 0 => positive | s.unsigned_abs(),
        s => negative | s.unsigned_abs(),
    })
}

/// Pan/tilt movement request with optional target position.
///
/// When neither position is set, this is a continuous drive. When both are
/// set, the camera moves to that position (or by that offset, if `relative`).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PanTiltRequest {
    pub pan_speed: i8,
    pub tilt_speed: i8,
    pub pan_position: Option<i16>,
    pub tilt_position: Option<i16>,
    pub relative: bool,
}

impl TryFrom<PanTiltRequest> for Command {
    type Error = Error;

    fn try_from(req: PanTiltRequest) -> Result<Self> {
        let PanTiltRequest {
            pan_speed,
            tilt_speed,
            pan_position,
            tilt_position,
            relative,
        } = req;

        match (pan_position, tilt_position) {
            (None, None) if relative => Err(Error::InvalidCommand(
                "relative movement needs both pan and tilt positions",
            )),
            (None, None) => Ok(Command::PanTiltDrive {
                pan_speed,
                tilt_speed,
            }),
            (Some(pan), Some(tilt)) if relative => Ok(Command::PanTiltRelative {
                pan_speed,
                tilt_speed,
                pan,
                tilt,
            }),
            (Some(pan), Some(tilt)) => Ok(Command::PanTiltAbsolute {
                pan_speed,
                tilt_speed,
                pan,
                tilt,
            }),
            _ => Err(Error::InvalidCommand(
                "positional movement needs both pan and tilt positions",
            )),
        }
    }
}

/// Camera inquiries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Inquiry {
    /// `Pan-tiltPosInq`
    PanTiltPosition,
    /// `CAM_ZoomPosInq`
    ZoomPosition,
    /// `CAM_FocusModeInq`
    FocusMode,
    /// `CAM_PowerInq`
    Power,
}

/// Decoded answer to an [Inquiry].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum InquiryReply {
    PanTiltPosition { pan: i16, tilt: i16 },
    ZoomPosition(u16),
    FocusMode(FocusModeStatus),
    Power(PowerStatus),
}

impl Inquiry {
    pub fn to_message(&self) -> Message {
        let body: &[u8] = match self {
            Self::PanTiltPosition => &[PAN_TILTER, 0x12],
            Self::ZoomPosition => &[CAMERA, 0x47],
            Self::FocusMode => &[CAMERA, 0x38],
            Self::Power => &[CAMERA, 0x00],
        };
        Message::new(MessageKind::Inquiry, body)
    }

    /// Decodes the answer to this inquiry.
    ///
    /// `payload` is the part of the Completion reply between the `y0 50`
    /// header and the terminator.
    ///
    /// ## Errors
    ///
    /// * [`Error::InvalidLength`] when `payload` is the wrong size
    /// * [`Error::UnknownValue`] when the reported mode is not known
    pub fn decode(&self, payload: &[u8]) -> Result<InquiryReply> {
        match self {
            Self::PanTiltPosition => {
                // 0p 0q 0r 0s 0t 0u 0v 0w: pan = pqrs, tilt = tuvw
                if payload.len() != 8 {
                    return Err(Error::InvalidLength);
                }
                Ok(InquiryReply::PanTiltPosition {
                    pan: unpack(&payload[..4], true)? as i16,
                    tilt: unpack(&payload[4..], true)? as i16,
                })
            }

            Self::ZoomPosition => {
                if payload.len() != 4 {
                    return Err(Error::InvalidLength);
                }
                Ok(InquiryReply::ZoomPosition(unpack(payload, false)? as u16))
            }

            Self::FocusMode => {
                let [mode] = payload else {
                    return Err(Error::InvalidLength);
                };
                FocusModeStatus::from_u8(*mode)
                    .map(InquiryReply::FocusMode)
                    .ok_or(Error::UnknownValue(*mode))
            }

            Self::Power => {
                let [power] = payload else {
                    return Err(Error::InvalidLength);
                };
                PowerStatus::from_u8(*power)
                    .map(InquiryReply::Power)
                    .ok_or(Error::UnknownValue(*power))
            }
        }
    }
}
