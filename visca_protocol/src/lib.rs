#![doc = include_str!("../README.md")]

#[macro_use]
extern crate num_derive;

#[macro_use]
extern crate tracing;

pub mod codec;
mod command;
mod error;
pub mod ip;
mod reply;
mod stream;

pub use crate::{
    command::{
        Command, FocusMode, FocusModeStatus, Inquiry, InquiryReply, Message, MessageKind,
        PanTiltRequest, PowerStatus, CAMERA_ADDRESS, MAX_PAN_TILT_SPEED, MAX_SOCKET,
        MAX_ZOOM_FOCUS_SPEED, TERMINATOR,
    },
    error::Error,
    reply::{ErrorCode, Reply, ReplyStatus, REPLY_ADDRESS},
    stream::StreamDeframer,
};

/// Result type.
pub type Result<T = ()> = std::result::Result<T, Error>;
