#![doc = include_str!("../README.md")]

#[macro_use]
extern crate tracing;

mod camera;
pub mod config;
mod error;
#[cfg(test)]
mod fake_camera;
mod session;
pub mod transport;

pub use {
    crate::{
        camera::ViscaCamera,
        config::{Endpoint, SocketPolicy, ViscaConfig, WaitFor},
        error::Error,
    },
    visca_protocol as protocol,
};
pub type Result<T = ()> = std::result::Result<T, Error>;
