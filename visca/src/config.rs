//! Connection configuration.
use std::{
    fmt::{Display, Formatter},
    net::SocketAddr,
    time::Duration,
};

/// Default TCP port for raw VISCA over TCP.
pub const DEFAULT_TCP_PORT: u16 = 5678;

pub use crate::protocol::ip::DEFAULT_PORT as DEFAULT_UDP_PORT;

/// Where, and how, to reach the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// VISCA over IP: UDP datagrams with an 8 byte header.
    Udp(SocketAddr),
    /// Raw VISCA messages over a TCP stream, for serial-to-TCP bridges and
    /// proxies.
    Tcp(SocketAddr),
}

impl Endpoint {
    pub const fn addr(&self) -> SocketAddr {
        match self {
            Self::Udp(addr) | Self::Tcp(addr) => *addr,
        }
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Udp(addr) => write!(f, "udp://{addr}"),
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
        }
    }
}

/// What to do when both VISCA sockets are busy.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SocketPolicy {
    /// Wait until a socket is freed by a reply or a timeout.
    #[default]
    Wait,
    /// Fail immediately with [`Error::NoFreeSocket`][crate::Error::NoFreeSocket].
    FailFast,
}

/// When a command is considered done from the caller's point of view.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum WaitFor {
    /// Return once the camera has accepted the command into a socket.
    ///
    /// The socket stays in use until the camera reports completion, or
    /// [`ViscaConfig::completion_timeout`] elapses.
    Ack,
    /// Return once the camera has finished executing the command.
    #[default]
    Completion,
}

/// Connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViscaConfig {
    /// How long to wait for the first reply (ACK, or the answer to an
    /// inquiry).
    pub reply_timeout: Duration,

    /// How long to wait for a Completion after an ACK. Movement commands only
    /// complete once the camera stops moving.
    pub completion_timeout: Duration,

    /// Number of times a command is re-sent when the camera reports that its
    /// command buffer is full.
    pub retry_limit: u8,

    /// Delay before the first re-send; doubled for each subsequent attempt.
    pub retry_backoff: Duration,

    pub socket_policy: SocketPolicy,
}

impl Default for ViscaConfig {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::from_secs(2),
            completion_timeout: Duration::from_secs(10),
            retry_limit: 3,
            retry_backoff: Duration::from_millis(50),
            socket_policy: SocketPolicy::Wait,
        }
    }
}

impl ViscaConfig {
    pub fn with_reply_timeout(mut self, reply_timeout: Duration) -> Self {
        self.reply_timeout = reply_timeout;
        self
    }

    pub fn with_completion_timeout(mut self, completion_timeout: Duration) -> Self {
        self.completion_timeout = completion_timeout;
        self
    }

    pub fn with_retry_limit(mut self, retry_limit: u8) -> Self {
        self.retry_limit = retry_limit;
        self
    }

    pub fn with_retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    pub fn with_socket_policy(mut self, socket_policy: SocketPolicy) -> Self {
        self.socket_policy = socket_policy;
        self
    }

    /// Backoff before re-sending after `attempt` failed attempts.
    pub(crate) fn backoff(&self, attempt: u8) -> Duration {
        self.retry_backoff
            .saturating_mul(1u32 << u32::from(attempt.min(16)))
    }
}
