//! Transport layer for VISCA camera control.
//!
//! Two transports are supported:
//!
//! * [ViscaUdpChannel]: Sony's VISCA over IP, which wraps every message in an
//!   8 byte header. This typically operates over port 52381.
//!
//! * [ViscaTcpChannel]: raw VISCA messages over a TCP stream, as exposed by
//!   serial-to-network bridges and proxies. Message boundaries are recovered
//!   with a [StreamDeframer].
use crate::{
    config::Endpoint,
    protocol::{
        ip::{PayloadType, ViscaIpPacket, CONTROL_RESET},
        MessageKind, StreamDeframer,
    },
    Error, Result,
};
use std::{
    io::ErrorKind,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpStream, UdpSocket},
};

/// A reply message received from the camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyFrame {
    /// Sequence number echoed by the camera. Only VISCA over IP has one.
    pub sequence: Option<u32>,
    pub payload: Vec<u8>,
}

pub struct ViscaUdpChannel {
    sock: UdpSocket,
}

impl ViscaUdpChannel {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let local: SocketAddr = if addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let sock = UdpSocket::bind(local).await?;
        sock.connect(addr).await?;
        Ok(Self { sock })
    }

    async fn send_packet(&self, packet: &ViscaIpPacket) -> Result {
        let out = packet.to_bytes()?;
        trace!(">>> {}", hex::encode(&out));
        self.sock.send(&out).await?;
        Ok(())
    }

    /// Sends a VISCA message with the given sequence number.
    pub async fn send(&self, kind: MessageKind, sequence: u32, payload: &[u8]) -> Result {
        let payload_type = match kind {
            MessageKind::Command => PayloadType::ViscaCommand,
            MessageKind::Inquiry => PayloadType::ViscaInquiry,
        };
        self.send_packet(&ViscaIpPacket::new(payload_type, sequence, payload.to_vec()))
            .await
    }

    /// Asks the camera to reset its sequence number counter.
    pub async fn reset_sequence(&self, sequence: u32) -> Result {
        debug!("resetting sequence number");
        self.send_packet(&ViscaIpPacket::new(
            PayloadType::ControlCommand,
            sequence,
            CONTROL_RESET.to_vec(),
        ))
        .await
    }

    /// Receives the next VISCA reply message.
    ///
    /// Control replies, and datagrams which aren't valid VISCA over IP
    /// packets, are logged and skipped.
    pub async fn recv(&self) -> Result<ReplyFrame> {
        let mut b = [0u8; ViscaIpPacket::MAX_PACKET_LENGTH];
        loop {
            let l = match self.sock.recv(&mut b).await {
                Ok(l) => l,
                Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
                    // ICMP port unreachable from an earlier send
                    warn!("camera refused connection");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let b = &b[..l];
            trace!("<<< {}", hex::encode(b));

            let packet = match ViscaIpPacket::from_bytes(b) {
                Ok(p) => p,
                Err(e) => {
                    warn!("dropping malformed datagram: {e}");
                    continue;
                }
            };

            match packet.payload_type {
                PayloadType::ViscaReply => {
                    return Ok(ReplyFrame {
                        sequence: Some(packet.sequence),
                        payload: packet.payload,
                    })
                }
                PayloadType::ControlReply => {
                    debug!(
                        "control reply (seq {}): {}",
                        packet.sequence,
                        hex::encode(&packet.payload)
                    );
                }
                t => warn!("unexpected payload type from camera: {t:?}"),
            }
        }
    }
}

pub struct ViscaTcpChannel {
    stream: TcpStream,
    deframer: StreamDeframer,
}

impl ViscaTcpChannel {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            deframer: StreamDeframer::new(),
        })
    }

    pub async fn send(&mut self, payload: &[u8]) -> Result {
        trace!(">>> {}", hex::encode(payload));
        self.stream.write_all(payload).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Receives the next complete VISCA message from the stream.
    ///
    /// This is cancel safe: bytes are only consumed from the socket by a
    /// single `read()`, and are buffered before returning.
    pub async fn recv(&mut self) -> Result<ReplyFrame> {
        let mut b = [0u8; 256];
        loop {
            if let Some(payload) = self.deframer.next_frame() {
                trace!("<<< {}", hex::encode(&payload));
                return Ok(ReplyFrame {
                    sequence: None,
                    payload,
                });
            }

            let l = self.stream.read(&mut b).await?;
            if l == 0 {
                info!("camera closed the connection");
                return Err(Error::Disconnected);
            }
            self.deframer.push(&b[..l]);
        }
    }

    async fn shutdown(&mut self) -> Result {
        self.stream.shutdown().await?;
        Ok(())
    }
}

/// A connection to a camera, over either transport.
pub enum ViscaChannel {
    Udp(ViscaUdpChannel),
    Tcp(ViscaTcpChannel),
}

impl ViscaChannel {
    /// Opens a connection to `endpoint`.
    ///
    /// For VISCA over IP, this also resets the camera's sequence number to
    /// `sequence`.
    pub async fn connect(endpoint: Endpoint, sequence: u32) -> Result<Self> {
        info!("connecting to {endpoint}");
        Ok(match endpoint {
            Endpoint::Udp(addr) => {
                let channel = ViscaUdpChannel::connect(addr).await?;
                channel.reset_sequence(sequence).await?;
                Self::Udp(channel)
            }
            Endpoint::Tcp(addr) => Self::Tcp(ViscaTcpChannel::connect(addr).await?),
        })
    }

    /// Sends a VISCA message. `sequence` is only used by VISCA over IP.
    pub async fn send(&mut self, kind: MessageKind, sequence: u32, payload: &[u8]) -> Result {
        match self {
            Self::Udp(c) => c.send(kind, sequence, payload).await,
            Self::Tcp(c) => c.send(payload).await,
        }
    }

    /// Receives the next reply frame from the camera. Cancel safe.
    pub async fn recv(&mut self) -> Result<ReplyFrame> {
        match self {
            Self::Udp(c) => c.recv().await,
            Self::Tcp(c) => c.recv().await,
        }
    }

    /// Closes the connection. UDP sockets are closed on drop.
    pub async fn close(&mut self) -> Result {
        match self {
            Self::Udp(_) => Ok(()),
            Self::Tcp(c) => c.shutdown().await,
        }
    }
}
