//! In-process camera on loopback, for tests.
use crate::{
    config::Endpoint,
    protocol::{
        ip::{PayloadType, ViscaIpPacket},
        ErrorCode, Reply, StreamDeframer,
    },
    Result,
};
use std::{net::SocketAddr, time::Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, UdpSocket},
    select,
    sync::mpsc,
    task::JoinHandle,
    time::timeout,
};

/// Builds the camera's replies to a message.
pub type Handler = Box<dyn FnMut(&[u8]) -> Vec<Reply> + Send>;

/// A message received by the [FakeCamera].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    /// `None` for raw VISCA over TCP.
    pub payload_type: Option<PayloadType>,
    pub sequence: u32,
    pub payload: Vec<u8>,
}

pub struct FakeCamera {
    endpoint: Endpoint,
    received: mpsc::UnboundedReceiver<Received>,
    inject: mpsc::UnboundedSender<Reply>,
    task: JoinHandle<()>,
}

pub fn ack(socket: u8) -> Reply {
    Reply::Ack { socket }
}

pub fn completion(socket: u8) -> Reply {
    Reply::Completion {
        socket,
        payload: vec![],
    }
}

pub fn answer(payload: &str) -> Reply {
    Reply::Completion {
        socket: 0,
        payload: hex::decode(payload).unwrap(),
    }
}

pub fn error(socket: u8, code: ErrorCode) -> Reply {
    Reply::Error { socket, code }
}

impl FakeCamera {
    const RECV_TIMEOUT: Duration = Duration::from_secs(1);

    /// Starts a VISCA over IP camera.
    pub async fn udp(mut handler: Handler) -> Result<Self> {
        let sock = UdpSocket::bind("127.0.0.1:0").await?;
        let endpoint = Endpoint::Udp(sock.local_addr()?);
        let (received_tx, received) = mpsc::unbounded_channel();
        let (inject, mut inject_rx) = mpsc::unbounded_channel::<Reply>();

        let task = tokio::task::spawn(async move {
            let mut b = [0u8; 64];
            let mut peer: Option<(SocketAddr, u32)> = None;
            loop {
                select! {
                    r = sock.recv_from(&mut b) => {
                        let Ok((l, addr)) = r else { return };
                        let pkt = ViscaIpPacket::from_bytes(&b[..l]).unwrap();
                        peer = Some((addr, pkt.sequence));
                        let _ = received_tx.send(Received {
                            payload_type: Some(pkt.payload_type),
                            sequence: pkt.sequence,
                            payload: pkt.payload.clone(),
                        });

                        let replies = match pkt.payload_type {
                            PayloadType::ControlCommand => {
                                let out = ViscaIpPacket::new(
                                    PayloadType::ControlReply,
                                    pkt.sequence,
                                    vec![0x01],
                                );
                                let _ = sock.send_to(&out.to_bytes().unwrap(), addr).await;
                                continue;
                            }
                            _ => handler(&pkt.payload),
                        };

                        for reply in replies {
                            let out = ViscaIpPacket::new(
                                PayloadType::ViscaReply,
                                pkt.sequence,
                                reply.to_bytes(),
                            );
                            let _ = sock.send_to(&out.to_bytes().unwrap(), addr).await;
                        }
                    }

                    Some(reply) = inject_rx.recv() => {
                        let Some((addr, sequence)) = peer else { continue };
                        let out = ViscaIpPacket::new(PayloadType::ViscaReply, sequence, reply.to_bytes());
                        let _ = sock.send_to(&out.to_bytes().unwrap(), addr).await;
                    }
                }
            }
        });

        Ok(Self {
            endpoint,
            received,
            inject,
            task,
        })
    }

    /// Starts a raw VISCA over TCP camera, which accepts a single connection.
    ///
    /// All replies to a message are written together.
    pub async fn tcp(mut handler: Handler) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let endpoint = Endpoint::Tcp(listener.local_addr()?);
        let (received_tx, received) = mpsc::unbounded_channel();
        let (inject, mut inject_rx) = mpsc::unbounded_channel::<Reply>();

        let task = tokio::task::spawn(async move {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let mut deframer = StreamDeframer::new();
            let mut b = [0u8; 64];
            loop {
                select! {
                    r = stream.read(&mut b) => {
                        let Ok(l) = r else { return };
                        if l == 0 {
                            return;
                        }
                        deframer.push(&b[..l]);

                        let mut out = Vec::new();
                        while let Some(frame) = deframer.next_frame() {
                            for reply in handler(&frame) {
                                out.extend(reply.to_bytes());
                            }
                            let _ = received_tx.send(Received {
                                payload_type: None,
                                sequence: 0,
                                payload: frame,
                            });
                        }
                        if !out.is_empty() && stream.write_all(&out).await.is_err() {
                            return;
                        }
                    }

                    Some(reply) = inject_rx.recv() => {
                        if stream.write_all(&reply.to_bytes()).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Ok(Self {
            endpoint,
            received,
            inject,
            task,
        })
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// Waits for the next message sent to the camera.
    pub async fn next(&mut self) -> Option<Received> {
        timeout(Self::RECV_TIMEOUT, self.received.recv())
            .await
            .ok()
            .flatten()
    }

    /// Takes every message received so far, without waiting.
    pub fn drain(&mut self) -> Vec<Received> {
        let mut o = Vec::new();
        while let Ok(r) = self.received.try_recv() {
            o.push(r);
        }
        o
    }

    /// Sends an unsolicited reply to the most recent peer.
    pub fn inject(&self, reply: Reply) {
        self.inject.send(reply).unwrap();
    }
}

impl Drop for FakeCamera {
    fn drop(&mut self) {
        self.task.abort();
    }
}
