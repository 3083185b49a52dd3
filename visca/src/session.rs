//! Reply correlation.
//!
//! A VISCA camera accepts at most two commands at a time, one in each of its
//! command sockets (`1` and `2`). A command is acknowledged (`ACK`) when it is
//! accepted into a socket, and completed (`Completion`) or failed (`Error`)
//! when the camera is done with it.
//!
//! The camera picks the socket. A command is bound to a socket number when
//! its `ACK` arrives, and its `Completion` or `Error` is then found by that
//! number. Replies on socket `0` belong to requests which never entered a
//! socket: inquiry answers, and rejected messages. VISCA over IP replies also
//! echo the sequence number of the message they answer, which is used to pick
//! between candidates.
//!
//! [ViscaReceiver] is the only reader of the transport. It owns the pending
//! request table and the sequence number counter, and routes every reply to
//! the caller waiting for it.
use crate::{
    config::{Endpoint, ViscaConfig, WaitFor},
    protocol::{Message, MessageKind, Reply, MAX_SOCKET},
    transport::{ReplyFrame, ViscaChannel},
    Error, Result,
};
use futures::{pin_mut, StreamExt};
use std::{sync::Arc, time::Duration};
use tokio::{
    select,
    sync::{mpsc, oneshot, Notify, OwnedSemaphorePermit},
    time::{interval, Instant},
};
use tokio_stream::wrappers::IntervalStream;

/// Number of command sockets on the camera.
pub const SOCKETS: usize = MAX_SOCKET as usize;

/// Successful outcome of a request.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Response {
    /// The camera accepted the command. Only sent for [WaitFor::Ack].
    Acknowledged,
    /// The camera finished the command. For inquiries, this is the answer.
    Completed(Vec<u8>),
}

/// Internal type for asynchronous message passing.
pub(crate) struct AsyncCommand {
    pub message: Message,
    pub wait: WaitFor,
    /// Reservation of a socket. Released when the request leaves the pending
    /// table.
    ///
    /// `None` for a cancel, which is answered as soon as it is sent.
    pub permit: Option<OwnedSemaphorePermit>,
    pub responder: oneshot::Sender<Result<Response>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestState {
    Sent,
    Acknowledged,
}

struct PendingRequest {
    /// Monotonic request ID, used to find the oldest request.
    id: u64,
    kind: MessageKind,
    sequence: u32,
    state: RequestState,
    /// Camera socket, bound by the command's `ACK`.
    socket: Option<u8>,
    wait: WaitFor,
    deadline: Instant,
    /// `None` once the caller has been notified.
    responder: Option<oneshot::Sender<Result<Response>>>,
    _permit: OwnedSemaphorePermit,
}

impl PendingRequest {
    /// Notifies the caller, keeping the socket reserved.
    fn respond(&mut self, r: Result<Response>) {
        if let Some(responder) = self.responder.take() {
            if responder.send(r).is_err() {
                debug!("responder remote side gone (seq {})", self.sequence);
            }
        }
    }

    /// Releases the socket, then notifies the caller.
    fn finish(self, r: Result<Response>) {
        let Self {
            sequence,
            responder,
            _permit,
            ..
        } = self;
        drop(_permit);

        if let Some(responder) = responder {
            if responder.send(r).is_err() {
                debug!("responder remote side gone (seq {sequence})");
            }
        }
    }
}

pub(crate) struct ViscaReceiver {
    config: ViscaConfig,
    channel: ViscaChannel,
    cmd_rx: mpsc::Receiver<AsyncCommand>,
    /// [Notify] used to track when we need to stop our main event loop.
    stop: Arc<Notify>,
    /// Next sequence number to send.
    sequence: u32,
    next_id: u64,
    /// Requests waiting for a reply. The slot index is unrelated to the
    /// camera's socket number.
    pending: [Option<PendingRequest>; SOCKETS],
}

impl ViscaReceiver {
    /// How often to check for expired requests.
    const SWEEP_INTERVAL: Duration = Duration::from_millis(10);

    /// Connects to the camera, and resets the sequence number counter.
    pub async fn connect(
        endpoint: Endpoint,
        config: ViscaConfig,
        cmd_rx: mpsc::Receiver<AsyncCommand>,
        stop: Arc<Notify>,
    ) -> Result<Self> {
        let mut receiver = Self {
            config,
            channel: ViscaChannel::connect(endpoint, 0).await?,
            cmd_rx,
            stop,
            sequence: 0,
            next_id: 0,
            pending: [None, None],
        };
        // The reset message used sequence 0.
        receiver.next_sequence();
        Ok(receiver)
    }

    fn next_sequence(&mut self) -> u32 {
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        sequence
    }

    pub async fn run(mut self) -> Result {
        let r = self.main_loop().await;
        if let Err(e) = &r {
            warn!("receiver stopped: {e}");
        }

        self.cmd_rx.close();
        self.fail_pending();
        if let Err(e) = self.channel.close().await {
            debug!("error closing channel: {e}");
        }
        r
    }

    /// Main event loop, which waits for:
    ///
    /// * `stop`: stops the loop
    ///
    /// * `cmd_rx`: requests from [ViscaCamera][crate::ViscaCamera] to send to
    ///   the camera. When every sender is dropped, the loop stops.
    ///
    /// * `channel`: replies from the camera, routed to the waiting request.
    ///   Losing the connection stops the loop.
    ///
    /// * `sweep`: times out requests beyond their deadline.
    async fn main_loop(&mut self) -> Result {
        let sweep = IntervalStream::new(interval(Self::SWEEP_INTERVAL));
        pin_mut!(sweep);

        loop {
            select! {
                () = self.stop.notified() => {
                    info!("stopping receiver");
                    return Ok(());
                }

                cmd = self.cmd_rx.recv() => {
                    let Some(cmd) = cmd else {
                        debug!("command channel closed");
                        return Ok(());
                    };
                    self.handle_queued_command(cmd).await;
                }

                frame = self.channel.recv() => {
                    self.handle_incoming_frame(frame?);
                }

                Some(_) = sweep.next() => {
                    self.expire_requests();
                }
            }
        }
    }

    /// Puts a request in a free slot, and sends it.
    async fn handle_queued_command(&mut self, cmd: AsyncCommand) {
        let AsyncCommand {
            message,
            wait,
            permit,
            responder,
        } = cmd;

        let slot = self.pending.iter().position(Option::is_none);
        if permit.is_some() && slot.is_none() {
            error!("no free slot for request holding a permit");
            drop(permit);
            let _ = responder.send(Err(Error::Internal));
            return;
        }

        let sequence = self.next_sequence();
        if let Err(e) = self
            .channel
            .send(message.kind(), sequence, message.payload())
            .await
        {
            error!("error sending request: {e}");
            drop(permit);
            let _ = responder.send(Err(e));
            return;
        }

        let (Some(slot), Some(permit)) = (slot, permit) else {
            trace!("sent {} (seq {sequence})", hex::encode(message.payload()));
            let _ = responder.send(Ok(Response::Acknowledged));
            return;
        };

        let id = self.next_id;
        self.next_id += 1;
        trace!("slot {slot}: sent {:?} (seq {sequence})", message.kind());
        self.pending[slot] = Some(PendingRequest {
            id,
            kind: message.kind(),
            sequence,
            state: RequestState::Sent,
            socket: None,
            wait,
            deadline: Instant::now() + self.config.reply_timeout,
            responder: Some(responder),
            _permit: permit,
        });
    }

    /// Finds the slot of the request matching `filter`.
    ///
    /// When several match, the one with the echoed `sequence` number wins,
    /// then the oldest.
    fn find(
        &self,
        sequence: Option<u32>,
        filter: impl Fn(&PendingRequest) -> bool,
    ) -> Option<usize> {
        let candidates = self
            .pending
            .iter()
            .enumerate()
            .filter_map(|(i, p)| Some((i, p.as_ref()?)))
            .filter(|(_, p)| filter(*p));

        sequence
            .and_then(|seq| candidates.clone().find(|(_, p)| p.sequence == seq))
            .or_else(|| candidates.min_by_key(|(_, p)| p.id))
            .map(|(i, _)| i)
    }

    /// Finds the slot which a reply belongs to.
    fn route(&self, sequence: Option<u32>, reply: &Reply) -> Option<usize> {
        let sent = |p: &PendingRequest| p.state == RequestState::Sent;
        match (reply.socket(), reply) {
            (0, Reply::Ack { .. }) => None,
            (0, Reply::Completion { .. }) => {
                self.find(sequence, |p| sent(p) && p.kind == MessageKind::Inquiry)
            }
            (0, Reply::Error { .. }) => self.find(sequence, sent),

            (s, _) if s > MAX_SOCKET => None,
            (_, Reply::Ack { .. }) => {
                self.find(sequence, |p| sent(p) && p.kind == MessageKind::Command)
            }
            (s, _) => self.find(sequence, |p| p.socket == Some(s)),
        }
    }

    fn handle_incoming_frame(&mut self, frame: ReplyFrame) {
        let ReplyFrame { sequence, payload } = frame;
        let reply = match Reply::parse(&payload) {
            Ok(r) => r,
            Err(e) => {
                warn!("dropping malformed reply {}: {e}", hex::encode(&payload));
                return;
            }
        };

        let Some(slot) = self.route(sequence, &reply) else {
            warn!("no request waiting for {reply:?} (seq {sequence:?})");
            return;
        };

        match reply {
            Reply::Ack { socket } => {
                // The camera only reuses a socket once it is done with it.
                for stale in self.pending.iter_mut().flatten() {
                    if stale.socket == Some(socket) {
                        warn!(
                            "socket {socket} reused while seq {} was waiting",
                            stale.sequence
                        );
                        stale.socket = None;
                    }
                }

                let Some(pending) = self.pending[slot].as_mut() else {
                    return;
                };
                trace!("socket {socket}: acknowledged seq {}", pending.sequence);
                pending.state = RequestState::Acknowledged;
                pending.socket = Some(socket);
                pending.deadline = Instant::now() + self.config.completion_timeout;
                if pending.wait == WaitFor::Ack {
                    pending.respond(Ok(Response::Acknowledged));
                }
            }

            Reply::Completion { socket, payload } => {
                if let Some(pending) = self.pending[slot].take() {
                    trace!("socket {socket}: completed seq {}", pending.sequence);
                    pending.finish(Ok(Response::Completed(payload)));
                }
            }

            Reply::Error { socket, code } => {
                if let Some(pending) = self.pending[slot].take() {
                    debug!(
                        "socket {socket}: camera reported {code} for seq {}",
                        pending.sequence
                    );
                    pending.finish(Err(Error::Device(code)));
                }
            }
        }
    }

    /// Fails every request beyond its deadline with [Error::Timeout], freeing
    /// its socket.
    fn expire_requests(&mut self) {
        let now = Instant::now();
        for slot in self.pending.iter_mut() {
            if !slot.as_ref().is_some_and(|p| p.deadline <= now) {
                continue;
            }

            if let Some(pending) = slot.take() {
                warn!(
                    "seq {}: timeout in state {:?} (socket {:?})",
                    pending.sequence, pending.state, pending.socket
                );
                pending.finish(Err(Error::Timeout));
            }
        }
    }

    /// Fails every pending request with [Error::Disconnected].
    fn fail_pending(&mut self) {
        for pending in self.pending.iter_mut().filter_map(Option::take) {
            pending.finish(Err(Error::Disconnected));
        }
    }
}

impl Drop for ViscaReceiver {
    fn drop(&mut self) {
        self.fail_pending();
    }
}
