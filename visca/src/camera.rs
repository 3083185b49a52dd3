use crate::{
    config::{Endpoint, SocketPolicy, ViscaConfig, WaitFor},
    protocol::{
        Command, ErrorCode, FocusMode, FocusModeStatus, Inquiry, InquiryReply, Message,
        PanTiltRequest, PowerStatus,
    },
    session::{AsyncCommand, Response, ViscaReceiver, SOCKETS},
    Error, Result,
};
use std::sync::Arc;
use tokio::{
    sync::{mpsc, oneshot, Mutex, Notify, Semaphore, TryAcquireError},
    task::JoinHandle,
    time::sleep,
};

/// A running connection: the receiver task, and the handles used to talk to
/// it.
struct Session {
    cmd_tx: mpsc::Sender<AsyncCommand>,
    /// One permit per camera command socket.
    sockets: Arc<Semaphore>,
    stop: Arc<Notify>,
    recv_task: JoinHandle<Result>,
}

impl Session {
    /// Length of the queue of requests waiting to be sent. Callers hold a
    /// socket permit before queueing, so this never fills.
    const QUEUE_LENGTH: usize = SOCKETS;

    async fn start(endpoint: Endpoint, config: ViscaConfig) -> Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel(Self::QUEUE_LENGTH);
        let stop = Arc::new(Notify::new());
        let receiver = ViscaReceiver::connect(endpoint, config, cmd_rx, stop.clone()).await?;

        debug!("spawning receiver task...");
        let recv_task = tokio::task::spawn(receiver.run());
        Ok(Self {
            cmd_tx,
            sockets: Arc::new(Semaphore::new(SOCKETS)),
            stop,
            recv_task,
        })
    }

    /// Signals the receiver task to stop, without waiting for it.
    fn signal_stop(&self) {
        self.sockets.close();
        self.stop.notify_one();
    }

    async fn shutdown(self) -> Result {
        self.signal_stop();
        match self.recv_task.await {
            Err(join_error) => {
                error!("receiver task failed: {join_error}");
                Err(Error::Internal)
            }
            Ok(Err(e)) => {
                // Already reported by the receiver; the connection is closed
                // either way.
                debug!("receiver task had stopped with: {e}");
                Ok(())
            }
            Ok(Ok(())) => Ok(()),
        }
    }
}

/// [ViscaCamera] controls a single PTZ camera over VISCA.
///
/// ## General design
///
/// Each connection is serviced by a receiver task (`ViscaReceiver`), which
/// sends requests queued by [ViscaCamera], reads every reply from the camera,
/// and routes it to the request waiting for it.
///
/// A camera has two command sockets, so at most two requests can be
/// outstanding at a time. [`ViscaConfig::socket_policy`] controls what
/// happens to a third.
///
/// Requests are safe to make concurrently from multiple tasks; all methods
/// take `&self`.
///
/// Dropping a [ViscaCamera] stops the receiver task, and fails all
/// outstanding requests with [`Error::Disconnected`].
pub struct ViscaCamera {
    endpoint: Endpoint,
    config: ViscaConfig,
    session: Mutex<Option<Session>>,
}

impl ViscaCamera {
    /// Connects to a camera.
    ///
    /// For VISCA over IP, this resets the camera's sequence number counter.
    pub async fn connect(endpoint: Endpoint, config: ViscaConfig) -> Result<Self> {
        let session = Session::start(endpoint, config.clone()).await?;
        info!("connected to {endpoint}");
        Ok(Self {
            endpoint,
            config,
            session: Mutex::new(Some(session)),
        })
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn config(&self) -> &ViscaConfig {
        &self.config
    }

    /// Returns `true` if the connection is open, and the receiver task is
    /// still running.
    pub async fn is_connected(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(|s| !s.cmd_tx.is_closed())
    }

    /// Closes the connection.
    ///
    /// Outstanding requests fail with [`Error::Disconnected`]. Closing an
    /// already-closed connection does nothing.
    pub async fn close(&self) -> Result {
        let Some(session) = self.session.lock().await.take() else {
            return Ok(());
        };
        info!("closing connection to {}", self.endpoint);
        session.shutdown().await
    }

    /// Closes the connection (if open), and connects again to the same
    /// endpoint with a fresh sequence number counter.
    pub async fn reconnect(&self) -> Result {
        let mut session = self.session.lock().await;
        if let Some(old) = session.take() {
            old.shutdown().await?;
        }

        info!("reconnecting to {}", self.endpoint);
        *session = Some(Session::start(self.endpoint, self.config.clone()).await?);
        Ok(())
    }

    /// Sends a message once, and waits for the outcome.
    async fn request_once(&self, message: Message, wait: WaitFor) -> Result<Response> {
        let (cmd_tx, sockets) = {
            let session = self.session.lock().await;
            let session = session.as_ref().ok_or(Error::Disconnected)?;
            (session.cmd_tx.clone(), session.sockets.clone())
        };

        // A cancel never occupies a socket, and must get through while both
        // are busy.
        let permit = match self.config.socket_policy {
            _ if message.is_cancel() => None,
            SocketPolicy::Wait => Some(
                sockets
                    .acquire_owned()
                    .await
                    .map_err(|_| Error::Disconnected)?,
            ),
            SocketPolicy::FailFast => Some(sockets.try_acquire_owned().map_err(|e| match e {
                TryAcquireError::NoPermits => Error::NoFreeSocket,
                TryAcquireError::Closed => Error::Disconnected,
            })?),
        };

        // https://tokio.rs/tokio/tutorial/channels#receive-responses
        let (responder, resp_rx) = oneshot::channel();
        cmd_tx
            .send(AsyncCommand {
                message,
                wait,
                permit,
                responder,
            })
            .await
            .map_err(|_| Error::Disconnected)?;

        resp_rx.await.map_err(|_| Error::Disconnected)?
    }

    /// Sends a message, retrying with exponential backoff while the camera's
    /// command buffer is full.
    async fn request(&self, message: Message, wait: WaitFor) -> Result<Response> {
        let mut attempt = 0;
        loop {
            match self.request_once(message.clone(), wait).await {
                Err(Error::Device(ErrorCode::CommandBufferFull))
                    if attempt < self.config.retry_limit =>
                {
                    let delay = self.config.backoff(attempt);
                    attempt += 1;
                    debug!(
                        "command buffer full, retry {attempt}/{} in {delay:?}",
                        self.config.retry_limit
                    );
                    sleep(delay).await;
                }
                r => return r,
            }
        }
    }

    /// Sends a [Command], and waits for the camera to finish executing it.
    ///
    /// ## Errors
    ///
    /// * [`Error::Protocol`] when the command's parameters are out of range;
    ///   nothing is sent
    /// * [`Error::Device`] when the camera rejected or failed the command
    /// * [`Error::Timeout`] when the camera did not reply in time
    /// * [`Error::NoFreeSocket`] when both sockets are busy, and
    ///   [`SocketPolicy::FailFast`] is set
    /// * [`Error::Disconnected`] when the connection is, or becomes, closed
    pub async fn send(&self, command: Command) -> Result {
        self.send_with(command, WaitFor::Completion).await
    }

    /// Sends a [Command], and waits until the point given by `wait`.
    pub async fn send_with(&self, command: Command, wait: WaitFor) -> Result {
        let message = command.to_message()?;
        self.request(message, wait).await?;
        Ok(())
    }

    /// Asks the camera about its state.
    pub async fn inquire(&self, inquiry: Inquiry) -> Result<InquiryReply> {
        match self.request(inquiry.to_message(), WaitFor::Completion).await? {
            Response::Completed(payload) => Ok(inquiry.decode(&payload)?),
            Response::Acknowledged => Err(Error::UnexpectedReply),
        }
    }

    /// Aborts the command the camera holds in `socket` (`1..=2`).
    ///
    /// Returns once the cancel is sent. The canceled request fails with
    /// [`Error::Device`]`(`[`ErrorCode::CommandCanceled`]`)`.
    pub async fn cancel(&self, socket: u8) -> Result {
        self.send(Command::Cancel(socket)).await
    }

    /// Moves the camera according to `request`: continuous movement, or to an
    /// absolute or relative position.
    pub async fn pan_tilt(&self, request: PanTiltRequest) -> Result {
        self.send(request.try_into()?).await
    }

    pub async fn pan_tilt_stop(&self) -> Result {
        self.send(Command::PAN_TILT_STOP).await
    }

    pub async fn pan_tilt_home(&self) -> Result {
        self.send(Command::PanTiltHome).await
    }

    pub async fn pan_tilt_reset(&self) -> Result {
        self.send(Command::PanTiltReset).await
    }

    /// Zooms continuously at `speed` (`-7..=7`; positive zooms in).
    pub async fn zoom(&self, speed: i8) -> Result {
        self.send(Command::Zoom(speed)).await
    }

    pub async fn zoom_stop(&self) -> Result {
        self.send(Command::ZOOM_STOP).await
    }

    /// Zooms directly to `position`.
    pub async fn zoom_to(&self, position: u16) -> Result {
        self.send(Command::ZoomDirect(position)).await
    }

    pub async fn set_focus_mode(&self, mode: FocusMode) -> Result {
        self.send(Command::FocusMode(mode)).await
    }

    /// Drives the focus at `speed` (`-7..=7`; positive focuses near).
    pub async fn manual_focus(&self, speed: i8) -> Result {
        self.send(Command::Focus(speed)).await
    }

    pub async fn save_preset(&self, preset: u8) -> Result {
        self.send(Command::PresetSave(preset)).await
    }

    pub async fn recall_preset(&self, preset: u8) -> Result {
        self.send(Command::PresetRecall(preset)).await
    }

    /// Powers on the camera, or puts it in standby.
    pub async fn set_power(&self, on: bool) -> Result {
        self.send(Command::Power(on)).await
    }

    /// Gets the current pan/tilt position, as `(pan, tilt)`.
    pub async fn pan_tilt_position(&self) -> Result<(i16, i16)> {
        match self.inquire(Inquiry::PanTiltPosition).await? {
            InquiryReply::PanTiltPosition { pan, tilt } => Ok((pan, tilt)),
            _ => Err(Error::UnexpectedReply),
        }
    }

    pub async fn zoom_position(&self) -> Result<u16> {
        match self.inquire(Inquiry::ZoomPosition).await? {
            InquiryReply::ZoomPosition(p) => Ok(p),
            _ => Err(Error::UnexpectedReply),
        }
    }

    pub async fn focus_mode(&self) -> Result<FocusModeStatus> {
        match self.inquire(Inquiry::FocusMode).await? {
            InquiryReply::FocusMode(m) => Ok(m),
            _ => Err(Error::UnexpectedReply),
        }
    }

    pub async fn power_status(&self) -> Result<PowerStatus> {
        match self.inquire(Inquiry::Power).await? {
            InquiryReply::Power(p) => Ok(p),
            _ => Err(Error::UnexpectedReply),
        }
    }
}

impl Drop for ViscaCamera {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.signal_stop();
        }
    }
}
