//! Frame dispatch and correlation: the send engine.
//!
//! All outbound frames funnel through [`CommandEngine`]. A synchronous
//! send assigns a frame ID, parks the caller on a keyed subscription and
//! wakes it when the matching response arrives, the receive timeout
//! expires, or the transport closes.

use std::sync::{Arc, Mutex as StdMutex, RwLock};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Mutex;
use tokio::time::{timeout, Instant};

use crate::device::XBeeConfig;
use crate::error::{Error, Result};
use crate::listener::{FrameDispatcher, FrameSubscription};
use crate::protocol::frame::encode;
use crate::protocol::packet::{
    ATCommandFrame, RemoteATCommandFrame, TransmitStatus, XBeeApiFrame, NO_FRAME_ID,
};
use crate::transport::Transport;
use crate::types::address::{XBee16BitAddress, XBee64BitAddress};
use crate::types::atcommand::{ATCommand, ATCommandResponse};
use crate::types::device::OperatingMode;

/// Remote AT transmit option: none.
pub(crate) const REMOTE_OPT_NONE: u8 = 0x00;
/// Remote AT transmit option: apply changes on the remote immediately.
pub(crate) const REMOTE_OPT_APPLY_CHANGES: u8 = 0x02;

/// Where an AT command is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AtDestination {
    /// The locally attached module.
    Local,
    /// A module reached over the air through the local one.
    Remote(XBee64BitAddress),
}

struct FrameIdState {
    current: u8,
    in_use: [bool; 256],
}

/// Allocates correlation IDs in 1..=255, skipping IDs held by live
/// waiters. ID 0 is never handed out; it means "no response expected".
pub(crate) struct FrameIdAllocator {
    state: Arc<StdMutex<FrameIdState>>,
}

impl FrameIdAllocator {
    fn new() -> Self {
        Self {
            state: Arc::new(StdMutex::new(FrameIdState {
                // First allocation wraps to 1.
                current: 0xFF,
                in_use: [false; 256],
            })),
        }
    }

    /// Reserves the next free ID. The reservation is released when the
    /// returned guard drops.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameIdExhausted`] when all 255 IDs are reserved.
    pub(crate) fn acquire(&self) -> Result<FrameIdGuard> {
        let mut state = self.state.lock().expect("frame id state poisoned");
        for _ in 0..255 {
            state.current = if state.current == 0xFF {
                1
            } else {
                state.current + 1
            };
            let id = state.current;
            if !state.in_use[usize::from(id)] {
                state.in_use[usize::from(id)] = true;
                return Ok(FrameIdGuard {
                    id,
                    state: Arc::clone(&self.state),
                });
            }
        }
        Err(Error::FrameIdExhausted)
    }
}

/// RAII reservation of a frame ID.
pub(crate) struct FrameIdGuard {
    id: u8,
    state: Arc<StdMutex<FrameIdState>>,
}

impl FrameIdGuard {
    pub(crate) fn id(&self) -> u8 {
        self.id
    }
}

impl Drop for FrameIdGuard {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.in_use[usize::from(self.id)] = false;
        }
    }
}

/// A keyed listener registered by an asynchronous send.
///
/// Holds the frame-ID reservation for as long as it lives; dropping it
/// releases the ID and retires the keyed subscription.
pub struct ResponseListener {
    subscription: FrameSubscription,
    frame_id: u8,
    _reservation: Option<FrameIdGuard>,
}

impl ResponseListener {
    /// The frame ID responses are keyed on.
    #[must_use]
    pub const fn frame_id(&self) -> u8 {
        self.frame_id
    }

    /// Receives the next frame carrying this listener's frame ID. Returns
    /// `None` once the transport closes.
    pub async fn recv(&mut self) -> Option<XBeeApiFrame> {
        self.subscription.recv().await
    }
}

/// The send engine shared by a local device and its remotes.
pub(crate) struct CommandEngine<T> {
    pub(crate) transport: Arc<Mutex<T>>,
    pub(crate) dispatcher: FrameDispatcher,
    pub(crate) mode: Arc<RwLock<OperatingMode>>,
    pub(crate) config: Arc<RwLock<XBeeConfig>>,
    frame_ids: FrameIdAllocator,
}

impl<T: Transport> CommandEngine<T> {
    pub(crate) fn new(
        transport: Arc<Mutex<T>>,
        dispatcher: FrameDispatcher,
        mode: Arc<RwLock<OperatingMode>>,
        config: Arc<RwLock<XBeeConfig>>,
    ) -> Self {
        Self {
            transport,
            dispatcher,
            mode,
            config,
            frame_ids: FrameIdAllocator::new(),
        }
    }

    pub(crate) fn receive_timeout(&self) -> Duration {
        self.config.read().expect("config poisoned").receive_timeout
    }

    fn operating_mode(&self) -> OperatingMode {
        *self.mode.read().expect("operating mode poisoned")
    }

    fn check_api_mode(&self) -> Result<OperatingMode> {
        let mode = self.operating_mode();
        if mode.is_api() {
            Ok(mode)
        } else {
            Err(Error::InvalidOperatingMode(mode))
        }
    }

    async fn ensure_open(&self) -> Result<()> {
        if self.transport.lock().await.is_open() {
            Ok(())
        } else {
            Err(Error::InterfaceNotOpen)
        }
    }

    /// Encodes and writes one frame under the transport write lock.
    async fn write_frame(&self, frame: &XBeeApiFrame) -> Result<()> {
        let escaped = self.operating_mode().is_escaped();
        let wire = encode(frame, escaped);
        let mut transport = self.transport.lock().await;
        if !transport.is_open() {
            return Err(Error::InterfaceNotOpen);
        }
        tracing::debug!("sending {frame}");
        transport.write(wire).await
    }

    /// Sends a frame without waiting for any response.
    ///
    /// A frame that expects a response but still carries ID 0 gets the
    /// next free ID before it goes out.
    pub(crate) async fn send_frame_async(&self, mut frame: XBeeApiFrame) -> Result<()> {
        self.ensure_open().await?;
        self.check_api_mode()?;
        if frame.needs_frame_id() && frame.frame_id() == Some(NO_FRAME_ID) {
            let reservation = self.frame_ids.acquire()?;
            frame.set_frame_id(reservation.id());
            return self.write_frame(&frame).await;
        }
        self.write_frame(&frame).await
    }

    /// Sends a frame and returns a keyed listener for its responses.
    ///
    /// The caller drives the listener; the reader never blocks on it.
    pub(crate) async fn send_frame_with_listener(
        &self,
        mut frame: XBeeApiFrame,
    ) -> Result<ResponseListener> {
        self.ensure_open().await?;
        self.check_api_mode()?;
        if !frame.needs_frame_id() {
            return Err(Error::InvalidArgument(
                "frame type does not carry a frame ID".into(),
            ));
        }
        let reservation = if frame.frame_id() == Some(NO_FRAME_ID) {
            let r = self.frame_ids.acquire()?;
            frame.set_frame_id(r.id());
            Some(r)
        } else {
            None
        };
        let frame_id = frame.frame_id().unwrap_or(NO_FRAME_ID);

        // Register before writing so a fast response cannot slip past.
        let subscription = self.dispatcher.subscribe_frame_id(frame_id);
        self.write_frame(&frame).await?;
        Ok(ResponseListener {
            subscription,
            frame_id,
            _reservation: reservation,
        })
    }

    /// Sends a frame and blocks until the matching response arrives or the
    /// receive timeout expires.
    ///
    /// Frames that carry no frame ID cannot be correlated; they are sent
    /// asynchronously and `None` comes back.
    pub(crate) async fn send_frame(
        &self,
        mut frame: XBeeApiFrame,
    ) -> Result<Option<XBeeApiFrame>> {
        self.ensure_open().await?;
        self.check_api_mode()?;
        if !frame.needs_frame_id() {
            self.write_frame(&frame).await?;
            return Ok(None);
        }

        let _reservation = if frame.frame_id() == Some(NO_FRAME_ID) {
            let r = self.frame_ids.acquire()?;
            frame.set_frame_id(r.id());
            Some(r)
        } else {
            None
        };
        let frame_id = frame.frame_id().unwrap_or(NO_FRAME_ID);

        // Register the waiter before writing so a fast response cannot
        // slip past, then park until the predicate matches.
        let mut subscription = self.dispatcher.subscribe_frame_id(frame_id);
        let sent_body = frame.body();
        self.write_frame(&frame).await?;

        let receive_timeout = self.receive_timeout();
        let deadline = Instant::now() + receive_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match timeout(remaining, subscription.recv()).await {
                Ok(Some(candidate)) => {
                    if response_matches(&frame, &sent_body, &candidate) {
                        return Ok(Some(candidate));
                    }
                }
                Ok(None) => return Err(Error::TransportClosed),
                Err(_) => {
                    return Err(Error::Timeout {
                        timeout_ms: receive_timeout.as_millis() as u64,
                    })
                }
            }
        }
        // Subscription and reservation drop on every exit path, removing
        // the waiter and freeing the ID.
    }

    /// Sends a transmit frame and verifies the reported delivery status.
    pub(crate) async fn send_and_check(
        &self,
        frame: XBeeApiFrame,
        async_transmission: bool,
    ) -> Result<()> {
        if async_transmission {
            return self.send_frame_async(frame).await;
        }
        let status = match self.send_frame(frame).await? {
            Some(XBeeApiFrame::TransmitStatus(s)) => s.delivery_status,
            Some(XBeeApiFrame::TxStatus(s)) => s.status,
            _ => return Err(Error::Transmit { status: None }),
        };
        if status == TransmitStatus::Success {
            Ok(())
        } else {
            Err(Error::Transmit {
                status: Some(status),
            })
        }
    }

    /// Sends an AT command to the given destination and waits for its
    /// response. Remote destinations wrap the command in a remote AT
    /// request frame.
    pub(crate) async fn send_at_command(
        &self,
        dest: AtDestination,
        command: &ATCommand,
    ) -> Result<ATCommandResponse> {
        let frame = match dest {
            AtDestination::Local => XBeeApiFrame::ATCommand(ATCommandFrame {
                frame_id: NO_FRAME_ID,
                command: command.command(),
                parameter: command.parameter().cloned(),
            }),
            AtDestination::Remote(addr64) => XBeeApiFrame::RemoteATCommand(RemoteATCommandFrame {
                frame_id: NO_FRAME_ID,
                dest64: addr64,
                dest16: XBee16BitAddress::UNKNOWN,
                options: if command.parameter().is_some() {
                    REMOTE_OPT_APPLY_CHANGES
                } else {
                    REMOTE_OPT_NONE
                },
                command: command.command(),
                parameter: command.parameter().cloned(),
            }),
        };
        tracing::debug!("sending AT command '{command}'");

        let response = match self.send_frame(frame).await? {
            Some(XBeeApiFrame::ATCommandResponse(r)) => ATCommandResponse {
                command: command.clone(),
                status: r.status,
                value: r.value,
            },
            Some(XBeeApiFrame::RemoteATCommandResponse(r)) => ATCommandResponse {
                command: command.clone(),
                status: r.status,
                value: r.value,
            },
            _ => {
                return Err(Error::OperationNotSupported(format!(
                    "no response for '{}'",
                    command.name()
                )))
            }
        };
        match &response.value {
            Some(v) => tracing::debug!("AT command response: {}", hex::encode_upper(v)),
            None => tracing::debug!("AT command response: empty"),
        }
        Ok(response)
    }

    /// Sends an AT parameter read/write/execute, enforcing an OK status.
    /// Returns the value carried by the response, if any.
    pub(crate) async fn send_parameter(
        &self,
        dest: AtDestination,
        parameter: &str,
        value: Option<Bytes>,
    ) -> Result<Option<Bytes>> {
        let command = match value {
            Some(v) => ATCommand::with_parameter(parameter, v)?,
            None => ATCommand::new(parameter)?,
        };
        let response = self.send_at_command(dest, &command).await?;
        response.check_status()?;
        Ok(response.value)
    }
}

/// The waiter's match predicate. The keyed subscription already filtered
/// on frame ID; this adds the frame-kind and mnemonic rules plus echo
/// suppression.
fn response_matches(sent: &XBeeApiFrame, sent_body: &Bytes, candidate: &XBeeApiFrame) -> bool {
    match sent {
        XBeeApiFrame::ATCommand(request) => {
            let XBeeApiFrame::ATCommandResponse(response) = candidate else {
                return false;
            };
            if !request.command.eq_ignore_ascii_case(&response.command) {
                return false;
            }
        }
        XBeeApiFrame::RemoteATCommand(request) => {
            let XBeeApiFrame::RemoteATCommandResponse(response) = candidate else {
                return false;
            };
            if !request.command.eq_ignore_ascii_case(&response.command) {
                return false;
            }
        }
        _ => {}
    }
    // A serial port with echo enabled hands our own transmission back.
    candidate.body() != *sent_body
}
