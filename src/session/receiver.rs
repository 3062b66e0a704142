//! Inbound drain task.
//!
//! States: listening for frames, answering the peer's unbind, done. Only the
//! header of each frame is interpreted.
//!
//! An optional idle signal fires the first time the Receiver has to wait for
//! input, or when it finishes. Every frame already readable before that point
//! has been handled, including a peer `unbind`.

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::{with_deadline, SessionConfig, SessionEnd, SharedSessionState, TaskOutcome};
use crate::error::SessionError;
use crate::smpp::codec::{decode_header, encode_unbind_resp};
use crate::smpp::{CommandId, FrameReader};

/// What the Receiver observed
#[derive(Debug, Clone)]
pub struct ReceiverReport {
    /// `deliver_sm_resp` frames counted
    pub responses: u32,
    /// Frames with a command this session does not handle
    pub ignored: u32,
    pub end: SessionEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Listening,
    Unbinding { sequence_number: u32 },
    Done(SessionEnd),
}

/// Reads frames until the session ends
pub struct Receiver<W> {
    shared: Arc<SharedSessionState<W>>,
    frames: FrameReader,
    io_timeout: Option<Duration>,
    idle_signal: Option<oneshot::Sender<()>>,
}

impl<W> Receiver<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(config: &SessionConfig, shared: Arc<SharedSessionState<W>>) -> Self {
        Self {
            shared,
            frames: FrameReader::new(config.receive_buffer_len, config.max_frame_len),
            io_timeout: config.io_timeout,
            idle_signal: None,
        }
    }

    /// Signal `idle` once the input already available has been drained
    ///
    /// Dropping the Receiver also releases the waiting side.
    pub fn with_idle_signal(mut self, idle: oneshot::Sender<()>) -> Self {
        self.idle_signal = Some(idle);
        self
    }

    pub async fn run<R>(mut self, mut reader: R) -> TaskOutcome<ReceiverReport>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut responses = 0u32;
        let mut ignored = 0u32;
        let mut failure = None;
        let mut state = State::Listening;

        let end = loop {
            state = match state {
                State::Listening => match self.next_frame(&mut reader).await {
                    Ok((command_id, sequence_number, status)) => {
                        match CommandId::from_u32(command_id) {
                            Some(CommandId::DeliverSmResp) => {
                                if status != 0 {
                                    warn!(
                                        seq = sequence_number,
                                        status, "deliver_sm_resp with error status"
                                    );
                                }
                                responses += 1;
                                State::Listening
                            }
                            Some(CommandId::Unbind) => {
                                self.shared.begin_unbind();
                                info!("Unbind request received. Sending response.");
                                State::Unbinding { sequence_number }
                            }
                            Some(CommandId::UnbindResp) => {
                                info!("Unbind response received.");
                                State::Done(SessionEnd::UnbindAcknowledged)
                            }
                            _ => {
                                warn!(
                                    cmd = format_args!("{:#x}", command_id),
                                    seq = sequence_number,
                                    "unexpected PDU received"
                                );
                                ignored += 1;
                                State::Listening
                            }
                        }
                    }
                    Err(e) => {
                        let end = match e {
                            SessionError::Protocol(_) | SessionError::FrameTooLarge { .. } => {
                                SessionEnd::ProtocolViolation
                            }
                            _ => SessionEnd::ConnectionLost,
                        };
                        if e.is_disconnect() {
                            debug!("Receive loop ended: {}", e);
                        } else {
                            error!("Receive loop aborted: {}", e);
                        }
                        failure = Some(e);
                        State::Done(end)
                    }
                },
                State::Unbinding { sequence_number } => {
                    let resp = encode_unbind_resp(sequence_number);
                    if let Err(e) = self.shared.write_frame(&resp, self.io_timeout).await {
                        error!("Error writing unbind response: {}", e);
                        failure = Some(e);
                    }
                    State::Done(SessionEnd::PeerUnbind)
                }
                State::Done(end) => break end,
            };
        };

        info!(responses, "Number of deliver_sm responses received: {}", responses);
        let report = ReceiverReport {
            responses,
            ignored,
            end,
        };
        match failure {
            Some(e) => TaskOutcome::failed(report, e),
            None => TaskOutcome::ok(report),
        }
    }

    /// Read one frame and return its command id, sequence number and status
    ///
    /// The read is polled once before the idle signal is considered; the
    /// signal fires only if that poll finds nothing ready.
    async fn next_frame<R>(&mut self, reader: &mut R) -> Result<(u32, u32, u32), SessionError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let idle_signal = &mut self.idle_signal;
        let mut read = pin!(with_deadline(
            self.io_timeout,
            "reading a frame",
            self.frames.read_frame(reader),
        ));

        let first_poll = std::future::poll_fn(|cx| Poll::Ready(read.as_mut().poll(cx))).await;
        let frame = match first_poll {
            Poll::Ready(result) => result?,
            Poll::Pending => {
                if let Some(idle) = idle_signal.take() {
                    debug!("no input ready, releasing sender");
                    let _ = idle.send(());
                }
                read.await?
            }
        };

        let header = decode_header(frame)?;
        debug!(
            cmd = header.command_id,
            seq = header.sequence_number,
            len = header.length,
            "frame received"
        );
        Ok((header.command_id, header.sequence_number, header.status))
    }
}
