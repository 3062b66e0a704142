//! # Session Engine
//!
//! Drives one bound SMPP receiver session over a single full-duplex stream.
//!
//! ## Key Components
//!
//! - **SharedSessionState**: the write half of the connection behind a mutex,
//!   plus the atomic unbind flag. Passed to both tasks by `Arc`.
//! - **Sender**: floods `deliver_sm` PDUs, then sends `unbind` unless the
//!   peer already asked to unbind.
//! - **Receiver**: reads every inbound frame, counts `deliver_sm_resp`, and
//!   answers the peer's `unbind`.
//! - **SessionCoordinator**: splits the stream, spawns both tasks, joins
//!   them and half-closes the connection once both are done.
//!
//! ## Start order
//!
//! The Receiver starts first. The Sender is spawned only after the Receiver
//! has handled every frame that was already readable and has had to wait for
//! more, so a peer `unbind` sitting in the stream stops the session before any
//! delivery goes out.
//!
//! ## Cancellation
//!
//! Cancellation is cooperative. The Sender checks the unbind flag before each
//! frame; a frame already being written is always completed. No read or write
//! has a deadline unless `SessionConfig::io_timeout` is set. A write that
//! times out may leave part of a frame on the wire, so the writer refuses all
//! later frames once that happens.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info, warn};

use crate::error::{Result, SessionError};
use crate::smpp::codec::{decode_bind_receiver, decode_header, encode_bind_receiver_resp};
use crate::smpp::{BindReceiver, BindReceiverResp, CommandId, FrameHeader, FrameReader};

pub mod receiver;
pub mod sender;

pub use receiver::{Receiver, ReceiverReport};
pub use sender::{Sender, SenderReport};

/// Tunables for one session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// System id returned in `bind_receiver_resp`
    pub system_id: String,

    /// Deadline for each frame read or write; `None` blocks indefinitely
    pub io_timeout: Option<Duration>,

    /// Largest frame the receiver will buffer
    pub max_frame_len: usize,

    /// Initial capacity of the receiver's read buffer
    pub receive_buffer_len: usize,

    /// Sender logs progress every this many frames; 0 disables it
    pub progress_interval: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            system_id: crate::defaults::SYSTEM_ID.to_string(),
            io_timeout: None,
            max_frame_len: crate::defaults::MAX_FRAME_LEN,
            receive_buffer_len: crate::defaults::RECEIVE_BUFFER_LEN,
            progress_interval: crate::defaults::PROGRESS_INTERVAL,
        }
    }
}

/// How the session came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEnd {
    /// The peer requested the unbind and we acknowledged it
    PeerUnbind,
    /// We requested the unbind and the peer acknowledged it
    UnbindAcknowledged,
    /// The stream closed or failed before an unbind completed
    ConnectionLost,
    /// An unrecoverable framing error stopped the receive loop
    ProtocolViolation,
}

/// Result of one session task: what it managed to do, and why it stopped
/// early if it did.
#[derive(Debug)]
pub struct TaskOutcome<T> {
    pub report: T,
    pub error: Option<SessionError>,
}

impl<T> TaskOutcome<T> {
    pub fn ok(report: T) -> Self {
        Self {
            report,
            error: None,
        }
    }

    pub fn failed(report: T, error: SessionError) -> Self {
        Self {
            report,
            error: Some(error),
        }
    }
}

/// State shared by the Sender and the Receiver for the lifetime of a session
#[derive(Debug)]
pub struct SharedSessionState<W> {
    writer: Mutex<W>,
    unbinding: AtomicBool,
    // set when a write was abandoned partway through a frame
    poisoned: AtomicBool,
}

impl<W> SharedSessionState<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            unbinding: AtomicBool::new(false),
            poisoned: AtomicBool::new(false),
        }
    }

    /// True once either side has started the unbind handshake from the peer
    pub fn is_unbinding(&self) -> bool {
        self.unbinding.load(Ordering::Acquire)
    }

    /// Raise the unbind flag; returns false if it was already raised
    pub fn begin_unbind(&self) -> bool {
        !self.unbinding.swap(true, Ordering::AcqRel)
    }

    /// True once a timed-out write has left the stream mid-frame
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    /// Write one complete frame while holding the write lock
    ///
    /// If the deadline elapses the frame may be half written; the writer is
    /// then poisoned and every later call fails with `WriterPoisoned`.
    pub async fn write_frame(&self, frame: &[u8], io_timeout: Option<Duration>) -> Result<()> {
        let mut writer = self.writer.lock().await;
        if self.is_poisoned() {
            return Err(SessionError::WriterPoisoned);
        }

        let result = with_deadline(io_timeout, "writing a frame", async {
            writer.write_all(frame).await?;
            writer.flush().await
        })
        .await;

        if let Err(SessionError::Timeout(_)) = &result {
            warn!("frame write timed out; refusing further writes on this stream");
            self.poisoned.store(true, Ordering::Release);
        }
        result
    }

    pub fn into_writer(self) -> W {
        self.writer.into_inner()
    }
}

/// Run `fut`, failing with `SessionError::Timeout` if `deadline` elapses first
pub(crate) async fn with_deadline<T, E, F>(
    deadline: Option<Duration>,
    what: &'static str,
    fut: F,
) -> Result<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    SessionError: From<E>,
{
    match deadline {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result.map_err(SessionError::from),
            Err(_) => Err(SessionError::Timeout(what)),
        },
        None => fut.await.map_err(SessionError::from),
    }
}

/// Perform the responder side of the bind handshake
///
/// The first PDU must be `bind_receiver`; anything else is fatal. On success
/// a `bind_receiver_resp` carrying `config.system_id` and the request's
/// sequence number is written back and the decoded request is returned.
pub async fn accept_bind<S>(stream: &mut S, config: &SessionConfig) -> Result<BindReceiver>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut frames = FrameReader::new(crate::defaults::BIND_BUFFER_LEN, config.max_frame_len);
    let frame = with_deadline(
        config.io_timeout,
        "waiting for bind_receiver",
        frames.read_frame(stream),
    )
    .await?;

    let header = decode_header(frame)?;
    if header.command() != Some(CommandId::BindReceiver) {
        error!(cmd = header.command_id, "bind is not a receiver packet");
        return Err(SessionError::UnexpectedFirstPdu(header.command_id));
    }

    let bind = decode_bind_receiver(frame)?;
    info!(
        system_id = %bind.system_id,
        system_type = %bind.system_type,
        interface_version = format_args!("{:#x}", bind.interface_version),
        "Receiver bound"
    );

    let resp = encode_bind_receiver_resp(&BindReceiverResp {
        header: FrameHeader::new(CommandId::BindReceiverResp, bind.header.sequence_number),
        system_id: config.system_id.clone(),
    });
    with_deadline(config.io_timeout, "writing bind_receiver_resp", async {
        stream.write_all(&resp).await?;
        stream.flush().await
    })
    .await?;

    Ok(bind)
}

/// Aggregated outcome of a completed session
#[derive(Debug, Clone)]
pub struct SessionSummary {
    /// `deliver_sm` frames written
    pub sent: u32,
    /// `deliver_sm_resp` frames received
    pub responses: u32,
    /// Sender's wall-clock time for the delivery loop
    pub elapsed: Duration,
    /// Whether we sent our own `unbind`
    pub unbind_sent: bool,
    pub end: SessionEnd,
}

/// Owns a session from task start to connection teardown
pub struct SessionCoordinator {
    config: SessionConfig,
}

impl SessionCoordinator {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Flood `target_count` deliveries over `stream` and wait for both tasks
    ///
    /// The stream must already be bound. The Sender starts once the Receiver
    /// has drained the input already available. Both tasks always run to a
    /// terminal state before this returns; afterwards the write half is shut
    /// down.
    pub async fn execute<S>(&self, stream: S, target_count: u32) -> Result<SessionSummary>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let shared = Arc::new(SharedSessionState::new(write_half));

        info!("Starting sender and receiver tasks");
        let (idle_tx, idle_rx) = oneshot::channel();
        let receiver =
            Receiver::new(&self.config, Arc::clone(&shared)).with_idle_signal(idle_tx);
        let receiver_task = tokio::spawn(receiver.run(read_half));

        // an Err only means the receiver finished (or died) without waiting
        let _ = idle_rx.await;

        let sender = Sender::new(&self.config, Arc::clone(&shared), target_count);
        let sender_task = tokio::spawn(sender.run());

        let (receiver_result, sender_result) = tokio::join!(receiver_task, sender_task);

        match Arc::try_unwrap(shared) {
            Ok(state) => {
                let mut writer = state.into_writer();
                if let Err(e) = writer.shutdown().await {
                    debug!("Shutting down connection write half failed: {}", e);
                }
            }
            Err(_) => warn!("Session state still shared after join; skipping shutdown"),
        }

        let receiver_outcome =
            receiver_result.map_err(|e| SessionError::TaskFailed(format!("receiver: {}", e)))?;
        let sender_outcome =
            sender_result.map_err(|e| SessionError::TaskFailed(format!("sender: {}", e)))?;

        Self::summarize(sender_outcome, receiver_outcome)
    }

    fn summarize(
        sender: TaskOutcome<SenderReport>,
        receiver: TaskOutcome<ReceiverReport>,
    ) -> Result<SessionSummary> {
        let summary = SessionSummary {
            sent: sender.report.sent,
            responses: receiver.report.responses,
            elapsed: sender.report.elapsed,
            unbind_sent: sender.report.unbind_sent,
            end: receiver.report.end,
        };

        match (sender.error, receiver.error) {
            (None, None) => Ok(summary),
            // peer went away after asking to unbind; nothing was lost
            (Some(e), _) if e.is_disconnect() && summary.end == SessionEnd::PeerUnbind => {
                debug!("Sender write failed after peer unbind: {}", e);
                Ok(summary)
            }
            (Some(e), _) => Err(e),
            (None, Some(e)) if e.is_disconnect() => {
                warn!("Connection lost before unbind completed: {}", e);
                Ok(summary)
            }
            (None, Some(e)) => Err(e),
        }
    }
}
