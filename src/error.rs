//! Error types shared by the wire layer and the session engine.

use thiserror::Error;

/// Failure to interpret the bytes of a single PDU.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// A read ran past the end of the frame.
    #[error("PDU truncated: needed {needed} more byte(s), {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// A C-octet string had no NUL before the end of the frame.
    #[error("field `{field}` has no NUL terminator before the end of the frame")]
    MissingTerminator { field: &'static str },

    /// A C-octet string exceeded its maximum length.
    #[error("field `{field}` is {actual} bytes long (maximum {max})")]
    FieldTooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    /// A C-octet string was not valid text.
    #[error("field `{field}` is not valid ASCII/UTF-8 text")]
    InvalidText { field: &'static str },

    /// Declared frame length is smaller than the fixed header.
    #[error("frame length {0} is shorter than the 16-byte header")]
    FrameTooShort(u32),

    /// Declared frame length disagrees with the buffer handed to the decoder.
    #[error("frame declares {declared} bytes but {actual} were supplied")]
    LengthMismatch { declared: u32, actual: usize },

    /// The frame carries a different command than the decoder expects.
    #[error("expected command 0x{expected:08x}, found 0x{actual:08x}")]
    UnexpectedCommand { expected: u32, actual: u32 },
}

/// Errors raised while running a session or one of its tasks.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Read/write failure or connection closed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed PDU.
    #[error("protocol error: {0}")]
    Protocol(#[from] DecodeError),

    /// The peer opened the session with something other than bind_receiver.
    #[error("first PDU is not a bind_receiver request (command 0x{0:08x})")]
    UnexpectedFirstPdu(u32),

    /// The peer rejected our bind request.
    #[error("bind rejected by peer with status 0x{0:08x}")]
    BindRejected(u32),

    /// A frame would need a read buffer beyond the configured cap.
    #[error("frame of {len} bytes exceeds the {max}-byte buffer limit")]
    FrameTooLarge { len: usize, max: usize },

    /// The allocator refused to grow the read buffer.
    #[error("failed to grow read buffer to {0} bytes")]
    BufferGrowth(usize),

    /// A configured I/O deadline elapsed.
    #[error("timed out while {0}")]
    Timeout(&'static str),

    /// An earlier write timed out mid-frame; the stream cannot carry more PDUs.
    #[error("writer abandoned after a timed-out write")]
    WriterPoisoned,

    /// A session task panicked or was cancelled before reporting.
    #[error("session task failed: {0}")]
    TaskFailed(String),
}

impl SessionError {
    /// True when the error means the connection is gone rather than the
    /// peer misbehaving.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, SessionError::Io(_))
    }
}

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, SessionError>;
