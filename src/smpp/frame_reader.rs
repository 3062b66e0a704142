//! Length-prefixed frame reader.
//!
//! Reads one whole PDU at a time: the 4-byte big-endian `command_length`
//! first, then the remaining `length - 4` bytes. Short reads are continued by
//! `read_exact` until the frame is complete or the stream ends. The reader
//! does not interpret anything beyond the length word; a declared length
//! below the header size is passed through and left for the decoder to
//! reject.

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use super::LENGTH_FIELD_LEN;
use crate::error::{Result, SessionError};

/// Reusable, growable buffer for reading frames off a stream
#[derive(Debug)]
pub struct FrameReader {
    buf: Vec<u8>,
    max_frame_len: usize,
}

impl FrameReader {
    /// Create a reader with `initial_capacity` bytes that will grow up to
    /// `max_frame_len`.
    pub fn new(initial_capacity: usize, max_frame_len: usize) -> Self {
        Self {
            buf: Vec::with_capacity(initial_capacity.max(LENGTH_FIELD_LEN)),
            max_frame_len,
        }
    }

    /// Current buffer capacity
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Read the next complete frame
    ///
    /// Returns the full frame, header included. The slice is valid until
    /// the next call.
    pub async fn read_frame<R>(&mut self, reader: &mut R) -> Result<&[u8]>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        self.buf.clear();
        self.buf.resize(LENGTH_FIELD_LEN, 0);
        reader.read_exact(&mut self.buf[..LENGTH_FIELD_LEN]).await?;

        let declared = u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]);
        let total = (declared as usize).max(LENGTH_FIELD_LEN);

        if total > self.max_frame_len {
            return Err(SessionError::FrameTooLarge {
                len: total,
                max: self.max_frame_len,
            });
        }

        if total > self.buf.capacity() {
            debug!(
                from = self.buf.capacity(),
                to = total,
                "growing frame read buffer"
            );
            self.buf
                .try_reserve_exact(total - self.buf.len())
                .map_err(|_| SessionError::BufferGrowth(total))?;
        }

        // resize keeps the length word already read
        self.buf.resize(total, 0);
        reader.read_exact(&mut self.buf[LENGTH_FIELD_LEN..]).await?;

        Ok(&self.buf)
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new(
            crate::defaults::RECEIVE_BUFFER_LEN,
            crate::defaults::MAX_FRAME_LEN,
        )
    }
}
