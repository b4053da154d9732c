use std::io::{self, Write};

use log::{debug, trace, warn};

use super::{DEFAULT_BUFFER_SIZE, MAX_FRAME_LEN, PREFIX_LEN, SENTINEL};
use crate::error::StreamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Open,
    Closed,
    // the sink failed mid-frame or mid-sentinel
    Failed,
}

/// Writes one logical stream as length-prefixed frames.
///
/// Bytes are buffered up to the configured capacity; each flush of the
/// buffer becomes exactly one frame. [`FrameWriter::close`] terminates the
/// logical stream with the sentinel but leaves the sink open, so the next
/// writer can start the following stream on it.
///
/// Pass `&mut sink` to keep ownership of the connection:
///
/// ```
/// use std::io::Write;
/// use syncwire::FrameWriter;
///
/// let mut conn = Vec::new();
/// let mut out = FrameWriter::new(&mut conn);
/// out.write_all(b"hello")?;
/// out.close()?;
/// assert_eq!(conn, [0, 5, b'h', b'e', b'l', b'l', b'o', 0xFF, 0xFF]);
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct FrameWriter<W: Write> {
    inner: W,
    // prefix slot followed by up to `capacity` payload bytes
    frame: Vec<u8>,
    capacity: usize,
    state: WriterState,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            frame: Self::empty_frame(DEFAULT_BUFFER_SIZE),
            capacity: DEFAULT_BUFFER_SIZE,
            state: WriterState::Open,
        }
    }

    /// Creates a writer whose frames carry at most `capacity` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidBufferSize`] unless
    /// `1 <= capacity <= MAX_FRAME_LEN`.
    pub fn with_capacity(inner: W, capacity: usize) -> Result<Self, StreamError> {
        if capacity == 0 || capacity > MAX_FRAME_LEN {
            return Err(StreamError::InvalidBufferSize(capacity));
        }
        Ok(Self {
            inner,
            frame: Self::empty_frame(capacity),
            capacity,
            state: WriterState::Open,
        })
    }

    fn empty_frame(capacity: usize) -> Vec<u8> {
        let mut frame = Vec::with_capacity(PREFIX_LEN + capacity);
        frame.extend_from_slice(&[0; PREFIX_LEN]);
        frame
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.state == WriterState::Closed
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Returns the sink. Buffered bytes that were not flushed are lost.
    pub fn into_inner(self) -> W {
        if self.state == WriterState::Open && self.buffered() > 0 {
            warn!("discarding {} unflushed bytes", self.buffered());
        }
        self.inner
    }

    fn buffered(&self) -> usize {
        self.frame.len() - PREFIX_LEN
    }

    fn ensure_open(&self) -> Result<(), StreamError> {
        match self.state {
            WriterState::Open => Ok(()),
            WriterState::Closed => Err(StreamError::Closed),
            WriterState::Failed => Err(StreamError::Failed),
        }
    }

    /// Emits the buffered bytes as one frame, if there are any.
    fn flush_frame(&mut self) -> io::Result<()> {
        let len = self.buffered();
        if len == 0 {
            return Ok(());
        }
        // capacity <= MAX_FRAME_LEN, so the length always fits
        let prefix = (len as u16).to_be_bytes();
        self.frame[..PREFIX_LEN].copy_from_slice(&prefix);
        if let Err(err) = self.inner.write_all(&self.frame) {
            self.state = WriterState::Failed;
            return Err(err);
        }
        self.frame.truncate(PREFIX_LEN);
        trace!("wrote frame of {len} bytes");
        Ok(())
    }

    /// Ends the logical stream.
    ///
    /// Flushes the remaining bytes as a final frame, writes the sentinel and
    /// flushes the sink. The sink itself is not closed. Closing an already
    /// closed writer is a no-op.
    ///
    /// If the sink fails, the writer is left failed and later calls return
    /// [`StreamError::Failed`] instead of writing a second sentinel.
    pub fn close(&mut self) -> io::Result<()> {
        match self.state {
            WriterState::Closed => {
                debug!("frame writer already closed");
                return Ok(());
            }
            WriterState::Failed => return Err(StreamError::Failed.into()),
            WriterState::Open => {}
        }
        self.flush_frame()?;
        let ended = self
            .inner
            .write_all(&SENTINEL.to_be_bytes())
            .and_then(|()| self.inner.flush());
        if let Err(err) = ended {
            self.state = WriterState::Failed;
            return Err(err);
        }
        self.state = WriterState::Closed;
        debug!("logical stream closed");
        Ok(())
    }
}

impl<W: Write> Write for FrameWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.ensure_open()?;
        let mut consumed = 0;
        while consumed < buf.len() {
            if self.buffered() == self.capacity {
                if let Err(err) = self.flush_frame() {
                    // bytes already buffered from `buf` count as written
                    return if consumed > 0 { Ok(consumed) } else { Err(err) };
                }
            }
            let take = (buf.len() - consumed).min(self.capacity - self.buffered());
            self.frame.extend_from_slice(&buf[consumed..consumed + take]);
            consumed += take;
        }
        Ok(consumed)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.ensure_open()?;
        self.flush_frame()?;
        self.inner.flush()
    }
}
