use std::io::{self, Read, Seek, SeekFrom};

use log::{debug, trace};

use super::{PREFIX_LEN, SENTINEL};
use crate::error::StreamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    AwaitingPrefix,
    /// Payload bytes left in the current frame, always > 0.
    Consuming(u16),
    /// Sentinel seen. Absorbing.
    Terminal,
    /// A framing error occurred. Absorbing.
    Failed,
}

/// Reads one logical stream written by a [`FrameWriter`](super::FrameWriter).
///
/// Frame payloads are presented as one continuous byte stream; `read`
/// returns `Ok(0)` once the sentinel has been consumed, without touching the
/// sink again. [`FrameReader::close`] discards whatever is left of the
/// logical stream so that the next reader on the same sink starts exactly at
/// the next stream's first prefix.
pub struct FrameReader<R: Read> {
    inner: R,
    state: ReaderState,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            state: ReaderState::AwaitingPrefix,
        }
    }

    /// Returns `true` once the end-of-stream sentinel has been read.
    pub fn is_terminal(&self) -> bool {
        self.state == ReaderState::Terminal
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn fail(&mut self, err: StreamError) -> io::Error {
        self.state = ReaderState::Failed;
        err.into()
    }

    fn read_prefix(&mut self) -> io::Result<i16> {
        let mut prefix = [0u8; PREFIX_LEN];
        let mut filled = 0;
        while filled < PREFIX_LEN {
            match self.inner.read(&mut prefix[filled..]) {
                Ok(0) => return Err(self.fail(StreamError::TruncatedPrefix)),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // a partially read prefix cannot be resumed
                    self.state = ReaderState::Failed;
                    return Err(e);
                }
            }
        }
        Ok(i16::from_be_bytes(prefix))
    }

    /// Moves to a frame with payload left and returns its remaining length,
    /// or `None` once the stream is terminal.
    fn next_frame(&mut self) -> io::Result<Option<u16>> {
        loop {
            match self.state {
                ReaderState::Consuming(left) => return Ok(Some(left)),
                ReaderState::Terminal => return Ok(None),
                ReaderState::Failed => return Err(StreamError::Failed.into()),
                ReaderState::AwaitingPrefix => match self.read_prefix()? {
                    SENTINEL => {
                        debug!("end of logical stream");
                        self.state = ReaderState::Terminal;
                    }
                    len if len < 0 => return Err(self.fail(StreamError::InvalidLength(len))),
                    0 => trace!("skipping empty frame"),
                    len => {
                        trace!("reading frame of {len} bytes");
                        self.state = ReaderState::Consuming(len as u16);
                    }
                },
            }
        }
    }

    /// Discards the rest of the logical stream, up to and including the
    /// sentinel. A terminal reader returns immediately.
    pub fn close(&mut self) -> io::Result<()> {
        let mut scratch = [0u8; 512];
        let mut drained = 0usize;
        loop {
            match self.read(&mut scratch) {
                Ok(0) => break,
                Ok(n) => drained += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        if drained > 0 {
            debug!("drained {drained} unread bytes on close");
        }
        Ok(())
    }

    /// Always fails: skipping would need random access the sink lacks.
    pub fn skip(&mut self, _n: u64) -> Result<u64, StreamError> {
        Err(StreamError::Unsupported("skip"))
    }

    /// Always fails.
    pub fn mark(&mut self, _read_limit: usize) -> Result<(), StreamError> {
        Err(StreamError::Unsupported("mark"))
    }

    /// Always fails.
    pub fn reset(&mut self) -> Result<(), StreamError> {
        Err(StreamError::Unsupported("reset"))
    }

    pub fn mark_supported(&self) -> bool {
        false
    }
}

impl<R: Read> Read for FrameReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let Some(left) = self.next_frame()? else {
            return Ok(0);
        };

        let want = buf.len().min(usize::from(left));
        let n = self.inner.read(&mut buf[..want])?;
        if n == 0 {
            return Err(self.fail(StreamError::TruncatedFrame { missing: left }));
        }

        // n <= want <= left
        let left = left - n as u16;
        self.state = if left == 0 {
            ReaderState::AwaitingPrefix
        } else {
            ReaderState::Consuming(left)
        };
        Ok(n)
    }
}

impl<R: Read> Seek for FrameReader<R> {
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(StreamError::Unsupported("seek").into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::FrameWriter;
    use std::io::{Cursor, Write};

    const TEST_BYTES: &[u8] = b"This is a sentence for testing the sending and receiving of the virtual streams";
    const TEST_BYTES_2: &[u8] = b"This is another sentence used for testing a second logical stream";

    fn framed(data: &[u8], capacity: usize) -> Vec<u8> {
        let mut wire = Vec::new();
        let mut w = FrameWriter::with_capacity(&mut wire, capacity).unwrap();
        w.write_all(data).unwrap();
        w.close().unwrap();
        wire
    }

    /// Hands out at most one byte per `read` call.
    struct Trickle<R>(R);

    impl<R: Read> Read for Trickle<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let len = buf.len().min(1);
            self.0.read(&mut buf[..len])
        }
    }

    fn stream_error(err: &io::Error) -> StreamError {
        StreamError::from_io(err).cloned().expect("not a stream error")
    }

    #[test]
    fn reads_back_written_bytes() {
        let wire = framed(TEST_BYTES, 5);
        let mut r = FrameReader::new(wire.as_slice());
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, TEST_BYTES);
        assert!(r.is_terminal());
        assert_eq!(r.read(&mut [0u8; 4]).unwrap(), 0);
    }

    #[test]
    fn empty_stream_is_immediately_terminal() {
        let wire = framed(b"", 5);
        let mut r = FrameReader::new(wire.as_slice());
        assert_eq!(r.read(&mut [0u8; 1]).unwrap(), 0);
        assert!(r.is_terminal());
    }

    #[test]
    fn terminal_reader_does_not_touch_sink() {
        let mut wire = framed(b"abc", 2);
        let end = wire.len() as u64;
        wire.extend_from_slice(b"next stream bytes");

        let mut cursor = Cursor::new(wire);
        let mut r = FrameReader::new(&mut cursor);
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        for _ in 0..3 {
            assert_eq!(r.read(&mut [0u8; 8]).unwrap(), 0);
        }
        r.close().unwrap();
        assert_eq!(cursor.position(), end);
    }

    #[test]
    fn zero_length_frames_are_skipped() {
        let wire = [0, 0, 0, 2, b'a', b'b', 0, 0, 0, 1, b'c', 0xFF, 0xFF];
        let mut out = String::new();
        FrameReader::new(&wire[..]).read_to_string(&mut out).unwrap();
        assert_eq!(out, "abc");
    }

    #[test]
    fn survives_partial_reads_from_sink() {
        let wire = framed(TEST_BYTES, 3);
        let mut r = FrameReader::new(Trickle(wire.as_slice()));
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, TEST_BYTES);
    }

    #[test]
    fn close_drains_rest_of_stream() {
        let mut wire = framed(TEST_BYTES, 5);
        wire.extend(framed(TEST_BYTES_2, 7));
        let mut sink = wire.as_slice();

        let mut first = FrameReader::new(&mut sink);
        let mut head = [0u8; 8];
        first.read_exact(&mut head).unwrap();
        assert_eq!(&head, &TEST_BYTES[..8]);
        first.close().unwrap();
        assert!(first.is_terminal());

        let mut second = FrameReader::new(&mut sink);
        let mut out = Vec::new();
        second.read_to_end(&mut out).unwrap();
        second.close().unwrap();
        assert_eq!(out, TEST_BYTES_2);
        assert!(sink.is_empty());
    }

    #[test]
    fn missing_prefix_is_truncated() {
        let mut r = FrameReader::new(&[0u8; 0][..]);
        let err = r.read(&mut [0u8; 1]).unwrap_err();
        assert_eq!(stream_error(&err), StreamError::TruncatedPrefix);
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        let mut r = FrameReader::new(&[0x00][..]);
        let err = r.read(&mut [0u8; 1]).unwrap_err();
        assert_eq!(stream_error(&err), StreamError::TruncatedPrefix);
    }

    #[test]
    fn negative_length_other_than_sentinel_is_rejected() {
        let mut r = FrameReader::new(&[0xFF, 0xFE][..]);
        let err = r.read(&mut [0u8; 1]).unwrap_err();
        assert_eq!(stream_error(&err), StreamError::InvalidLength(-2));

        let mut r = FrameReader::new(&[0x80, 0x00][..]);
        let err = r.read(&mut [0u8; 1]).unwrap_err();
        assert_eq!(stream_error(&err), StreamError::InvalidLength(i16::MIN));
    }

    #[test]
    fn short_payload_is_truncated_frame() {
        let mut r = FrameReader::new(&[0, 5, b'a', b'b'][..]);
        let mut out = Vec::new();
        let err = r.read_to_end(&mut out).unwrap_err();
        assert_eq!(stream_error(&err), StreamError::TruncatedFrame { missing: 3 });
        assert_eq!(out, b"ab");
    }

    #[test]
    fn reader_stays_failed_after_framing_error() {
        let mut r = FrameReader::new(&[0xFF, 0xFE, 0, 1, b'x', 0xFF, 0xFF][..]);
        assert!(r.read(&mut [0u8; 1]).is_err());
        let err = r.read(&mut [0u8; 1]).unwrap_err();
        assert_eq!(stream_error(&err), StreamError::Failed);
        assert!(r.close().is_err());
    }

    #[test]
    fn skip_mark_reset_and_seek_are_unsupported() {
        let wire = framed(TEST_BYTES, 5);
        let mut r = FrameReader::new(Cursor::new(wire));
        assert_eq!(r.skip(3), Err(StreamError::Unsupported("skip")));
        assert_eq!(r.mark(16), Err(StreamError::Unsupported("mark")));
        assert_eq!(r.reset(), Err(StreamError::Unsupported("reset")));
        assert!(!r.mark_supported());

        let err = r.seek(SeekFrom::Start(0)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);

        // nothing was consumed by the failed calls
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, TEST_BYTES);
    }
}
