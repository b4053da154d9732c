//! Virtual streams: sequential logical messages over one byte connection.
//!
//! Wire format:
//! ```text
//! +-----------------+------------------+
//! | LENGTH (2B, BE) | PAYLOAD (LENGTH) |   repeated
//! +-----------------+------------------+
//! | 0xFFFF          |                      once, last
//! +-----------------+
//! ```
//!
//! `LENGTH` is a signed 16-bit value. Non-negative values carry that many
//! payload bytes, `-1` ends the logical stream, anything else is invalid.
//! Logical streams follow each other on the same sink and never interleave.

pub mod reader;
pub mod writer;

pub use reader::FrameReader;
pub use writer::FrameWriter;

/// Length prefix size.
pub const PREFIX_LEN: usize = 2;
/// Largest payload a single frame can carry.
pub const MAX_FRAME_LEN: usize = i16::MAX as usize;
/// Writer buffer capacity used by [`FrameWriter::new`].
pub const DEFAULT_BUFFER_SIZE: usize = 1024;
/// Prefix value marking the end of a logical stream.
pub const SENTINEL: i16 = -1;
