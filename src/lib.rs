//! Framed, optionally encrypted virtual streams over one byte connection.
//!
//! A sync client and server exchange many logical messages over a single
//! long-lived connection. [`FrameWriter`] and [`FrameReader`] delimit those
//! messages; the [`crypto`] envelope encrypts them with a key derived from
//! the user's password. Both layers are plain `std::io` adapters borrowing
//! the connection, so they compose in either order.

pub mod crypto;
mod error;
pub mod message;
pub mod stream;

pub use crate::crypto::{KdfParams, Key};
pub use crate::error::{CryptoError, StreamError};
pub use crate::stream::{FrameReader, FrameWriter};

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::*;
    use crate::crypto::{derive_key, wrap_for_decryption, wrap_for_encryption};
    use crate::stream::MAX_FRAME_LEN;

    const TEST_BYTES: &[u8] =
        b"This is a sentence for testing the sending and receiving of the frame writer and reader";
    const TEST_BYTES_2: &[u8] =
        b"This is another sentence used for testing two logical streams on one connection";

    fn write_stream(sink: &mut Vec<u8>, data: &[u8], capacity: usize) {
        let mut out = FrameWriter::with_capacity(sink, capacity).unwrap();
        out.write_all(data).unwrap();
        out.close().unwrap();
    }

    fn read_stream(source: &mut &[u8]) -> Vec<u8> {
        let mut input = FrameReader::new(source);
        let mut data = Vec::new();
        input.read_to_end(&mut data).unwrap();
        input.close().unwrap();
        data
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    #[test]
    fn roundtrip_across_capacities() {
        for capacity in [1, 2, 5, 16, 1024, MAX_FRAME_LEN] {
            for len in [0, 1, capacity, capacity + 1, 3 * capacity - 1, 70_000] {
                let data = sample(len);
                let mut wire = Vec::new();
                write_stream(&mut wire, &data, capacity);

                let mut source = wire.as_slice();
                let mut input = FrameReader::new(&mut source);
                let mut out = Vec::new();
                input.read_to_end(&mut out).unwrap();
                assert_eq!(out, data, "capacity {capacity}, length {len}");
                assert_eq!(input.read(&mut [0u8; 1]).unwrap(), 0);
                assert!(source.is_empty());
            }
        }
    }

    #[test]
    fn logical_content_does_not_depend_on_capacity() {
        let data = sample(5000);
        let mut reference = None;
        for capacity in [1, 7, 512, 4096] {
            let mut wire = Vec::new();
            write_stream(&mut wire, &data, capacity);
            let content = read_stream(&mut wire.as_slice());
            match &reference {
                None => reference = Some(content),
                Some(r) => assert_eq!(&content, r),
            }
        }
    }

    #[test]
    fn sequential_streams_survive_early_close() {
        let mut wire = Vec::new();
        write_stream(&mut wire, TEST_BYTES, 5);
        write_stream(&mut wire, TEST_BYTES_2, 5);

        let mut source = wire.as_slice();
        let mut first = FrameReader::new(&mut source);
        let mut head = [0u8; 12];
        first.read_exact(&mut head).unwrap();
        first.close().unwrap();

        assert_eq!(&head, &TEST_BYTES[..12]);
        assert_eq!(read_stream(&mut source), TEST_BYTES_2);
        assert!(source.is_empty());
    }

    #[test]
    fn multiple_flushes_keep_content_contiguous() {
        let mut wire = Vec::new();
        let mut out = FrameWriter::with_capacity(&mut wire, 5).unwrap();
        out.flush().unwrap();
        out.write_all(TEST_BYTES).unwrap();
        out.flush().unwrap();
        out.flush().unwrap();
        out.write_all(TEST_BYTES_2).unwrap();
        out.flush().unwrap();
        out.close().unwrap();

        assert_eq!(read_stream(&mut wire.as_slice()), [TEST_BYTES, TEST_BYTES_2].concat());
    }

    #[test]
    fn encryption_inside_frames() {
        let key = derive_key("pw", b"salt", KdfParams::default()).unwrap();
        let mut wire = Vec::new();
        for data in [TEST_BYTES, TEST_BYTES_2] {
            let mut out = FrameWriter::with_capacity(&mut wire, 10).unwrap();
            let mut sealed = wrap_for_encryption(&mut out, &key).unwrap();
            sealed.write_all(data).unwrap();
            sealed.finish().unwrap();
            out.close().unwrap();
        }

        let mut source = wire.as_slice();
        for expected in [TEST_BYTES, TEST_BYTES_2] {
            let mut input = FrameReader::new(&mut source);
            let mut opened = wrap_for_decryption(&mut input, &key).unwrap();
            let mut plain = Vec::new();
            opened.read_to_end(&mut plain).unwrap();
            input.close().unwrap();
            assert_eq!(plain, expected);
        }
        assert!(source.is_empty());
    }

    #[test]
    fn frames_inside_encryption() {
        let key = derive_key("pw", b"salt", KdfParams::default()).unwrap();
        let mut sealed = wrap_for_encryption(Vec::new(), &key).unwrap();
        for data in [TEST_BYTES, TEST_BYTES_2] {
            let mut out = FrameWriter::with_capacity(&mut sealed, 8).unwrap();
            out.write_all(data).unwrap();
            out.close().unwrap();
        }
        sealed.finish().unwrap();
        let wire = sealed.into_inner();

        // prefixes are not visible on the wire
        assert_ne!(&wire[..2], &[0, 8]);

        let mut opened = wrap_for_decryption(wire.as_slice(), &key).unwrap();
        for expected in [TEST_BYTES, TEST_BYTES_2] {
            let mut input = FrameReader::new(&mut opened);
            let mut data = Vec::new();
            input.read_to_end(&mut data).unwrap();
            input.close().unwrap();
            assert_eq!(data, expected);
        }
        let mut rest = Vec::new();
        assert_eq!(opened.read_to_end(&mut rest).unwrap(), 0);
    }

    #[test]
    fn wrong_password_cannot_open_stream() {
        let key = derive_key("correct", b"salt", KdfParams::default()).unwrap();
        let wrong = derive_key("wrong", b"salt", KdfParams::default()).unwrap();

        let mut wire = Vec::new();
        let mut out = FrameWriter::new(&mut wire);
        let mut sealed = wrap_for_encryption(&mut out, &key).unwrap();
        sealed.write_all(TEST_BYTES).unwrap();
        sealed.finish().unwrap();
        out.close().unwrap();

        let mut source = wire.as_slice();
        let mut input = FrameReader::new(&mut source);
        let mut opened = wrap_for_decryption(&mut input, &wrong).unwrap();
        let mut plain = Vec::new();
        match opened.read_to_end(&mut plain) {
            Err(err) => assert_eq!(CryptoError::from_io(&err), Some(&CryptoError::BadPadding)),
            Ok(_) => assert_ne!(plain, TEST_BYTES),
        }
    }
}
