//! Cipher envelope: Camellia in CBC mode with PKCS#7 padding.
//!
//! The envelope is a plain `Write`/`Read` transformer, so it can wrap either
//! the content of a logical stream or the framed connection itself.
//!
//! Every stream is encrypted under the same fixed IV. Two messages that
//! share a plaintext prefix under one key therefore share a ciphertext
//! prefix. Deployed peers depend on this IV, so it cannot change without a
//! protocol version bump.

use std::io::{self, Read, Write};

use anyhow::Result;
use camellia::{Camellia128, Camellia192, Camellia256};
use cbc::cipher::{
    BlockDecryptMut, BlockEncryptMut, KeyIvInit,
    block_padding::{Pkcs7, RawPadding},
    generic_array::GenericArray,
};
use log::debug;
use zeroize::Zeroizing;

use super::{BLOCK_LEN, Key};
use crate::error::CryptoError;

/// Initialization vector shared by all peers.
pub const IV: [u8; BLOCK_LEN] = [
    0x46, 0x69, 0x64, 0x65, 0x73, 0x02, 0x69, 0x73, 0x20, 0x53, 0x65, 0x63, 0x75, 0x72, 0x65, 0x21,
];

type Block = [u8; BLOCK_LEN];

enum Encryptor {
    C128(cbc::Encryptor<Camellia128>),
    C192(cbc::Encryptor<Camellia192>),
    C256(cbc::Encryptor<Camellia256>),
}

impl Encryptor {
    fn new(key: &Key) -> Result<Self, CryptoError> {
        let k = key.as_bytes();
        let invalid = |_| CryptoError::InvalidKeyLength(k.len());
        match k.len() {
            16 => cbc::Encryptor::<Camellia128>::new_from_slices(k, &IV)
                .map(Self::C128)
                .map_err(invalid),
            24 => cbc::Encryptor::<Camellia192>::new_from_slices(k, &IV)
                .map(Self::C192)
                .map_err(invalid),
            32 => cbc::Encryptor::<Camellia256>::new_from_slices(k, &IV)
                .map(Self::C256)
                .map_err(invalid),
            n => Err(CryptoError::InvalidKeyLength(n)),
        }
    }

    fn encrypt(&mut self, block: &mut Block) {
        let block = GenericArray::from_mut_slice(&mut block[..]);
        match self {
            Self::C128(c) => c.encrypt_block_mut(block),
            Self::C192(c) => c.encrypt_block_mut(block),
            Self::C256(c) => c.encrypt_block_mut(block),
        }
    }
}

enum Decryptor {
    C128(cbc::Decryptor<Camellia128>),
    C192(cbc::Decryptor<Camellia192>),
    C256(cbc::Decryptor<Camellia256>),
}

impl Decryptor {
    fn new(key: &Key) -> Result<Self, CryptoError> {
        let k = key.as_bytes();
        let invalid = |_| CryptoError::InvalidKeyLength(k.len());
        match k.len() {
            16 => cbc::Decryptor::<Camellia128>::new_from_slices(k, &IV)
                .map(Self::C128)
                .map_err(invalid),
            24 => cbc::Decryptor::<Camellia192>::new_from_slices(k, &IV)
                .map(Self::C192)
                .map_err(invalid),
            32 => cbc::Decryptor::<Camellia256>::new_from_slices(k, &IV)
                .map(Self::C256)
                .map_err(invalid),
            n => Err(CryptoError::InvalidKeyLength(n)),
        }
    }

    fn decrypt(&mut self, block: &mut Block) {
        let block = GenericArray::from_mut_slice(&mut block[..]);
        match self {
            Self::C128(c) => c.decrypt_block_mut(block),
            Self::C192(c) => c.decrypt_block_mut(block),
            Self::C256(c) => c.decrypt_block_mut(block),
        }
    }
}

/// Wraps `sink` so everything written to it is encrypted under `key`.
pub fn wrap_for_encryption<W: Write>(
    sink: W,
    key: &Key,
) -> Result<EncryptingWriter<W>, CryptoError> {
    EncryptingWriter::new(sink, key)
}

/// Wraps `source` so everything read from it is decrypted under `key`.
pub fn wrap_for_decryption<R: Read>(
    source: R,
    key: &Key,
) -> Result<DecryptingReader<R>, CryptoError> {
    DecryptingReader::new(source, key)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EncryptState {
    Open,
    Finished,
    Failed,
}

/// Encrypting sink.
///
/// Completed blocks go to the sink as soon as they fill. The trailing partial
/// block is padded and written by [`EncryptingWriter::finish`]; `flush` alone
/// never pads, since padding ends the cipher stream.
pub struct EncryptingWriter<W: Write> {
    inner: W,
    cipher: Encryptor,
    pending: Zeroizing<Block>,
    filled: usize,
    state: EncryptState,
}

impl<W: Write> EncryptingWriter<W> {
    pub fn new(inner: W, key: &Key) -> Result<Self, CryptoError> {
        Ok(Self {
            inner,
            cipher: Encryptor::new(key)?,
            pending: Zeroizing::new([0; BLOCK_LEN]),
            filled: 0,
            state: EncryptState::Open,
        })
    }

    /// Pads and writes the final block, then flushes the sink.
    ///
    /// Later writes fail; calling `finish` again does nothing.
    pub fn finish(&mut self) -> io::Result<()> {
        match self.state {
            EncryptState::Finished => return Ok(()),
            EncryptState::Failed => return Err(CryptoError::Failed.into()),
            EncryptState::Open => {}
        }
        let mut block = *self.pending;
        Pkcs7::raw_pad(&mut block, self.filled);
        self.cipher.encrypt(&mut block);
        let written = self
            .inner
            .write_all(&block)
            .and_then(|()| self.inner.flush());
        if let Err(err) = written {
            self.state = EncryptState::Failed;
            return Err(err);
        }
        self.state = EncryptState::Finished;
        debug!("cipher stream finished");
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for EncryptingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.state {
            EncryptState::Finished => return Err(CryptoError::Finished.into()),
            EncryptState::Failed => return Err(CryptoError::Failed.into()),
            EncryptState::Open => {}
        }

        let mut out = Vec::with_capacity(buf.len() + BLOCK_LEN);
        let mut rest = buf;
        while !rest.is_empty() {
            let take = rest.len().min(BLOCK_LEN - self.filled);
            self.pending[self.filled..self.filled + take].copy_from_slice(&rest[..take]);
            self.filled += take;
            rest = &rest[take..];

            if self.filled == BLOCK_LEN {
                let mut block = *self.pending;
                self.cipher.encrypt(&mut block);
                out.extend_from_slice(&block);
                self.filled = 0;
            }
        }
        if let Err(err) = self.inner.write_all(&out) {
            // the cipher chain already advanced past the lost blocks
            self.state = EncryptState::Failed;
            return Err(err);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

enum DecryptState {
    Streaming,
    Done,
    Failed(CryptoError),
}

/// Decrypting source.
///
/// The most recent plaintext block is held back until the source reports
/// EOF, because only then is it known to carry the padding. Padding, length
/// and key errors therefore surface at the end of the stream.
pub struct DecryptingReader<R: Read> {
    inner: R,
    cipher: Decryptor,
    input: Block,
    in_len: usize,
    held: Option<Zeroizing<Block>>,
    ready: Zeroizing<Vec<u8>>,
    pos: usize,
    state: DecryptState,
}

impl<R: Read> DecryptingReader<R> {
    pub fn new(inner: R, key: &Key) -> Result<Self, CryptoError> {
        Ok(Self {
            inner,
            cipher: Decryptor::new(key)?,
            input: [0; BLOCK_LEN],
            in_len: 0,
            held: None,
            ready: Zeroizing::new(Vec::with_capacity(BLOCK_LEN)),
            pos: 0,
            state: DecryptState::Streaming,
        })
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn set_ready(&mut self, plain: &[u8]) {
        self.ready.clear();
        self.ready.extend_from_slice(plain);
        self.pos = 0;
    }

    /// Reads ciphertext until one plaintext block is releasable or the
    /// source ends.
    fn fill(&mut self) -> io::Result<()> {
        loop {
            match self.inner.read(&mut self.input[self.in_len..]) {
                Ok(0) => return self.finalize(),
                Ok(n) => {
                    self.in_len += n;
                    if self.in_len < BLOCK_LEN {
                        continue;
                    }
                    let mut block = Zeroizing::new(self.input);
                    self.cipher.decrypt(&mut block);
                    self.in_len = 0;
                    if let Some(prev) = self.held.replace(block) {
                        self.set_ready(&prev[..]);
                        return Ok(());
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn finalize(&mut self) -> io::Result<()> {
        let result = if self.in_len != 0 {
            Err(CryptoError::IncompleteBlock)
        } else {
            match self.held.take() {
                None => Err(CryptoError::EmptyCiphertext),
                Some(last) => Pkcs7::raw_unpad(&last[..])
                    .map(|plain| plain.to_vec())
                    .map_err(|_| CryptoError::BadPadding),
            }
        };

        match result {
            Ok(plain) => {
                self.set_ready(&plain);
                self.state = DecryptState::Done;
                debug!("cipher stream verified");
                Ok(())
            }
            Err(err) => {
                self.state = DecryptState::Failed(err.clone());
                Err(err.into())
            }
        }
    }
}

impl<R: Read> Read for DecryptingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.pos < self.ready.len() {
                let n = buf.len().min(self.ready.len() - self.pos);
                buf[..n].copy_from_slice(&self.ready[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            match self.state {
                DecryptState::Done => return Ok(0),
                DecryptState::Failed(ref err) => return Err(err.clone().into()),
                DecryptState::Streaming => {}
            }
            self.fill()?;
        }
    }
}

/// Encrypt a complete message.
pub fn encrypt(key: &Key, plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut out = EncryptingWriter::new(Vec::with_capacity(plaintext.len() + BLOCK_LEN), key)?;
    out.write_all(plaintext)?;
    out.finish()?;
    Ok(out.into_inner())
}

/// Decrypt a complete message.
pub fn decrypt(key: &Key, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let mut input = DecryptingReader::new(ciphertext, key)?;
    let mut plaintext = Zeroizing::new(Vec::with_capacity(ciphertext.len()));
    input
        .read_to_end(&mut plaintext)
        .map_err(|e| match CryptoError::from_io(&e).cloned() {
            Some(err) => anyhow::Error::from(err),
            None => anyhow::Error::from(e),
        })?;
    Ok(plaintext)
}
