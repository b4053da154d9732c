use std::{fmt, io};

/// Errors raised by the frame writer and reader.
///
/// All of them are fatal to the logical stream they occur on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Write, flush or close attempted on a closed writer.
    Closed,
    /// Writer capacity outside `1..=MAX_FRAME_LEN`.
    InvalidBufferSize(usize),
    /// The sink ended before a full 2-byte prefix was read.
    TruncatedPrefix,
    /// The sink ended in the middle of a frame payload.
    TruncatedFrame { missing: u16 },
    /// Negative prefix other than the sentinel.
    InvalidLength(i16),
    /// Operation that would break frame boundaries.
    Unsupported(&'static str),
    /// A previous framing or sink error left the stream unusable.
    Failed,
}

impl StreamError {
    /// Recovers a `StreamError` carried inside an `io::Error`.
    pub fn from_io(err: &io::Error) -> Option<&StreamError> {
        err.get_ref().and_then(|inner| inner.downcast_ref())
    }

    fn kind(&self) -> io::ErrorKind {
        match self {
            StreamError::Closed | StreamError::Failed => io::ErrorKind::Other,
            StreamError::InvalidBufferSize(_) => io::ErrorKind::InvalidInput,
            StreamError::TruncatedPrefix | StreamError::TruncatedFrame { .. } => {
                io::ErrorKind::UnexpectedEof
            }
            StreamError::InvalidLength(_) => io::ErrorKind::InvalidData,
            StreamError::Unsupported(_) => io::ErrorKind::Unsupported,
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Closed => write!(f, "stream closed"),
            StreamError::InvalidBufferSize(n) => write!(f, "invalid frame buffer size: {n}"),
            StreamError::TruncatedPrefix => write!(f, "truncated frame prefix"),
            StreamError::TruncatedFrame { missing } => {
                write!(f, "truncated frame: {missing} payload bytes missing")
            }
            StreamError::InvalidLength(l) => write!(f, "invalid frame length: {l}"),
            StreamError::Unsupported(op) => write!(f, "{op} is not supported"),
            StreamError::Failed => write!(f, "stream failed on an earlier error"),
        }
    }
}

impl std::error::Error for StreamError {}

impl From<StreamError> for io::Error {
    fn from(err: StreamError) -> Self {
        io::Error::new(err.kind(), err)
    }
}

/// Errors raised by the cipher envelope and key handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    InvalidKeyLength(usize),
    UnknownAlgorithm(String),
    /// Ciphertext did not end on a block boundary.
    IncompleteBlock,
    EmptyCiphertext,
    /// Final block failed PKCS#7 validation: wrong key or corrupted data.
    BadPadding,
    /// Write attempted after the envelope was finished.
    Finished,
    /// The sink failed earlier; the cipher state no longer matches the output.
    Failed,
}

impl CryptoError {
    /// Recovers a `CryptoError` carried inside an `io::Error`.
    pub fn from_io(err: &io::Error) -> Option<&CryptoError> {
        err.get_ref().and_then(|inner| inner.downcast_ref())
    }
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::InvalidKeyLength(n) => write!(f, "invalid key length: {n} bytes"),
            CryptoError::UnknownAlgorithm(a) => write!(f, "unknown cipher algorithm '{a}'"),
            CryptoError::IncompleteBlock => write!(f, "last block incomplete in decryption"),
            CryptoError::EmptyCiphertext => write!(f, "no ciphertext to decrypt"),
            CryptoError::BadPadding => write!(f, "decryption failed: invalid key or corrupted data"),
            CryptoError::Finished => write!(f, "cipher stream already finished"),
            CryptoError::Failed => write!(f, "cipher stream failed on an earlier write"),
        }
    }
}

impl std::error::Error for CryptoError {}

impl From<CryptoError> for io::Error {
    fn from(err: CryptoError) -> Self {
        let kind = match err {
            CryptoError::InvalidKeyLength(_) | CryptoError::UnknownAlgorithm(_) => {
                io::ErrorKind::InvalidInput
            }
            CryptoError::Finished | CryptoError::Failed => io::ErrorKind::Other,
            _ => io::ErrorKind::InvalidData,
        };
        io::Error::new(kind, err)
    }
}
