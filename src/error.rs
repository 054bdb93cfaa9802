use thiserror::Error;

/// Broad class of a decode failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The file is internally inconsistent or not an MT5 at all.
    Format,
    /// Offsets, lengths or linkage point somewhere they cannot.
    Structural,
}

/// Decoder error types
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid signature at 0x{offset:X}: expected {expected:?}, found {found:?}")]
    BadSignature {
        offset: u64,
        expected: [u8; 4],
        found: [u8; 4],
    },

    #[error("texture count mismatch: TEXD at 0x{offset:X} declares {declared}, found {found}")]
    TextureCountMismatch {
        offset: u64,
        declared: u32,
        found: usize,
    },

    #[error("duplicate {tag} chunk at 0x{offset:X}")]
    DuplicateChunk { tag: &'static str, offset: u64 },

    #[error("offset cycle: {what} record at 0x{offset:X} was already visited")]
    OffsetCycle { what: &'static str, offset: u64 },

    #[error("{what} offset 0x{offset:X} lies outside the {len}-byte buffer")]
    OutOfBounds {
        what: &'static str,
        offset: u64,
        len: usize,
    },

    #[error("truncated {what} at 0x{offset:X}")]
    Truncated { what: &'static str, offset: u64 },

    #[error("malformed {what} at 0x{offset:X}: {message}")]
    Malformed {
        what: &'static str,
        offset: u64,
        message: String,
    },
}

impl DecodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodeError::BadSignature { .. }
            | DecodeError::TextureCountMismatch { .. }
            | DecodeError::DuplicateChunk { .. } => ErrorKind::Format,
            DecodeError::OffsetCycle { .. }
            | DecodeError::OutOfBounds { .. }
            | DecodeError::Truncated { .. }
            | DecodeError::Malformed { .. } => ErrorKind::Structural,
        }
    }

    /// Translate a binrw failure raised while reading the record `what` that starts at `offset`.
    pub fn from_binrw(err: binrw::Error, what: &'static str, offset: u64) -> Self {
        match err {
            binrw::Error::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                DecodeError::Truncated { what, offset }
            }
            binrw::Error::Custom { err, .. } => match err.downcast::<DecodeError>() {
                Ok(inner) => *inner,
                Err(other) => DecodeError::Malformed {
                    what,
                    offset,
                    message: format!("{:?}", other),
                },
            },
            other => DecodeError::Malformed {
                what,
                offset,
                message: other.to_string(),
            },
        }
    }
}

/// Rejected consolidation settings.
#[derive(Debug, Error, PartialEq)]
pub enum ConsolidateError {
    #[error("invalid consolidation option {name} = {value}")]
    InvalidOption { name: &'static str, value: f32 },
}

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecodeError>;
