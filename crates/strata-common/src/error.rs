use std::error::Error;
use std::fmt;
use std::io;

/// Every failure the storage stack can report.
#[derive(Debug)]
pub enum StrataError {
    /// Underlying I/O failure other than running out of data.
    IoError(io::Error),
    /// A read went past the end of the byte source.
    EndOfData,
    /// An index (region slot, section, array entry) outside its valid range.
    Bounds { index: i64, len: usize },
    /// A tag accessor asked for a variant the tag does not hold.
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    /// Compression scheme id other than gzip (1) or zlib (2).
    UnsupportedScheme(u8),
    /// A variable-length integer ran past its byte budget, or a value does not fit its field.
    Overflow(&'static str),
    /// Decoded data refers to something that does not exist.
    Corruption(String),
    /// Bits-per-value outside [1, 64].
    InvalidWidth(u8),
    /// Structurally invalid input.
    Malformed(String),
    /// Configuration could not be read or parsed.
    Config(String),
}

impl fmt::Display for StrataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrataError::IoError(err) => write!(f, "IO error: {}", err),
            StrataError::EndOfData => write!(f, "Unexpected end of data"),
            StrataError::Bounds { index, len } => {
                write!(f, "Index {} out of bounds (len {})", index, len)
            }
            StrataError::TypeMismatch { expected, found } => {
                write!(f, "Type mismatch: expected {}, found {}", expected, found)
            }
            StrataError::UnsupportedScheme(id) => {
                write!(f, "Unsupported compression scheme: {}", id)
            }
            StrataError::Overflow(what) => write!(f, "Overflow: {}", what),
            StrataError::Corruption(msg) => write!(f, "Corrupted data: {}", msg),
            StrataError::InvalidWidth(bits) => {
                write!(f, "Invalid bits per value: {} (must be 1..=64)", bits)
            }
            StrataError::Malformed(msg) => write!(f, "Malformed data: {}", msg),
            StrataError::Config(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl Error for StrataError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StrataError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for StrataError {
    fn from(err: io::Error) -> Self {
        // Short reads are their own category, not a generic I/O failure
        if err.kind() == io::ErrorKind::UnexpectedEof {
            StrataError::EndOfData
        } else {
            StrataError::IoError(err)
        }
    }
}
