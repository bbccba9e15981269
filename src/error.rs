//! Error types for feed decoding and order-book reconstruction.
//!
//! Every variant is fatal: a run either converts the whole file or stops at
//! the first error. Errors raised while a file is being processed are wrapped
//! in [`DecodeError::InFile`] so the message carries the originating file name.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for decoding operations.
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Main error type for decoding operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    // ------------------------------------------------------------------
    // I/O and decompression
    // ------------------------------------------------------------------
    /// File open, stat or mmap failure
    #[error("{path}: {message}")]
    Io { path: PathBuf, message: String },

    /// Corrupt gzip stream
    #[error("inflate failed: {0}")]
    Inflate(String),

    // ------------------------------------------------------------------
    // Framing
    // ------------------------------------------------------------------
    /// Framing marker did not match
    #[error("bad framing marker at offset {offset}: expected 0x{expected:02x}, found 0x{found:02x}")]
    BadMarker { expected: u8, found: u8, offset: u64 },

    /// Stream ended in the middle of a message
    #[error("unexpected end of stream inside a message ({pending} bytes pending)")]
    TruncatedMessage { pending: usize },

    /// Message body shorter than the layout of its type
    #[error("message type '{tag}' needs {expected} bytes, got {actual}")]
    ShortMessage { tag: char, expected: usize, actual: usize },

    /// Message does not fit in the working buffer
    #[error("message of {0} bytes exceeds the working buffer")]
    MessageTooLarge(usize),

    /// Share count wider than the book's quantity type
    #[error("message type '{tag}': share count {value} out of range")]
    QuantityOverflow { tag: char, value: u64 },

    /// Fixed-width header with a record width we have no layout for
    #[error("unsupported record layout: {0} byte records")]
    UnsupportedRecordLayout(usize),

    // ------------------------------------------------------------------
    // Order-book consistency
    // ------------------------------------------------------------------
    /// Order expected to be resting was not found
    #[error("order not found: {0}")]
    OrderNotFound(u64),

    /// Order was dropped by a symbol clear and then referenced again
    #[error("order {0} referenced after symbol clear")]
    OrderCleared(u64),

    /// Add for an order id that is already resting
    #[error("duplicate order: {0}")]
    DuplicateOrder(u64),

    /// Execute or cancel larger than the remaining quantity
    #[error("order {order_id}: quantity {requested} exceeds remaining {remaining}")]
    QuantityUnderflow {
        order_id: u64,
        remaining: u32,
        requested: u32,
    },

    /// Trading state byte outside the known set
    #[error("unknown trading state: '{0}'")]
    UnknownTradingState(char),

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------
    /// Format name not recognised
    #[error("{0}: unsupported file format")]
    UnsupportedFormat(String),

    /// Symbol longer than the protocol's symbol field
    #[error("symbol '{symbol}' is longer than {width} bytes")]
    InvalidSymbol { symbol: String, width: usize },

    /// No date given and none found in the file name
    #[error("{0}: unable to parse date from file name")]
    InvalidDate(String),

    /// Output sink failure
    #[error("write failed: {0}")]
    Emit(String),

    /// Any error raised while processing a named input file
    #[error("{path}: {source}")]
    InFile {
        path: PathBuf,
        #[source]
        source: Box<DecodeError>,
    },

    /// Generic error with context
    #[error("Error: {0}")]
    Generic(String),
}

impl DecodeError {
    /// Create a generic error from any string-like type.
    pub fn generic(msg: impl Into<String>) -> Self {
        DecodeError::Generic(msg.into())
    }

    /// Attach the input file name to an error.
    pub fn in_file(self, path: impl Into<PathBuf>) -> Self {
        match self {
            // Already carries a path
            err @ (DecodeError::InFile { .. } | DecodeError::Io { .. }) => err,
            err => DecodeError::InFile {
                path: path.into(),
                source: Box::new(err),
            },
        }
    }

    /// Build an I/O error for a path.
    pub fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        DecodeError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// The innermost error, looking through file-name wrappers.
    pub fn root(&self) -> &DecodeError {
        match self {
            DecodeError::InFile { source, .. } => source.root(),
            err => err,
        }
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(err: std::io::Error) -> Self {
        DecodeError::Emit(err.to_string())
    }
}

impl From<String> for DecodeError {
    fn from(err: String) -> Self {
        DecodeError::Generic(err)
    }
}

impl From<&str> for DecodeError {
    fn from(err: &str) -> Self {
        DecodeError::Generic(err.to_string())
    }
}
