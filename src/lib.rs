//! # tick-normalizer
//!
//! Converts exchange market-data feed files into a normalized, tab-separated
//! event stream for a single symbol.
//!
//! Supported inputs:
//!
//! - **BATS PITCH 1.12**: gzip-compressed ASCII messages framed by `S` ... `\n`
//! - **NASDAQ TotalView-ITCH 4.1**: gzip-compressed big-endian binary,
//!   two-byte length prefixed
//! - **NYSE Daily TAQ**: fixed-width text trade or quote records, plain or gzip
//!
//! ## Pipeline
//!
//! ```text
//! mmap -> InflateBuffer -> framer -> decoder -> BookAction -> OrderBook -> TsvWriter
//! ```
//!
//! - [`InflateBuffer`] inflates the mapped file into a fixed 1 MiB working
//!   buffer that is compacted, never resized.
//! - Each [`proto`] reader frames messages and lowers them to a
//!   protocol-neutral [`proto::BookAction`]. Decoded messages borrow the
//!   working buffer, so none can outlive the next compaction.
//! - [`OrderBook`] keeps resting orders for the configured symbol and emits
//!   [`Event`]s; consistency violations are fatal.
//! - [`TsvWriter`] renders events in the OB or TAQ column layout.
//!
//! ## Quick Start
//!
//! ```rust
//! use tick_normalizer::{Format, InflateBuffer, OutputShape, Session, SessionConfig};
//!
//! // One PITCH add order: S <body> \n
//! let input = b"S00000001A000000000AB1B000100TEST  0000123400Y\n".to_vec();
//!
//! let config = SessionConfig::new(Format::BatsPitch, "TEST").with_shape(OutputShape::Ob);
//! let mut session = Session::new(config).unwrap();
//!
//! let mut out = Vec::new();
//! let summary = session
//!     .convert(InflateBuffer::new(input), "2012-01-03", &mut out)
//!     .unwrap();
//!
//! assert_eq!(summary.rows, 2); // date row + add
//! let text = String::from_utf8(out).unwrap();
//! assert!(text.lines().last().unwrap().contains("12.3400"));
//! ```
//!
//! ### Converting a File
//!
//! ```ignore
//! use tick_normalizer::{convert_file, Format, SessionConfig};
//!
//! let config = SessionConfig::new(Format::NasdaqItch, "AAPL").with_progress(true);
//! let stdout = std::io::stdout();
//! convert_file("data/S010312-v41.txt.gz", &config, stdout.lock())?;
//! ```
//!
//! ## Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`error`] | `DecodeError` and `Result` |
//! | [`types`] | `Symbol`, `Decimal`, book records |
//! | [`codec`] | ASCII base-10/base-36 and big-endian field decoding |
//! | [`inflate`] | Streaming gzip/plain working buffer |
//! | [`proto`] | PITCH, ITCH and TAQ framers and decoders |
//! | [`book`] | Symbol filter and order-book state machine |
//! | [`event`] | Normalized events and the sink trait |
//! | [`output`] | TSV writer |
//! | [`session`] | Formats, configuration and conversion runs |
//! | [`stats`] | Per-message-type counts |

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod book;
pub mod codec;
pub mod error;
pub mod event;
pub mod inflate;
pub mod output;
pub mod proto;
pub mod session;
pub mod stats;
pub mod types;

// Re-exports - Core types
pub use error::{DecodeError, Result};
pub use types::{Decimal, ExecRecord, Order, Symbol, TradeType, MAX_SYMBOL_LEN};

// Re-exports - Input
pub use inflate::{InflateBuffer, WORKING_BUFFER_SIZE};
pub use proto::{BookAction, FeedReader, Frame, ItchReader, PitchReader, TaqReader};

// Re-exports - Reconstruction
pub use book::{BookStats, OrderBook, SymbolFilter};

// Re-exports - Output
pub use event::{Event, EventKind, EventSink, Field, VecSink};
pub use output::{OutputShape, TsvWriter};

// Re-exports - Sessions
pub use session::{convert_file, Format, Session, SessionConfig, SessionSummary};
pub use stats::MessageStats;
