//! Conversion sessions.
//!
//! A session ties one input file to one output stream: it picks the feed
//! reader for the configured [`Format`], runs every decoded action through
//! a fresh [`OrderBook`], and writes the resulting events as TSV.
//!
//! # Example
//!
//! ```ignore
//! use tick_normalizer::{Format, OutputShape, SessionConfig, convert_file};
//!
//! let config = SessionConfig::new(Format::BatsPitch, "AAPL")
//!     .with_shape(OutputShape::Ob);
//!
//! let stdout = std::io::stdout();
//! let summary = convert_file("data/BATS_20120103.dat.gz", &config, stdout.lock())?;
//! println!("{} rows", summary.rows);
//! ```

use std::fmt;
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::book::{OrderBook, SymbolFilter};
use crate::error::{DecodeError, Result};
use crate::event::{Event, EventSink};
use crate::inflate::InflateBuffer;
use crate::output::{OutputShape, TsvWriter};
use crate::proto::{itch, pitch, taq, FeedReader, ItchReader, PitchReader, TaqReader};

/// Time zone written on the date row unless configured otherwise.
pub const DEFAULT_TIME_ZONE: &str = "America/New_York";

// ============================================================================
// Formats
// ============================================================================

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    #[serde(rename = "bats-pitch-1.12")]
    BatsPitch,
    #[serde(rename = "nasdaq-itch-4.1")]
    NasdaqItch,
    #[serde(rename = "nyse-taq-1.7")]
    NyseTaq,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::BatsPitch, Format::NasdaqItch, Format::NyseTaq];

    /// Parse a format name.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnsupportedFormat`] for unknown names.
    pub fn parse(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.name() == name)
            .ok_or_else(|| DecodeError::UnsupportedFormat(name.to_string()))
    }

    pub fn name(self) -> &'static str {
        match self {
            Format::BatsPitch => "bats-pitch-1.12",
            Format::NasdaqItch => "nasdaq-itch-4.1",
            Format::NyseTaq => "nyse-taq-1.7",
        }
    }

    /// Width of the symbol field on the wire.
    pub fn symbol_width(self) -> usize {
        match self {
            Format::BatsPitch => pitch::SYMBOL_LEN,
            Format::NasdaqItch => itch::SYMBOL_LEN,
            Format::NyseTaq => taq::SYMBOL_LEN,
        }
    }

    /// Exchange written on every row. Empty for NYSE TAQ, where the
    /// venue comes from each record.
    pub fn default_exchange(self) -> &'static str {
        match self {
            Format::BatsPitch => "BATS",
            Format::NasdaqItch => "XNAS",
            Format::NyseTaq => "",
        }
    }

    /// Trading date encoded in a file name, as `YYYY-MM-DD`.
    pub fn parse_date(self, filename: &str) -> Option<String> {
        match self {
            Format::BatsPitch => pitch::parse_date(filename),
            Format::NasdaqItch => itch::parse_date(filename),
            Format::NyseTaq => taq::parse_date(filename),
        }
    }

    /// Human-readable name of a message tag.
    pub fn message_name(self, tag: u8) -> &'static str {
        match self {
            Format::BatsPitch => pitch::message_name(tag),
            Format::NasdaqItch => itch::message_name(tag),
            Format::NyseTaq => taq::message_name(tag),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self> {
        Format::parse(s)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for one conversion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Input format
    pub format: Format,

    /// Symbol to extract, unpadded
    pub symbol: String,

    /// Output column layout
    pub shape: OutputShape,

    /// Trading date; taken from the file name when absent
    pub date: Option<String>,

    /// Exchange column; the format's default when absent
    pub exchange: Option<String>,

    /// Time zone column of the date row
    pub time_zone: String,

    /// Print a progress line to stderr while converting
    #[serde(default)]
    pub progress: bool,
}

impl SessionConfig {
    pub fn new(format: Format, symbol: impl Into<String>) -> Self {
        Self {
            format,
            symbol: symbol.into(),
            shape: OutputShape::default(),
            date: None,
            exchange: None,
            time_zone: DEFAULT_TIME_ZONE.to_string(),
            progress: false,
        }
    }

    pub fn with_shape(mut self, shape: OutputShape) -> Self {
        self.shape = shape;
        self
    }

    /// Override the date parsed from the file name.
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = Some(exchange.into());
        self
    }

    pub fn with_time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = time_zone.into();
        self
    }

    /// Enable/disable the stderr progress line.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Exchange column value.
    pub fn exchange(&self) -> &str {
        self.exchange
            .as_deref()
            .unwrap_or_else(|| self.format.default_exchange())
    }

    /// Date for `path`: the configured date, or the one in its file name.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidDate`] if neither is available.
    pub fn resolve_date(&self, path: &Path) -> Result<String> {
        if let Some(date) = &self.date {
            return Ok(date.clone());
        }
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.format
            .parse_date(&filename)
            .ok_or(DecodeError::InvalidDate(filename.clone()))
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| DecodeError::generic(e.to_string()))
    }
}

// ============================================================================
// Session
// ============================================================================

/// Outcome of a conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Messages decoded from the input
    pub messages: u64,

    /// Messages outside the configured symbol
    pub filtered: u64,

    /// Rows written, header excluded
    pub rows: u64,

    /// Orders still resting at end of input
    pub resting_orders: usize,

    /// Decompressed bytes read
    pub bytes: u64,
}

/// One conversion run over a single input.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    book: OrderBook,
}

impl Session {
    /// Build a session with an empty book.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidSymbol`] if the symbol does not fit the
    /// format's symbol field.
    pub fn new(config: SessionConfig) -> Result<Self> {
        let filter = SymbolFilter::new(&config.symbol, config.format.symbol_width())?;
        Ok(Self {
            config,
            book: OrderBook::new(filter),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    /// Convert everything in `buf`, writing the header, the date row and
    /// one row per in-scope event to `out`.
    pub fn convert<R, W>(&mut self, buf: InflateBuffer<R>, date: &str, out: W) -> Result<SessionSummary>
    where
        R: AsRef<[u8]>,
        W: Write,
    {
        let mut writer = TsvWriter::new(out, self.config.shape)
            .with_date(date)
            .with_time_zone(self.config.time_zone.as_str())
            .with_exchange(self.config.exchange())
            .with_symbol(self.config.symbol.as_str());

        writer.write_header()?;
        writer.emit(&Event::date())?;

        let bytes = match self.config.format {
            Format::BatsPitch => drive(PitchReader::new(buf), &mut self.book, &mut writer)?,
            Format::NasdaqItch => drive(ItchReader::new(buf), &mut self.book, &mut writer)?,
            Format::NyseTaq => drive(TaqReader::new(buf), &mut self.book, &mut writer)?,
        };
        writer.flush()?;

        let stats = self.book.stats();
        if self.config.format == Format::NyseTaq && stats.messages_ignored > 0 {
            log::warn!(
                "{} records rejected by sale condition or correction filters",
                stats.messages_ignored
            );
        }

        Ok(SessionSummary {
            messages: stats.messages_applied,
            filtered: stats.messages_filtered,
            rows: writer.rows(),
            resting_orders: self.book.order_count(),
            bytes,
        })
    }
}

/// Feed every action from `reader` through `book` into `sink`. Returns the
/// number of decompressed bytes consumed.
fn drive<F: FeedReader, S: EventSink>(mut reader: F, book: &mut OrderBook, mut sink: S) -> Result<u64> {
    while let Some(action) = reader.next_action()? {
        book.apply(action, &mut sink)?;
    }
    Ok(reader.offset())
}

/// Convert the file at `path`.
///
/// Any error is wrapped with the file name.
pub fn convert_file<W: Write>(path: impl AsRef<Path>, config: &SessionConfig, out: W) -> Result<SessionSummary> {
    let path = path.as_ref();
    let start = Instant::now();

    let summary = (|| -> Result<SessionSummary> {
        let date = config.resolve_date(path)?;
        let mut buf = InflateBuffer::open(path)?;
        if config.progress {
            buf = buf.with_progress(print_progress);
        }
        log::debug!(
            "converting {} as {} ({}, symbol {})",
            path.display(),
            config.format,
            date,
            config.symbol
        );

        let mut session = Session::new(config.clone())?;
        session.convert(buf, &date, out)
    })()
    .map_err(|e| e.in_file(path))?;

    if config.progress {
        eprintln!();
    }
    log::info!(
        "{}: {} messages, {} rows, {} filtered, {} orders resting ({:.2?})",
        path.display(),
        summary.messages,
        summary.rows,
        summary.filtered,
        summary.resting_orders,
        start.elapsed()
    );

    Ok(summary)
}

fn print_progress(fraction: f64) {
    let mut stderr = io::stderr();
    let _ = write!(stderr, "Processing messages: {:.0}%\r", fraction * 100.0);
    let _ = stderr.flush();
}
