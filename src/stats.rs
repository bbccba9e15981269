//! Per-message-type counts for a feed file.
//!
//! Frames every message in one pass without decoding fields, filtering or
//! touching an order book. Used by the `stat` command to summarise what a
//! file contains.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, Result};
use crate::inflate::InflateBuffer;
use crate::proto::{FeedReader, ItchReader, PitchReader, TaqReader};
use crate::session::Format;

/// Message counts by type tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageStats {
    pub format: Format,

    /// tag -> count
    pub counts: BTreeMap<char, u64>,

    /// Total messages framed
    pub total: u64,

    /// Decompressed bytes read
    pub bytes: u64,
}

impl MessageStats {
    pub fn new(format: Format) -> Self {
        Self {
            format,
            counts: BTreeMap::new(),
            total: 0,
            bytes: 0,
        }
    }

    /// Count every message from `reader`.
    pub fn collect<F: FeedReader>(format: Format, mut reader: F) -> Result<Self> {
        let mut stats = Self::new(format);
        while let Some(frame) = reader.next_frame()? {
            stats.record(frame.tag);
        }
        stats.bytes = reader.offset();
        Ok(stats)
    }

    /// Count every message in a buffer of the given format.
    pub fn from_buffer<R: AsRef<[u8]>>(format: Format, buf: InflateBuffer<R>) -> Result<Self> {
        match format {
            Format::BatsPitch => Self::collect(format, PitchReader::new(buf)),
            Format::NasdaqItch => Self::collect(format, ItchReader::new(buf)),
            Format::NyseTaq => Self::collect(format, TaqReader::new(buf)),
        }
    }

    /// Count every message in a file; errors carry the file name.
    pub fn from_file(format: Format, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        InflateBuffer::open(path)
            .and_then(|buf| Self::from_buffer(format, buf))
            .map_err(|e| e.in_file(path))
    }

    #[inline]
    pub fn record(&mut self, tag: u8) {
        *self.counts.entry(tag as char).or_insert(0) += 1;
        self.total += 1;
    }

    pub fn count(&self, tag: u8) -> u64 {
        self.counts.get(&(tag as char)).copied().unwrap_or(0)
    }

    /// One `count  name` line per message type seen, most frequent first.
    pub fn report(&self) -> String {
        let mut rows: Vec<(char, u64)> = self.counts.iter().map(|(&t, &c)| (t, c)).collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut out = String::new();
        for (tag, count) in rows {
            let _ = writeln!(
                out,
                "{:>12}  {} ({})",
                count,
                self.format.message_name(tag as u8),
                tag
            );
        }
        let _ = writeln!(out, "{:>12}  total", self.total);
        out
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| DecodeError::generic(e.to_string()))
    }
}
