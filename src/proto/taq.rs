//! NYSE Daily TAQ 1.7 (fixed-width text).
//!
//! The file opens with a record-count header line, which is skipped. The
//! first data record then fixes the record width for the rest of the file:
//! its line length (terminator included) is the stride, and its body length
//! selects the layout (71 bytes for daily trades, 89 for daily quotes).
//! After that, records are sliced purely by position.
//!
//! Trades are kept only when every sale-condition byte is `@`, ` ` or `F`
//! and the correction indicator is `00` or `01`. Quotes marked as cancels
//! are dropped.

use crate::codec::base10_decode;
use crate::error::{DecodeError, Result};
use crate::inflate::InflateBuffer;
use crate::proto::{BookAction, FeedReader, Frame, Timestamp, WireId};
use crate::types::{Decimal, TradeType};

/// Symbol field width.
pub const SYMBOL_LEN: usize = 16;

/// Body length of a daily trade record.
pub const TRADE_RECORD_LEN: usize = 71;

/// Body length of a daily quote record.
pub const QUOTE_RECORD_LEN: usize = 89;

/// Integer digits of a price field.
pub const PRICE_INT_LEN: usize = 7;

/// Fraction digits of a price field.
pub const PRICE_FRACTION_LEN: usize = 4;

/// Exchange code to Market Identifier Code.
pub fn mic(exchange: u8) -> Option<&'static str> {
    let code = match exchange {
        b'A' => "XASE",
        b'B' => "XBOS",
        b'C' => "XCIS",
        b'D' => "FINR",
        b'I' => "XISX",
        b'J' => "EDGA",
        b'K' => "EDGX",
        b'M' => "XCHI",
        b'N' => "XNYS",
        b'T' => "XPHL",
        b'P' => "XARC",
        b'S' => "XXXX",
        b'Q' => "XNAS",
        b'W' => "XCBO",
        b'X' => "XPSX",
        b'Y' => "BATY",
        b'Z' => "BATS",
        _ => return None,
    };
    Some(code)
}

/// Exchange codes with a MIC, in table order.
pub const EXCHANGE_CODES: &[u8] = b"ABCDIJKMNTPSQWXYZ";

/// Record layout in use for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLayout {
    Trade,
    Quote,
}

impl RecordLayout {
    /// Layout for a record body length.
    pub fn from_body_len(len: usize) -> Result<Self> {
        match len {
            TRADE_RECORD_LEN => Ok(RecordLayout::Trade),
            QUOTE_RECORD_LEN => Ok(RecordLayout::Quote),
            other => Err(DecodeError::UnsupportedRecordLayout(other)),
        }
    }

    pub fn body_len(self) -> usize {
        match self {
            RecordLayout::Trade => TRADE_RECORD_LEN,
            RecordLayout::Quote => QUOTE_RECORD_LEN,
        }
    }

    /// Frame tag used for this layout.
    pub fn tag(self) -> u8 {
        match self {
            RecordLayout::Trade => b'T',
            RecordLayout::Quote => b'Q',
        }
    }
}

/// Human-readable record name.
pub fn message_name(tag: u8) -> &'static str {
    match tag {
        b'T' => "Daily Trade",
        b'Q' => "Daily Quote",
        _ => "Unknown",
    }
}

// ============================================================================
// Messages
// ============================================================================

/// A decoded TAQ record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaqMessage<'a> {
    Trade {
        time: &'a [u8],
        exchange: u8,
        symbol: &'a [u8],
        sale_condition: &'a [u8],
        volume: &'a [u8],
        price: &'a [u8],
        stop_stock: u8,
        correction: &'a [u8],
        sequence: &'a [u8],
        source: u8,
        reporting_facility: u8,
    },
    Quote {
        time: &'a [u8],
        exchange: u8,
        symbol: &'a [u8],
        bid_price: &'a [u8],
        bid_size: &'a [u8],
        ask_price: &'a [u8],
        ask_size: &'a [u8],
        condition: u8,
        market_maker: &'a [u8],
        bid_exchange: u8,
        ask_exchange: u8,
        sequence: &'a [u8],
        national_bbo: u8,
        nasdaq_bbo: u8,
        cancel_correction: u8,
        source: u8,
    },
}

impl<'a> TaqMessage<'a> {
    /// Decode a framed record.
    pub fn decode(frame: Frame<'a>) -> Result<Self> {
        let b = frame.body;
        let layout = match frame.tag {
            b'T' => RecordLayout::Trade,
            b'Q' => RecordLayout::Quote,
            _ => return Err(DecodeError::UnsupportedRecordLayout(b.len())),
        };
        if b.len() < layout.body_len() {
            return Err(DecodeError::ShortMessage {
                tag: frame.tag as char,
                expected: layout.body_len(),
                actual: b.len(),
            });
        }

        let msg = match layout {
            RecordLayout::Trade => TaqMessage::Trade {
                time: &b[0..9],
                exchange: b[9],
                symbol: &b[10..26],
                sale_condition: &b[26..30],
                volume: &b[30..39],
                price: &b[39..50],
                stop_stock: b[50],
                correction: &b[51..53],
                sequence: &b[53..69],
                source: b[69],
                reporting_facility: b[70],
            },
            RecordLayout::Quote => TaqMessage::Quote {
                time: &b[0..9],
                exchange: b[9],
                symbol: &b[10..26],
                bid_price: &b[26..37],
                bid_size: &b[37..44],
                ask_price: &b[44..55],
                ask_size: &b[55..62],
                condition: b[62],
                market_maker: &b[63..67],
                bid_exchange: b[67],
                ask_exchange: b[68],
                sequence: &b[69..85],
                national_bbo: b[85],
                nasdaq_bbo: b[86],
                cancel_correction: b[87],
                source: b[88],
            },
        };

        Ok(msg)
    }

    /// Lower to a protocol-neutral book action. Records rejected by the
    /// condition filters become [`BookAction::Ignore`].
    pub fn action(&self) -> BookAction<'a> {
        match *self {
            TaqMessage::Trade {
                time,
                exchange,
                symbol,
                sale_condition,
                volume,
                price,
                correction,
                sequence,
                ..
            } => {
                if !accepts_sale_condition(sale_condition) || !accepts_correction(correction) {
                    return BookAction::Ignore;
                }
                BookAction::Trade {
                    time: Timestamp::Text(time),
                    exchange: mic(exchange),
                    side: None,
                    quantity: base10_decode(volume),
                    symbol,
                    price: Decimal::from_field(price, PRICE_INT_LEN),
                    exec_id: WireId::text(base10_decode(sequence), sequence),
                    trade_type: trade_type(sale_condition),
                }
            }
            TaqMessage::Quote {
                time,
                exchange,
                symbol,
                bid_price,
                bid_size,
                ask_price,
                ask_size,
                cancel_correction,
                ..
            } => {
                if cancel_correction == b'B' {
                    return BookAction::Ignore;
                }
                BookAction::Quote {
                    time: Timestamp::Text(time),
                    exchange: mic(exchange),
                    symbol,
                    bid_price: Decimal::from_field(bid_price, PRICE_INT_LEN),
                    bid_quantity: base10_decode(bid_size),
                    ask_price: Decimal::from_field(ask_price, PRICE_INT_LEN),
                    ask_quantity: base10_decode(ask_size),
                }
            }
        }
    }
}

/// Every sale-condition byte is `@`, ` ` or `F`.
pub fn accepts_sale_condition(condition: &[u8]) -> bool {
    condition.iter().all(|&c| matches!(c, b'@' | b' ' | b'F'))
}

/// Correction indicator `00` (regular) or `01` (original, later corrected).
pub fn accepts_correction(indicator: &[u8]) -> bool {
    match indicator {
        [b'1', _] => false,
        [_, b'0'] | [_, b'1'] => true,
        _ => false,
    }
}

/// Intermarket sweep if any sale-condition byte is `F`.
pub fn trade_type(condition: &[u8]) -> TradeType {
    if condition.contains(&b'F') {
        TradeType::IntermarketSweep
    } else {
        TradeType::Regular
    }
}

// ============================================================================
// Framer
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Stride {
    layout: RecordLayout,
    /// Body plus line terminator
    record_len: usize,
}

/// Frames fixed-width TAQ records out of an inflate buffer.
#[derive(Debug)]
pub struct TaqReader<R: AsRef<[u8]>> {
    buf: InflateBuffer<R>,
    stride: Option<Stride>,
    header_skipped: bool,
}

impl<R: AsRef<[u8]>> TaqReader<R> {
    pub fn new(buf: InflateBuffer<R>) -> Self {
        Self {
            buf,
            stride: None,
            header_skipped: false,
        }
    }

    pub fn buffer(&self) -> &InflateBuffer<R> {
        &self.buf
    }

    /// Layout in use, once the first record has been read.
    pub fn layout(&self) -> Option<RecordLayout> {
        self.stride.map(|s| s.layout)
    }

    /// Length of the line at the cursor including its `'\n'`, or `None`
    /// if the stream ends first (the length of what remains is returned
    /// in the error position instead).
    fn line_len(&mut self) -> Result<std::result::Result<usize, usize>> {
        let mut searched = 0;
        loop {
            let avail = self.buf.available();
            if let Some(pos) = avail[searched..].iter().position(|&b| b == b'\n') {
                return Ok(Ok(searched + pos + 1));
            }
            searched = avail.len();
            if !self.buf.fill(searched + 1)? {
                return Ok(Err(self.buf.available().len()));
            }
        }
    }

    fn skip_header(&mut self) -> Result<bool> {
        self.header_skipped = true;
        match self.line_len()? {
            Ok(len) => {
                self.buf.advance(len);
                Ok(true)
            }
            Err(rest) => {
                self.buf.advance(rest);
                Ok(false)
            }
        }
    }

    fn detect_stride(&mut self) -> Result<Option<Stride>> {
        let line = match self.line_len()? {
            Ok(len) => len,
            Err(0) => return Ok(None),
            // Single record with no terminator
            Err(rest) => rest,
        };
        let avail = self.buf.available();
        let mut body_len = line;
        if avail[..line].ends_with(b"\n") {
            body_len -= 1;
        }
        if avail[..body_len].ends_with(b"\r") {
            body_len -= 1;
        }

        let layout = RecordLayout::from_body_len(body_len)?;
        let stride = Stride {
            layout,
            record_len: line,
        };
        log::debug!(
            "TAQ {:?} records, {} bytes per record",
            layout,
            stride.record_len
        );
        Ok(Some(stride))
    }
}

impl<R: AsRef<[u8]>> FeedReader for TaqReader<R> {
    fn next_frame(&mut self) -> Result<Option<Frame<'_>>> {
        if !self.header_skipped && !self.skip_header()? {
            return Ok(None);
        }

        let stride = match self.stride {
            Some(stride) => stride,
            None => match self.detect_stride()? {
                Some(stride) => {
                    self.stride = Some(stride);
                    stride
                }
                None => return Ok(None),
            },
        };

        let body_len = stride.layout.body_len();
        let take = if self.buf.fill(stride.record_len)? {
            stride.record_len
        } else {
            let pending = self.buf.available().len();
            if pending == 0 {
                return Ok(None);
            }
            // Last record may lack its terminator
            if pending < body_len {
                return Err(DecodeError::TruncatedMessage { pending });
            }
            pending
        };

        let raw = self.buf.take(take);
        Ok(Some(Frame {
            tag: stride.layout.tag(),
            body: &raw[..body_len],
        }))
    }

    fn next_action(&mut self) -> Result<Option<BookAction<'_>>> {
        match self.next_frame()? {
            Some(frame) => Ok(Some(TaqMessage::decode(frame)?.action())),
            None => Ok(None),
        }
    }

    fn offset(&self) -> u64 {
        self.buf.offset()
    }
}

// ============================================================================
// File names
// ============================================================================

/// Date from a `..._YYYYMMDD[.ext]` file name, as `YYYY-MM-DD`.
pub fn parse_date(filename: &str) -> Option<String> {
    let (_, tail) = filename.rsplit_once('_')?;
    let digits = tail.get(..8)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if tail.len() > 8 && !tail[8..].starts_with('.') {
        return None;
    }
    Some(format!("{}-{}-{}", &digits[0..4], &digits[4..6], &digits[6..8]))
}
