//! BATS PITCH 1.12.
//!
//! ASCII messages, one per line: a `'S'` start marker, the message body,
//! then `'\n'`. Every body starts with an 8-digit millisecond timestamp and
//! a one-byte message type. Numeric fields are ASCII base-10, order and
//! execution ids are ASCII base-36, prices are 10 digits with 4 implied
//! decimals.
//!
//! | Type | Message | Body length |
//! |------|---------|-------------|
//! | `s` | Symbol Clear | 15 |
//! | `A` | Add Order (short) | 45 |
//! | `d` | Add Order (long) | 53 |
//! | `E` | Order Executed | 39 |
//! | `X` | Order Cancel | 27 |
//! | `P` | Trade (short) | 56 |
//! | `r` | Trade (long) | 60 |
//! | `B` | Trade Break | 21 |
//! | `H` | Trading Status | 19 |
//! | `I` | Auction Update | 66 |
//! | `J` | Auction Summary | 36 |
//! | `R` | Retail Price Improvement | 16 |
//!
//! Unknown types are framed up to the next newline and ignored.

use crate::codec::{base10_decode, base36_decode};
use crate::error::{DecodeError, Result};
use crate::inflate::InflateBuffer;
use crate::proto::{BookAction, FeedReader, Frame, Timestamp, WireId};
use crate::types::{Decimal, TradeType};

/// Start-of-message marker.
pub const START_MARKER: u8 = b'S';

/// End-of-message marker.
pub const END_MARKER: u8 = b'\n';

/// Symbol field width.
pub const SYMBOL_LEN: usize = 6;

/// Integer digits of a price field.
pub const PRICE_INT_LEN: usize = 6;

/// Fraction digits of a price field.
pub const PRICE_FRACTION_LEN: usize = 4;

const TIMESTAMP_LEN: usize = 8;
const HEADER_LEN: usize = TIMESTAMP_LEN + 1;

/// Body length for a known message type.
pub fn body_len(tag: u8) -> Option<usize> {
    match tag {
        b's' => Some(15),
        b'A' => Some(45),
        b'd' => Some(53),
        b'E' => Some(39),
        b'X' => Some(27),
        b'P' => Some(56),
        b'r' => Some(60),
        b'B' => Some(21),
        b'H' => Some(19),
        b'I' => Some(66),
        b'J' => Some(36),
        b'R' => Some(16),
        _ => None,
    }
}

/// Human-readable message name.
pub fn message_name(tag: u8) -> &'static str {
    match tag {
        b's' => "Symbol Clear",
        b'A' => "Add Order (short)",
        b'd' => "Add Order (long)",
        b'E' => "Order Executed",
        b'X' => "Order Cancel",
        b'P' => "Trade (short)",
        b'r' => "Trade (long)",
        b'B' => "Trade Break",
        b'H' => "Trading Status",
        b'I' => "Auction Update",
        b'J' => "Auction Summary",
        b'R' => "Retail Price Improvement",
        _ => "Unknown",
    }
}

// ============================================================================
// Messages
// ============================================================================

/// A decoded PITCH message. Fields borrow the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PitchMessage<'a> {
    SymbolClear {
        timestamp: &'a [u8],
        symbol: &'a [u8],
    },
    /// Short and long add order
    AddOrder {
        timestamp: &'a [u8],
        order_id: &'a [u8],
        side: u8,
        shares: &'a [u8],
        symbol: &'a [u8],
        price: &'a [u8],
        display: u8,
    },
    OrderExecuted {
        timestamp: &'a [u8],
        order_id: &'a [u8],
        executed_shares: &'a [u8],
        execution_id: &'a [u8],
    },
    OrderCancel {
        timestamp: &'a [u8],
        order_id: &'a [u8],
        canceled_shares: &'a [u8],
    },
    /// Short and long trade (executions against hidden orders)
    Trade {
        timestamp: &'a [u8],
        order_id: &'a [u8],
        side: u8,
        shares: &'a [u8],
        symbol: &'a [u8],
        price: &'a [u8],
        execution_id: &'a [u8],
    },
    TradeBreak {
        timestamp: &'a [u8],
        execution_id: &'a [u8],
    },
    TradingStatus {
        timestamp: &'a [u8],
        symbol: &'a [u8],
        halt_status: u8,
        reg_sho_action: u8,
    },
    AuctionUpdate {
        timestamp: &'a [u8],
        symbol: &'a [u8],
    },
    AuctionSummary {
        timestamp: &'a [u8],
        symbol: &'a [u8],
    },
    RetailPriceImprovement {
        timestamp: &'a [u8],
        symbol: &'a [u8],
        rpi: u8,
    },
    Unknown {
        tag: u8,
    },
}

impl<'a> PitchMessage<'a> {
    /// Decode a framed body. Pure: the same frame always decodes to the
    /// same value.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::ShortMessage`] if the body is shorter than its
    ///   type's layout
    /// - [`DecodeError::QuantityOverflow`] if an order's share count does
    ///   not fit in 32 bits
    pub fn decode(frame: Frame<'a>) -> Result<Self> {
        let b = frame.body;
        if let Some(expected) = body_len(frame.tag) {
            if b.len() < expected {
                return Err(DecodeError::ShortMessage {
                    tag: frame.tag as char,
                    expected,
                    actual: b.len(),
                });
            }
        }
        let ts = &b[..TIMESTAMP_LEN.min(b.len())];

        let msg = match frame.tag {
            b's' => PitchMessage::SymbolClear {
                timestamp: ts,
                symbol: &b[9..15],
            },
            b'A' => PitchMessage::AddOrder {
                timestamp: ts,
                order_id: &b[9..21],
                side: b[21],
                shares: &b[22..28],
                symbol: &b[28..34],
                price: &b[34..44],
                display: b[44],
            },
            b'd' => PitchMessage::AddOrder {
                timestamp: ts,
                order_id: &b[9..21],
                side: b[21],
                shares: &b[22..32],
                symbol: &b[32..38],
                price: &b[38..48],
                display: b[48],
            },
            b'E' => PitchMessage::OrderExecuted {
                timestamp: ts,
                order_id: &b[9..21],
                executed_shares: &b[21..27],
                execution_id: &b[27..39],
            },
            b'X' => PitchMessage::OrderCancel {
                timestamp: ts,
                order_id: &b[9..21],
                canceled_shares: &b[21..27],
            },
            b'P' => PitchMessage::Trade {
                timestamp: ts,
                order_id: &b[9..21],
                side: b[21],
                shares: &b[22..28],
                symbol: &b[28..34],
                price: &b[34..44],
                execution_id: &b[44..56],
            },
            b'r' => PitchMessage::Trade {
                timestamp: ts,
                order_id: &b[9..21],
                side: b[21],
                shares: &b[22..32],
                symbol: &b[32..38],
                price: &b[38..48],
                execution_id: &b[48..60],
            },
            b'B' => PitchMessage::TradeBreak {
                timestamp: ts,
                execution_id: &b[9..21],
            },
            b'H' => PitchMessage::TradingStatus {
                timestamp: ts,
                symbol: &b[9..15],
                halt_status: b[15],
                reg_sho_action: b[16],
            },
            b'I' => PitchMessage::AuctionUpdate {
                timestamp: ts,
                symbol: &b[9..15],
            },
            b'J' => PitchMessage::AuctionSummary {
                timestamp: ts,
                symbol: &b[9..15],
            },
            b'R' => PitchMessage::RetailPriceImprovement {
                timestamp: ts,
                symbol: &b[9..15],
                rpi: b[15],
            },
            tag => PitchMessage::Unknown { tag },
        };

        match msg {
            PitchMessage::AddOrder { shares, .. } => {
                order_shares(frame.tag, shares)?;
            }
            PitchMessage::OrderExecuted {
                executed_shares, ..
            } => {
                order_shares(frame.tag, executed_shares)?;
            }
            PitchMessage::OrderCancel {
                canceled_shares, ..
            } => {
                order_shares(frame.tag, canceled_shares)?;
            }
            _ => {}
        }

        Ok(msg)
    }

    /// Lower to a protocol-neutral book action.
    pub fn action(&self) -> BookAction<'a> {
        match *self {
            PitchMessage::SymbolClear { timestamp, symbol } => BookAction::Clear {
                time: millis(timestamp),
                symbol,
            },
            PitchMessage::AddOrder {
                timestamp,
                order_id,
                side,
                shares,
                symbol,
                price,
                ..
            } => BookAction::AddOrder {
                time: millis(timestamp),
                order_id: base36_id(order_id),
                side,
                quantity: shares_u32(shares),
                symbol,
                price: Decimal::from_field(price, PRICE_INT_LEN),
            },
            PitchMessage::OrderExecuted {
                timestamp,
                order_id,
                executed_shares,
                execution_id,
            } => BookAction::Execute {
                time: millis(timestamp),
                order_id: base36_id(order_id),
                quantity: shares_u32(executed_shares),
                exec_id: base36_id(execution_id),
                price: None,
            },
            PitchMessage::OrderCancel {
                timestamp,
                order_id,
                canceled_shares,
            } => BookAction::Cancel {
                time: millis(timestamp),
                order_id: base36_id(order_id),
                quantity: shares_u32(canceled_shares),
            },
            PitchMessage::Trade {
                timestamp,
                side,
                shares,
                symbol,
                price,
                execution_id,
                ..
            } => BookAction::Trade {
                time: millis(timestamp),
                exchange: None,
                side: Some(side),
                quantity: base10_decode(shares),
                symbol,
                price: Decimal::from_field(price, PRICE_INT_LEN),
                exec_id: base36_id(execution_id),
                trade_type: TradeType::NonDisplayed,
            },
            PitchMessage::TradeBreak {
                timestamp,
                execution_id,
            } => BookAction::TradeBreak {
                time: millis(timestamp),
                exec_id: base36_id(execution_id),
            },
            PitchMessage::TradingStatus {
                timestamp,
                symbol,
                halt_status,
                ..
            } => BookAction::Status {
                time: millis(timestamp),
                symbol,
                status: halt_status,
                recognised: true,
            },
            PitchMessage::AuctionUpdate { .. }
            | PitchMessage::AuctionSummary { .. }
            | PitchMessage::RetailPriceImprovement { .. }
            | PitchMessage::Unknown { .. } => BookAction::Ignore,
        }
    }
}

fn order_shares(tag: u8, field: &[u8]) -> Result<u32> {
    let value = base10_decode(field);
    u32::try_from(value).map_err(|_| DecodeError::QuantityOverflow {
        tag: tag as char,
        value,
    })
}

/// Share field already range-checked by [`PitchMessage::decode`].
#[inline]
fn shares_u32(field: &[u8]) -> u32 {
    u32::try_from(base10_decode(field)).unwrap_or(u32::MAX)
}

#[inline]
fn millis(timestamp: &[u8]) -> Timestamp<'static> {
    Timestamp::Nanos(base10_decode(timestamp) * 1_000_000)
}

#[inline]
fn base36_id(field: &[u8]) -> WireId<'_> {
    WireId::text(base36_decode(field), field)
}

// ============================================================================
// Framer
// ============================================================================

/// Frames PITCH messages out of an inflate buffer.
#[derive(Debug)]
pub struct PitchReader<R: AsRef<[u8]>> {
    buf: InflateBuffer<R>,
}

impl<R: AsRef<[u8]>> PitchReader<R> {
    pub fn new(buf: InflateBuffer<R>) -> Self {
        Self { buf }
    }

    /// Underlying buffer.
    pub fn buffer(&self) -> &InflateBuffer<R> {
        &self.buf
    }

    fn truncated(&self) -> DecodeError {
        DecodeError::TruncatedMessage {
            pending: self.buf.available().len(),
        }
    }

    /// Frame length (markers included) of the message at the cursor.
    fn frame_len(&mut self) -> Result<Option<usize>> {
        if !self.buf.fill(1)? {
            if self.buf.available().is_empty() {
                return Ok(None);
            }
            return Err(self.truncated());
        }

        let found = self.buf.available()[0];
        if found != START_MARKER {
            return Err(DecodeError::BadMarker {
                expected: START_MARKER,
                found,
                offset: self.buf.offset(),
            });
        }

        if !self.buf.fill(1 + HEADER_LEN)? {
            return Err(self.truncated());
        }
        let tag = self.buf.available()[1 + TIMESTAMP_LEN];

        let len = match body_len(tag) {
            Some(len) => len,
            None => self.scan_to_newline()?,
        };

        if !self.buf.fill(len + 2)? {
            return Err(self.truncated());
        }
        let found = self.buf.available()[len + 1];
        if found != END_MARKER {
            return Err(DecodeError::BadMarker {
                expected: END_MARKER,
                found,
                offset: self.buf.offset() + len as u64 + 1,
            });
        }

        Ok(Some(len + 2))
    }

    /// Body length of an unknown message type, found by scanning to `'\n'`.
    fn scan_to_newline(&mut self) -> Result<usize> {
        let mut searched = 1 + HEADER_LEN;
        loop {
            let avail = self.buf.available();
            if let Some(pos) = avail[searched..].iter().position(|&b| b == END_MARKER) {
                return Ok(searched + pos - 1);
            }
            searched = avail.len();
            if !self.buf.fill(searched + 1)? {
                return Err(self.truncated());
            }
        }
    }
}

impl<R: AsRef<[u8]>> FeedReader for PitchReader<R> {
    fn next_frame(&mut self) -> Result<Option<Frame<'_>>> {
        let len = match self.frame_len()? {
            Some(len) => len,
            None => return Ok(None),
        };
        let raw = self.buf.take(len);
        let body = &raw[1..len - 1];

        Ok(Some(Frame {
            tag: body[TIMESTAMP_LEN],
            body,
        }))
    }

    fn next_action(&mut self) -> Result<Option<BookAction<'_>>> {
        match self.next_frame()? {
            Some(frame) => Ok(Some(PitchMessage::decode(frame)?.action())),
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

/// Date from a `...YYYYMMDD.dat.gz` file name, as `YYYY-MM-DD`.
pub fn parse_date(filename: &str) -> Option<String> {
    let stem = filename.strip_suffix(".dat.gz")?;
    let digits = stem.get(stem.len().checked_sub(8)?..)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{}-{}-{}", &digits[0..4], &digits[4..6], &digits[6..8]))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a short add order body.
    pub fn add_order(ms: u32, id: &str, side: u8, shares: u32, symbol: &str, price: &str) -> Vec<u8> {
        format!(
            "{ms:08}A{id:0>12}{}{shares:06}{symbol:<6}{price}Y",
            side as char
        )
        .into_bytes()
    }

    pub fn order_executed(ms: u32, id: &str, shares: u32, exec_id: &str) -> Vec<u8> {
        format!("{ms:08}E{id:0>12}{shares:06}{exec_id:0>12}").into_bytes()
    }

    pub fn order_cancel(ms: u32, id: &str, shares: u32) -> Vec<u8> {
        format!("{ms:08}X{id:0>12}{shares:06}").into_bytes()
    }

    pub fn trade(ms: u32, id: &str, shares: u32, symbol: &str, price: &str, exec_id: &str) -> Vec<u8> {
        format!("{ms:08}P{id:0>12}B{shares:06}{symbol:<6}{price}{exec_id:0>12}").into_bytes()
    }

    pub fn trade_break(ms: u32, exec_id: &str) -> Vec<u8> {
        format!("{ms:08}B{exec_id:0>12}").into_bytes()
    }

    pub fn symbol_clear(ms: u32, symbol: &str) -> Vec<u8> {
        format!("{ms:08}s{symbol:<6}").into_bytes()
    }

    pub fn trading_status(ms: u32, symbol: &str, status: u8) -> Vec<u8> {
        format!("{ms:08}H{symbol:<6}{}0XX", status as char).into_bytes()
    }

    /// Wrap bodies in start/end markers.
    pub fn stream(bodies: &[Vec<u8>]) -> Vec<u8> {
        let mut out = Vec::new();
        for body in bodies {
            out.push(START_MARKER);
            out.extend_from_slice(body);
            out.push(END_MARKER);
        }
        out
    }

    fn reader(bytes: Vec<u8>) -> PitchReader<Vec<u8>> {
        PitchReader::new(InflateBuffer::new(bytes))
    }

    #[test]
    fn test_builders_match_layouts() {
        assert_eq!(add_order(1, "AB1", b'B', 100, "TEST", "0000123400").len(), 45);
        assert_eq!(order_executed(1, "AB1", 40, "X").len(), 39);
        assert_eq!(order_cancel(1, "AB1", 40).len(), 27);
        assert_eq!(trade(1, "AB1", 1, "TEST", "0000100000", "X").len(), 56);
        assert_eq!(trade_break(1, "X").len(), 21);
        assert_eq!(symbol_clear(1, "TEST").len(), 15);
        assert_eq!(trading_status(1, "TEST", b'T').len(), 19);
    }

    #[test]
    fn test_decode_add_order() {
        let body = add_order(34_200_000, "AB1", b'B', 100, "TEST", "0000123400");
        let frame = Frame { tag: b'A', body: &body };
        let msg = PitchMessage::decode(frame).unwrap();

        match msg {
            PitchMessage::AddOrder {
                timestamp,
                order_id,
                side,
                shares,
                symbol,
                price,
                display,
            } => {
                assert_eq!(timestamp, b"34200000");
                assert_eq!(order_id, b"000000000AB1");
                assert_eq!(side, b'B');
                assert_eq!(shares, b"000100");
                assert_eq!(symbol, b"TEST  ");
                assert_eq!(price, b"0000123400");
                assert_eq!(display, b'Y');
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_decode_long_add_order() {
        let body = b"00000001d0000000000Z1S0000001000ABCDEF0000100000YMPID".to_vec();
        assert_eq!(body.len(), 53);
        let action = PitchMessage::decode(Frame { tag: b'd', body: &body })
            .unwrap()
            .action();

        match action {
            BookAction::AddOrder {
                order_id,
                side,
                quantity,
                symbol,
                price,
                ..
            } => {
                assert_eq!(order_id.key, 35 * 36 + 1);
                assert_eq!(side, b'S');
                assert_eq!(quantity, 1000);
                assert_eq!(symbol, b"ABCDEF");
                assert_eq!(price.to_string(), "10.0000");
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn test_long_add_order_share_overflow() {
        let body = b"00000001d0000000000Z1S5000000000ABCDEF0000100000YMPID".to_vec();
        let err = PitchMessage::decode(Frame { tag: b'd', body: &body }).unwrap_err();
        assert_eq!(
            err,
            DecodeError::QuantityOverflow {
                tag: 'd',
                value: 5_000_000_000
            }
        );

        // Largest count that still fits
        let body = b"00000001d0000000000Z1S4294967295ABCDEF0000100000YMPID".to_vec();
        match PitchMessage::decode(Frame { tag: b'd', body: &body }).unwrap().action() {
            BookAction::AddOrder { quantity, .. } => assert_eq!(quantity, u32::MAX),
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn test_decode_is_idempotent() {
        let body = order_executed(5, "AB1", 40, "EX1");
        let frame = Frame { tag: b'E', body: &body };
        assert_eq!(
            PitchMessage::decode(frame).unwrap(),
            PitchMessage::decode(frame).unwrap()
        );
        assert_eq!(
            PitchMessage::decode(frame).unwrap().action(),
            PitchMessage::decode(frame).unwrap().action()
        );
    }

    #[test]
    fn test_millisecond_timestamp_to_nanos() {
        let body = order_cancel(34_200_001, "AB1", 1);
        let action = PitchMessage::decode(Frame { tag: b'X', body: &body })
            .unwrap()
            .action();
        match action {
            BookAction::Cancel { time, .. } => {
                assert_eq!(time, Timestamp::Nanos(34_200_001_000_000))
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn test_short_body_rejected() {
        let body = b"00000001E000".to_vec();
        let err = PitchMessage::decode(Frame { tag: b'E', body: &body }).unwrap_err();
        assert_eq!(
            err,
            DecodeError::ShortMessage {
                tag: 'E',
                expected: 39,
                actual: 12
            }
        );
    }

    #[test]
    fn test_framer_reads_all_messages() {
        let bytes = stream(&[
            add_order(1, "AB1", b'B', 100, "TEST", "0000123400"),
            order_executed(2, "AB1", 40, "EX1"),
            trade_break(3, "EX1"),
        ]);
        let mut reader = reader(bytes);

        let mut tags = Vec::new();
        while let Some(frame) = reader.next_frame().unwrap() {
            tags.push(frame.tag);
        }
        assert_eq!(tags, b"AEB");
    }

    #[test]
    fn test_framer_skips_unknown_type() {
        let bytes = stream(&[
            b"00000001Zwhatever-length".to_vec(),
            order_cancel(2, "AB1", 40),
        ]);
        let mut reader = reader(bytes);

        let first = reader.next_action().unwrap().unwrap();
        assert_eq!(first, BookAction::Ignore);
        let second = reader.next_frame().unwrap().unwrap();
        assert_eq!(second.tag, b'X');
        assert!(reader.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_bad_start_marker() {
        let mut bytes = stream(&[order_cancel(1, "AB1", 1)]);
        bytes[0] = b'Q';
        let err = reader(bytes).next_frame().unwrap_err();
        assert_eq!(
            err,
            DecodeError::BadMarker {
                expected: b'S',
                found: b'Q',
                offset: 0
            }
        );
    }

    #[test]
    fn test_bad_end_marker() {
        let mut bytes = stream(&[order_cancel(1, "AB1", 1), order_cancel(2, "AB1", 1)]);
        let second_end = bytes.len() - 1;
        bytes[second_end] = b'\r';

        let mut reader = reader(bytes);
        assert!(reader.next_frame().unwrap().is_some());
        let err = reader.next_frame().unwrap_err();
        assert_eq!(
            err,
            DecodeError::BadMarker {
                expected: b'\n',
                found: b'\r',
                offset: second_end as u64
            }
        );
    }

    #[test]
    fn test_truncated_stream() {
        let mut bytes = stream(&[order_cancel(1, "AB1", 1)]);
        bytes.truncate(10);
        let err = reader(bytes).next_frame().unwrap_err();
        assert!(matches!(err, DecodeError::TruncatedMessage { pending: 10 }));
    }

    #[test]
    fn test_frames_across_refills() {
        let bodies: Vec<Vec<u8>> = (0..50).map(|i| order_cancel(i, "AB1", 1)).collect();
        let bytes = stream(&bodies);
        let mut reader = PitchReader::new(InflateBuffer::with_capacity(bytes, 64));

        let mut count = 0;
        while let Some(frame) = reader.next_frame().unwrap() {
            assert_eq!(frame.body.len(), 27);
            count += 1;
        }
        assert_eq!(count, 50);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("PITCH.20100401.dat.gz").as_deref(),
            Some("2010-04-01")
        );
        assert_eq!(parse_date("20121231.dat.gz").as_deref(), Some("2012-12-31"));
        assert_eq!(parse_date("PITCH.2010041.dat.gz"), None);
        assert_eq!(parse_date("PITCH.20100401.txt.gz"), None);
    }
}
