//! NASDAQ TotalView-ITCH 4.1.
//!
//! Binary messages, each preceded by a big-endian `u16` length. The first
//! body byte is the message type. Integers are big-endian; prices are `u32`
//! with 4 implied decimals. Timestamps are split: a `T` message carries
//! seconds since midnight and every other message carries nanoseconds since
//! the last `T`.
//!
//! The length prefix decides the span of each message. Decoding checks the
//! span is at least as long as the layout of its type.

use crate::codec::{be_u16, be_u32, be_u64};
use crate::error::{DecodeError, Result};
use crate::inflate::InflateBuffer;
use crate::proto::{BookAction, FeedReader, Frame, Timestamp, WireId};
use crate::types::{Decimal, TradeType};

/// Stock field width.
pub const SYMBOL_LEN: usize = 8;

/// Integer digits of a rendered price.
pub const PRICE_INT_LEN: usize = 6;

/// Fraction digits of a rendered price.
pub const PRICE_FRACTION_LEN: usize = 4;

const LENGTH_PREFIX: usize = 2;

/// Minimum body length for a known message type.
pub fn min_len(tag: u8) -> Option<usize> {
    match tag {
        b'T' => Some(5),
        b'S' => Some(6),
        b'R' => Some(20),
        b'H' => Some(19),
        b'Y' => Some(14),
        b'L' => Some(20),
        b'A' => Some(30),
        b'F' => Some(34),
        b'E' => Some(25),
        b'C' => Some(30),
        b'X' => Some(17),
        b'D' => Some(13),
        b'U' => Some(29),
        b'P' => Some(38),
        b'Q' => Some(34),
        b'B' => Some(13),
        b'I' => Some(44),
        b'N' => Some(14),
        _ => None,
    }
}

/// Human-readable message name.
pub fn message_name(tag: u8) -> &'static str {
    match tag {
        b'T' => "Timestamp - Seconds",
        b'S' => "System Event",
        b'R' => "Stock Directory",
        b'H' => "Stock Trading Action",
        b'Y' => "Reg SHO Short Sale Price Test Restricted Indicator",
        b'L' => "Market Participant Position",
        b'A' => "Add Order",
        b'F' => "Add Order - MPID Attribution",
        b'E' => "Order Executed",
        b'C' => "Order Executed With Price",
        b'X' => "Order Cancel",
        b'D' => "Order Delete",
        b'U' => "Order Replace",
        b'P' => "Trade (Non-Cross)",
        b'Q' => "Cross Trade",
        b'B' => "Broken Trade",
        b'I' => "Net Order Imbalance Indicator",
        b'N' => "Retail Price Improvement Indicator",
        _ => "Unknown",
    }
}

/// Trading states with a defined meaning.
#[inline]
fn is_known_trading_state(state: u8) -> bool {
    matches!(state, b'H' | b'P' | b'Q' | b'T')
}

// ============================================================================
// Messages
// ============================================================================

/// A decoded ITCH message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItchMessage<'a> {
    TimestampSeconds {
        second: u32,
    },
    SystemEvent {
        nanos: u32,
        event_code: u8,
    },
    StockDirectory {
        nanos: u32,
        stock: &'a [u8],
    },
    StockTradingAction {
        nanos: u32,
        stock: &'a [u8],
        trading_state: u8,
    },
    /// `A` and `F`
    AddOrder {
        nanos: u32,
        order_ref: u64,
        side: u8,
        shares: u32,
        stock: &'a [u8],
        price: u32,
    },
    OrderExecuted {
        nanos: u32,
        order_ref: u64,
        executed_shares: u32,
        match_number: u64,
    },
    OrderExecutedWithPrice {
        nanos: u32,
        order_ref: u64,
        executed_shares: u32,
        match_number: u64,
        printable: u8,
        price: u32,
    },
    OrderCancel {
        nanos: u32,
        order_ref: u64,
        canceled_shares: u32,
    },
    OrderDelete {
        nanos: u32,
        order_ref: u64,
    },
    OrderReplace {
        nanos: u32,
        original_ref: u64,
        new_ref: u64,
        shares: u32,
        price: u32,
    },
    Trade {
        nanos: u32,
        order_ref: u64,
        side: u8,
        shares: u32,
        stock: &'a [u8],
        price: u32,
        match_number: u64,
    },
    CrossTrade {
        nanos: u32,
        shares: u64,
        stock: &'a [u8],
        price: u32,
        match_number: u64,
        cross_type: u8,
    },
    BrokenTrade {
        nanos: u32,
        match_number: u64,
    },
    /// Recognised type the book does not act on
    Other {
        tag: u8,
    },
    Unknown {
        tag: u8,
    },
}

impl<'a> ItchMessage<'a> {
    /// Decode a framed body.
    ///
    /// # Errors
    ///
    /// [`DecodeError::ShortMessage`] if the body is shorter than its type's
    /// layout.
    pub fn decode(frame: Frame<'a>) -> Result<Self> {
        let b = frame.body;
        let expected = match min_len(frame.tag) {
            Some(expected) => expected,
            None => return Ok(ItchMessage::Unknown { tag: frame.tag }),
        };
        if b.len() < expected {
            return Err(DecodeError::ShortMessage {
                tag: frame.tag as char,
                expected,
                actual: b.len(),
            });
        }

        let msg = match frame.tag {
            b'T' => ItchMessage::TimestampSeconds {
                second: be_u32(b, 1),
            },
            b'S' => ItchMessage::SystemEvent {
                nanos: be_u32(b, 1),
                event_code: b[5],
            },
            b'R' => ItchMessage::StockDirectory {
                nanos: be_u32(b, 1),
                stock: &b[5..13],
            },
            b'H' => ItchMessage::StockTradingAction {
                nanos: be_u32(b, 1),
                stock: &b[5..13],
                trading_state: b[13],
            },
            b'A' | b'F' => ItchMessage::AddOrder {
                nanos: be_u32(b, 1),
                order_ref: be_u64(b, 5),
                side: b[13],
                shares: be_u32(b, 14),
                stock: &b[18..26],
                price: be_u32(b, 26),
            },
            b'E' => ItchMessage::OrderExecuted {
                nanos: be_u32(b, 1),
                order_ref: be_u64(b, 5),
                executed_shares: be_u32(b, 13),
                match_number: be_u64(b, 17),
            },
            b'C' => ItchMessage::OrderExecutedWithPrice {
                nanos: be_u32(b, 1),
                order_ref: be_u64(b, 5),
                executed_shares: be_u32(b, 13),
                match_number: be_u64(b, 17),
                printable: b[25],
                price: be_u32(b, 26),
            },
            b'X' => ItchMessage::OrderCancel {
                nanos: be_u32(b, 1),
                order_ref: be_u64(b, 5),
                canceled_shares: be_u32(b, 13),
            },
            b'D' => ItchMessage::OrderDelete {
                nanos: be_u32(b, 1),
                order_ref: be_u64(b, 5),
            },
            b'U' => ItchMessage::OrderReplace {
                nanos: be_u32(b, 1),
                original_ref: be_u64(b, 5),
                new_ref: be_u64(b, 13),
                shares: be_u32(b, 21),
                price: be_u32(b, 25),
            },
            b'P' => ItchMessage::Trade {
                nanos: be_u32(b, 1),
                order_ref: be_u64(b, 5),
                side: b[13],
                shares: be_u32(b, 14),
                stock: &b[18..26],
                price: be_u32(b, 26),
                match_number: be_u64(b, 30),
            },
            b'Q' => ItchMessage::CrossTrade {
                nanos: be_u32(b, 1),
                shares: be_u64(b, 5),
                stock: &b[13..21],
                price: be_u32(b, 21),
                match_number: be_u64(b, 25),
                cross_type: b[33],
            },
            b'B' => ItchMessage::BrokenTrade {
                nanos: be_u32(b, 1),
                match_number: be_u64(b, 5),
            },
            tag => ItchMessage::Other { tag },
        };

        Ok(msg)
    }

    /// Lower to a protocol-neutral book action.
    pub fn action(&self) -> BookAction<'a> {
        match *self {
            ItchMessage::TimestampSeconds { second } => BookAction::Clock { seconds: second },
            ItchMessage::StockTradingAction {
                nanos,
                stock,
                trading_state,
            } => BookAction::Status {
                time: Timestamp::SinceSecond(nanos),
                symbol: stock,
                status: trading_state,
                recognised: is_known_trading_state(trading_state),
            },
            ItchMessage::AddOrder {
                nanos,
                order_ref,
                side,
                shares,
                stock,
                price,
            } => BookAction::AddOrder {
                time: Timestamp::SinceSecond(nanos),
                order_id: WireId::numeric(order_ref),
                side,
                quantity: shares,
                symbol: stock,
                price: price_of(price),
            },
            ItchMessage::OrderExecuted {
                nanos,
                order_ref,
                executed_shares,
                match_number,
            } => BookAction::Execute {
                time: Timestamp::SinceSecond(nanos),
                order_id: WireId::numeric(order_ref),
                quantity: executed_shares,
                exec_id: WireId::numeric(match_number),
                price: None,
            },
            ItchMessage::OrderExecutedWithPrice {
                nanos,
                order_ref,
                executed_shares,
                match_number,
                price,
                ..
            } => BookAction::Execute {
                time: Timestamp::SinceSecond(nanos),
                order_id: WireId::numeric(order_ref),
                quantity: executed_shares,
                exec_id: WireId::numeric(match_number),
                price: Some(price_of(price)),
            },
            ItchMessage::OrderCancel {
                nanos,
                order_ref,
                canceled_shares,
            } => BookAction::Cancel {
                time: Timestamp::SinceSecond(nanos),
                order_id: WireId::numeric(order_ref),
                quantity: canceled_shares,
            },
            ItchMessage::OrderDelete { nanos, order_ref } => BookAction::Delete {
                time: Timestamp::SinceSecond(nanos),
                order_id: WireId::numeric(order_ref),
            },
            ItchMessage::OrderReplace {
                nanos,
                original_ref,
                new_ref,
                shares,
                price,
            } => BookAction::Replace {
                time: Timestamp::SinceSecond(nanos),
                order_id: WireId::numeric(original_ref),
                new_order_id: WireId::numeric(new_ref),
                quantity: shares,
                price: price_of(price),
            },
            ItchMessage::Trade {
                nanos,
                side,
                shares,
                stock,
                price,
                match_number,
                ..
            } => BookAction::Trade {
                time: Timestamp::SinceSecond(nanos),
                exchange: None,
                side: Some(side),
                quantity: shares as u64,
                symbol: stock,
                price: price_of(price),
                exec_id: WireId::numeric(match_number),
                trade_type: TradeType::NonDisplayed,
            },
            ItchMessage::CrossTrade {
                nanos,
                shares,
                stock,
                price,
                match_number,
                ..
            } => BookAction::Trade {
                time: Timestamp::SinceSecond(nanos),
                exchange: None,
                side: None,
                quantity: shares,
                symbol: stock,
                price: price_of(price),
                exec_id: WireId::numeric(match_number),
                trade_type: TradeType::Cross,
            },
            ItchMessage::BrokenTrade {
                nanos,
                match_number,
            } => BookAction::TradeBreak {
                time: Timestamp::SinceSecond(nanos),
                exec_id: WireId::numeric(match_number),
            },
            ItchMessage::SystemEvent { .. }
            | ItchMessage::StockDirectory { .. }
            | ItchMessage::Other { .. }
            | ItchMessage::Unknown { .. } => BookAction::Ignore,
        }
    }
}

#[inline]
fn price_of(raw: u32) -> Decimal {
    Decimal::from_fixed(raw as u64, PRICE_INT_LEN, PRICE_FRACTION_LEN)
}

// ============================================================================
// Framer
// ============================================================================

/// Frames length-prefixed ITCH messages out of an inflate buffer.
#[derive(Debug)]
pub struct ItchReader<R: AsRef<[u8]>> {
    buf: InflateBuffer<R>,
}

impl<R: AsRef<[u8]>> ItchReader<R> {
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
}

impl<R: AsRef<[u8]>> FeedReader for ItchReader<R> {
    fn next_frame(&mut self) -> Result<Option<Frame<'_>>> {
        if !self.buf.fill(LENGTH_PREFIX)? {
            if self.buf.available().is_empty() {
                return Ok(None);
            }
            return Err(self.truncated());
        }

        let len = be_u16(self.buf.available(), 0) as usize;
        if len == 0 {
            return Err(DecodeError::ShortMessage {
                tag: '?',
                expected: 1,
                actual: 0,
            });
        }
        if !self.buf.fill(LENGTH_PREFIX + len)? {
            return Err(self.truncated());
        }

        let raw = self.buf.take(LENGTH_PREFIX + len);
        let body = &raw[LENGTH_PREFIX..];

        Ok(Some(Frame { tag: body[0], body }))
    }

    fn next_action(&mut self) -> Result<Option<BookAction<'_>>> {
        match self.next_frame()? {
            Some(frame) => Ok(Some(ItchMessage::decode(frame)?.action())),
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

/// Date from an `S<MMDDYY>-v41.txt.gz` file name, as `20YY-MM-DD`.
pub fn parse_date(filename: &str) -> Option<String> {
    let rest = filename.strip_prefix('S')?;
    let digits = rest.get(..6)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) || !rest[6..].starts_with("-v41") {
        return None;
    }
    Some(format!("20{}-{}-{}", &digits[4..6], &digits[0..2], &digits[2..4]))
}
