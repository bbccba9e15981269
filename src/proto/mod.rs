//! Feed protocols.
//!
//! Each protocol module provides three layers:
//!
//! 1. A **framer** that delimits messages in the inflated byte stream and
//!    hands out [`Frame`]s borrowing the working buffer.
//! 2. A **decoder** that turns a frame into a tagged message enum whose
//!    fields are slices of the frame.
//! 3. A lowering from that enum into a protocol-neutral [`BookAction`],
//!    which is the only thing the order book ever sees.
//!
//! Frames and actions borrow the reader, so the borrow checker guarantees
//! no decoded message outlives the next buffer compaction.

pub mod itch;
pub mod pitch;
pub mod taq;

use crate::error::Result;
use crate::event::Field;
use crate::types::{Decimal, TradeType};

pub use itch::ItchReader;
pub use pitch::PitchReader;
pub use taq::TaqReader;

/// One framed message: its type tag and its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Message type discriminant
    pub tag: u8,
    /// Message body, starting at the first byte of the message proper
    pub body: &'a [u8],
}

/// A source of framed messages and the book actions they lower to.
pub trait FeedReader {
    /// Next framed message, or `None` at clean end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame<'_>>>;

    /// Next message decoded and lowered to a book action.
    fn next_action(&mut self) -> Result<Option<BookAction<'_>>>;

    /// Offset of the reader in the decompressed stream.
    fn offset(&self) -> u64;
}

// ============================================================================
// Protocol-neutral actions
// ============================================================================

/// Message time as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp<'a> {
    /// Absolute nanoseconds since midnight
    Nanos(u64),
    /// Nanoseconds since the last seconds marker
    SinceSecond(u32),
    /// Preformatted text (e.g. `HHMMSSmmm`)
    Text(&'a [u8]),
}

/// An order or execution identifier.
///
/// `key` is the decoded value used for table lookups; `text` is the wire
/// spelling, when the protocol carries one, used for output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireId<'a> {
    pub key: u64,
    pub text: Option<&'a [u8]>,
}

impl<'a> WireId<'a> {
    /// Binary identifier, rendered as a decimal integer.
    #[inline]
    pub fn numeric(key: u64) -> Self {
        Self { key, text: None }
    }

    /// Identifier decoded from wire text, rendered as that text.
    #[inline]
    pub fn text(key: u64, text: &'a [u8]) -> Self {
        Self {
            key,
            text: Some(text),
        }
    }

    /// Output column value.
    pub fn field(&self) -> Field<'a> {
        match self.text {
            Some(text) => Field::text(text),
            None => Field::Int(self.key),
        }
    }
}

/// A decoded message reduced to what the order book needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookAction<'a> {
    /// New resting order
    AddOrder {
        time: Timestamp<'a>,
        order_id: WireId<'a>,
        side: u8,
        quantity: u32,
        symbol: &'a [u8],
        price: Decimal,
    },
    /// Execution against a resting order. `price` overrides the resting
    /// price when the feed reports one.
    Execute {
        time: Timestamp<'a>,
        order_id: WireId<'a>,
        quantity: u32,
        exec_id: WireId<'a>,
        price: Option<Decimal>,
    },
    /// Partial cancel
    Cancel {
        time: Timestamp<'a>,
        order_id: WireId<'a>,
        quantity: u32,
    },
    /// Full cancel of whatever remains
    Delete {
        time: Timestamp<'a>,
        order_id: WireId<'a>,
    },
    /// Cancel-and-add keeping the original side
    Replace {
        time: Timestamp<'a>,
        order_id: WireId<'a>,
        new_order_id: WireId<'a>,
        quantity: u32,
        price: Decimal,
    },
    /// Print with no resting order behind it
    Trade {
        time: Timestamp<'a>,
        exchange: Option<&'static str>,
        side: Option<u8>,
        quantity: u64,
        symbol: &'a [u8],
        price: Decimal,
        exec_id: WireId<'a>,
        trade_type: TradeType,
    },
    /// Trade bust, symbol only resolvable through the execution table
    TradeBreak {
        time: Timestamp<'a>,
        exec_id: WireId<'a>,
    },
    /// Trading status change. `recognised` is false when the feed used a
    /// state code outside the protocol's table.
    Status {
        time: Timestamp<'a>,
        symbol: &'a [u8],
        status: u8,
        recognised: bool,
    },
    /// Drop every resting order
    Clear {
        time: Timestamp<'a>,
        symbol: &'a [u8],
    },
    /// Seconds marker for feeds with relative timestamps
    Clock { seconds: u32 },
    /// Top-of-book quote
    Quote {
        time: Timestamp<'a>,
        exchange: Option<&'static str>,
        symbol: &'a [u8],
        bid_price: Decimal,
        bid_quantity: u64,
        ask_price: Decimal,
        ask_quantity: u64,
    },
    /// Anything the book does not act on
    Ignore,
}

impl<'a> BookAction<'a> {
    /// Order id for message types that reference a resting order.
    #[inline]
    pub fn referenced_order(&self) -> Option<u64> {
        match self {
            BookAction::Execute { order_id, .. }
            | BookAction::Cancel { order_id, .. }
            | BookAction::Delete { order_id, .. }
            | BookAction::Replace { order_id, .. } => Some(order_id.key),
            _ => None,
        }
    }

    /// Symbol field carried directly by the message, if any.
    #[inline]
    pub fn symbol(&self) -> Option<&'a [u8]> {
        match *self {
            BookAction::AddOrder { symbol, .. }
            | BookAction::Trade { symbol, .. }
            | BookAction::Status { symbol, .. }
            | BookAction::Clear { symbol, .. }
            | BookAction::Quote { symbol, .. } => Some(symbol),
            _ => None,
        }
    }
}
