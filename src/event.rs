//! Normalized output events and the sink interface.
//!
//! The order book produces [`Event`]s and hands them to an [`EventSink`].
//! Session-wide columns (date, time zone, exchange, symbol) are owned by the
//! sink; an event only carries what varies per row.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Decimal, TradeType};

/// Row type, written as the first column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Date,
    AddOrder,
    CancelOrder,
    ExecuteOrder,
    Clear,
    Trade,
    TradeBreak,
    Status,
    Quote,
}

impl EventKind {
    /// Single-character event code.
    pub fn code(self) -> u8 {
        match self {
            EventKind::Date => b'D',
            EventKind::AddOrder => b'A',
            EventKind::CancelOrder => b'X',
            EventKind::ExecuteOrder => b'E',
            EventKind::Clear => b'C',
            EventKind::Trade => b'T',
            EventKind::TradeBreak => b'B',
            EventKind::Status => b'S',
            EventKind::Quote => b'Q',
        }
    }
}

/// One output column value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Field<'a> {
    /// Renders as nothing (a bare delimiter)
    #[default]
    Empty,
    /// Raw wire text
    Text(Cow<'a, [u8]>),
    /// Decimal integer
    Int(u64),
    /// Single byte
    Char(u8),
    /// Fixed-point price
    Price(Decimal),
}

impl<'a> Field<'a> {
    /// Borrowed wire text.
    #[inline]
    pub fn text(bytes: &'a [u8]) -> Self {
        Field::Text(Cow::Borrowed(bytes))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Field::Empty)
    }

    /// Detach from the input buffer.
    pub fn into_owned(self) -> Field<'static> {
        match self {
            Field::Empty => Field::Empty,
            Field::Text(text) => Field::Text(Cow::Owned(text.into_owned())),
            Field::Int(v) => Field::Int(v),
            Field::Char(c) => Field::Char(c),
            Field::Price(p) => Field::Price(p),
        }
    }
}

impl fmt::Display for Field<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Empty => Ok(()),
            Field::Text(text) => f.write_str(&String::from_utf8_lossy(text)),
            Field::Int(v) => write!(f, "{v}"),
            Field::Char(c) => write!(f, "{}", *c as char),
            Field::Price(p) => write!(f, "{p}"),
        }
    }
}

/// A normalized output row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event<'a> {
    pub kind: EventKind,
    pub time: Field<'a>,
    /// Per-row venue; empty means the session exchange
    pub exchange: Field<'a>,
    pub order_id: Field<'a>,
    pub exec_id: Field<'a>,
    pub side: Field<'a>,
    pub quantity: Field<'a>,
    pub price: Field<'a>,
    pub trade_type: Option<TradeType>,
    pub bid_quantity: Field<'a>,
    pub bid_price: Field<'a>,
    pub ask_quantity: Field<'a>,
    pub ask_price: Field<'a>,
    pub status: Field<'a>,
}

impl<'a> Event<'a> {
    /// Event with every column empty except kind and time.
    pub fn new(kind: EventKind, time: Field<'a>) -> Self {
        Self {
            kind,
            time,
            exchange: Field::Empty,
            order_id: Field::Empty,
            exec_id: Field::Empty,
            side: Field::Empty,
            quantity: Field::Empty,
            price: Field::Empty,
            trade_type: None,
            bid_quantity: Field::Empty,
            bid_price: Field::Empty,
            ask_quantity: Field::Empty,
            ask_price: Field::Empty,
            status: Field::Empty,
        }
    }

    /// The session date row.
    pub fn date() -> Event<'static> {
        Event::new(EventKind::Date, Field::Empty)
    }

    /// Detach from the input buffer.
    pub fn into_owned(self) -> Event<'static> {
        Event {
            kind: self.kind,
            time: self.time.into_owned(),
            exchange: self.exchange.into_owned(),
            order_id: self.order_id.into_owned(),
            exec_id: self.exec_id.into_owned(),
            side: self.side.into_owned(),
            quantity: self.quantity.into_owned(),
            price: self.price.into_owned(),
            trade_type: self.trade_type,
            bid_quantity: self.bid_quantity.into_owned(),
            bid_price: self.bid_price.into_owned(),
            ask_quantity: self.ask_quantity.into_owned(),
            ask_price: self.ask_price.into_owned(),
            status: self.status.into_owned(),
        }
    }
}

/// Receiver of normalized events.
///
/// A write failure is fatal to the run, so sinks return `Result` and the
/// order book propagates it unchanged.
pub trait EventSink {
    fn emit(&mut self, event: &Event<'_>) -> Result<()>;
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: &Event<'_>) -> Result<()> {
        (**self).emit(event)
    }
}

/// Sink that keeps owned copies of every event.
#[derive(Debug, Clone, Default)]
pub struct VecSink {
    pub events: Vec<Event<'static>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Event codes in emission order, e.g. `"AXX"`.
    pub fn codes(&self) -> String {
        self.events.iter().map(|e| e.kind.code() as char).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSink for VecSink {
    fn emit(&mut self, event: &Event<'_>) -> Result<()> {
        self.events.push(event.clone().into_owned());
        Ok(())
    }
}
