//! Single-symbol order book state machine.
//!
//! Tracks resting orders for one symbol and emits a normalized event for
//! every in-scope message:
//! - ahash maps for order and execution lookups
//! - A tombstone set for ids dropped by a symbol clear, lifted when any
//!   later add reuses the id
//! - Session clock for feeds that timestamp relative to a seconds marker
//!
//! Every consistency violation is fatal: the book never clamps a quantity
//! or skips a missing order it was told to expect.

use ahash::{AHashMap, AHashSet};

use crate::book::SymbolFilter;
use crate::error::{DecodeError, Result};
use crate::event::{Event, EventKind, EventSink, Field};
use crate::proto::{BookAction, Timestamp};
use crate::types::{ExecRecord, Order};

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Counters for monitoring a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookStats {
    /// Actions passed to [`OrderBook::apply`]
    pub messages_applied: u64,

    /// Actions rejected by the symbol filter
    pub messages_filtered: u64,

    /// Actions the book does not act on
    pub messages_ignored: u64,

    /// Events handed to the sink
    pub events_emitted: u64,

    /// Symbol clears processed
    pub clears: u64,

    /// Largest number of simultaneously resting orders
    pub peak_orders: usize,
}

/// Single-symbol order book.
///
/// Owns the order table, the execution table used to resolve trade breaks,
/// and the seconds clock. Each run builds a fresh book.
///
/// # Example
///
/// ```
/// use tick_normalizer::{OrderBook, SymbolFilter, VecSink};
/// use tick_normalizer::proto::{BookAction, Timestamp, WireId};
/// use tick_normalizer::Decimal;
///
/// let mut book = OrderBook::new(SymbolFilter::new("TEST", 6).unwrap());
/// let mut sink = VecSink::new();
///
/// let add = BookAction::AddOrder {
///     time: Timestamp::Nanos(0),
///     order_id: WireId::numeric(1),
///     side: b'B',
///     quantity: 100,
///     symbol: b"TEST  ",
///     price: Decimal::from_parts(b"000010", b"0000"),
/// };
/// book.apply(add, &mut sink).unwrap();
///
/// assert_eq!(book.remaining(1), Some(100));
/// assert_eq!(sink.codes(), "A");
/// ```
#[derive(Debug, Clone)]
pub struct OrderBook {
    filter: SymbolFilter,

    /// order id -> resting order
    orders: AHashMap<u64, Order>,

    /// exec id -> execution record; never pruned during a run
    execs: AHashMap<u64, ExecRecord>,

    /// Ids dropped by the last symbol clears
    cleared: AHashSet<u64>,

    /// Latest seconds marker
    clock_seconds: u32,

    stats: BookStats,
}

impl OrderBook {
    pub fn new(filter: SymbolFilter) -> Self {
        Self {
            filter,
            orders: AHashMap::new(),
            execs: AHashMap::new(),
            cleared: AHashSet::new(),
            clock_seconds: 0,
            stats: BookStats::default(),
        }
    }

    pub fn filter(&self) -> &SymbolFilter {
        &self.filter
    }

    /// Apply one action, emitting at most two events (a replace emits a
    /// cancel and an add).
    ///
    /// # Errors
    ///
    /// - [`DecodeError::OrderCleared`] if the action references an order
    ///   dropped by a symbol clear
    /// - [`DecodeError::DuplicateOrder`] on an add for a resting id
    /// - [`DecodeError::QuantityUnderflow`] if an execute or cancel exceeds
    ///   the remaining quantity
    /// - [`DecodeError::UnknownTradingState`] for unrecognised status codes
    /// - Any error returned by the sink
    pub fn apply<S: EventSink>(&mut self, action: BookAction<'_>, mut sink: S) -> Result<()> {
        self.stats.messages_applied += 1;

        if matches!(action, BookAction::Ignore) {
            self.stats.messages_ignored += 1;
            return Ok(());
        }

        let resting = match action.referenced_order() {
            Some(id) => self.orders.get(&id).copied(),
            None => None,
        };

        if resting.is_none() {
            if let Some(id) = action.referenced_order() {
                if self.cleared.contains(&id) {
                    return Err(DecodeError::OrderCleared(id));
                }
            }
            if !self.filter.admits(&action, &self.execs) {
                // An out-of-scope add reusing a cleared id now owns it
                if let BookAction::AddOrder { order_id, .. } = action {
                    self.cleared.remove(&order_id.key);
                }
                self.stats.messages_filtered += 1;
                return Ok(());
            }
        }

        match action {
            BookAction::AddOrder {
                time,
                order_id,
                side,
                quantity,
                price,
                ..
            } => {
                if self.orders.contains_key(&order_id.key) {
                    return Err(DecodeError::DuplicateOrder(order_id.key));
                }
                self.insert_order(
                    order_id.key,
                    Order {
                        remaining: quantity,
                        price,
                        side,
                    },
                );

                let mut event = Event::new(EventKind::AddOrder, self.time(time));
                event.order_id = order_id.field();
                event.side = Field::Char(side);
                event.quantity = Field::Int(quantity as u64);
                event.price = Field::Price(price);
                self.emit(&mut sink, &event)?;
            }
            BookAction::Execute {
                time,
                order_id,
                quantity,
                exec_id,
                price,
            } => {
                let order = resting.ok_or(DecodeError::OrderNotFound(order_id.key))?;
                let remaining = self.reduce(order_id.key, order, quantity)?;
                self.execs.insert(
                    exec_id.key,
                    ExecRecord {
                        symbol: self.filter.symbol(),
                    },
                );

                let mut event = Event::new(EventKind::ExecuteOrder, self.time(time));
                event.order_id = order_id.field();
                event.exec_id = exec_id.field();
                event.quantity = Field::Int(quantity as u64);
                event.price = Field::Price(price.unwrap_or(order.price));
                self.emit(&mut sink, &event)?;

                if remaining == 0 {
                    self.orders.remove(&order_id.key);
                }
            }
            BookAction::Cancel {
                time,
                order_id,
                quantity,
            } => {
                let order = resting.ok_or(DecodeError::OrderNotFound(order_id.key))?;
                let remaining = self.reduce(order_id.key, order, quantity)?;

                let mut event = Event::new(EventKind::CancelOrder, self.time(time));
                event.order_id = order_id.field();
                event.quantity = Field::Int(quantity as u64);
                self.emit(&mut sink, &event)?;

                if remaining == 0 {
                    self.orders.remove(&order_id.key);
                }
            }
            BookAction::Delete { time, order_id } => {
                let order = self
                    .orders
                    .remove(&order_id.key)
                    .ok_or(DecodeError::OrderNotFound(order_id.key))?;

                let mut event = Event::new(EventKind::CancelOrder, self.time(time));
                event.order_id = order_id.field();
                event.quantity = Field::Int(order.remaining as u64);
                self.emit(&mut sink, &event)?;
            }
            BookAction::Replace {
                time,
                order_id,
                new_order_id,
                quantity,
                price,
            } => {
                let old = self
                    .orders
                    .remove(&order_id.key)
                    .ok_or(DecodeError::OrderNotFound(order_id.key))?;
                if self.orders.contains_key(&new_order_id.key) {
                    return Err(DecodeError::DuplicateOrder(new_order_id.key));
                }

                let time = self.time(time);
                let mut cancel = Event::new(EventKind::CancelOrder, time.clone());
                cancel.order_id = order_id.field();
                cancel.quantity = Field::Int(old.remaining as u64);
                self.emit(&mut sink, &cancel)?;

                self.insert_order(
                    new_order_id.key,
                    Order {
                        remaining: quantity,
                        price,
                        side: old.side,
                    },
                );

                let mut add = Event::new(EventKind::AddOrder, time);
                add.order_id = new_order_id.field();
                add.side = Field::Char(old.side);
                add.quantity = Field::Int(quantity as u64);
                add.price = Field::Price(price);
                self.emit(&mut sink, &add)?;
            }
            BookAction::Trade {
                time,
                exchange,
                side,
                quantity,
                price,
                exec_id,
                trade_type,
                ..
            } => {
                self.execs.insert(
                    exec_id.key,
                    ExecRecord {
                        symbol: self.filter.symbol(),
                    },
                );

                let mut event = Event::new(EventKind::Trade, self.time(time));
                if let Some(mic) = exchange {
                    event.exchange = Field::text(mic.as_bytes());
                }
                if let Some(side) = side {
                    event.side = Field::Char(side);
                }
                event.exec_id = exec_id.field();
                event.quantity = Field::Int(quantity);
                event.price = Field::Price(price);
                event.trade_type = Some(trade_type);
                self.emit(&mut sink, &event)?;
            }
            BookAction::TradeBreak { time, exec_id } => {
                let mut event = Event::new(EventKind::TradeBreak, self.time(time));
                event.exec_id = exec_id.field();
                self.emit(&mut sink, &event)?;
            }
            BookAction::Status {
                time,
                status,
                recognised,
                ..
            } => {
                if !recognised {
                    return Err(DecodeError::UnknownTradingState(status as char));
                }

                let mut event = Event::new(EventKind::Status, self.time(time));
                event.status = Field::Char(status);
                self.emit(&mut sink, &event)?;
            }
            BookAction::Clear { time, .. } => {
                let event = Event::new(EventKind::Clear, self.time(time));
                self.emit(&mut sink, &event)?;

                self.stats.clears += 1;
                log::debug!(
                    "symbol clear dropped {} resting orders",
                    self.orders.len()
                );
                self.cleared.extend(self.orders.drain().map(|(id, _)| id));
            }
            BookAction::Clock { seconds } => {
                self.clock_seconds = seconds;
            }
            BookAction::Quote {
                time,
                exchange,
                bid_price,
                bid_quantity,
                ask_price,
                ask_quantity,
                ..
            } => {
                let mut event = Event::new(EventKind::Quote, self.time(time));
                if let Some(mic) = exchange {
                    event.exchange = Field::text(mic.as_bytes());
                }
                event.bid_quantity = Field::Int(bid_quantity);
                event.bid_price = Field::Price(bid_price);
                event.ask_quantity = Field::Int(ask_quantity);
                event.ask_price = Field::Price(ask_price);
                self.emit(&mut sink, &event)?;
            }
            BookAction::Ignore => {}
        }

        Ok(())
    }

    fn insert_order(&mut self, id: u64, order: Order) {
        self.cleared.remove(&id);
        self.orders.insert(id, order);
        self.stats.peak_orders = self.stats.peak_orders.max(self.orders.len());
    }

    /// Take `quantity` off a resting order and return what remains.
    fn reduce(&mut self, id: u64, order: Order, quantity: u32) -> Result<u32> {
        if quantity > order.remaining {
            return Err(DecodeError::QuantityUnderflow {
                order_id: id,
                remaining: order.remaining,
                requested: quantity,
            });
        }

        let remaining = order.remaining - quantity;
        if let Some(entry) = self.orders.get_mut(&id) {
            entry.remaining = remaining;
        }
        Ok(remaining)
    }

    fn emit<S: EventSink>(&mut self, sink: &mut S, event: &Event<'_>) -> Result<()> {
        sink.emit(event)?;
        self.stats.events_emitted += 1;
        Ok(())
    }

    /// Output time column for a wire timestamp.
    fn time<'a>(&self, time: Timestamp<'a>) -> Field<'a> {
        match time {
            Timestamp::Nanos(ns) => Field::Int(ns),
            Timestamp::SinceSecond(ns) => {
                Field::Int(self.clock_seconds as u64 * NANOS_PER_SECOND + ns as u64)
            }
            Timestamp::Text(text) => Field::text(text),
        }
    }

    /// Reset to an empty book, keeping the filter.
    pub fn reset(&mut self) {
        self.orders.clear();
        self.execs.clear();
        self.cleared.clear();
        self.clock_seconds = 0;
        self.stats = BookStats::default();
    }

    /// Get current statistics.
    pub fn stats(&self) -> &BookStats {
        &self.stats
    }

    /// Number of resting orders.
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Number of recorded executions.
    pub fn exec_count(&self) -> usize {
        self.execs.len()
    }

    pub fn contains_order(&self, id: u64) -> bool {
        self.orders.contains_key(&id)
    }

    /// Remaining quantity of a resting order.
    pub fn remaining(&self, id: u64) -> Option<u32> {
        self.orders.get(&id).map(|o| o.remaining)
    }

    /// Latest seconds marker seen.
    pub fn clock_seconds(&self) -> u32 {
        self.clock_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::VecSink;
    use crate::proto::WireId;
    use crate::types::{Decimal, TradeType};

    const SYM: &[u8] = b"TEST  ";

    fn book() -> OrderBook {
        OrderBook::new(SymbolFilter::new("TEST", 6).unwrap())
    }

    fn price(int: &[u8], frac: &[u8]) -> Decimal {
        Decimal::from_parts(int, frac)
    }

    fn add(id: u64, symbol: &[u8], quantity: u32) -> BookAction<'_> {
        BookAction::AddOrder {
            time: Timestamp::Nanos(1),
            order_id: WireId::numeric(id),
            side: b'S',
            quantity,
            symbol,
            price: price(b"000010", b"0000"),
        }
    }

    fn execute(id: u64, quantity: u32, exec: u64) -> BookAction<'static> {
        BookAction::Execute {
            time: Timestamp::Nanos(2),
            order_id: WireId::numeric(id),
            quantity,
            exec_id: WireId::numeric(exec),
            price: None,
        }
    }

    fn cancel(id: u64, quantity: u32) -> BookAction<'static> {
        BookAction::Cancel {
            time: Timestamp::Nanos(3),
            order_id: WireId::numeric(id),
            quantity,
        }
    }

    fn clear(symbol: &[u8]) -> BookAction<'_> {
        BookAction::Clear {
            time: Timestamp::Nanos(4),
            symbol,
        }
    }

    fn trade(symbol: &[u8], exec: u64) -> BookAction<'_> {
        BookAction::Trade {
            time: Timestamp::Nanos(5),
            exchange: None,
            side: None,
            quantity: 10,
            symbol,
            price: price(b"000011", b"0000"),
            exec_id: WireId::numeric(exec),
            trade_type: TradeType::NonDisplayed,
        }
    }

    fn trade_break(exec: u64) -> BookAction<'static> {
        BookAction::TradeBreak {
            time: Timestamp::Nanos(6),
            exec_id: WireId::numeric(exec),
        }
    }

    #[test]
    fn test_new_book() {
        let book = book();
        assert_eq!(book.order_count(), 0);
        assert_eq!(book.exec_count(), 0);
        assert_eq!(book.stats(), &BookStats::default());
    }

    #[test]
    fn test_execute_carries_resting_price() {
        let mut book = book();
        let mut sink = VecSink::new();

        book.apply(add(1, SYM, 100), &mut sink).unwrap();
        book.apply(execute(1, 40, 9), &mut sink).unwrap();

        assert_eq!(sink.codes(), "AE");
        assert_eq!(sink.events[1].quantity, Field::Int(40));
        assert_eq!(sink.events[1].price.to_string(), "10.0000");
        assert_eq!(sink.events[1].exec_id, Field::Int(9));
        assert_eq!(book.remaining(1), Some(60));
        assert_eq!(book.exec_count(), 1);
    }

    #[test]
    fn test_execute_with_price_override() {
        let mut book = book();
        let mut sink = VecSink::new();

        book.apply(add(1, SYM, 100), &mut sink).unwrap();
        let action = BookAction::Execute {
            time: Timestamp::Nanos(2),
            order_id: WireId::numeric(1),
            quantity: 100,
            exec_id: WireId::numeric(3),
            price: Some(price(b"000009", b"9900")),
        };
        book.apply(action, &mut sink).unwrap();

        assert_eq!(sink.events[1].price.to_string(), "9.9900");
        assert!(!book.contains_order(1));
    }

    #[test]
    fn test_cancel_to_zero_removes_order() {
        let mut book = book();
        let mut sink = VecSink::new();

        book.apply(add(1, SYM, 50), &mut sink).unwrap();
        book.apply(cancel(1, 20), &mut sink).unwrap();
        assert!(book.contains_order(1));
        book.apply(cancel(1, 30), &mut sink).unwrap();

        assert_eq!(sink.codes(), "AXX");
        assert!(!book.contains_order(1));
    }

    #[test]
    fn test_quantity_underflow_is_fatal() {
        let mut book = book();
        let mut sink = VecSink::new();

        book.apply(add(1, SYM, 10), &mut sink).unwrap();
        let err = book.apply(execute(1, 11, 1), &mut sink).unwrap_err();
        assert_eq!(
            err,
            DecodeError::QuantityUnderflow {
                order_id: 1,
                remaining: 10,
                requested: 11
            }
        );
        assert_eq!(book.remaining(1), Some(10));
    }

    #[test]
    fn test_duplicate_add_is_fatal() {
        let mut book = book();
        let mut sink = VecSink::new();

        book.apply(add(1, SYM, 10), &mut sink).unwrap();
        let err = book.apply(add(1, SYM, 10), &mut sink).unwrap_err();
        assert_eq!(err, DecodeError::DuplicateOrder(1));
    }

    #[test]
    fn test_other_symbol_filtered() {
        let mut book = book();
        let mut sink = VecSink::new();

        book.apply(add(1, b"OTHER ", 10), &mut sink).unwrap();
        book.apply(execute(1, 5, 1), &mut sink).unwrap();
        book.apply(cancel(1, 5), &mut sink).unwrap();

        assert!(sink.is_empty());
        assert_eq!(book.stats().messages_filtered, 3);
        assert_eq!(book.exec_count(), 0);
    }

    #[test]
    fn test_delete_and_replace() {
        let mut book = book();
        let mut sink = VecSink::new();

        book.apply(add(1, SYM, 100), &mut sink).unwrap();
        book.apply(cancel(1, 30), &mut sink).unwrap();

        let replace = BookAction::Replace {
            time: Timestamp::Nanos(7),
            order_id: WireId::numeric(1),
            new_order_id: WireId::numeric(2),
            quantity: 200,
            price: price(b"000012", b"0000"),
        };
        book.apply(replace, &mut sink).unwrap();

        assert_eq!(sink.codes(), "AXXA");
        assert_eq!(sink.events[2].quantity, Field::Int(70));
        assert_eq!(sink.events[3].side, Field::Char(b'S'));
        assert_eq!(sink.events[3].order_id, Field::Int(2));
        assert!(!book.contains_order(1));
        assert_eq!(book.remaining(2), Some(200));

        let delete = BookAction::Delete {
            time: Timestamp::Nanos(8),
            order_id: WireId::numeric(2),
        };
        book.apply(delete, &mut sink).unwrap();
        assert_eq!(sink.codes(), "AXXAX");
        assert_eq!(sink.events[4].quantity, Field::Int(200));
        assert_eq!(book.order_count(), 0);
    }

    #[test]
    fn test_clear_tombstones_orders() {
        let mut book = book();
        let mut sink = VecSink::new();

        book.apply(add(1, SYM, 100), &mut sink).unwrap();
        book.apply(clear(SYM), &mut sink).unwrap();

        assert_eq!(sink.codes(), "AC");
        assert_eq!(book.order_count(), 0);
        assert_eq!(book.stats().clears, 1);

        let err = book.apply(execute(1, 10, 1), &mut sink).unwrap_err();
        assert_eq!(err, DecodeError::OrderCleared(1));

        // Re-adding the id lifts the tombstone
        book.apply(add(1, SYM, 5), &mut sink).unwrap();
        book.apply(execute(1, 5, 2), &mut sink).unwrap();
        assert!(!book.contains_order(1));
    }

    #[test]
    fn test_cleared_id_reused_by_other_symbol() {
        let mut book = book();
        let mut sink = VecSink::new();

        book.apply(add(7, SYM, 100), &mut sink).unwrap();
        book.apply(clear(SYM), &mut sink).unwrap();
        book.apply(add(7, b"OTHER ", 50), &mut sink).unwrap();
        book.apply(execute(7, 20, 1), &mut sink).unwrap();
        book.apply(cancel(7, 30), &mut sink).unwrap();

        assert_eq!(sink.codes(), "AC");
        assert_eq!(book.stats().messages_filtered, 3);
        assert!(!book.contains_order(7));
    }

    #[test]
    fn test_trade_break_follows_exec_table() {
        let mut book = book();
        let mut sink = VecSink::new();

        book.apply(trade_break(42), &mut sink).unwrap();
        assert!(sink.is_empty());

        book.apply(trade(b"OTHER ", 43), &mut sink).unwrap();
        book.apply(trade_break(43), &mut sink).unwrap();
        assert!(sink.is_empty());

        book.apply(trade(SYM, 42), &mut sink).unwrap();
        book.apply(trade_break(42), &mut sink).unwrap();
        assert_eq!(sink.codes(), "TB");
        assert_eq!(sink.events[0].trade_type, Some(TradeType::NonDisplayed));
        assert_eq!(sink.events[1].exec_id, Field::Int(42));
    }

    #[test]
    fn test_clock_and_relative_time() {
        let mut book = book();
        let mut sink = VecSink::new();

        book.apply(BookAction::Clock { seconds: 34_200 }, &mut sink)
            .unwrap();
        let add = BookAction::AddOrder {
            time: Timestamp::SinceSecond(500),
            order_id: WireId::numeric(1),
            side: b'B',
            quantity: 1,
            symbol: SYM,
            price: price(b"1", b"0000"),
        };
        book.apply(add, &mut sink).unwrap();

        assert_eq!(book.clock_seconds(), 34_200);
        assert_eq!(sink.events[0].time, Field::Int(34_200_000_000_500));
    }

    #[test]
    fn test_unknown_status_is_fatal() {
        let mut book = book();
        let mut sink = VecSink::new();

        let status = |code, recognised| BookAction::Status {
            time: Timestamp::Nanos(0),
            symbol: SYM,
            status: code,
            recognised,
        };
        book.apply(status(b'H', true), &mut sink).unwrap();
        assert_eq!(sink.events[0].status, Field::Char(b'H'));

        let err = book.apply(status(b'Z', false), &mut sink).unwrap_err();
        assert_eq!(err, DecodeError::UnknownTradingState('Z'));
    }

    #[test]
    fn test_quote_keeps_venue() {
        let mut book = OrderBook::new(SymbolFilter::new("IBM", 16).unwrap());
        let mut sink = VecSink::new();

        let quote = BookAction::Quote {
            time: Timestamp::Text(b"093000000"),
            exchange: Some("XNYS"),
            symbol: b"IBM             ",
            bid_price: price(b"0000123", b"4000"),
            bid_quantity: 5,
            ask_price: price(b"0000123", b"5000"),
            ask_quantity: 7,
        };
        book.apply(quote, &mut sink).unwrap();

        let event = &sink.events[0];
        assert_eq!(event.exchange.to_string(), "XNYS");
        assert_eq!(event.time.to_string(), "093000000");
        assert_eq!(event.bid_price.to_string(), "123.4000");
        assert_eq!(event.ask_quantity, Field::Int(7));
    }

    #[test]
    fn test_conservation_of_quantity() {
        let mut book = book();
        let mut sink = VecSink::new();

        book.apply(add(1, SYM, 1000), &mut sink).unwrap();
        let steps: [(bool, u32); 6] = [
            (true, 100),
            (false, 50),
            (true, 250),
            (false, 1),
            (true, 99),
            (false, 300),
        ];
        let mut taken = 0;
        for (i, (is_exec, qty)) in steps.iter().enumerate() {
            let action = if *is_exec {
                execute(1, *qty, i as u64)
            } else {
                cancel(1, *qty)
            };
            book.apply(action, &mut sink).unwrap();
            taken += qty;
            assert_eq!(book.remaining(1).unwrap_or(0) + taken, 1000);
        }
        assert_eq!(book.remaining(1), Some(200));
    }

    #[test]
    fn test_reset() {
        let mut book = book();
        let mut sink = VecSink::new();

        book.apply(add(1, SYM, 10), &mut sink).unwrap();
        book.apply(trade(SYM, 1), &mut sink).unwrap();
        book.reset();

        assert_eq!(book.order_count(), 0);
        assert_eq!(book.exec_count(), 0);
        assert_eq!(book.stats().messages_applied, 0);
    }
}
