//! Tab-separated event output.
//!
//! Two column layouts are supported:
//!
//! - **OB**: every order-book event (`D`, `A`, `X`, `E`, `C`, `T`, `B`, `S`)
//! - **TAQ**: trades and quotes only; executions are written as regular
//!   trades at the resting price, and adds, cancels and clears are dropped
//!
//! Empty columns are written as a bare tab. The writer owns the
//! session-wide columns (date, time zone, exchange, symbol): the date and
//! time zone appear on the `D` row only; exchange and symbol appear on
//! every row, with a per-row venue taking precedence over the session
//! exchange.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::event::{Event, EventKind, EventSink, Field};
use crate::types::TradeType;

/// OB column names.
pub const OB_COLUMNS: &[&str] = &[
    "Event", "Date", "Time", "TimeZone", "Exchange", "Symbol", "OrderID", "ExecID", "Side",
    "Quantity", "Price", "Status",
];

/// TAQ column names.
pub const TAQ_COLUMNS: &[&str] = &[
    "Event",
    "Date",
    "Time",
    "TimeZone",
    "Exchange",
    "Symbol",
    "ExecID",
    "TradeQuantity",
    "TradePrice",
    "TradeSide",
    "TradeType",
    "BidQuantity1",
    "BidPrice1",
    "AskQuantity1",
    "AskPrice1",
    "Status",
];

/// Output column layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputShape {
    /// Order-book events
    #[default]
    Ob,
    /// Trades and quotes
    Taq,
}

impl OutputShape {
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            OutputShape::Ob => OB_COLUMNS,
            OutputShape::Taq => TAQ_COLUMNS,
        }
    }

    /// Parse `ob` or `taq` (case-insensitive).
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ob" => Some(OutputShape::Ob),
            "taq" => Some(OutputShape::Taq),
            _ => None,
        }
    }
}

/// Writes events as TSV rows.
///
/// # Example
///
/// ```
/// use tick_normalizer::{Event, EventSink, OutputShape, TsvWriter};
///
/// let mut out = Vec::new();
/// {
///     let mut writer = TsvWriter::new(&mut out, OutputShape::Ob)
///         .with_date("2012-01-03")
///         .with_exchange("BATS")
///         .with_symbol("TEST");
///     writer.write_header().unwrap();
///     writer.emit(&Event::date()).unwrap();
/// }
/// let text = String::from_utf8(out).unwrap();
/// assert!(text.ends_with("D\t2012-01-03\t\tAmerica/New_York\tBATS\tTEST\t\t\t\t\t\t\n"));
/// ```
#[derive(Debug)]
pub struct TsvWriter<W: Write> {
    out: W,
    shape: OutputShape,
    date: String,
    time_zone: String,
    exchange: String,
    symbol: String,
    /// Reused row buffer
    line: Vec<u8>,
    rows: u64,
}

impl<W: Write> TsvWriter<W> {
    pub fn new(out: W, shape: OutputShape) -> Self {
        Self {
            out,
            shape,
            date: String::new(),
            time_zone: crate::session::DEFAULT_TIME_ZONE.to_string(),
            exchange: String::new(),
            symbol: String::new(),
            line: Vec::with_capacity(256),
            rows: 0,
        }
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = date.into();
        self
    }

    pub fn with_time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = time_zone.into();
        self
    }

    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = exchange.into();
        self
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }

    pub fn shape(&self) -> OutputShape {
        self.shape
    }

    /// Rows written so far, header excluded.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Write the column header line.
    pub fn write_header(&mut self) -> Result<()> {
        let header = self.shape.columns().join("\t");
        self.out.write_all(header.as_bytes())?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn format_ob(&mut self, event: &Event<'_>) -> std::io::Result<()> {
        let line = &mut self.line;
        line.push(event.kind.code());
        write_common(line, event, event.kind, &self.date, &self.time_zone, &self.exchange, &self.symbol)?;
        write_field(line, &event.order_id)?;
        write_field(line, &event.exec_id)?;
        write_field(line, &event.side)?;
        write_field(line, &event.quantity)?;
        write_field(line, &event.price)?;
        write_field(line, &event.status)?;
        Ok(())
    }

    fn format_taq(&mut self, event: &Event<'_>, kind: EventKind) -> std::io::Result<()> {
        let trade_type = match (event.kind, event.trade_type) {
            (EventKind::ExecuteOrder, _) => Some(TradeType::Regular),
            (_, trade_type) => trade_type,
        };

        let line = &mut self.line;
        line.push(kind.code());
        write_common(line, event, kind, &self.date, &self.time_zone, &self.exchange, &self.symbol)?;
        write_field(line, &event.exec_id)?;
        write_field(line, &event.quantity)?;
        write_field(line, &event.price)?;
        write_field(line, &event.side)?;
        match trade_type {
            Some(t) => write_field(line, &Field::Char(t.code()))?,
            None => line.push(b'\t'),
        }
        write_field(line, &event.bid_quantity)?;
        write_field(line, &event.bid_price)?;
        write_field(line, &event.ask_quantity)?;
        write_field(line, &event.ask_price)?;
        write_field(line, &event.status)?;
        Ok(())
    }
}

/// Kind a TAQ row is written as, or `None` if the event is not written.
fn taq_kind(kind: EventKind) -> Option<EventKind> {
    match kind {
        EventKind::Date
        | EventKind::Trade
        | EventKind::TradeBreak
        | EventKind::Status
        | EventKind::Quote => Some(kind),
        EventKind::ExecuteOrder => Some(EventKind::Trade),
        EventKind::AddOrder | EventKind::CancelOrder | EventKind::Clear => None,
    }
}

/// Columns two through six: date, time, time zone, exchange, symbol.
fn write_common(
    line: &mut Vec<u8>,
    event: &Event<'_>,
    kind: EventKind,
    date: &str,
    time_zone: &str,
    exchange: &str,
    symbol: &str,
) -> std::io::Result<()> {
    let is_date = kind == EventKind::Date;
    line.push(b'\t');
    if is_date {
        line.extend_from_slice(date.as_bytes());
    }
    write_field(line, &event.time)?;
    line.push(b'\t');
    if is_date {
        line.extend_from_slice(time_zone.as_bytes());
    }
    line.push(b'\t');
    if event.exchange.is_empty() {
        line.extend_from_slice(exchange.as_bytes());
    } else {
        write!(line, "{}", event.exchange)?;
    }
    line.push(b'\t');
    line.extend_from_slice(symbol.as_bytes());
    Ok(())
}

/// Separator followed by the field.
#[inline]
fn write_field(line: &mut Vec<u8>, field: &Field<'_>) -> std::io::Result<()> {
    line.push(b'\t');
    match field {
        Field::Empty => {}
        Field::Text(text) => line.extend_from_slice(text),
        Field::Char(c) => line.push(*c),
        other => write!(line, "{other}")?,
    }
    Ok(())
}

impl<W: Write> EventSink for TsvWriter<W> {
    fn emit(&mut self, event: &Event<'_>) -> Result<()> {
        self.line.clear();
        match self.shape {
            OutputShape::Ob => {
                if event.kind == EventKind::Quote {
                    return Ok(());
                }
                self.format_ob(event)?;
            }
            OutputShape::Taq => match taq_kind(event.kind) {
                Some(kind) => self.format_taq(event, kind)?,
                None => return Ok(()),
            },
        }
        self.line.push(b'\n');
        self.out.write_all(&self.line)?;
        self.rows += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Decimal;

    fn writer(shape: OutputShape) -> TsvWriter<Vec<u8>> {
        TsvWriter::new(Vec::new(), shape)
            .with_date("2012-01-03")
            .with_exchange("BATS")
            .with_symbol("TEST")
    }

    fn text(writer: TsvWriter<Vec<u8>>) -> String {
        String::from_utf8(writer.into_inner()).unwrap()
    }

    fn columns(line: &str) -> Vec<&str> {
        line.split('\t').collect()
    }

    fn execute() -> Event<'static> {
        let mut event = Event::new(EventKind::ExecuteOrder, Field::Int(1_000_000));
        event.order_id = Field::text(b"4K2JP00000A1");
        event.exec_id = Field::text(b"0000000000XY");
        event.quantity = Field::Int(40);
        event.price = Field::Price(Decimal::from_parts(b"000012", b"3400"));
        event
    }

    #[test]
    fn test_ob_header() {
        let mut w = writer(OutputShape::Ob);
        w.write_header().unwrap();
        assert_eq!(
            text(w),
            "Event\tDate\tTime\tTimeZone\tExchange\tSymbol\tOrderID\tExecID\tSide\tQuantity\tPrice\tStatus\n"
        );
    }

    #[test]
    fn test_taq_header_width() {
        let mut w = writer(OutputShape::Taq);
        w.write_header().unwrap();
        let out = text(w);
        assert_eq!(columns(out.trim_end()).len(), 16);
    }

    #[test]
    fn test_ob_rows() {
        let mut w = writer(OutputShape::Ob);
        w.emit(&Event::date()).unwrap();
        w.emit(&execute()).unwrap();
        let out = text(w);
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(
            columns(lines[0]),
            ["D", "2012-01-03", "", "America/New_York", "BATS", "TEST", "", "", "", "", "", ""]
        );
        assert_eq!(
            columns(lines[1]),
            ["E", "", "1000000", "", "BATS", "TEST", "4K2JP00000A1", "0000000000XY", "", "40", "12.3400", ""]
        );
    }

    #[test]
    fn test_ob_skips_quotes() {
        let mut w = writer(OutputShape::Ob);
        w.emit(&Event::new(EventKind::Quote, Field::Empty)).unwrap();
        assert_eq!(w.rows(), 0);
        assert!(text(w).is_empty());
    }

    #[test]
    fn test_taq_projection() {
        let mut w = writer(OutputShape::Taq);
        w.emit(&Event::new(EventKind::AddOrder, Field::Int(1))).unwrap();
        w.emit(&Event::new(EventKind::CancelOrder, Field::Int(2))).unwrap();
        w.emit(&Event::new(EventKind::Clear, Field::Int(3))).unwrap();
        w.emit(&execute()).unwrap();

        let mut quote = Event::new(EventKind::Quote, Field::text(b"093000000"));
        quote.exchange = Field::text(b"XNYS");
        quote.bid_quantity = Field::Int(5);
        quote.bid_price = Field::Price(Decimal::from_parts(b"0000010", b"0000"));
        quote.ask_quantity = Field::Int(6);
        quote.ask_price = Field::Price(Decimal::from_parts(b"0000010", b"0100"));
        w.emit(&quote).unwrap();

        assert_eq!(w.rows(), 2);
        let out = text(w);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            columns(lines[0]),
            ["T", "", "1000000", "", "BATS", "TEST", "0000000000XY", "40", "12.3400", "", "R", "", "", "", "", ""]
        );
        assert_eq!(
            columns(lines[1]),
            ["Q", "", "093000000", "", "XNYS", "TEST", "", "", "", "", "", "5", "10.0000", "6", "10.0100", ""]
        );
    }

    #[test]
    fn test_trade_type_column() {
        let mut w = writer(OutputShape::Taq);
        let mut trade = Event::new(EventKind::Trade, Field::Int(1));
        trade.trade_type = Some(TradeType::IntermarketSweep);
        trade.side = Field::Char(b'B');
        w.emit(&trade).unwrap();

        let out = text(w);
        let cols = columns(out.trim_end());
        assert_eq!(cols[9], "B");
        assert_eq!(cols[10], "F");
    }

    #[test]
    fn test_shape_parse() {
        assert_eq!(OutputShape::parse("OB"), Some(OutputShape::Ob));
        assert_eq!(OutputShape::parse("taq"), Some(OutputShape::Taq));
        assert_eq!(OutputShape::parse("csv"), None);
    }
}
