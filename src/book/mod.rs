//! Order-book reconstruction.
//!
//! This module turns the protocol-neutral actions produced by the feed
//! readers into normalized events for a single symbol.

mod engine;
pub mod filter;

pub use engine::{BookStats, OrderBook};
pub use filter::SymbolFilter;
