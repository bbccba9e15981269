//! Symbol filter.
//!
//! The configured symbol is padded to the protocol's field width once, and
//! every symbol-bearing message is compared byte for byte over that width.

use ahash::AHashMap;

use crate::error::Result;
use crate::proto::BookAction;
use crate::types::{ExecRecord, Symbol};

/// Decides whether a message that does not reference a known resting
/// order belongs to the configured symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolFilter {
    symbol: Symbol,
}

impl SymbolFilter {
    /// Filter on `symbol`, space-padded to `width` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DecodeError::InvalidSymbol`] if the symbol is wider
    /// than the field.
    pub fn new(symbol: &str, width: usize) -> Result<Self> {
        Ok(Self {
            symbol: Symbol::padded(symbol, width)?,
        })
    }

    /// The padded filter symbol.
    #[inline]
    pub fn symbol(&self) -> Symbol {
        self.symbol
    }

    /// Whether `action` is in scope.
    ///
    /// Trade breaks carry no symbol and are resolved through `execs`. Clock
    /// markers always pass because later timestamps depend on them. Messages
    /// that reference an order are never admitted here: they are in scope
    /// only if the order is resting, which the book checks first.
    pub fn admits(&self, action: &BookAction<'_>, execs: &AHashMap<u64, ExecRecord>) -> bool {
        match action {
            BookAction::TradeBreak { exec_id, .. } => execs
                .get(&exec_id.key)
                .is_some_and(|exec| exec.symbol == self.symbol),
            BookAction::Clock { .. } => true,
            BookAction::Ignore => false,
            other => match other.symbol() {
                Some(field) => self.symbol.matches(field),
                None => false,
            },
        }
    }
}
