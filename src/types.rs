//! Core value types shared by the decoders and the order book.
//!
//! These types are designed to be:
//! - `Copy` and heap-free, so decoded messages never allocate
//! - Exact: prices stay as wire digits and are never converted to floating point
//! - Fixed-width, matching how symbols and prices appear on the wire

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, Result};

/// Widest symbol field across the supported feeds (NYSE TAQ).
pub const MAX_SYMBOL_LEN: usize = 16;

/// Maximum number of digits a [`Decimal`] can hold.
pub const MAX_DECIMAL_DIGITS: usize = 16;

// ============================================================================
// Symbol
// ============================================================================

/// A fixed-width, space-padded symbol as it appears on the wire.
///
/// PITCH uses 6 bytes, ITCH 8 and NYSE TAQ 16. Comparison is an exact
/// byte comparison over the full width; no case folding or trimming.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol {
    bytes: [u8; MAX_SYMBOL_LEN],
    width: u8,
}

impl Symbol {
    /// Pad a user-supplied symbol with spaces to `width` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidSymbol`] if the symbol does not fit.
    pub fn padded(symbol: &str, width: usize) -> Result<Self> {
        let raw = symbol.as_bytes();
        if raw.len() > width || width > MAX_SYMBOL_LEN {
            return Err(DecodeError::InvalidSymbol {
                symbol: symbol.to_string(),
                width,
            });
        }

        let mut bytes = [b' '; MAX_SYMBOL_LEN];
        bytes[..raw.len()].copy_from_slice(raw);

        Ok(Self {
            bytes,
            width: width as u8,
        })
    }

    /// Copy a symbol field straight from a message.
    ///
    /// Fields wider than [`MAX_SYMBOL_LEN`] are cut at that length.
    pub fn from_wire(field: &[u8]) -> Self {
        let width = field.len().min(MAX_SYMBOL_LEN);
        let mut bytes = [b' '; MAX_SYMBOL_LEN];
        bytes[..width].copy_from_slice(&field[..width]);

        Self {
            bytes,
            width: width as u8,
        }
    }

    /// Full padded field.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.width as usize]
    }

    /// Field width in bytes.
    #[inline]
    pub fn width(&self) -> usize {
        self.width as usize
    }

    /// Symbol without its trailing padding.
    pub fn trimmed(&self) -> &[u8] {
        let raw = self.as_bytes();
        let end = raw.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
        &raw[..end]
    }

    /// Exact comparison against a wire field.
    #[inline]
    pub fn matches(&self, field: &[u8]) -> bool {
        self.as_bytes() == field
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.trimmed()))
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({:?})", String::from_utf8_lossy(self.as_bytes()))
    }
}

// ============================================================================
// Decimal
// ============================================================================

/// Fixed-point price kept as its wire digits.
///
/// The integer and fraction digits are stored separately and only joined
/// with a `.` when rendered. The integer part loses its leading zeros on
/// output (one digit is always kept); the fraction is written verbatim.
///
/// # Example
///
/// ```
/// use tick_normalizer::Decimal;
///
/// let price = Decimal::from_parts(b"000012", b"3400");
/// assert_eq!(price.to_string(), "12.3400");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    digits: [u8; MAX_DECIMAL_DIGITS],
    integer_len: u8,
    len: u8,
}

impl Decimal {
    /// Build from separate integer and fraction digit spans.
    ///
    /// Spans longer than the digit capacity are cut from the left of the
    /// integer part, which only ever drops leading zeros on real feeds.
    pub fn from_parts(integer: &[u8], fraction: &[u8]) -> Self {
        let fraction = &fraction[..fraction.len().min(MAX_DECIMAL_DIGITS)];
        let room = MAX_DECIMAL_DIGITS - fraction.len();
        let integer = &integer[integer.len().saturating_sub(room)..];

        let mut digits = [b'0'; MAX_DECIMAL_DIGITS];
        digits[..integer.len()].copy_from_slice(integer);
        digits[integer.len()..integer.len() + fraction.len()].copy_from_slice(fraction);

        Self {
            digits,
            integer_len: integer.len() as u8,
            len: (integer.len() + fraction.len()) as u8,
        }
    }

    /// Split one contiguous digit field after `integer_len` digits.
    pub fn from_field(field: &[u8], integer_len: usize) -> Self {
        let split = integer_len.min(field.len());
        Self::from_parts(&field[..split], &field[split..])
    }

    /// Render a binary fixed-point value as `integer_len + fraction_len`
    /// zero-padded digits, then split.
    pub fn from_fixed(value: u64, integer_len: usize, fraction_len: usize) -> Self {
        let width = (integer_len + fraction_len).min(MAX_DECIMAL_DIGITS);
        let mut digits = [b'0'; MAX_DECIMAL_DIGITS];
        let mut rest = value;
        for slot in digits[..width].iter_mut().rev() {
            *slot = b'0' + (rest % 10) as u8;
            rest /= 10;
        }
        Self::from_field(&digits[..width], integer_len.min(width))
    }

    /// Integer digits as stored (leading zeros included).
    pub fn integer(&self) -> &[u8] {
        &self.digits[..self.integer_len as usize]
    }

    /// Fraction digits.
    pub fn fraction(&self) -> &[u8] {
        &self.digits[self.integer_len as usize..self.len as usize]
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let integer = self.integer();
        let first = integer
            .iter()
            .position(|&d| d != b'0')
            .unwrap_or(integer.len().saturating_sub(1));
        let integer = if integer.is_empty() { &b"0"[..] } else { &integer[first..] };

        f.write_str(&String::from_utf8_lossy(integer))?;
        f.write_str(".")?;
        f.write_str(&String::from_utf8_lossy(self.fraction()))
    }
}

impl fmt::Debug for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Decimal({self})")
    }
}

// ============================================================================
// Book records
// ============================================================================

/// A resting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    /// Shares not yet executed or canceled
    pub remaining: u32,
    /// Resting price, carried onto execution events
    pub price: Decimal,
    /// Wire side indicator (`B`/`S`)
    pub side: u8,
}

/// Execution record kept for trade-break resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecRecord {
    /// Symbol the execution belonged to
    pub symbol: Symbol,
}

/// Trade classification written to the `TradeType` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeType {
    /// Regular execution against a displayed order
    Regular,
    /// Execution against a non-displayed order
    NonDisplayed,
    /// Intermarket sweep
    IntermarketSweep,
    /// Opening/closing/halt cross
    Cross,
}

impl TradeType {
    /// Single-character column code.
    pub fn code(self) -> u8 {
        match self {
            TradeType::Regular => b'R',
            TradeType::NonDisplayed => b'N',
            TradeType::IntermarketSweep => b'F',
            TradeType::Cross => b'X',
        }
    }
}
