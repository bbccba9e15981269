//! Field decoders shared by the protocol modules.
//!
//! All decoders are pure functions over byte slices. ASCII decoders do no
//! trimming and no sign handling; they accumulate left to right exactly as
//! the digits appear on the wire.

/// Decode an ASCII base-10 field: `value = value * 10 + (byte - '0')`.
#[inline]
pub fn base10_decode(field: &[u8]) -> u64 {
    field.iter().fold(0u64, |acc, &b| {
        acc.wrapping_mul(10).wrapping_add(b.wrapping_sub(b'0') as u64)
    })
}

/// Value of one base-36 digit (`0-9` then `A-Z`).
#[inline]
fn base36_digit(b: u8) -> u64 {
    match b {
        b'0'..=b'9' => (b - b'0') as u64,
        b'A'..=b'Z' => (b - b'A') as u64 + 10,
        b'a'..=b'z' => (b - b'a') as u64 + 10,
        _ => 0,
    }
}

/// Decode a base-36 identifier field.
#[inline]
pub fn base36_decode(field: &[u8]) -> u64 {
    field
        .iter()
        .fold(0u64, |acc, &b| acc.wrapping_mul(36).wrapping_add(base36_digit(b)))
}

/// Big-endian `u16` at `offset`.
#[inline]
pub fn be_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

/// Big-endian `u32` at `offset`.
#[inline]
pub fn be_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_be_bytes(raw)
}

/// Big-endian `u64` at `offset`.
#[inline]
pub fn be_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_be_bytes(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base10_decode() {
        assert_eq!(base10_decode(b"000100"), 100);
        assert_eq!(base10_decode(b"0000000040"), 40);
        assert_eq!(base10_decode(b""), 0);
        assert_eq!(base10_decode(b"34200000"), 34_200_000);
    }

    #[test]
    fn test_base36_decode() {
        assert_eq!(base36_decode(b"0"), 0);
        assert_eq!(base36_decode(b"Z"), 35);
        assert_eq!(base36_decode(b"10"), 36);
        assert_eq!(base36_decode(b"AB1"), 10 * 36 * 36 + 11 * 36 + 1);
        // Leading zeros do not change the value
        assert_eq!(base36_decode(b"000000000AB1"), base36_decode(b"AB1"));
    }

    #[test]
    fn test_decode_is_pure() {
        let field = b"4K2JP00000A1";
        assert_eq!(base36_decode(field), base36_decode(field));
    }

    #[test]
    fn test_big_endian() {
        let bytes = [0x00, 0x1e, 0x00, 0x00, 0x01, 0x00, 0, 0, 0, 0, 0, 0, 0, 7];
        assert_eq!(be_u16(&bytes, 0), 30);
        assert_eq!(be_u32(&bytes, 2), 256);
        assert_eq!(be_u64(&bytes, 6), 7);
    }
}
