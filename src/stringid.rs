//! `StringId` — short identifiers packed into an integer. Used as a
//! compact, comparable identifier for filter types and command/option
//! ids.
//!
//! Two packings are supported:
//! - **5-bit**: a 27-symbol alphabet (`a-z` and `-`) packed 5 bits per
//!   character into a `u32`, up to 6 characters.
//! - **6-bit**: a 63-symbol alphabet (`a-z`, `A-Z`, `0-9`, `-`) packed 6
//!   bits per character into a `u64`, up to 10 characters.
//!
//! Symbol code `0` is reserved as a terminator so decoding can stop
//! before consuming the full integer width without needing a separate
//! length field.

const BIT5_ALPHABET: &[u8; 27] = b"abcdefghijklmnopqrstuvwxyz-";
const BIT6_ALPHABET: &[u8; 63] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-";

fn bit5_code(c: u8) -> Option<u32> {
    BIT5_ALPHABET
        .iter()
        .position(|&a| a == c)
        .map(|i| i as u32 + 1)
}

fn bit6_code(c: u8) -> Option<u64> {
    BIT6_ALPHABET
        .iter()
        .position(|&a| a == c)
        .map(|i| i as u64 + 1)
}

#[derive(Debug, thiserror::Error)]
pub enum StringIdError {
    #[error("string too long for this packing: {0:?}")]
    TooLong(String),
    #[error("character '{0}' is not in the StringId alphabet")]
    InvalidChar(char),
    #[error("string is empty")]
    Empty,
}

/// Packs `s` (1-6 chars over `a-z-`) into a 5-bit-per-char `u32`.
pub fn encode_bit5(s: &str) -> Result<u32, StringIdError> {
    if s.is_empty() {
        return Err(StringIdError::Empty);
    }
    if s.len() > 6 {
        return Err(StringIdError::TooLong(s.to_string()));
    }
    let mut value: u32 = 0;
    for (i, &b) in s.as_bytes().iter().enumerate() {
        let code = bit5_code(b).ok_or(StringIdError::InvalidChar(b as char))?;
        value |= code << (i * 5);
    }
    Ok(value)
}

/// Inverse of [`encode_bit5`]; stops at the first terminator code (0).
pub fn decode_bit5(id: u32) -> String {
    let mut out = String::new();
    for i in 0..6 {
        let code = (id >> (i * 5)) & 0x1f;
        if code == 0 {
            break;
        }
        out.push(BIT5_ALPHABET[(code - 1) as usize] as char);
    }
    out
}

/// Packs `s` (1-10 chars over `a-zA-Z0-9-`) into a 6-bit-per-char `u64`.
pub fn encode_bit6(s: &str) -> Result<u64, StringIdError> {
    if s.is_empty() {
        return Err(StringIdError::Empty);
    }
    if s.len() > 10 {
        return Err(StringIdError::TooLong(s.to_string()));
    }
    let mut value: u64 = 0;
    for (i, &b) in s.as_bytes().iter().enumerate() {
        let code = bit6_code(b).ok_or(StringIdError::InvalidChar(b as char))?;
        value |= code << (i * 6);
    }
    Ok(value)
}

/// Inverse of [`encode_bit6`]; stops at the first terminator code (0).
pub fn decode_bit6(id: u64) -> String {
    let mut out = String::new();
    for i in 0..10 {
        let code = (id >> (i * 6)) & 0x3f;
        if code == 0 {
            break;
        }
        out.push(BIT6_ALPHABET[(code - 1) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit5_round_trip() {
        for s in ["a", "ab", "abcdef", "gz-", "x-y"] {
            let id = encode_bit5(s).unwrap();
            assert_eq!(decode_bit5(id), s);
        }
    }

    #[test]
    fn bit6_round_trip() {
        for s in ["a", "Ab9", "hash", "chunk", "Zz0-9"] {
            let id = encode_bit6(s).unwrap();
            assert_eq!(decode_bit6(id), s);
        }
    }

    #[test]
    fn bit5_rejects_too_long() {
        assert!(encode_bit5("abcdefg").is_err());
    }

    #[test]
    fn bit5_rejects_invalid_char() {
        assert!(matches!(
            encode_bit5("A"),
            Err(StringIdError::InvalidChar('A'))
        ));
    }
}
