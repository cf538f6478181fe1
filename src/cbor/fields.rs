//! Small grammar helpers shared by every record decoder.
//!
//! The consuming helpers move the cursor by exactly one item on success and leave it
//! untouched on failure.

use crate::error::{Result, UrError};

use super::Cursor;

/// Consume a map key that must equal `expected`
pub fn match_key(cursor: &mut Cursor<'_>, expected: u64) -> Result<()> {
    cursor.attempt(|c| {
        let actual = c.u64()?;
        if actual != expected {
            return Err(UrError::WrongMapKey { expected, actual });
        }
        Ok(())
    })
}

/// Whether the cursor sits on the unsigned map key `expected`
pub fn is_key(cursor: &Cursor<'_>, expected: u64) -> bool {
    cursor.peek_unsigned() == Some(expected)
}

/// Consume a tag that must equal `expected`
pub fn match_tag(cursor: &mut Cursor<'_>, expected: u64) -> Result<()> {
    cursor.attempt(|c| {
        let actual = c.tag()?;
        if actual != expected {
            return Err(UrError::WrongTag(actual));
        }
        Ok(())
    })
}

/// Whether the cursor sits on the tag `expected`
pub fn is_tag(cursor: &Cursor<'_>, expected: u64) -> bool {
    cursor.peek_tag() == Some(expected)
}

/// Consume a byte string of exactly `N` bytes
pub fn copy_fixed_bytes<const N: usize>(cursor: &mut Cursor<'_>) -> Result<[u8; N]> {
    cursor.attempt(|c| {
        let bytes = c.bytes()?;
        <[u8; N]>::try_from(bytes)
            .map_err(|_| UrError::WrongStringLength { expected: N, actual: bytes.len() })
    })
}

/// Read `key` followed by its value when the map has it next, otherwise leave the cursor be
pub fn optional<'b, T>(
    cursor: &mut Cursor<'b>,
    key: u64,
    read: impl FnOnce(&mut Cursor<'b>) -> Result<T>,
) -> Result<Option<T>> {
    if !is_key(cursor, key) {
        return Ok(None);
    }

    match_key(cursor, key)?;
    read(cursor).map(Some)
}

/// Longest prefix of `text` that fits in `max_len` bytes without splitting a character
pub fn truncate_utf8(text: &str, max_len: usize) -> &str {
    if text.len() <= max_len {
        return text;
    }

    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }

    &text[..end]
}
