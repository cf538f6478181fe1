//! Up-front structural validation of untrusted CBOR.

use std::collections::HashSet;

use bitflags::bitflags;
use minicbor::{Decoder, data::Type};

use crate::{
    error::{Result, ToUrError as _, UrError},
    registry::limits::MAX_NESTING_DEPTH,
};

bitflags! {
    /// Checks applied by [`validate`] before any decoder looks at the data
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ValidationFlags: u16 {
        /// Well-formed encoding with a bounded nesting depth
        const BASIC = 1 << 0;
        /// No map contains the same key twice
        const MAP_KEYS_UNIQUE = 1 << 1;
        /// Map keys appear in canonical (length-first, then bytewise) order
        const MAP_IS_SORTED = 1 << 2;
        /// Text strings hold valid UTF-8
        const UTF8 = 1 << 3;
        /// The `undefined` simple value never appears
        const NO_UNDEFINED = 1 << 4;
        /// The buffer holds exactly one item with nothing after it
        const COMPLETE_DATA = 1 << 5;
        /// Strings and containers all carry a definite length
        const NO_INDEFINITE_LENGTH = 1 << 6;

        /// Everything the tagged UR types require
        const CANONICAL = Self::BASIC.bits()
            | Self::MAP_KEYS_UNIQUE.bits()
            | Self::MAP_IS_SORTED.bits()
            | Self::UTF8.bits()
            | Self::NO_UNDEFINED.bits()
            | Self::COMPLETE_DATA.bits()
            | Self::NO_INDEFINITE_LENGTH.bits();
    }
}

/// Walks every item in `bytes` once and rejects anything `flags` forbids
///
/// # Errors
///
/// Returns `CborMalformed` describing the first violation found
pub fn validate(bytes: &[u8], flags: ValidationFlags) -> Result<()> {
    let mut decoder = Decoder::new(bytes);
    validate_item(&mut decoder, flags, 0)?;

    if flags.contains(ValidationFlags::COMPLETE_DATA) && decoder.position() != bytes.len() {
        let trailing = bytes.len() - decoder.position();
        return Err(UrError::CborMalformed(format!("{trailing} trailing bytes after item")));
    }

    Ok(())
}

fn validate_item(decoder: &mut Decoder<'_>, flags: ValidationFlags, depth: usize) -> Result<()> {
    if depth > MAX_NESTING_DEPTH {
        return Err(malformed("nesting too deep"));
    }

    let datatype = decoder.datatype().map_err_cbor()?;
    match datatype {
        Type::Undefined if flags.contains(ValidationFlags::NO_UNDEFINED) => {
            Err(malformed("undefined value"))
        }

        Type::String => {
            if flags.contains(ValidationFlags::UTF8) {
                decoder.str().map_err_cbor()?;
            } else {
                decoder.skip().map_err_cbor()?;
            }
            Ok(())
        }

        Type::Array => {
            let len = decoder.array().map_err_cbor()?.unwrap_or_default();
            for _ in 0..len {
                validate_item(decoder, flags, depth + 1)?;
            }
            Ok(())
        }

        Type::Map => validate_map(decoder, flags, depth),

        Type::Tag => {
            decoder.tag().map_err_cbor()?;
            validate_item(decoder, flags, depth + 1)
        }

        Type::ArrayIndef | Type::MapIndef | Type::BytesIndef | Type::StringIndef => {
            if flags.contains(ValidationFlags::NO_INDEFINITE_LENGTH) {
                return Err(malformed("indefinite-length item"));
            }
            decoder.skip().map_err_cbor()
        }

        Type::Break => Err(malformed("unexpected break")),
        Type::Unknown(byte) => Err(UrError::CborMalformed(format!("unknown initial byte {byte:#04x}"))),

        _ => decoder.skip().map_err_cbor(),
    }
}

fn validate_map(decoder: &mut Decoder<'_>, flags: ValidationFlags, depth: usize) -> Result<()> {
    let len = decoder.map().map_err_cbor()?.unwrap_or_default();
    let input = decoder.input();

    let sorted = flags.contains(ValidationFlags::MAP_IS_SORTED);
    let unique = flags.contains(ValidationFlags::MAP_KEYS_UNIQUE);

    let mut previous: Option<&[u8]> = None;
    let mut seen: HashSet<&[u8]> = HashSet::new();

    for _ in 0..len {
        let start = decoder.position();
        validate_item(decoder, flags, depth + 1)?;
        let key = &input[start..decoder.position()];

        if sorted {
            if let Some(previous) = previous {
                match canonical_cmp(previous, key) {
                    std::cmp::Ordering::Less => {}
                    std::cmp::Ordering::Equal => return Err(malformed("duplicate map key")),
                    std::cmp::Ordering::Greater => return Err(malformed("map keys out of order")),
                }
            }
            previous = Some(key);
        } else if unique && !seen.insert(key) {
            return Err(malformed("duplicate map key"));
        }

        validate_item(decoder, flags, depth + 1)?;
    }

    Ok(())
}

// shorter encodings sort first, equal lengths compare bytewise
fn canonical_cmp(a: &[u8], b: &[u8]) -> std::cmp::Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn malformed(reason: &str) -> UrError {
    UrError::CborMalformed(reason.to_string())
}
