use minicbor::{Decoder, data::Type};

use crate::error::{Result, ToUrError as _, UrError};

use super::validate::{ValidationFlags, validate};

/// Position inside a validated CBOR buffer, bounded by the enclosing container.
///
/// `remaining` counts the items left in the current container; a map of `n` entries holds
/// `2n` items. Tags are consumed without touching the count since they prefix the item
/// they annotate. Cloning a cursor is how decoders take a snapshot for trial parsing.
#[derive(Debug, Clone)]
pub struct Cursor<'b> {
    decoder: Decoder<'b>,
    remaining: u64,
}

impl<'b> Cursor<'b> {
    /// Validate `bytes` with [`ValidationFlags::CANONICAL`] and point at the top-level item
    pub fn new(bytes: &'b [u8]) -> Result<Self> {
        Self::with_flags(bytes, ValidationFlags::CANONICAL)
    }

    /// Validate `bytes` with custom checks, e.g. for text-keyed maps that are not sorted
    pub fn with_flags(bytes: &'b [u8], flags: ValidationFlags) -> Result<Self> {
        validate(bytes, flags)?;
        Ok(Self { decoder: Decoder::new(bytes), remaining: 1 })
    }

    pub fn at_end(&self) -> bool {
        self.remaining == 0
    }

    /// Items left in the current container
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn datatype(&self) -> Option<Type> {
        if self.at_end() {
            return None;
        }

        self.decoder.datatype().ok()
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(self.datatype(), Some(Type::U8 | Type::U16 | Type::U32 | Type::U64))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.datatype(), Some(Type::Array | Type::ArrayIndef))
    }

    pub fn is_map(&self) -> bool {
        matches!(self.datatype(), Some(Type::Map | Type::MapIndef))
    }

    pub fn is_tag(&self) -> bool {
        matches!(self.datatype(), Some(Type::Tag))
    }

    /// Value of the unsigned integer under the cursor, without consuming it
    pub fn peek_unsigned(&self) -> Option<u64> {
        if !self.is_unsigned() {
            return None;
        }

        self.decoder.clone().u64().ok()
    }

    /// Value of the tag under the cursor, without consuming it
    pub fn peek_tag(&self) -> Option<u64> {
        if !self.is_tag() {
            return None;
        }

        self.decoder.clone().tag().ok().map(|tag| tag.as_u64())
    }

    /// Runs `parse` on a snapshot and only keeps its progress when it succeeds
    pub fn attempt<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let mut snapshot = self.clone();
        let value = parse(&mut snapshot)?;
        *self = snapshot;
        Ok(value)
    }

    pub fn u64(&mut self) -> Result<u64> {
        self.expect("unsigned integer", |ty| {
            matches!(ty, Type::U8 | Type::U16 | Type::U32 | Type::U64)
        })?;

        let value = self.decoder.u64().map_err_cbor()?;
        self.remaining -= 1;
        Ok(value)
    }

    pub fn u32(&mut self) -> Result<u32> {
        self.attempt(|cursor| {
            let value = cursor.u64()?;
            u32::try_from(value)
                .map_err(|_| UrError::UnhandledCase(format!("integer {value} does not fit in 32 bits")))
        })
    }

    pub fn bool(&mut self) -> Result<bool> {
        self.expect("bool", |ty| ty == Type::Bool)?;

        let value = self.decoder.bool().map_err_cbor()?;
        self.remaining -= 1;
        Ok(value)
    }

    pub fn bytes(&mut self) -> Result<&'b [u8]> {
        self.expect("byte string", |ty| ty == Type::Bytes)?;

        let value = self.decoder.bytes().map_err_cbor()?;
        self.remaining -= 1;
        Ok(value)
    }

    pub fn str(&mut self) -> Result<&'b str> {
        self.expect("text string", |ty| ty == Type::String)?;

        let value = self.decoder.str().map_err_cbor()?;
        self.remaining -= 1;
        Ok(value)
    }

    /// Consume the tag under the cursor, the tagged item stays in place
    pub fn tag(&mut self) -> Result<u64> {
        self.expect("tag", |ty| ty == Type::Tag)?;

        let tag = self.decoder.tag().map_err_cbor()?;
        Ok(tag.as_u64())
    }

    /// Cursor over the entries of the map under this cursor, which itself does not move
    pub fn enter_map(&self) -> Result<Cursor<'b>> {
        self.expect("map", |ty| matches!(ty, Type::Map | Type::MapIndef))?;

        let mut decoder = self.decoder.clone();
        let len = decoder
            .map()
            .map_err_cbor()?
            .ok_or_else(|| UrError::UnhandledCase("indefinite-length map".to_string()))?;

        let remaining = len
            .checked_mul(2)
            .ok_or_else(|| UrError::UnhandledCase(format!("map with {len} entries")))?;

        Ok(Cursor { decoder, remaining })
    }

    /// Cursor over the elements of the array under this cursor, which itself does not move
    pub fn enter_array(&self) -> Result<Cursor<'b>> {
        self.expect("array", |ty| matches!(ty, Type::Array | Type::ArrayIndef))?;

        let mut decoder = self.decoder.clone();
        let remaining = decoder
            .array()
            .map_err_cbor()?
            .ok_or_else(|| UrError::UnhandledCase("indefinite-length array".to_string()))?;

        Ok(Cursor { decoder, remaining })
    }

    /// Step past the container `child` was entered from
    ///
    /// # Errors
    ///
    /// Returns `UnknownFormat` if `child` still has unread items
    pub fn leave(&mut self, child: Cursor<'b>) -> Result<()> {
        if !child.at_end() {
            return Err(UrError::UnknownFormat(format!(
                "{} unexpected trailing items in container",
                child.remaining
            )));
        }

        if self.at_end() {
            return Err(UrError::UnknownFormat("leaving a container past its end".to_string()));
        }

        self.decoder = child.decoder;
        self.remaining -= 1;
        Ok(())
    }

    /// Skip one tag header, or one whole item including anything nested inside it
    pub fn advance(&mut self) -> Result<()> {
        if self.at_end() {
            return Err(UrError::UnknownFormat("advance past end of container".to_string()));
        }

        if self.is_tag() {
            self.decoder.tag().map_err_cbor()?;
            return Ok(());
        }

        self.decoder.skip().map_err_cbor()?;
        self.remaining -= 1;
        Ok(())
    }

    fn expect(&self, expected: &str, accept: impl Fn(Type) -> bool) -> Result<()> {
        if self.at_end() {
            return Err(UrError::WrongType(format!("expected {expected}, found end of container")));
        }

        let found = self.decoder.datatype().map_err_cbor()?;
        if !accept(found) {
            return Err(UrError::WrongType(format!("expected {expected}, found {found:?}")));
        }

        Ok(())
    }
}
