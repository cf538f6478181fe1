//! BIP85 entropy request/response envelope exchanged with the Jade signer.
//!
//! Unlike the UR registry types these maps are keyed by text and Jade does not sort them,
//! so responses are validated without the sorted-keys check.

use minicbor::Encoder;
use tracing::trace;

use crate::{
    cbor::{Cursor, ValidationFlags, fields::copy_fixed_bytes},
    error::{Result, ToUrError as _, UrError},
    format::copy_into,
    registry::lengths,
};

const NUM_WORDS: &str = "num_words";
const INDEX: &str = "index";
const PUBKEY: &str = "pubkey";
const ENCRYPTED: &str = "encrypted";

/// Ask Jade for a BIP85 mnemonic, encrypted to `pubkey`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bip85Request {
    pub num_words: u32,
    pub index: u32,
    pub pubkey: [u8; lengths::COMPRESSED_PUBKEY],
}

impl Bip85Request {
    pub fn new(num_words: u32, index: u32, pubkey: [u8; lengths::COMPRESSED_PUBKEY]) -> Self {
        Self { num_words, index, pubkey }
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        let mut cbor = Vec::new();
        let mut e = Encoder::new(&mut cbor);

        e.map(3)
            .and_then(|e| e.str(NUM_WORDS))
            .and_then(|e| e.u32(self.num_words))
            .and_then(|e| e.str(INDEX))
            .and_then(|e| e.u32(self.index))
            .and_then(|e| e.str(PUBKEY))
            .and_then(|e| e.bytes(&self.pubkey))
            .map_err_cbor()?;

        Ok(cbor)
    }

    /// Write the request map into `out`
    ///
    /// # Errors
    ///
    /// Returns `BufferTooSmall` with the encoded length when `out` is shorter
    pub fn encode_into(&self, out: &mut [u8]) -> Result<usize> {
        copy_into(&self.to_cbor()?, out)
    }
}

/// Jade's answer to a [`Bip85Request`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bip85Response {
    /// Ephemeral key Jade used for the encryption
    pub pubkey: [u8; lengths::COMPRESSED_PUBKEY],
    pub encrypted: Vec<u8>,
}

impl Bip85Response {
    pub fn from_cbor(cbor: &[u8]) -> Result<Self> {
        let flags = ValidationFlags::CANONICAL.difference(ValidationFlags::MAP_IS_SORTED);
        let mut cursor = Cursor::with_flags(cbor, flags)?;
        let mut map = cursor.enter_map()?;

        let mut pubkey = None;
        let mut encrypted = None;

        while !map.at_end() {
            match map.str()? {
                PUBKEY => pubkey = Some(copy_fixed_bytes::<{ lengths::COMPRESSED_PUBKEY }>(&mut map)?),
                ENCRYPTED => encrypted = Some(map.bytes()?.to_vec()),
                other => {
                    trace!("skipping bip85 response field {other}");
                    skip_value(&mut map)?;
                }
            }
        }

        cursor.leave(map)?;

        let pubkey = pubkey
            .ok_or_else(|| UrError::UnknownFormat("bip85 response has no pubkey".to_string()))?;

        let encrypted = encrypted
            .ok_or_else(|| UrError::WrongType("bip85 response has no encrypted data".to_string()))?;

        Ok(Self { pubkey, encrypted })
    }
}

fn skip_value(cursor: &mut Cursor<'_>) -> Result<()> {
    while cursor.is_tag() {
        cursor.advance()?;
    }

    cursor.advance()
}

#[cfg(test)]
mod tests {
    use minicbor::data::Tag;

    use super::*;

    const PUBKEY_HEX: &str = "037aa2120135ae201c0586ad9f450ad3f4641ddabcd9bd3e692944d9d8fd8ed8d2";

    fn pubkey() -> [u8; 33] {
        hex::decode(PUBKEY_HEX).unwrap().try_into().unwrap()
    }

    #[test]
    fn test_request_encode() {
        let request = Bip85Request::new(24, 1024, pubkey());

        let mut out = [0u8; 128];
        let written = request.encode_into(&mut out).unwrap();

        assert_eq!(
            hex::encode(&out[..written]),
            format!("a3696e756d5f776f726473181865696e646578190400667075626b65795821{PUBKEY_HEX}")
        );
    }

    #[test]
    fn test_request_buffer_too_small() {
        let request = Bip85Request::new(12, 0, pubkey());
        let required = request.to_cbor().unwrap().len();

        let mut out = [0u8; 20];
        assert_eq!(
            request.encode_into(&mut out).unwrap_err(),
            UrError::BufferTooSmall { required, capacity: 20 }
        );
    }

    #[test]
    fn test_response_parse_unsorted_keys() {
        let mut cbor = Vec::new();
        let mut e = Encoder::new(&mut cbor);
        e.map(3).unwrap();
        e.str("encrypted").unwrap().bytes(&[0xaa; 48]).unwrap();
        e.str("v").unwrap().tag(Tag::new(1)).unwrap().u8(2).unwrap();
        e.str("pubkey").unwrap().bytes(&pubkey()).unwrap();

        let response = Bip85Response::from_cbor(&cbor).unwrap();
        assert_eq!(response.pubkey, pubkey());
        assert_eq!(response.encrypted, vec![0xaa; 48]);
    }

    #[test]
    fn test_response_missing_pubkey() {
        let mut cbor = Vec::new();
        let mut e = Encoder::new(&mut cbor);
        e.map(1).unwrap().str("encrypted").unwrap().bytes(&[1, 2, 3]).unwrap();

        let err = Bip85Response::from_cbor(&cbor).unwrap_err();
        assert!(matches!(err, UrError::UnknownFormat(_)));
    }

    #[test]
    fn test_response_short_pubkey() {
        let mut cbor = Vec::new();
        let mut e = Encoder::new(&mut cbor);
        e.map(2).unwrap();
        e.str("pubkey").unwrap().bytes(&[2; 32]).unwrap();
        e.str("encrypted").unwrap().bytes(&[1]).unwrap();

        let err = Bip85Response::from_cbor(&cbor).unwrap_err();
        assert_eq!(err, UrError::WrongStringLength { expected: 33, actual: 32 });
    }

    #[test]
    fn test_response_not_a_map() {
        let err = Bip85Response::from_cbor(&[0x80]).unwrap_err();
        assert!(matches!(err, UrError::WrongType(_)));
    }
}
