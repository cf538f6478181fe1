use minicbor::{
    Encode, Encoder,
    encode::{Error as EncodeError, Write},
};
use tracing::debug;

use crate::{
    cbor::Cursor,
    error::{Result, UrError},
    format::copy_into,
    registry::CRYPTO_PSBT,
    ur::UrType,
};

/// crypto-psbt: a BIP174 PSBT carried as a CBOR byte string
/// BCR-2020-006: https://github.com/BlockchainCommons/Research/blob/master/papers/bcr-2020-006-urtypes.md
///
/// The payload lives in a buffer whose capacity is fixed when the value is created, so a
/// caller can decode successive PSBTs into the same allocation.
#[derive(Debug, Clone)]
pub struct Psbt {
    buffer: Vec<u8>,
    len: usize,
}

impl Psbt {
    /// Empty PSBT with room for `capacity` payload bytes
    ///
    /// # Errors
    ///
    /// Returns `OutOfMemory` if the buffer cannot be allocated
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(capacity).map_err(|_| UrError::OutOfMemory)?;
        buffer.resize(capacity, 0);

        Ok(Self { buffer, len: 0 })
    }

    /// PSBT holding a copy of `payload`, with exactly enough room for it
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let mut psbt = Self::with_capacity(payload.len())?;
        psbt.set_payload(payload)?;
        Ok(psbt)
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The serialized PSBT, starting with the `psbt\xff` magic
    pub fn payload(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    /// Decode untagged crypto-psbt CBOR into the existing buffer, which never shrinks
    ///
    /// # Errors
    ///
    /// Returns `WrongStringLength` when the payload exceeds the buffer capacity
    pub fn decode_into(&mut self, cbor: &[u8]) -> Result<()> {
        let mut cursor = Cursor::new(cbor)?;
        let payload = cursor.bytes()?;
        self.set_payload(payload)
    }

    fn set_payload(&mut self, payload: &[u8]) -> Result<()> {
        let capacity = self.capacity();
        if payload.len() > capacity {
            return Err(UrError::WrongStringLength { expected: capacity, actual: payload.len() });
        }

        self.buffer[..payload.len()].copy_from_slice(payload);
        self.len = payload.len();
        Ok(())
    }

    /// Write the untagged CBOR form into `out`, see [`copy_into`] for the sizing contract
    pub fn encode_into(&self, out: &mut [u8]) -> Result<usize> {
        copy_into(&self.to_cbor()?, out)
    }

    /// Parse the payload with rust-bitcoin
    pub fn to_bitcoin(&self) -> Result<bitcoin::psbt::Psbt> {
        bitcoin::psbt::Psbt::deserialize(self.payload())
            .map_err(|e| UrError::InvalidArgument(format!("invalid PSBT: {e}")))
    }
}

impl PartialEq for Psbt {
    fn eq(&self, other: &Self) -> bool {
        self.payload() == other.payload()
    }
}

impl Eq for Psbt {}

impl UrType for Psbt {
    const TAG: u64 = CRYPTO_PSBT;
    const UR_TYPE: &'static str = "crypto-psbt";
    type Decoded = Self;

    // bytes
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        let payload = cursor.bytes()?;
        debug!(len = payload.len(), "decoded psbt");
        Self::from_payload(payload)
    }
}

impl<C> Encode<C> for Psbt {
    fn encode<W: Write>(
        &self,
        e: &mut Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), EncodeError<W::Error>> {
        e.bytes(self.payload())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PSBT_HEX: &str = "70736274ff01009a020000000258e87a21b56daf0c23be8e7070456c336f7cbaa5c8757924f545887bb2abdd750000000000ffffffff838d0427d0ec650a68aa46bb0b098aea4422c071b2ca78352a077959d07cea1d0100000000ffffffff0270aaf00800000000160014d85c2b71d0060b09c9886aeb815e50991dda124d00e1f5050000000016001400aea9a2e5f0f876a588df5546e8742d1d87008f000000000000000000";

    fn psbt_cbor() -> Vec<u8> {
        hex::decode(format!("58a7{PSBT_HEX}")).unwrap()
    }

    #[test]
    fn test_crypto_psbt_decode() {
        let psbt = Psbt::from_cbor(&psbt_cbor()).unwrap();

        assert_eq!(psbt.len(), 167);
        assert_eq!(psbt.capacity(), 167);
        assert_eq!(hex::encode(psbt.payload()), PSBT_HEX);
        assert_eq!(psbt.to_cbor().unwrap(), psbt_cbor());
    }

    #[test]
    fn test_crypto_psbt_to_bitcoin() {
        let psbt = Psbt::from_cbor(&psbt_cbor()).unwrap().to_bitcoin().unwrap();
        assert_eq!(psbt.unsigned_tx.input.len(), 2);
        assert_eq!(psbt.unsigned_tx.output.len(), 2);

        let garbage = Psbt::from_payload(b"not a psbt").unwrap();
        assert!(matches!(garbage.to_bitcoin(), Err(UrError::InvalidArgument(_))));
    }

    #[test]
    fn test_crypto_psbt_decode_into_reuses_buffer() {
        let mut psbt = Psbt::with_capacity(256).unwrap();
        assert!(psbt.is_empty());

        psbt.decode_into(&psbt_cbor()).unwrap();
        assert_eq!(psbt.len(), 167);
        assert_eq!(psbt.capacity(), 256);

        // a shorter payload keeps the capacity
        psbt.decode_into(&[0x43, 1, 2, 3]).unwrap();
        assert_eq!(psbt.payload(), &[1, 2, 3]);
        assert_eq!(psbt.capacity(), 256);
    }

    /// Test malformed CBOR: payload larger than the caller's buffer
    #[test]
    fn test_crypto_psbt_buffer_too_small() {
        let mut psbt = Psbt::with_capacity(100).unwrap();
        let err = psbt.decode_into(&psbt_cbor()).unwrap_err();

        assert_eq!(err, UrError::WrongStringLength { expected: 100, actual: 167 });
        assert!(psbt.is_empty());
    }

    /// Test malformed CBOR: text instead of bytes
    #[test]
    fn test_crypto_psbt_wrong_type() {
        let err = Psbt::from_cbor(&[0x63, b'a', b'b', b'c']).unwrap_err();
        assert!(matches!(err, UrError::WrongType(_)));
    }

    #[test]
    fn test_crypto_psbt_tagged() {
        let psbt = Psbt::from_cbor(&psbt_cbor()).unwrap();
        let tagged = psbt.to_tagged_cbor().unwrap();
        assert_eq!(&tagged[..3], &[0xd9, 0x01, 0x36]);
        assert_eq!(Psbt::from_tagged_cbor(&tagged).unwrap(), psbt);
    }

    #[test]
    fn test_crypto_psbt_encode_into() {
        let psbt = Psbt::from_cbor(&psbt_cbor()).unwrap();

        let mut small = [0u8; 16];
        assert_eq!(
            psbt.encode_into(&mut small).unwrap_err(),
            UrError::BufferTooSmall { required: 169, capacity: 16 }
        );

        let mut out = [0u8; 200];
        let written = psbt.encode_into(&mut out).unwrap();
        assert_eq!(&out[..written], psbt_cbor().as_slice());
    }
}
