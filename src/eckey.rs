use minicbor::{
    Encode, Encoder,
    encode::{Error as EncodeError, Write},
};
use crate::{
    cbor::{
        Cursor,
        fields::{copy_fixed_bytes, match_key, optional},
    },
    error::{Result, UrError},
    registry::{CRYPTO_ECKEY, eckey_keys, lengths},
    ur::UrType,
};

/// crypto-eckey: a bare secp256k1 key
/// BCR-2020-008: https://github.com/BlockchainCommons/Research/blob/master/papers/bcr-2020-008-eckey.md
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcKey {
    Private([u8; lengths::PRIVATE_KEY]),
    PublicCompressed([u8; lengths::COMPRESSED_PUBKEY]),
    PublicUncompressed([u8; lengths::UNCOMPRESSED_PUBKEY]),
}

/// The only curve BCR-2020-008 defines
const CURVE_SECP256K1: u64 = 0;

impl EcKey {
    pub fn key_data(&self) -> &[u8] {
        match self {
            Self::Private(key) => key,
            Self::PublicCompressed(key) => key,
            Self::PublicUncompressed(key) => key,
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self, Self::Private(_))
    }

    /// Lowercase hex of the key bytes, as it appears inside a descriptor
    pub fn to_hex(&self) -> String {
        hex::encode(self.key_data())
    }
}

impl UrType for EcKey {
    const TAG: u64 = CRYPTO_ECKEY;
    const UR_TYPE: &'static str = "crypto-eckey";
    type Decoded = Self;

    // {?1: uint, ?2: bool, 3: bytes}
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        let mut map = cursor.enter_map()?;

        let curve = optional(&mut map, eckey_keys::CURVE, |m| m.u64())?;
        if let Some(curve) = curve.filter(|curve| *curve != CURVE_SECP256K1) {
            return Err(UrError::UnhandledCase(format!("unsupported curve {curve}")));
        }

        let is_private =
            optional(&mut map, eckey_keys::IS_PRIVATE, |m| m.bool())?.unwrap_or_default();

        match_key(&mut map, eckey_keys::DATA)?;

        let key = if is_private {
            Self::Private(copy_fixed_bytes::<{ lengths::PRIVATE_KEY }>(&mut map)?)
        } else {
            let data = map.bytes()?;
            match data.len() {
                lengths::COMPRESSED_PUBKEY => Self::PublicCompressed(to_array(data)?),
                lengths::UNCOMPRESSED_PUBKEY => Self::PublicUncompressed(to_array(data)?),
                len => {
                    return Err(UrError::UnhandledCase(format!(
                        "public eckey with {len} bytes of key data"
                    )));
                }
            }
        };

        cursor.leave(map)?;
        Ok(key)
    }
}

fn to_array<const N: usize>(data: &[u8]) -> Result<[u8; N]> {
    <[u8; N]>::try_from(data)
        .map_err(|_| UrError::WrongStringLength { expected: N, actual: data.len() })
}

impl<C> Encode<C> for EcKey {
    fn encode<W: Write>(
        &self,
        e: &mut Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), EncodeError<W::Error>> {
        if self.is_private() {
            e.map(2)?.u64(eckey_keys::IS_PRIVATE)?.bool(true)?;
        } else {
            e.map(1)?;
        }

        e.u64(eckey_keys::DATA)?.bytes(self.key_data())?;
        Ok(())
    }
}
