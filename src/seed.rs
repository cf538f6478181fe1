use bip39::Mnemonic;
use minicbor::{
    Encode, Encoder,
    data::Tag,
    encode::{Error as EncodeError, Write},
};

use crate::{
    cbor::{
        Cursor,
        fields::{copy_fixed_bytes, match_key, match_tag},
    },
    error::{Result, UrError},
    registry::{CRYPTO_SEED, DATE, lengths, seed_keys},
    ur::UrType,
};

/// crypto-seed: 16 bytes of BIP39 entropy with an optional creation date
/// BCR-2020-006: https://github.com/BlockchainCommons/Research/blob/master/papers/bcr-2020-006-urtypes.md
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seed {
    /// Seed entropy (128 bits, a 12 word mnemonic)
    pub seed: [u8; lengths::SEED],
    /// Creation date in days since the unix epoch
    pub creation_date: Option<u64>,
}

impl Seed {
    pub fn new(seed: [u8; lengths::SEED]) -> Self {
        Self { seed, creation_date: None }
    }

    /// Create from a 12 word BIP39 mnemonic
    pub fn from_mnemonic(mnemonic: &Mnemonic) -> Result<Self> {
        let entropy = mnemonic.to_entropy();
        let seed = <[u8; lengths::SEED]>::try_from(entropy.as_slice()).map_err(|_| {
            UrError::InvalidArgument(format!("expected 16 bytes of entropy, got {}", entropy.len()))
        })?;

        Ok(Self::new(seed))
    }

    /// The seed entropy as a BIP39 mnemonic
    pub fn to_mnemonic(&self) -> Result<Mnemonic> {
        Mnemonic::from_entropy(&self.seed)
            .map_err(|e| UrError::InvalidArgument(format!("invalid BIP39 entropy: {e}")))
    }
}

impl UrType for Seed {
    const TAG: u64 = CRYPTO_SEED;
    const UR_TYPE: &'static str = "crypto-seed";
    type Decoded = Self;

    // {1: bytes .size 16, ?2: #6.100(uint)}
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        let mut map = cursor.enter_map()?;

        match_key(&mut map, seed_keys::PAYLOAD)?;
        let seed = copy_fixed_bytes::<{ lengths::SEED }>(&mut map)?;

        // the date is the only other field we accept, anything else fails the leave
        let creation_date = if map.at_end() {
            None
        } else {
            match_key(&mut map, seed_keys::CREATION_DATE)?;
            match_tag(&mut map, DATE)?;
            Some(map.u64()?)
        };

        cursor.leave(map)?;
        Ok(Self { seed, creation_date })
    }
}

impl<C> Encode<C> for Seed {
    fn encode<W: Write>(
        &self,
        e: &mut Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), EncodeError<W::Error>> {
        let len = 1 + u64::from(self.creation_date.is_some());
        e.map(len)?;
        e.u64(seed_keys::PAYLOAD)?.bytes(&self.seed)?;

        if let Some(date) = self.creation_date {
            e.u64(seed_keys::CREATION_DATE)?.tag(Tag::new(DATE))?.u64(date)?;
        }

        Ok(())
    }
}
