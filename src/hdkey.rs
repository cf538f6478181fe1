//! crypto-hdkey: Hierarchical Deterministic Key (BIP32)
//! BCR-2020-007: https://github.com/BlockchainCommons/Research/blob/master/papers/bcr-2020-007-hdkey.md
//!
//! A map is either a master key (`is-master: true`, key, chain code) or a derived key with
//! optional metadata. Decoding tries the master grammar on a snapshot first and falls back
//! to the derived grammar; the outer cursor only moves once one of them succeeds.

use bitcoin::{
    NetworkKind,
    bip32::{Xpriv, Xpub},
};
use minicbor::{
    Encode, Encoder,
    data::Tag,
    encode::{Error as EncodeError, Write},
};
use tracing::{debug, trace};

use crate::{
    cbor::{
        Cursor,
        fields::{copy_fixed_bytes, match_key, match_tag, optional, truncate_utf8},
    },
    coin_info::{CoinInfo, Network},
    error::{Result, UrError},
    keypath::Keypath,
    registry::{
        CRYPTO_COIN_INFO, CRYPTO_HDKEY, CRYPTO_KEYPATH, hdkey_keys, lengths,
        limits::{NAME_MAX_LEN, NOTE_MAX_LEN},
    },
    ur::UrType,
};

/// Master key: private key data (0x00 prefixed) and chain code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterKey {
    pub key_data: [u8; lengths::HDKEY_KEY_DATA],
    pub chain_code: [u8; lengths::CHAIN_CODE],
}

/// Derived key with its optional metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedKey {
    pub is_private: bool,
    /// Compressed public key, or 0x00 followed by the private key
    pub key_data: [u8; lengths::HDKEY_KEY_DATA],
    pub chain_code: Option<[u8; lengths::CHAIN_CODE]>,
    pub use_info: Option<CoinInfo>,
    pub origin: Option<Keypath>,
    pub children: Option<Keypath>,
    /// 0 when unknown
    pub parent_fingerprint: u32,
    /// At most 32 bytes
    pub name: Option<String>,
    /// At most 128 bytes
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HdKey {
    Master(MasterKey),
    Derived(DerivedKey),
}

impl DerivedKey {
    /// Public key with its chain code, nothing else known yet
    pub fn new(key_data: [u8; lengths::HDKEY_KEY_DATA], chain_code: [u8; lengths::CHAIN_CODE]) -> Self {
        Self {
            is_private: false,
            key_data,
            chain_code: Some(chain_code),
            use_info: None,
            origin: None,
            children: None,
            parent_fingerprint: 0,
            name: None,
            note: None,
        }
    }

    /// Create from an extended public key and the path it was derived along
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the origin does not match the depth of the xpub
    pub fn from_xpub(xpub: &Xpub, origin: Keypath) -> Result<Self> {
        if origin.index_count() != usize::from(xpub.depth) {
            return Err(UrError::InvalidArgument(format!(
                "origin has {} levels, xpub is at depth {}",
                origin.index_count(),
                xpub.depth
            )));
        }

        let network = match xpub.network {
            NetworkKind::Main => Network::Mainnet,
            NetworkKind::Test => Network::Testnet,
        };

        let mut key = Self::new(xpub.public_key.serialize(), xpub.chain_code.to_bytes());
        key.use_info = Some(CoinInfo::bitcoin(network));
        key.origin = Some(origin);
        key.parent_fingerprint = u32::from_be_bytes(xpub.parent_fingerprint.to_bytes());
        Ok(key)
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(truncate_utf8(name, NAME_MAX_LEN).to_string());
        self
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(truncate_utf8(note, NOTE_MAX_LEN).to_string());
        self
    }

    fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        let mut map = cursor.enter_map()?;

        let is_private =
            optional(&mut map, hdkey_keys::IS_PRIVATE, |m| m.bool())?.unwrap_or_default();

        match_key(&mut map, hdkey_keys::KEY_DATA)?;
        let key_data = copy_fixed_bytes::<{ lengths::HDKEY_KEY_DATA }>(&mut map)?;

        let chain_code = optional(&mut map, hdkey_keys::CHAIN_CODE, |m| {
            copy_fixed_bytes::<{ lengths::CHAIN_CODE }>(m)
        })?;

        let use_info = optional(&mut map, hdkey_keys::USE_INFO, |m| {
            match_tag(m, CRYPTO_COIN_INFO)?;
            CoinInfo::decode(m)
        })?;

        let origin = optional(&mut map, hdkey_keys::ORIGIN, |m| {
            match_tag(m, CRYPTO_KEYPATH)?;
            Keypath::decode(m)
        })?;

        let children = optional(&mut map, hdkey_keys::CHILDREN, |m| {
            match_tag(m, CRYPTO_KEYPATH)?;
            Keypath::decode(m)
        })?;

        let parent_fingerprint =
            optional(&mut map, hdkey_keys::PARENT_FINGERPRINT, |m| m.u32())?.unwrap_or_default();

        let name = optional(&mut map, hdkey_keys::NAME, |m| read_text(m, "name", NAME_MAX_LEN))?;
        let note = optional(&mut map, hdkey_keys::NOTE, |m| read_text(m, "note", NOTE_MAX_LEN))?;

        cursor.leave(map)?;

        Ok(Self {
            is_private,
            key_data,
            chain_code,
            use_info,
            origin,
            children,
            parent_fingerprint,
            name,
            note,
        })
    }
}

fn read_text(cursor: &mut Cursor<'_>, field: &str, max_len: usize) -> Result<String> {
    let text = cursor.str()?;
    let kept = truncate_utf8(text, max_len);
    if kept.len() != text.len() {
        debug!(field, len = text.len(), kept = kept.len(), "truncated hdkey text field");
    }

    Ok(kept.to_string())
}

impl MasterKey {
    /// Create from a depth 0 mainnet extended private key
    pub fn from_xpriv(xpriv: &Xpriv) -> Result<Self> {
        if xpriv.depth != 0 {
            return Err(UrError::InvalidArgument(format!(
                "master key expected, xpriv is at depth {}",
                xpriv.depth
            )));
        }

        if xpriv.network != NetworkKind::Main {
            return Err(UrError::InvalidArgument("master keys are mainnet only".to_string()));
        }

        let mut key_data = [0u8; lengths::HDKEY_KEY_DATA];
        key_data[1..].copy_from_slice(&xpriv.private_key.secret_bytes());

        Ok(Self { key_data, chain_code: xpriv.chain_code.to_bytes() })
    }

    // {1: true, 3: bytes .size 33, 4: bytes .size 32}
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        let mut map = cursor.enter_map()?;

        match_key(&mut map, hdkey_keys::IS_MASTER)?;
        if !map.bool()? {
            return Err(UrError::UnhandledCase("is-master present but false".to_string()));
        }

        match_key(&mut map, hdkey_keys::KEY_DATA)?;
        let key_data = copy_fixed_bytes::<{ lengths::HDKEY_KEY_DATA }>(&mut map)?;

        match_key(&mut map, hdkey_keys::CHAIN_CODE)?;
        let chain_code = copy_fixed_bytes::<{ lengths::CHAIN_CODE }>(&mut map)?;

        cursor.leave(map)?;
        Ok(Self { key_data, chain_code })
    }
}

impl HdKey {
    pub fn is_master(&self) -> bool {
        matches!(self, Self::Master(_))
    }

    pub fn is_private(&self) -> bool {
        match self {
            Self::Master(_) => true,
            Self::Derived(key) => key.is_private,
        }
    }

    pub fn key_data(&self) -> &[u8; lengths::HDKEY_KEY_DATA] {
        match self {
            Self::Master(key) => &key.key_data,
            Self::Derived(key) => &key.key_data,
        }
    }

    pub fn chain_code(&self) -> Option<&[u8; lengths::CHAIN_CODE]> {
        match self {
            Self::Master(key) => Some(&key.chain_code),
            Self::Derived(key) => key.chain_code.as_ref(),
        }
    }

    pub fn origin(&self) -> Option<&Keypath> {
        match self {
            Self::Master(_) => None,
            Self::Derived(key) => key.origin.as_ref(),
        }
    }

    pub fn children(&self) -> Option<&Keypath> {
        match self {
            Self::Master(_) => None,
            Self::Derived(key) => key.children.as_ref(),
        }
    }

    pub fn parent_fingerprint(&self) -> u32 {
        match self {
            Self::Master(_) => 0,
            Self::Derived(key) => key.parent_fingerprint,
        }
    }

    /// Network from the coin info, mainnet when absent
    pub fn network(&self) -> Network {
        match self {
            Self::Master(_) => Network::Mainnet,
            Self::Derived(key) => key.use_info.map(|info| info.network).unwrap_or_default(),
        }
    }
}

impl UrType for HdKey {
    const TAG: u64 = CRYPTO_HDKEY;
    const UR_TYPE: &'static str = "crypto-hdkey";
    type Decoded = Self;

    fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        match cursor.attempt(MasterKey::decode) {
            Ok(master) => return Ok(Self::Master(master)),
            Err(error) => trace!(%error, "not a master key, trying derived"),
        }

        let derived = cursor.attempt(DerivedKey::decode)?;
        Ok(Self::Derived(derived))
    }
}

impl<C> Encode<C> for HdKey {
    fn encode<W: Write>(
        &self,
        e: &mut Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), EncodeError<W::Error>> {
        let key = match self {
            Self::Master(master) => {
                e.map(3)?;
                e.u64(hdkey_keys::IS_MASTER)?.bool(true)?;
                e.u64(hdkey_keys::KEY_DATA)?.bytes(&master.key_data)?;
                e.u64(hdkey_keys::CHAIN_CODE)?.bytes(&master.chain_code)?;
                return Ok(());
            }
            Self::Derived(key) => key,
        };

        let len = 1
            + u64::from(key.is_private)
            + u64::from(key.chain_code.is_some())
            + u64::from(key.use_info.is_some())
            + u64::from(key.origin.is_some())
            + u64::from(key.children.is_some())
            + u64::from(key.parent_fingerprint != 0)
            + u64::from(key.name.is_some())
            + u64::from(key.note.is_some());

        e.map(len)?;

        if key.is_private {
            e.u64(hdkey_keys::IS_PRIVATE)?.bool(true)?;
        }

        e.u64(hdkey_keys::KEY_DATA)?.bytes(&key.key_data)?;

        if let Some(chain_code) = &key.chain_code {
            e.u64(hdkey_keys::CHAIN_CODE)?.bytes(chain_code)?;
        }

        if let Some(use_info) = &key.use_info {
            e.u64(hdkey_keys::USE_INFO)?.tag(Tag::new(CRYPTO_COIN_INFO))?;
            use_info.encode(e, ctx)?;
        }

        if let Some(origin) = &key.origin {
            e.u64(hdkey_keys::ORIGIN)?.tag(Tag::new(CRYPTO_KEYPATH))?;
            origin.encode(e, ctx)?;
        }

        if let Some(children) = &key.children {
            e.u64(hdkey_keys::CHILDREN)?.tag(Tag::new(CRYPTO_KEYPATH))?;
            children.encode(e, ctx)?;
        }

        if key.parent_fingerprint != 0 {
            e.u64(hdkey_keys::PARENT_FINGERPRINT)?.u32(key.parent_fingerprint)?;
        }

        if let Some(name) = &key.name {
            e.u64(hdkey_keys::NAME)?.str(name)?;
        }

        if let Some(note) = &key.note {
            e.u64(hdkey_keys::NOTE)?.str(note)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::keypath::{ChildIndex, PathComponent};

    const MASTER_CBOR: &str = "a301f503582100e8f32e723decf4051aefac8e2c93c9c5b214313817cdb01a1494b917c8436b35045820873dff81c02f525623fd1fe5167eac3a55a049de3d314bb42ee227ffed37d508";
    const DERIVED_CBOR: &str = "a5035821026fe2355745bb2db3630bbc80ef5d58951c963c841f54170ba6e5c12be7fc12a6045820ced155c72456255881793514edc5bd9447e7f74abb88c6d6b6480fd016ee8c8505d90131a1020106d90130a1018a182cf501f501f500f401f4081ae9181cf3";

    #[test]
    fn test_crypto_hdkey_master() {
        let key = HdKey::from_cbor(&hex::decode(MASTER_CBOR).unwrap()).unwrap();

        let HdKey::Master(master) = &key else { panic!("expected a master key") };
        assert_eq!(master.key_data[0], 0x00);
        assert_eq!(
            hex::encode(master.chain_code),
            "873dff81c02f525623fd1fe5167eac3a55a049de3d314bb42ee227ffed37d508"
        );
        assert!(key.is_private());
        assert_eq!(key.network(), Network::Mainnet);
        assert_eq!(hex::encode(key.to_cbor().unwrap()), MASTER_CBOR);
    }

    #[test]
    fn test_crypto_hdkey_derived() {
        let key = HdKey::from_cbor(&hex::decode(DERIVED_CBOR).unwrap()).unwrap();

        let HdKey::Derived(derived) = &key else { panic!("expected a derived key") };
        assert!(!derived.is_private);
        assert_eq!(derived.key_data[0], 0x02);
        assert_eq!(derived.parent_fingerprint, 3910671603);
        assert_eq!(derived.use_info, Some(CoinInfo::bitcoin(Network::Testnet)));
        assert!(derived.children.is_none());

        let origin = derived.origin.as_ref().unwrap();
        assert_eq!(origin.components.len(), 5);
        assert_eq!(origin.source_fingerprint, 0);
        assert_eq!(origin.components[4], PathComponent::Index(ChildIndex::normal(1).unwrap()));

        assert_eq!(key.network(), Network::Testnet);
        assert_eq!(hex::encode(key.to_cbor().unwrap()), DERIVED_CBOR);
    }

    #[test]
    fn test_crypto_hdkey_name_and_note_truncated() {
        let mut cbor = Vec::new();
        let mut encoder = Encoder::new(&mut cbor);
        encoder.map(3).unwrap();
        encoder.u8(3).unwrap().bytes(&[0x02; 33]).unwrap();
        encoder.u8(9).unwrap().str(&"n".repeat(40)).unwrap();
        encoder.u8(10).unwrap().str(&"é".repeat(100)).unwrap();

        let HdKey::Derived(key) = HdKey::from_cbor(&cbor).unwrap() else {
            panic!("expected a derived key")
        };

        assert_eq!(key.name.as_deref(), Some("n".repeat(32).as_str()));
        let note = key.note.unwrap();
        assert_eq!(note.len(), 128);
        assert_eq!(note, "é".repeat(64));
        assert!(key.chain_code.is_none());
    }

    #[test]
    fn test_crypto_hdkey_builders_truncate() {
        let key = DerivedKey::new([0x03; 33], [0x01; 32]).with_name(&"x".repeat(50)).with_note("hi");
        assert_eq!(key.name.as_ref().map(String::len), Some(32));
        assert_eq!(key.note.as_deref(), Some("hi"));

        let hdkey = HdKey::Derived(key);
        let decoded = HdKey::from_cbor(&hdkey.to_cbor().unwrap()).unwrap();
        assert_eq!(decoded, hdkey);
    }

    /// Test malformed CBOR: missing required key data
    #[test]
    fn test_crypto_hdkey_missing_key_data() {
        let mut cbor = Vec::new();
        let mut encoder = Encoder::new(&mut cbor);
        encoder.map(1).unwrap().u8(4).unwrap().bytes(&[0u8; 32]).unwrap();

        let err = HdKey::from_cbor(&cbor).unwrap_err();
        assert_eq!(err, UrError::WrongMapKey { expected: 3, actual: 4 });
    }

    /// Test malformed CBOR: 32 byte key data
    #[test]
    fn test_crypto_hdkey_invalid_key_data_length() {
        let mut cbor = Vec::new();
        let mut encoder = Encoder::new(&mut cbor);
        encoder.map(1).unwrap().u8(3).unwrap().bytes(&[0u8; 32]).unwrap();

        let err = HdKey::from_cbor(&cbor).unwrap_err();
        assert_eq!(err, UrError::WrongStringLength { expected: 33, actual: 32 });
    }

    /// Test malformed CBOR: a master key without its chain code is not a derived key either
    #[test]
    fn test_crypto_hdkey_master_without_chain_code() {
        let mut cbor = Vec::new();
        let mut encoder = Encoder::new(&mut cbor);
        encoder.map(2).unwrap();
        encoder.u8(1).unwrap().bool(true).unwrap();
        encoder.u8(3).unwrap().bytes(&[0u8; 33]).unwrap();

        // the derived error is reported
        let err = HdKey::from_cbor(&cbor).unwrap_err();
        assert_eq!(err, UrError::WrongMapKey { expected: 3, actual: 1 });
    }

    /// Test malformed CBOR: keys the grammar does not know
    #[test]
    fn test_crypto_hdkey_unknown_key() {
        let mut cbor = Vec::new();
        let mut encoder = Encoder::new(&mut cbor);
        encoder.map(2).unwrap();
        encoder.u8(3).unwrap().bytes(&[0x02; 33]).unwrap();
        encoder.u8(11).unwrap().u8(0).unwrap();

        assert!(matches!(HdKey::from_cbor(&cbor), Err(UrError::UnknownFormat(_))));
    }

    /// Test malformed CBOR: origin without its keypath tag
    #[test]
    fn test_crypto_hdkey_untagged_origin() {
        let mut cbor = Vec::new();
        let mut encoder = Encoder::new(&mut cbor);
        encoder.map(2).unwrap();
        encoder.u8(3).unwrap().bytes(&[0x02; 33]).unwrap();
        encoder.u8(6).unwrap().map(1).unwrap().u8(2).unwrap().u32(1).unwrap();

        assert!(matches!(HdKey::from_cbor(&cbor), Err(UrError::WrongType(_))));
    }

    #[test]
    fn test_crypto_hdkey_from_xpriv() {
        use std::str::FromStr as _;

        let xpriv = Xpriv::from_str("xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi").unwrap();
        let master = MasterKey::from_xpriv(&xpriv).unwrap();

        let expected = HdKey::from_cbor(&hex::decode(MASTER_CBOR).unwrap()).unwrap();
        assert_eq!(HdKey::Master(master), expected);
    }
}
