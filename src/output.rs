//! crypto-output: output descriptors (BCR-2020-010)
//! See: https://github.com/BlockchainCommons/Research/blob/master/papers/bcr-2020-010-output-desc.md
//!
//! Only single-key expressions are handled, optionally wrapped in `sh`, `wsh` or
//! `sh(wsh(...))`, plus 32 byte raw scripts. Multisig, combo and taproot are rejected.

use derive_more::From;
use minicbor::{
    Encode, Encoder,
    data::Tag,
    encode::{Error as EncodeError, Write},
};
use strum::{Display, EnumIter, IntoEnumIterator as _};
use tracing::debug;

use crate::{
    cbor::{
        Cursor,
        fields::{copy_fixed_bytes, is_tag},
    },
    eckey::EcKey,
    error::{Result, UrError},
    format::FormatMode,
    hdkey::HdKey,
    registry::{
        COSIGNER, CRYPTO_ECKEY, CRYPTO_HDKEY, CRYPTO_OUTPUT, PAY_TO_PUBKEY, PAY_TO_PUBKEY_HASH,
        RAW_SCRIPT, SCRIPT_HASH, TAPROOT, WITNESS_PUBKEY_HASH, WITNESS_SCRIPT_HASH, lengths,
    },
    ur::UrType,
};

/// Script function applied directly to the key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum KeyExpressionKind {
    Pk,
    Pkh,
    Wpkh,
    Cosigner,
}

impl KeyExpressionKind {
    pub fn tag(self) -> u64 {
        match self {
            Self::Pk => PAY_TO_PUBKEY,
            Self::Pkh => PAY_TO_PUBKEY_HASH,
            Self::Wpkh => WITNESS_PUBKEY_HASH,
            Self::Cosigner => COSIGNER,
        }
    }

    pub fn from_tag(tag: u64) -> Option<Self> {
        Self::iter().find(|kind| kind.tag() == tag)
    }
}

/// Key inside a key expression
#[derive(Debug, Clone, PartialEq, Eq, From)]
pub enum KeyMaterial {
    EcKey(EcKey),
    HdKey(HdKey),
}

/// `kind(key)`, e.g. `wpkh([37b5eed4/84'/0'/0']xpub...)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyExpression {
    pub kind: KeyExpressionKind,
    pub key: KeyMaterial,
}

impl KeyExpression {
    pub fn new(kind: KeyExpressionKind, key: impl Into<KeyMaterial>) -> Self {
        Self { kind, key: key.into() }
    }

    fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        let tag = cursor.tag()?;
        let kind = KeyExpressionKind::from_tag(tag)
            .ok_or_else(|| UrError::UnhandledCase(format!("script expression tag {tag}")))?;

        let key = match cursor.tag()? {
            CRYPTO_ECKEY => KeyMaterial::EcKey(EcKey::decode(cursor)?),
            CRYPTO_HDKEY => KeyMaterial::HdKey(HdKey::decode(cursor)?),
            other => return Err(UrError::WrongTag(other)),
        };

        Ok(Self { kind, key })
    }

    fn encode<W: Write>(&self, e: &mut Encoder<W>) -> Result<(), EncodeError<W::Error>> {
        e.tag(Tag::new(self.kind.tag()))?;

        match &self.key {
            KeyMaterial::EcKey(key) => e.tag(Tag::new(CRYPTO_ECKEY))?.encode(key)?,
            KeyMaterial::HdKey(key) => e.tag(Tag::new(CRYPTO_HDKEY))?.encode(key)?,
        };

        Ok(())
    }

    fn render(&self, mode: FormatMode) -> Result<String> {
        let payload = match &self.key {
            KeyMaterial::EcKey(key) => key.to_hex(),
            KeyMaterial::HdKey(key) => render_hdkey(key, mode)?,
        };

        Ok(format!("{}({payload})", self.kind))
    }
}

fn render_hdkey(key: &HdKey, mode: FormatMode) -> Result<String> {
    let mut path = key.derivation_path()?;

    let account_level = key.origin().is_some_and(|origin| origin.is_account_level());

    if mode == FormatMode::Bip44Compatible && account_level && key.children().is_none() {
        path.push_str("/0/*");
    }

    Ok(format!("{}{}{path}", key.key_origin()?, key.to_base58()?))
}

/// crypto-output: a key expression in its script wrapper, or a raw script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Bare(KeyExpression),
    Sh(KeyExpression),
    Wsh(KeyExpression),
    ShWsh(KeyExpression),
    RawScript([u8; lengths::RAW_SCRIPT]),
}

impl Output {
    pub fn key_expression(&self) -> Option<&KeyExpression> {
        match self {
            Self::Bare(key) | Self::Sh(key) | Self::Wsh(key) | Self::ShWsh(key) => Some(key),
            Self::RawScript(_) => None,
        }
    }

    /// Descriptor string, e.g. `sh(wpkh(03...))`
    pub fn descriptor(&self, mode: FormatMode) -> Result<String> {
        let descriptor = match self {
            Self::Bare(key) => key.render(mode)?,
            Self::Sh(key) => format!("sh({})", key.render(mode)?),
            Self::Wsh(key) => format!("wsh({})", key.render(mode)?),
            Self::ShWsh(key) => format!("sh(wsh({}))", key.render(mode)?),
            Self::RawScript(script) => format!("raw({})", hex::encode(script)),
        };

        Ok(descriptor)
    }
}

impl UrType for Output {
    const TAG: u64 = CRYPTO_OUTPUT;
    const UR_TYPE: &'static str = "crypto-output";
    type Decoded = Self;

    /// On `TaprootUnsupported` the cursor is left on the taproot tag
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        let tag = cursor
            .peek_tag()
            .ok_or_else(|| UrError::WrongType("output must start with a tag".to_string()))?;

        let output = match tag {
            SCRIPT_HASH => {
                cursor.tag()?;
                if is_tag(cursor, WITNESS_SCRIPT_HASH) {
                    cursor.tag()?;
                    Self::ShWsh(KeyExpression::decode(cursor)?)
                } else {
                    Self::Sh(KeyExpression::decode(cursor)?)
                }
            }
            WITNESS_SCRIPT_HASH => {
                cursor.tag()?;
                Self::Wsh(KeyExpression::decode(cursor)?)
            }
            RAW_SCRIPT => {
                cursor.tag()?;
                Self::RawScript(copy_fixed_bytes::<{ lengths::RAW_SCRIPT }>(cursor)?)
            }
            TAPROOT => {
                debug!("taproot output descriptor");
                return Err(UrError::TaprootUnsupported);
            }
            _ => Self::Bare(KeyExpression::decode(cursor)?),
        };

        Ok(output)
    }
}

impl<C> Encode<C> for Output {
    fn encode<W: Write>(
        &self,
        e: &mut Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), EncodeError<W::Error>> {
        match self {
            Self::Bare(key) => key.encode(e)?,
            Self::Sh(key) => {
                e.tag(Tag::new(SCRIPT_HASH))?;
                key.encode(e)?;
            }
            Self::Wsh(key) => {
                e.tag(Tag::new(WITNESS_SCRIPT_HASH))?;
                key.encode(e)?;
            }
            Self::ShWsh(key) => {
                e.tag(Tag::new(SCRIPT_HASH))?.tag(Tag::new(WITNESS_SCRIPT_HASH))?;
                key.encode(e)?;
            }
            Self::RawScript(script) => {
                e.tag(Tag::new(RAW_SCRIPT))?.bytes(script)?;
            }
        }

        Ok(())
    }
}
