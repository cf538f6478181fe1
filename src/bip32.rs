//! BIP32 serialization of crypto-hdkey and the key origin / derivation path strings used
//! by output descriptors.
//!
//! Layout of the 78 byte extended key:
//! `version(4) | depth(1) | parent fingerprint(4) | child number(4) | chain code(32) | key(33)`

use bitcoin::base58;

use crate::{
    coin_info::Network,
    error::{Result, UrError},
    hdkey::HdKey,
    keypath::PathComponent,
    registry::lengths,
};

/// BIP32 version bytes
pub mod version {
    pub const MAINNET_PRIVATE: u32 = 0x0488_ADE4;
    pub const MAINNET_PUBLIC: u32 = 0x0488_B21E;
    pub const TESTNET_PRIVATE: u32 = 0x0435_8394;
    pub const TESTNET_PUBLIC: u32 = 0x0435_87CF;
}

/// Child number BIP32 readers expect for a key whose children end in a wildcard
const WILDCARD_CHILD_NUMBER: u32 = 0xFFFF_FFFE;

impl HdKey {
    pub fn bip32_version(&self) -> u32 {
        match (self.is_master(), self.network(), self.is_private()) {
            (true, _, _) => version::MAINNET_PRIVATE,
            (false, Network::Mainnet, true) => version::MAINNET_PRIVATE,
            (false, Network::Mainnet, false) => version::MAINNET_PUBLIC,
            (false, Network::Testnet, true) => version::TESTNET_PRIVATE,
            (false, Network::Testnet, false) => version::TESTNET_PUBLIC,
        }
    }

    /// Origin levels plus every plain index in the children path
    pub fn depth(&self) -> Result<u8> {
        let origin = self.origin().map(|origin| origin.components.len()).unwrap_or_default();
        let children = self.children().map(|children| children.index_count()).unwrap_or_default();

        u8::try_from(origin + children)
            .map_err(|_| UrError::UnhandledCase(format!("depth {} too large", origin + children)))
    }

    /// Last origin step as a BIP32 child number, or the wildcard marker when the children
    /// path ends in `*`
    ///
    /// # Errors
    ///
    /// Returns `UnhandledCase` when the origin does not end in a plain index, or when the
    /// children path ends in anything but a wildcard
    pub fn child_number(&self) -> Result<u32> {
        let origin_child = match self.origin().and_then(|origin| origin.components.last()) {
            None => 0,
            Some(last) => {
                let index = last.as_index().ok_or_else(|| {
                    UrError::UnhandledCase("last origin step is not a plain index".to_string())
                })?;
                u32::from(index.to_child_number()?)
            }
        };

        match self.children().and_then(|children| children.components.last()) {
            None => Ok(origin_child),
            Some(PathComponent::Wildcard { .. }) => Ok(WILDCARD_CHILD_NUMBER),
            Some(_) => Err(UrError::UnhandledCase(
                "children path must end in a wildcard".to_string(),
            )),
        }
    }

    /// The 78 byte BIP32 serialization
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a derived key without a chain code, and
    /// `UnhandledCase` when the origin does not end in a plain index
    pub fn to_bip32_bytes(&self) -> Result<[u8; lengths::BIP32_SERIALIZED]> {
        let chain_code = self
            .chain_code()
            .ok_or_else(|| UrError::InvalidArgument("hdkey has no chain code".to_string()))?;

        let mut out = [0u8; lengths::BIP32_SERIALIZED];
        out[0..4].copy_from_slice(&self.bip32_version().to_be_bytes());
        out[4] = self.depth()?;
        out[5..9].copy_from_slice(&self.parent_fingerprint().to_be_bytes());
        out[9..13].copy_from_slice(&self.child_number()?.to_be_bytes());
        out[13..45].copy_from_slice(chain_code);
        out[45..78].copy_from_slice(self.key_data());

        Ok(out)
    }

    /// Base58check `xpub`/`xprv`/`tpub`/`tprv` string
    pub fn to_base58(&self) -> Result<String> {
        Ok(base58::encode_check(&self.to_bip32_bytes()?))
    }

    /// `[fingerprint/path]` prefix of a descriptor key, `[00000000]` for a master key
    ///
    /// The origin's source fingerprint is used when set, otherwise the parent fingerprint.
    pub fn key_origin(&self) -> Result<String> {
        let Some(origin) = self.origin() else {
            return Ok(format!("[{:08x}]", self.parent_fingerprint()));
        };

        let fingerprint = match origin.source_fingerprint {
            0 => self.parent_fingerprint(),
            fingerprint => fingerprint,
        };

        Ok(format!("[{fingerprint:08x}{}]", origin.render()?))
    }

    /// Children path of a descriptor key, e.g. `/1/*`, empty when there is none
    pub fn derivation_path(&self) -> Result<String> {
        match self.children() {
            Some(children) => children.render(),
            None => Ok(String::new()),
        }
    }
}
