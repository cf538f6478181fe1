use derive_more::Display;
use minicbor::{
    Encode, Encoder,
    encode::{Error as EncodeError, Write},
};

use crate::{
    cbor::{Cursor, fields::optional},
    error::{Result, UrError},
    registry::{COIN_TYPE_BTC, CRYPTO_COIN_INFO, coin_info_keys},
    ur::UrType,
};

/// Network a key is meant for, decides the BIP32 version bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display)]
pub enum Network {
    #[default]
    #[display("mainnet")]
    Mainnet,
    #[display("testnet")]
    Testnet,
}

impl Network {
    fn from_u64(value: u64) -> Result<Self> {
        match value {
            0 => Ok(Self::Mainnet),
            1 => Ok(Self::Testnet),
            other => Err(UrError::UnhandledCase(format!("unknown network {other}"))),
        }
    }

    fn as_u64(self) -> u64 {
        match self {
            Self::Mainnet => 0,
            Self::Testnet => 1,
        }
    }
}

impl From<Network> for bitcoin::NetworkKind {
    fn from(network: Network) -> Self {
        match network {
            Network::Mainnet => Self::Main,
            Network::Testnet => Self::Test,
        }
    }
}

/// crypto-coin-info: coin type and network
/// BCR-2020-007: https://github.com/BlockchainCommons/Research/blob/master/papers/bcr-2020-007-hdkey.md
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CoinInfo {
    /// SLIP-44 coin type, 0 for bitcoin
    pub coin_type: u32,
    pub network: Network,
}

impl CoinInfo {
    pub fn new(coin_type: u32, network: Network) -> Self {
        Self { coin_type, network }
    }

    pub fn bitcoin(network: Network) -> Self {
        Self::new(COIN_TYPE_BTC, network)
    }
}

impl UrType for CoinInfo {
    const TAG: u64 = CRYPTO_COIN_INFO;
    const UR_TYPE: &'static str = "crypto-coin-info";
    type Decoded = Self;

    // {?1: uint, ?2: int}
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        let mut map = cursor.enter_map()?;

        let coin_type =
            optional(&mut map, coin_info_keys::COIN_TYPE, |m| m.u32())?.unwrap_or(COIN_TYPE_BTC);

        let network = optional(&mut map, coin_info_keys::NETWORK, |m| m.u64())?
            .map(Network::from_u64)
            .transpose()?
            .unwrap_or_default();

        cursor.leave(map)?;
        Ok(Self { coin_type, network })
    }
}

impl<C> Encode<C> for CoinInfo {
    fn encode<W: Write>(
        &self,
        e: &mut Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), EncodeError<W::Error>> {
        // defaults are left out
        let has_coin_type = self.coin_type != COIN_TYPE_BTC;
        let has_network = self.network != Network::Mainnet;

        e.map(u64::from(has_coin_type) + u64::from(has_network))?;

        if has_coin_type {
            e.u64(coin_info_keys::COIN_TYPE)?.u32(self.coin_type)?;
        }

        if has_network {
            e.u64(coin_info_keys::NETWORK)?.u64(self.network.as_u64())?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crypto_coin_info_testnet() {
        // {2: 1}
        let info = CoinInfo::from_cbor(&hex::decode("a10201").unwrap()).unwrap();

        assert_eq!(info, CoinInfo::bitcoin(Network::Testnet));
        assert_eq!(info.network.to_string(), "testnet");
        assert_eq!(hex::encode(info.to_cbor().unwrap()), "a10201");
    }

    #[test]
    fn test_crypto_coin_info_defaults() {
        let info = CoinInfo::from_cbor(&hex::decode("a0").unwrap()).unwrap();
        assert_eq!(info, CoinInfo::default());
        assert_eq!(info.network, Network::Mainnet);
        assert_eq!(info.to_cbor().unwrap(), vec![0xa0]);
    }

    #[test]
    fn test_crypto_coin_info_coin_type() {
        // {1: 60, 2: 0}
        let info = CoinInfo::from_cbor(&hex::decode("a201183c0200").unwrap()).unwrap();
        assert_eq!(info.coin_type, 60);
        assert_eq!(info.network, Network::Mainnet);
    }

    /// Test malformed CBOR: network outside mainnet/testnet
    #[test]
    fn test_crypto_coin_info_unknown_network() {
        let err = CoinInfo::from_cbor(&hex::decode("a10205").unwrap()).unwrap_err();
        assert!(matches!(err, UrError::UnhandledCase(_)));
    }

    /// Test malformed CBOR: keys out of the grammar
    #[test]
    fn test_crypto_coin_info_unknown_key() {
        let err = CoinInfo::from_cbor(&hex::decode("a10300").unwrap()).unwrap_err();
        assert!(matches!(err, UrError::UnknownFormat(_)));
    }

    #[test]
    fn test_network_kind() {
        assert_eq!(bitcoin::NetworkKind::from(Network::Testnet), bitcoin::NetworkKind::Test);
    }
}
