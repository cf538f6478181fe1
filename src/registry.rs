//! CBOR tag assignments from BCR-2020-006
//! See: https://github.com/BlockchainCommons/Research/blob/master/papers/bcr-2020-006-urtypes.md

/// crypto-seed tag (BCR-2020-006)
pub const CRYPTO_SEED: u64 = 300;

/// crypto-hdkey tag (BCR-2020-007)
pub const CRYPTO_HDKEY: u64 = 303;

/// crypto-keypath tag (BCR-2020-007)
pub const CRYPTO_KEYPATH: u64 = 304;

/// crypto-coin-info tag (BCR-2020-007)
pub const CRYPTO_COIN_INFO: u64 = 305;

/// crypto-eckey tag (BCR-2020-008)
pub const CRYPTO_ECKEY: u64 = 306;

/// crypto-output tag (BCR-2020-010)
pub const CRYPTO_OUTPUT: u64 = 308;

/// crypto-psbt tag (BCR-2020-006)
pub const CRYPTO_PSBT: u64 = 310;

/// crypto-account tag (BCR-2020-015)
pub const CRYPTO_ACCOUNT: u64 = 311;

/// RFC 8943 days-since-epoch date, used by the seed creation date
pub const DATE: u64 = 100;

// Script expression tags (BCR-2020-010)
/// script-hash (sh) - P2SH wrapper
pub const SCRIPT_HASH: u64 = 400;

/// witness-script-hash (wsh) - P2WSH
pub const WITNESS_SCRIPT_HASH: u64 = 401;

/// pay-to-pubkey (pk)
pub const PAY_TO_PUBKEY: u64 = 402;

/// pay-to-pubkey-hash (pkh) - P2PKH (BIP44)
pub const PAY_TO_PUBKEY_HASH: u64 = 403;

/// witness-pubkey-hash (wpkh) - P2WPKH (BIP84)
pub const WITNESS_PUBKEY_HASH: u64 = 404;

/// combo, recognized by the registry but not decoded
pub const COMBO: u64 = 405;

/// multisig, recognized by the registry but not decoded
pub const MULTISIG: u64 = 406;

/// raw script
pub const RAW_SCRIPT: u64 = 408;

/// taproot (tr) - P2TR (BIP86), rejected on purpose
pub const TAPROOT: u64 = 409;

/// cosigner key expression
pub const COSIGNER: u64 = 410;

// =============================================================================
// CBOR Map Keys
// =============================================================================

/// CBOR map keys for crypto-hdkey (BCR-2020-007)
pub mod hdkey_keys {
    pub const IS_MASTER: u64 = 1;
    pub const IS_PRIVATE: u64 = 2;
    pub const KEY_DATA: u64 = 3;
    pub const CHAIN_CODE: u64 = 4;
    pub const USE_INFO: u64 = 5;
    pub const ORIGIN: u64 = 6;
    pub const CHILDREN: u64 = 7;
    pub const PARENT_FINGERPRINT: u64 = 8;
    pub const NAME: u64 = 9;
    pub const NOTE: u64 = 10;
}

/// CBOR map keys for crypto-seed (BCR-2020-006)
pub mod seed_keys {
    pub const PAYLOAD: u64 = 1;
    pub const CREATION_DATE: u64 = 2;
}

/// CBOR map keys for crypto-eckey (BCR-2020-008)
pub mod eckey_keys {
    pub const CURVE: u64 = 1;
    pub const IS_PRIVATE: u64 = 2;
    pub const DATA: u64 = 3;
}

/// CBOR map keys for crypto-keypath (BCR-2020-007)
pub mod keypath_keys {
    pub const COMPONENTS: u64 = 1;
    pub const SOURCE_FINGERPRINT: u64 = 2;
    pub const DEPTH: u64 = 3;
}

/// CBOR map keys for crypto-coin-info (BCR-2020-007)
pub mod coin_info_keys {
    pub const COIN_TYPE: u64 = 1;
    pub const NETWORK: u64 = 2;
}

/// CBOR map keys for crypto-account (BCR-2020-015)
pub mod account_keys {
    pub const MASTER_FINGERPRINT: u64 = 1;
    pub const OUTPUT_DESCRIPTORS: u64 = 2;
}

// =============================================================================
// Data Lengths
// =============================================================================

/// Common byte lengths for cryptographic data
pub mod lengths {
    /// Seed entropy (16 bytes)
    pub const SEED: usize = 16;
    /// Private key (32 bytes)
    pub const PRIVATE_KEY: usize = 32;
    /// Compressed public key (33 bytes)
    pub const COMPRESSED_PUBKEY: usize = 33;
    /// SEC1 uncompressed public key, including the 0x04 prefix (65 bytes)
    pub const UNCOMPRESSED_PUBKEY: usize = 65;
    /// HD key data: compressed public key or 0x00-prefixed private key (33 bytes)
    pub const HDKEY_KEY_DATA: usize = 33;
    /// Chain code (32 bytes)
    pub const CHAIN_CODE: usize = 32;
    /// Raw script payload (32 bytes)
    pub const RAW_SCRIPT: usize = 32;
    /// BIP32 serialized extended key (78 bytes)
    pub const BIP32_SERIALIZED: usize = 78;
}

// =============================================================================
// Capacities
// =============================================================================

/// Upper bounds that keep adversarial input from driving unbounded work
pub mod limits {
    /// Maximum number of components in a keypath
    pub const KEYPATH_MAX_COMPONENTS: usize = 8;
    /// Maximum number of output descriptors in an account
    pub const DESCRIPTORS_MAX_SIZE: usize = 16;
    /// Maximum number of bytes kept from an hdkey name
    pub const NAME_MAX_LEN: usize = 32;
    /// Maximum number of bytes kept from an hdkey note
    pub const NOTE_MAX_LEN: usize = 128;
    /// Maximum number of indexes a range component may expand to when rendered
    pub const RANGE_MAX_RENDERED: u32 = 32;
    /// Maximum CBOR nesting accepted by the validator
    pub const MAX_NESTING_DEPTH: usize = 64;
}

/// SLIP-44 coin type for bitcoin
pub const COIN_TYPE_BTC: u32 = 0;
