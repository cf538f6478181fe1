use std::fmt::Write as _;

use bitcoin::bip32::ChildNumber;
use minicbor::{
    Encode, Encoder,
    encode::{Error as EncodeError, Write},
};

use crate::{
    cbor::{
        Cursor,
        fields::{match_key, optional},
    },
    error::{Result, UrError},
    registry::{
        CRYPTO_KEYPATH, keypath_keys,
        limits::{KEYPATH_MAX_COMPONENTS, RANGE_MAX_RENDERED},
    },
    ur::UrType,
};

/// Largest index that still leaves room for the hardened bit
const MAX_CHILD_INDEX: u32 = 0x7FFF_FFFF;

/// One `index, hardened` pair of a derivation path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildIndex {
    pub index: u32,
    pub hardened: bool,
}

impl ChildIndex {
    pub fn new(index: u32, hardened: bool) -> Result<Self> {
        if index > MAX_CHILD_INDEX {
            return Err(UrError::UnhandledCase(format!("child index {index} out of range")));
        }

        Ok(Self { index, hardened })
    }

    pub fn normal(index: u32) -> Result<Self> {
        Self::new(index, false)
    }

    pub fn hardened(index: u32) -> Result<Self> {
        Self::new(index, true)
    }

    /// BIP32 child number, with bit 31 set for hardened derivation
    pub fn to_child_number(self) -> Result<ChildNumber> {
        let child = if self.hardened {
            ChildNumber::from_hardened_idx(self.index)
        } else {
            ChildNumber::from_normal_idx(self.index)
        };

        child.map_err(|e| UrError::UnhandledCase(e.to_string()))
    }

    fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        cursor.attempt(|c| {
            let index = c.u32()?;
            let hardened = c.bool()?;
            Self::new(index, hardened)
        })
    }

    fn encode<W: Write>(&self, e: &mut Encoder<W>) -> Result<(), EncodeError<W::Error>> {
        e.u32(self.index)?.bool(self.hardened)?;
        Ok(())
    }

    fn render(self, out: &mut String) {
        let _ = write!(out, "{}{}", self.index, hardened_marker(self.hardened));
    }
}

/// A single step of a crypto-keypath
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathComponent {
    /// `index, hardened`
    Index(ChildIndex),
    /// `[low, high], hardened`
    Range { low: u32, high: u32, hardened: bool },
    /// `[], hardened`
    Wildcard { hardened: bool },
    /// `[internal, external]`, each a child index
    Pair { internal: ChildIndex, external: ChildIndex },
}

impl PathComponent {
    pub fn as_index(&self) -> Option<ChildIndex> {
        match self {
            Self::Index(index) => Some(*index),
            _ => None,
        }
    }

    fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        if !cursor.is_array() {
            return ChildIndex::decode(cursor).map(Self::Index);
        }

        if cursor.enter_array()?.at_end() {
            return cursor.attempt(|c| {
                let empty = c.enter_array()?;
                c.leave(empty)?;
                let hardened = c.bool()?;
                Ok(Self::Wildcard { hardened })
            });
        }

        cursor.attempt(Self::decode_range).or_else(|_| cursor.attempt(Self::decode_pair))
    }

    fn decode_range(cursor: &mut Cursor<'_>) -> Result<Self> {
        let mut bounds = cursor.enter_array()?;
        let low = bounds.u32()?;
        let high = bounds.u32()?;
        cursor.leave(bounds)?;
        let hardened = cursor.bool()?;

        if low > high || high > MAX_CHILD_INDEX {
            return Err(UrError::UnhandledCase(format!("invalid range {low}..{high}")));
        }

        Ok(Self::Range { low, high, hardened })
    }

    fn decode_pair(cursor: &mut Cursor<'_>) -> Result<Self> {
        let mut pair = cursor.enter_array()?;
        let internal = ChildIndex::decode(&mut pair)?;
        let external = ChildIndex::decode(&mut pair)?;
        cursor.leave(pair)?;

        Ok(Self::Pair { internal, external })
    }

    fn encode<W: Write>(&self, e: &mut Encoder<W>) -> Result<(), EncodeError<W::Error>> {
        match self {
            Self::Index(index) => index.encode(e)?,
            Self::Range { low, high, hardened } => {
                e.array(2)?.u32(*low)?.u32(*high)?.bool(*hardened)?;
            }
            Self::Wildcard { hardened } => {
                e.array(0)?.bool(*hardened)?;
            }
            Self::Pair { internal, external } => {
                e.array(4)?;
                internal.encode(e)?;
                external.encode(e)?;
            }
        }

        Ok(())
    }

    /// Descriptor notation of this step, including its leading `/`
    ///
    /// Ranges expand to every index they cover, pairs render as
    /// `<external,internal>`.
    pub fn render(&self, out: &mut String) -> Result<()> {
        out.push('/');

        match *self {
            Self::Index(index) => index.render(out),
            Self::Wildcard { hardened } => {
                out.push('*');
                out.push_str(hardened_marker(hardened));
            }
            Self::Range { low, high, hardened } => {
                if low > high || high - low >= RANGE_MAX_RENDERED {
                    return Err(UrError::UnhandledCase(format!(
                        "range {low}..{high} is too wide to render"
                    )));
                }

                out.push('<');
                for index in low..=high {
                    if index != low {
                        out.push(';');
                    }
                    let _ = write!(out, "{index}{}", hardened_marker(hardened));
                }
                out.push('>');
            }
            Self::Pair { internal, external } => {
                out.push('<');
                external.render(out);
                out.push(',');
                internal.render(out);
                out.push('>');
            }
        }

        Ok(())
    }
}

fn hardened_marker(hardened: bool) -> &'static str {
    if hardened { "'" } else { "" }
}

/// crypto-keypath: BIP32 derivation path with optional source fingerprint and depth
/// BCR-2020-007: https://github.com/BlockchainCommons/Research/blob/master/papers/bcr-2020-007-hdkey.md
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keypath {
    pub components: Vec<PathComponent>,
    /// Fingerprint of the key the path starts from, 0 when unknown
    pub source_fingerprint: u32,
    pub depth: u8,
}

impl Keypath {
    /// Create a keypath, enforcing the component limit
    ///
    /// # Errors
    ///
    /// Returns `UnhandledCase` for more than 8 components, or for an empty path without a
    /// source fingerprint since that carries no information
    pub fn new(components: Vec<PathComponent>, source_fingerprint: u32, depth: u8) -> Result<Self> {
        if components.len() > KEYPATH_MAX_COMPONENTS {
            return Err(UrError::UnhandledCase(format!(
                "keypath with {} components",
                components.len()
            )));
        }

        if components.is_empty() && source_fingerprint == 0 {
            return Err(UrError::UnhandledCase("empty keypath without fingerprint".to_string()));
        }

        Ok(Self { components, source_fingerprint, depth })
    }

    /// Descriptor notation of the whole path, e.g. `/44'/0'/0'`
    pub fn render(&self) -> Result<String> {
        let mut out = String::new();
        for component in &self.components {
            component.render(&mut out)?;
        }

        Ok(out)
    }

    /// Number of plain index steps, the ones that add a BIP32 level
    pub fn index_count(&self) -> usize {
        self.components.iter().filter(|component| component.as_index().is_some()).count()
    }

    /// Whether this is a three level all-hardened path like `44'/0'/0'`
    pub fn is_account_level(&self) -> bool {
        self.components.len() == 3
            && self
                .components
                .iter()
                .all(|component| component.as_index().is_some_and(|index| index.hardened))
    }
}

impl UrType for Keypath {
    const TAG: u64 = CRYPTO_KEYPATH;
    const UR_TYPE: &'static str = "crypto-keypath";
    type Decoded = Self;

    // {1: [path-component*], ?2: uint32, ?3: uint8}
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        let mut map = cursor.enter_map()?;

        match_key(&mut map, keypath_keys::COMPONENTS)?;
        let mut array = map.enter_array()?;

        // every component but a pair takes two items
        if array.remaining() / 2 > KEYPATH_MAX_COMPONENTS as u64 {
            return Err(UrError::UnhandledCase(format!(
                "keypath with {} array items",
                array.remaining()
            )));
        }

        let mut components = Vec::with_capacity(KEYPATH_MAX_COMPONENTS);
        while !array.at_end() {
            if components.len() == KEYPATH_MAX_COMPONENTS {
                return Err(UrError::UnhandledCase("keypath with too many components".to_string()));
            }

            components.push(PathComponent::decode(&mut array)?);
        }
        map.leave(array)?;

        let source_fingerprint =
            optional(&mut map, keypath_keys::SOURCE_FINGERPRINT, |m| m.u32())?.unwrap_or_default();

        let depth = optional(&mut map, keypath_keys::DEPTH, |m| m.u32())?
            .map(|depth| {
                u8::try_from(depth)
                    .map_err(|_| UrError::UnhandledCase(format!("keypath depth {depth}")))
            })
            .transpose()?
            .unwrap_or_default();

        let keypath = Self::new(components, source_fingerprint, depth)?;

        cursor.leave(map)?;
        Ok(keypath)
    }
}

impl<C> Encode<C> for Keypath {
    fn encode<W: Write>(
        &self,
        e: &mut Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), EncodeError<W::Error>> {
        let len = 1 + u64::from(self.source_fingerprint != 0) + u64::from(self.depth != 0);
        e.map(len)?;

        let items: u64 = self
            .components
            .iter()
            .map(|component| match component {
                PathComponent::Pair { .. } => 1,
                _ => 2,
            })
            .sum();

        e.u64(keypath_keys::COMPONENTS)?.array(items)?;
        for component in &self.components {
            component.encode(e)?;
        }

        if self.source_fingerprint != 0 {
            e.u64(keypath_keys::SOURCE_FINGERPRINT)?.u32(self.source_fingerprint)?;
        }

        if self.depth != 0 {
            e.u64(keypath_keys::DEPTH)?.u8(self.depth)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use minicbor::Encoder;

    use super::*;

    fn index(index: u32, hardened: bool) -> PathComponent {
        PathComponent::Index(ChildIndex::new(index, hardened).unwrap())
    }

    #[test]
    fn test_crypto_keypath_decode() {
        // {1: [44, true, 0, true, 0, true], 2: 0xd34db33f, 3: 4}
        let cbor = hex::decode("a30186182cf500f500f5021ad34db33f0304").unwrap();
        let keypath = Keypath::from_cbor(&cbor).unwrap();

        assert_eq!(keypath.components, vec![index(44, true), index(0, true), index(0, true)]);
        assert_eq!(keypath.source_fingerprint, 0xd34db33f);
        assert_eq!(keypath.depth, 4);
        assert_eq!(keypath.render().unwrap(), "/44'/0'/0'");
        assert!(keypath.is_account_level());

        assert_eq!(hex::encode(keypath.to_cbor().unwrap()), hex::encode(&cbor));
    }

    #[test]
    fn test_crypto_keypath_wildcard() {
        // {1: [1, false, [], false]}
        let cbor = hex::decode("a1018401f480f4").unwrap();
        let keypath = Keypath::from_cbor(&cbor).unwrap();

        assert_eq!(
            keypath.components,
            vec![index(1, false), PathComponent::Wildcard { hardened: false }]
        );
        assert_eq!(keypath.source_fingerprint, 0);
        assert_eq!(keypath.index_count(), 1);
        assert_eq!(keypath.render().unwrap(), "/1/*");
        assert!(!keypath.is_account_level());
        assert_eq!(keypath.to_cbor().unwrap(), cbor);
    }

    #[test]
    fn test_crypto_keypath_range() {
        let mut cbor = Vec::new();
        let mut encoder = Encoder::new(&mut cbor);
        encoder.map(1).unwrap().u8(1).unwrap().array(2).unwrap();
        encoder.array(2).unwrap().u8(0).unwrap().u8(2).unwrap().bool(true).unwrap();

        let keypath = Keypath::from_cbor(&cbor).unwrap();
        assert_eq!(
            keypath.components,
            vec![PathComponent::Range { low: 0, high: 2, hardened: true }]
        );
        assert_eq!(keypath.render().unwrap(), "/<0';1';2'>");
        assert_eq!(keypath.index_count(), 0);
        assert_eq!(keypath.to_cbor().unwrap(), cbor);
    }

    #[test]
    fn test_crypto_keypath_pair() {
        // {1: [84, true, [0, false, 1, false]], 2: 1}
        let mut cbor = Vec::new();
        let mut encoder = Encoder::new(&mut cbor);
        encoder.map(2).unwrap().u8(1).unwrap().array(3).unwrap();
        encoder.u8(84).unwrap().bool(true).unwrap();
        encoder.array(4).unwrap().u8(0).unwrap().bool(false).unwrap().u8(1).unwrap().bool(false).unwrap();
        encoder.u8(2).unwrap().u8(1).unwrap();

        let keypath = Keypath::from_cbor(&cbor).unwrap();
        assert_eq!(
            keypath.components[1],
            PathComponent::Pair {
                internal: ChildIndex::normal(0).unwrap(),
                external: ChildIndex::normal(1).unwrap(),
            }
        );
        assert_eq!(keypath.render().unwrap(), "/84'/<1,0>");
        assert_eq!(keypath.to_cbor().unwrap(), cbor);
    }

    #[test]
    fn test_crypto_keypath_wide_range_does_not_render() {
        let keypath = Keypath::new(
            vec![PathComponent::Range { low: 0, high: 1000, hardened: false }],
            0,
            0,
        )
        .unwrap();

        assert!(matches!(keypath.render(), Err(UrError::UnhandledCase(_))));
    }

    #[test]
    fn test_crypto_keypath_fingerprint_only() {
        // {1: [], 2: 0x37b5eed4}
        let cbor = hex::decode("a20180021a37b5eed4").unwrap();
        let keypath = Keypath::from_cbor(&cbor).unwrap();

        assert!(keypath.components.is_empty());
        assert_eq!(keypath.source_fingerprint, 0x37b5eed4);
        assert_eq!(keypath.render().unwrap(), "");
    }

    /// Test malformed CBOR: an empty path needs a fingerprint
    #[test]
    fn test_crypto_keypath_empty() {
        let cbor = hex::decode("a10180").unwrap();
        assert!(matches!(Keypath::from_cbor(&cbor), Err(UrError::UnhandledCase(_))));
    }

    /// Test malformed CBOR: more than 8 components
    #[test]
    fn test_crypto_keypath_too_long() {
        let mut cbor = Vec::new();
        let mut encoder = Encoder::new(&mut cbor);
        encoder.map(1).unwrap().u8(1).unwrap().array(18).unwrap();
        for i in 0..9u32 {
            encoder.u32(i).unwrap().bool(false).unwrap();
        }

        assert!(matches!(Keypath::from_cbor(&cbor), Err(UrError::UnhandledCase(_))));

        let components = (0..9).map(|i| index(i, false)).collect();
        assert!(matches!(Keypath::new(components, 1, 0), Err(UrError::UnhandledCase(_))));
    }

    /// Test malformed CBOR: too many pairs hide behind a short item count
    #[test]
    fn test_crypto_keypath_too_many_pairs() {
        let mut cbor = Vec::new();
        let mut encoder = Encoder::new(&mut cbor);
        encoder.map(1).unwrap().u8(1).unwrap().array(9).unwrap();
        for _ in 0..9 {
            encoder.array(4).unwrap().u8(0).unwrap().bool(false).unwrap().u8(1).unwrap().bool(false).unwrap();
        }

        assert!(matches!(Keypath::from_cbor(&cbor), Err(UrError::UnhandledCase(_))));
    }

    /// Test malformed CBOR: the hardened flag must be a bool
    #[test]
    fn test_crypto_keypath_plain_integers() {
        // {1: [0x8000002c, 0x80000000]}
        let cbor = hex::decode("a101821a8000002c1a80000000").unwrap();
        assert!(Keypath::from_cbor(&cbor).is_err());
    }

    /// Test malformed CBOR: a range with its bounds reversed
    #[test]
    fn test_crypto_keypath_reversed_range() {
        let mut cbor = Vec::new();
        let mut encoder = Encoder::new(&mut cbor);
        encoder.map(1).unwrap().u8(1).unwrap().array(2).unwrap();
        encoder.array(2).unwrap().u8(5).unwrap().u8(2).unwrap().bool(false).unwrap();

        assert!(Keypath::from_cbor(&cbor).is_err());
    }

    #[test]
    fn test_child_number() {
        let child = ChildIndex::hardened(44).unwrap().to_child_number().unwrap();
        assert_eq!(u32::from(child), 0x8000_002c);

        let child = ChildIndex::normal(7).unwrap().to_child_number().unwrap();
        assert_eq!(u32::from(child), 7);

        assert!(ChildIndex::new(0x8000_0000, false).is_err());
    }
}
