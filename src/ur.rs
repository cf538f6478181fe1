//! UR text wrapper and the shared record surface of every registry type.

use foundation_ur::{UR, bytewords};
use minicbor::{Encode, Encoder, data::Tag};
use tracing::debug;

use crate::{
    account::{Account, AccountDecode},
    cbor::{Cursor, fields::match_tag},
    coin_info::CoinInfo,
    eckey::EcKey,
    error::{Result, ToUrError as _, UrError},
    hdkey::HdKey,
    keypath::Keypath,
    output::Output,
    psbt::Psbt,
    seed::Seed,
};

/// A CBOR record registered in BCR-2020-006, with its tag and UR type name
pub trait UrType: Encode<()> {
    /// CBOR tag used when the record is nested inside another one
    const TAG: u64;

    /// UR type name, as in `ur:<type>/...`
    const UR_TYPE: &'static str;

    /// What a successful decode yields, usually `Self`
    type Decoded;

    /// Decode the untagged record under `cursor`
    fn decode(cursor: &mut Cursor<'_>) -> Result<Self::Decoded>;

    /// Decode from untagged CBOR, the form carried inside a UR
    fn from_cbor(cbor: &[u8]) -> Result<Self::Decoded> {
        let mut cursor = Cursor::new(cbor)?;
        Self::decode(&mut cursor)
    }

    /// Decode from CBOR that starts with this record's tag
    fn from_tagged_cbor(cbor: &[u8]) -> Result<Self::Decoded> {
        let mut cursor = Cursor::new(cbor)?;
        match_tag(&mut cursor, Self::TAG)?;
        Self::decode(&mut cursor)
    }

    /// Encode as untagged CBOR
    fn to_cbor(&self) -> Result<Vec<u8>> {
        minicbor::to_vec(self).map_err_cbor()
    }

    /// Encode with this record's tag in front
    fn to_tagged_cbor(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        Encoder::new(&mut buffer)
            .tag(Tag::new(Self::TAG))
            .map_err_cbor()?
            .encode(self)
            .map_err_cbor()?;

        Ok(buffer)
    }

    /// Single-part `ur:` string for this record
    fn to_ur_string(&self) -> Result<String> {
        let cbor = self.to_cbor()?;
        Ok(UR::new(Self::UR_TYPE, &cbor).to_string())
    }
}

/// Wrapper for UR with a normalized (lowercase) type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ur {
    ur_type: String,
    cbor: Vec<u8>,
}

impl Ur {
    /// Parse a single-part UR string, e.g. `ur:crypto-seed/...`
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the text is not a UR and `UnhandledCase` for multi-part URs
    pub fn parse(text: &str) -> Result<Self> {
        // UR strings are case-insensitive, QR codes carry them uppercase
        let lowercase = text.trim().to_ascii_lowercase();
        let ur = UR::parse(&lowercase).map_err(|e| UrError::InvalidArgument(e.to_string()))?;

        let ur_type = ur.as_type().to_string();
        let cbor = match ur {
            UR::SinglePart { message, .. } => bytewords::decode(message, bytewords::Style::Minimal)
                .map_err(|e| UrError::InvalidArgument(e.to_string()))?,
            UR::SinglePartDeserialized { message, .. } => message.to_vec(),
            UR::MultiPart { .. } | UR::MultiPartDeserialized { .. } => {
                return Err(UrError::UnhandledCase("multi-part UR".to_string()));
            }
        };

        debug!(%ur_type, len = cbor.len(), "parsed ur");
        Ok(Self { ur_type, cbor })
    }

    pub fn ur_type(&self) -> &str {
        &self.ur_type
    }

    pub fn cbor(&self) -> &[u8] {
        &self.cbor
    }

    /// Decode the payload as the record named by the UR type
    pub fn decode(&self) -> Result<UrRecord> {
        let cbor = self.cbor.as_slice();
        let record = match self.ur_type.as_str() {
            Seed::UR_TYPE => UrRecord::Seed(Seed::from_cbor(cbor)?),
            EcKey::UR_TYPE => UrRecord::EcKey(EcKey::from_cbor(cbor)?),
            HdKey::UR_TYPE => UrRecord::HdKey(HdKey::from_cbor(cbor)?),
            Keypath::UR_TYPE => UrRecord::Keypath(Keypath::from_cbor(cbor)?),
            CoinInfo::UR_TYPE => UrRecord::CoinInfo(CoinInfo::from_cbor(cbor)?),
            Output::UR_TYPE => UrRecord::Output(Output::from_cbor(cbor)?),
            Account::UR_TYPE => UrRecord::Account(Account::from_cbor(cbor)?),
            Psbt::UR_TYPE => UrRecord::Psbt(Psbt::from_cbor(cbor)?),
            other => return Err(UrError::UnhandledCase(format!("unsupported ur type: {other}"))),
        };

        Ok(record)
    }
}

/// Any record a UR string can carry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrRecord {
    Seed(Seed),
    EcKey(EcKey),
    HdKey(HdKey),
    Keypath(Keypath),
    CoinInfo(CoinInfo),
    Output(Output),
    Account(AccountDecode),
    Psbt(Psbt),
}

impl UrRecord {
    /// Parse and decode a UR string in one go
    pub fn from_ur_str(text: &str) -> Result<Self> {
        Ur::parse(text)?.decode()
    }
}
