//! crypto-account: master fingerprint plus the output descriptors of one account
//! BCR-2020-015: https://github.com/BlockchainCommons/Research/blob/master/papers/bcr-2020-015-account.md
//!
//! Taproot descriptors are skipped instead of failing the whole account: the decode keeps
//! every other descriptor and reports how many were dropped.

use minicbor::{
    Encode, Encoder,
    data::Tag,
    encode::{Error as EncodeError, Write},
};
use tracing::{debug, warn};

use crate::{
    cbor::{
        Cursor,
        fields::{is_tag, match_key, match_tag},
    },
    error::{Result, UrError},
    format::FormatMode,
    output::Output,
    registry::{CRYPTO_ACCOUNT, CRYPTO_OUTPUT, account_keys, limits::DESCRIPTORS_MAX_SIZE},
    ur::UrType,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub master_fingerprint: u32,
    /// At most 16 descriptors
    pub descriptors: Vec<Output>,
}

/// Result of decoding an account that may have dropped taproot descriptors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountDecode {
    pub account: Account,
    /// Number of taproot descriptors that were skipped
    pub skipped_taproot: usize,
}

impl AccountDecode {
    pub fn is_complete(&self) -> bool {
        self.skipped_taproot == 0
    }

    /// `TaprootUnsupported` when anything was skipped, the account is still available
    pub fn outcome(&self) -> Result<()> {
        if self.is_complete() { Ok(()) } else { Err(UrError::TaprootUnsupported) }
    }

    /// The account, only if nothing was skipped
    pub fn into_result(self) -> Result<Account> {
        self.outcome()?;
        Ok(self.account)
    }
}

/// How descriptors appear inside the account array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entries {
    /// Each one wrapped in the crypto-output tag, as BCR-2020-015 has it
    Tagged,
    /// Bare output expressions, as Blockstream Jade exports them
    Bare,
}

impl Account {
    pub fn new(master_fingerprint: u32, descriptors: Vec<Output>) -> Result<Self> {
        if descriptors.len() > DESCRIPTORS_MAX_SIZE {
            return Err(UrError::UnhandledCase(format!(
                "account with {} descriptors",
                descriptors.len()
            )));
        }

        Ok(Self { master_fingerprint, descriptors })
    }

    /// Decode the account layout Blockstream Jade exports, where descriptors lack the
    /// crypto-output tag
    pub fn from_jade_cbor(cbor: &[u8]) -> Result<AccountDecode> {
        let mut cursor = Cursor::new(cbor)?;
        decode_account(&mut cursor, Entries::Bare)
    }

    /// Descriptor strings of every kept output, in order
    pub fn descriptors(&self, mode: FormatMode) -> Result<Vec<String>> {
        self.descriptors.iter().map(|output| output.descriptor(mode)).collect()
    }
}

fn decode_account(cursor: &mut Cursor<'_>, entries: Entries) -> Result<AccountDecode> {
    let mut map = cursor.enter_map()?;

    match_key(&mut map, account_keys::MASTER_FINGERPRINT)?;
    let master_fingerprint = map.u32()?;

    match_key(&mut map, account_keys::OUTPUT_DESCRIPTORS)?;
    let mut array = map.enter_array()?;

    if array.remaining() > DESCRIPTORS_MAX_SIZE as u64 {
        return Err(UrError::UnhandledCase(format!(
            "account with {} descriptors",
            array.remaining()
        )));
    }

    let mut descriptors = Vec::with_capacity(array.remaining() as usize);
    let mut skipped_taproot = 0;

    while !array.at_end() {
        if entries == Entries::Tagged {
            match_tag(&mut array, CRYPTO_OUTPUT)?;
        }

        let before = array.remaining();
        match Output::decode(&mut array) {
            Ok(output) => descriptors.push(output),
            Err(UrError::TaprootUnsupported) => {
                warn!(index = descriptors.len() + skipped_taproot, "skipping taproot descriptor");
                skipped_taproot += 1;
                skip_entry(&mut array, before, entries)?;
            }
            Err(error) => return Err(error),
        }
    }

    map.leave(array)?;
    cursor.leave(map)?;

    debug!(count = descriptors.len(), skipped_taproot, "decoded account");
    Ok(AccountDecode { account: Account { master_fingerprint, descriptors }, skipped_taproot })
}

// steps over the rest of an entry until the next one starts or the array ends
fn skip_entry(array: &mut Cursor<'_>, before: u64, entries: Entries) -> Result<()> {
    loop {
        if array.at_end() {
            return Ok(());
        }

        if array.remaining() < before {
            let at_boundary = match entries {
                Entries::Tagged => is_tag(array, CRYPTO_OUTPUT),
                Entries::Bare => true,
            };

            if at_boundary {
                return Ok(());
            }
        }

        array.advance()?;
    }
}

impl UrType for Account {
    const TAG: u64 = CRYPTO_ACCOUNT;
    const UR_TYPE: &'static str = "crypto-account";
    type Decoded = AccountDecode;

    fn decode(cursor: &mut Cursor<'_>) -> Result<AccountDecode> {
        decode_account(cursor, Entries::Tagged)
    }
}

impl<C> Encode<C> for Account {
    fn encode<W: Write>(
        &self,
        e: &mut Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), EncodeError<W::Error>> {
        e.map(2)?;
        e.u64(account_keys::MASTER_FINGERPRINT)?.u32(self.master_fingerprint)?;
        e.u64(account_keys::OUTPUT_DESCRIPTORS)?.array(self.descriptors.len() as u64)?;

        for output in &self.descriptors {
            e.tag(Tag::new(CRYPTO_OUTPUT))?;
            output.encode(e, ctx)?;
        }

        Ok(())
    }
}
