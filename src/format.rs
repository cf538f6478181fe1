//! Descriptor formatting options and the caller-buffer variants of the string producers.
//!
//! Every `*_into` function follows the same two pass contract: when the output does not
//! fit, nothing is written and `BufferTooSmall` reports the exact length needed, so the
//! caller can size a buffer and call again.

use crate::{
    error::{Result, UrError},
    hdkey::HdKey,
    output::Output,
};

/// How hdkey descriptor keys are rendered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FormatMode {
    /// Exactly what the key carries
    #[default]
    Default,
    /// Add `/0/*` to account level keys (three hardened origin steps, no children) so
    /// wallets that expect BIP44 style receive paths can use them as is
    Bip44Compatible,
}

/// Copy `src` into the front of `out`
///
/// # Errors
///
/// Returns `BufferTooSmall` with the length of `src` when `out` is shorter
pub fn copy_into(src: &[u8], out: &mut [u8]) -> Result<usize> {
    let required = src.len();
    if required > out.len() {
        return Err(UrError::BufferTooSmall { required, capacity: out.len() });
    }

    out[..required].copy_from_slice(src);
    Ok(required)
}

/// Copy the UTF-8 bytes of `text` into `out`, see [`copy_into`]
pub fn write_str_into(text: &str, out: &mut [u8]) -> Result<usize> {
    copy_into(text.as_bytes(), out)
}

impl HdKey {
    pub fn to_base58_into(&self, out: &mut [u8]) -> Result<usize> {
        write_str_into(&self.to_base58()?, out)
    }

    pub fn key_origin_into(&self, out: &mut [u8]) -> Result<usize> {
        write_str_into(&self.key_origin()?, out)
    }

    pub fn derivation_path_into(&self, out: &mut [u8]) -> Result<usize> {
        write_str_into(&self.derivation_path()?, out)
    }
}

impl Output {
    pub fn descriptor_into(&self, mode: FormatMode, out: &mut [u8]) -> Result<usize> {
        write_str_into(&self.descriptor(mode)?, out)
    }
}
