use std::fmt::Display;

use thiserror::Error;

/// Every outcome a decode, encode or format call can report.
///
/// `TaprootUnsupported` is the only "soft" error: the account aggregator reports it next to
/// the descriptors it did keep, see [`crate::account::AccountDecode`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrError {
    #[error("Malformed CBOR: {0}")]
    CborMalformed(String),

    #[error("Wrong CBOR type: {0}")]
    WrongType(String),

    #[error("Unexpected tag: {0}")]
    WrongTag(u64),

    #[error("Wrong map key: expected {expected}, got {actual}")]
    WrongMapKey { expected: u64, actual: u64 },

    #[error("Wrong string length: expected {expected}, got {actual}")]
    WrongStringLength { expected: usize, actual: usize },

    #[error("Unhandled case: {0}")]
    UnhandledCase(String),

    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    #[error("Taproot output descriptors are not supported")]
    TaprootUnsupported,

    #[error("Buffer too small: {required} bytes required, {capacity} available")]
    BufferTooSmall { required: usize, capacity: usize },

    #[error("Out of memory")]
    OutOfMemory,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T, E = UrError> = std::result::Result<T, E>;

/// Helper trait to convert errors from the CBOR layer into `UrError`
pub trait ToUrError<T> {
    fn map_err_cbor(self) -> Result<T>;
}

impl<T, E: Display> ToUrError<T> for std::result::Result<T, E> {
    fn map_err_cbor(self) -> Result<T> {
        self.map_err(|e| UrError::CborMalformed(e.to_string()))
    }
}
