//! Bounded CBOR traversal for the UR decoders.
//!
//! Input is validated once up front, then walked with a [`Cursor`] that knows how many
//! items are left in the container it points into.

pub mod cursor;
pub mod fields;
pub mod validate;

pub use cursor::Cursor;
pub use validate::{ValidationFlags, validate};
