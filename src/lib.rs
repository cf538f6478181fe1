pub mod account;
pub mod bip32;
pub mod cbor;
pub mod coin_info;
pub mod eckey;
pub mod error;
pub mod format;
pub mod hdkey;
pub mod jade;
pub mod keypath;
pub mod output;
pub mod psbt;
pub mod registry;
pub mod seed;
pub mod ur;

pub use account::{Account, AccountDecode};
pub use coin_info::{CoinInfo, Network};
pub use eckey::EcKey;
pub use error::{Result, UrError};
pub use format::FormatMode;
pub use hdkey::{DerivedKey, HdKey, MasterKey};
pub use jade::{Bip85Request, Bip85Response};
pub use keypath::{ChildIndex, Keypath, PathComponent};
pub use output::{KeyExpression, KeyExpressionKind, KeyMaterial, Output};
pub use psbt::Psbt;
pub use seed::Seed;
pub use ur::{Ur, UrRecord, UrType};
