//! Log interpretation: well-known signatures, event naming, token metadata,
//! transfer decoding and the relevance predicate.

pub mod abi_loader;
pub mod relevance;
pub mod resolver;
pub mod signatures;
pub mod tokens;
pub mod transfer;

pub use abi_loader::{AbiLoadError, load_abi_dir};
pub use relevance::is_relevant;
pub use resolver::EventNameResolver;
pub use tokens::{TokenInfo, TokenTable};
pub use transfer::{TransferDetails, decode_transfer};
