//! Classification engine: price lookups, dedup, importance and alert text.

pub mod classifier;
pub mod dedup;
pub mod importance;
pub mod price;

pub use classifier::{ClassifierSettings, EventClassifier};
pub use dedup::DedupStore;
pub use price::{PriceError, PriceOracle, PriceSource, RateLimiter};
