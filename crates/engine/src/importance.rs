//! Importance rules shared by the classifier and the aggregator.

/// Default USD threshold for transfer importance.
pub const DEFAULT_USD_THRESHOLD: f64 = 50.0;

/// A transfer is important when its USD value is known and at least `threshold`.
///
/// An unknown value (`None`) is never important. A genuinely zero value is
/// simply below any positive threshold.
pub fn is_important_usd(usd: Option<f64>, threshold: f64) -> bool {
    match usd {
        Some(value) => value >= threshold,
        None => false,
    }
}

/// Module-install keywords make an event important regardless of value.
pub use sentinel_common::types::mentions_module_install;
