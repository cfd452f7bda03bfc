//! Watched-address registry.
//!
//! Built once at startup from a wallet profile plus configured extras. Reads
//! dominate; the runtime add path takes the write lock briefly.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use alloy::primitives::{Address, B256};

use crate::types::WatchedAddress;

/// Label returned for addresses without an explicit label.
pub const DEFAULT_LABEL: &str = "General";

/// Label given to addresses added without one.
pub const EXTRA_LABEL: &str = "Extra";

const PROD_WALLETS: &[(&str, &str)] = &[
    ("0x33381eC82DD811b1BABa841f1e2410468aeD7047", "Main App"),
    ("0x845A66F0230970971240d76fdDF7f961e08e3f01", "wETH Hub"),
    ("0x3b0794015C9595aE06cf2069C0faC5d9B290f911", "USDT Hub"),
    ("0xec6595E48933D6f752a6f6421f0a9A019Fb80081", "wBTC Hub"),
    ("0xEA1523eB5F0ecDdB1875122aC2c9470a978e3010", "USDC Hub"),
    ("0xc5eFb9E4EfD91E68948d5039819494Eea56FFA46", "PAXG Hub"),
    ("0xdAE486e75Cdf40bd9B2A0086dCf66e2d6C4e784b", "PECTO Hub"),
];

const TEST_WALLETS: &[(&str, &str)] = &[
    ("0x7A058060dD1C45eF6c79B36C1555655830f3B4AC", "Main App"),
    ("0x5ee7E95d40258516fe198c22D987A82930dC1D03", "wETH Hub"),
    ("0x569d561965e85C68222C2caC5E241Bc8647E431d", "USDT Hub"),
    ("0xe0Fa88e388f27750Ce5519600cC01651f973abfA", "wBTC Hub"),
    ("0xddE03B3aaA0d1390BD19AA6EF58Eb7F15a2a4B25", "USDC Hub"),
    ("0x47556c13DBAEFB9CeCc9912C3921acE13fdCAC55", "PAXG Hub"),
    ("0xf613f5BaA4Ca549D848c391f77E939A6774E8589", "Suleman"),
    ("0x015FC372F9207d041FbA3a00101f99420CaaD77A", "User Wallet"),
];

/// Thread-safe `{address -> label}` membership table.
#[derive(Debug, Default)]
pub struct WatchList {
    entries: RwLock<HashMap<Address, String>>,
}

impl WatchList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a named wallet profile (`test` or anything else for prod)
    /// plus extra addresses. Unparseable extras are logged and skipped.
    pub fn from_profile(profile: &str, extras: &[String]) -> Self {
        let table = if profile.eq_ignore_ascii_case("test") {
            TEST_WALLETS
        } else {
            PROD_WALLETS
        };

        let list = Self::new();
        for (addr, label) in table {
            match addr.parse::<Address>() {
                Ok(address) => {
                    list.insert(address, Some(label));
                }
                Err(e) => tracing::warn!(address = addr, error = %e, "Invalid built-in wallet"),
            }
        }

        for extra in extras {
            match extra.parse::<Address>() {
                Ok(address) => {
                    if !list.is_watched(&address) {
                        list.insert(address, None);
                    }
                }
                Err(e) => tracing::warn!(address = %extra, error = %e, "Skipping invalid extra address"),
            }
        }

        tracing::info!(profile, watched = list.len(), "Watch list loaded");
        list
    }

    pub fn is_watched(&self, address: &Address) -> bool {
        self.read().contains_key(address)
    }

    /// Label for an address, `General` when unknown or unlabeled.
    pub fn label(&self, address: &Address) -> String {
        self.read()
            .get(address)
            .filter(|l| !l.is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_LABEL.to_string())
    }

    /// Add or relabel an address. Returns `true` if it was not watched before.
    pub fn insert(&self, address: Address, label: Option<&str>) -> bool {
        let label = label
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(EXTRA_LABEL)
            .to_string();
        self.write().insert(address, label).is_none()
    }

    pub fn addresses(&self) -> Vec<Address> {
        let mut out: Vec<Address> = self.read().keys().copied().collect();
        out.sort();
        out
    }

    /// Snapshot of all entries, sorted by address.
    pub fn entries(&self) -> Vec<WatchedAddress> {
        let mut out: Vec<WatchedAddress> = self
            .read()
            .iter()
            .map(|(address, label)| WatchedAddress {
                address: *address,
                label: label.clone(),
            })
            .collect();
        out.sort_by_key(|w| w.address);
        out
    }

    /// Watched addresses left-padded into 32-byte topic values.
    pub fn address_topics(&self) -> Vec<B256> {
        self.addresses()
            .into_iter()
            .map(|a| a.into_word())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Address, String>> {
        self.entries.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Address, String>> {
        self.entries.write().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn test_prod_profile_labels() {
        let list = WatchList::from_profile("prod", &[]);
        assert_eq!(list.len(), PROD_WALLETS.len());
        let main_app = address!("33381eC82DD811b1BABa841f1e2410468aeD7047");
        assert!(list.is_watched(&main_app));
        assert_eq!(list.label(&main_app), "Main App");
    }

    #[test]
    fn test_test_profile_selected_case_insensitively() {
        let list = WatchList::from_profile("TEST", &[]);
        let user = address!("015FC372F9207d041FbA3a00101f99420CaaD77A");
        assert_eq!(list.label(&user), "User Wallet");
        assert!(!list.is_watched(&address!("33381eC82DD811b1BABa841f1e2410468aeD7047")));
    }

    #[test]
    fn test_extras_get_extra_label_and_invalid_skipped() {
        let extras = vec![
            "0x1111111111111111111111111111111111111111".to_string(),
            "not-an-address".to_string(),
            // already in prod table, keeps its label
            "0x845a66f0230970971240d76fddf7f961e08e3f01".to_string(),
        ];
        let list = WatchList::from_profile("prod", &extras);
        assert_eq!(list.len(), PROD_WALLETS.len() + 1);
        assert_eq!(
            list.label(&address!("1111111111111111111111111111111111111111")),
            "Extra"
        );
        assert_eq!(
            list.label(&address!("845A66F0230970971240d76fdDF7f961e08e3f01")),
            "wETH Hub"
        );
    }

    #[test]
    fn test_unknown_address_label_is_general() {
        let list = WatchList::new();
        assert_eq!(list.label(&Address::ZERO), DEFAULT_LABEL);
        assert!(!list.is_watched(&Address::ZERO));
    }

    #[test]
    fn test_runtime_insert() {
        let list = WatchList::new();
        let a = address!("2222222222222222222222222222222222222222");
        assert!(list.insert(a, Some("  ")));
        assert_eq!(list.label(&a), "Extra");
        assert!(!list.insert(a, Some("Treasury")));
        assert_eq!(list.label(&a), "Treasury");
    }

    #[test]
    fn test_address_topics_are_left_padded() {
        let list = WatchList::new();
        let a = address!("3333333333333333333333333333333333333333");
        list.insert(a, None);
        let topics = list.address_topics();
        assert_eq!(topics.len(), 1);
        assert_eq!(&topics[0][..12], &[0u8; 12]);
        assert_eq!(&topics[0][12..], a.as_slice());
    }
}
