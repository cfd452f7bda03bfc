use std::collections::HashMap;

use alloy::primitives::{Address, B256};

use crate::signatures;

/// Maps `(contract, topic0)` to a human event name.
///
/// Built during startup and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct EventNameResolver {
    by_address: HashMap<Address, HashMap<B256, String>>,
    global: HashMap<B256, String>,
}

impl EventNameResolver {
    /// Resolver seeded with the well-known global signature table.
    pub fn new() -> Self {
        let global = signatures::global_topics()
            .into_iter()
            .map(|(topic, name)| (topic, name.to_string()))
            .collect();
        Self {
            by_address: HashMap::new(),
            global,
        }
    }

    /// Register an event name for one contract.
    pub fn register(&mut self, address: Address, topic0: B256, name: impl Into<String>) {
        self.by_address
            .entry(address)
            .or_default()
            .insert(topic0, name.into());
    }

    pub fn register_global(&mut self, topic0: B256, name: impl Into<String>) {
        self.global.insert(topic0, name.into());
    }

    /// Address-specific name, then global name, then a short hash label.
    pub fn resolve(&self, address: &Address, topic0: &B256) -> String {
        if let Some(name) = self
            .by_address
            .get(address)
            .and_then(|events| events.get(topic0))
        {
            return name.clone();
        }
        if let Some(name) = self.global.get(topic0) {
            return name.clone();
        }
        format!("Event {}", short_hash(topic0))
    }

    /// Number of address-specific registrations.
    pub fn registered_count(&self) -> usize {
        self.by_address.values().map(HashMap::len).sum()
    }
}

/// First four bytes of a hash as `0x`-prefixed hex.
pub fn short_hash(hash: &B256) -> String {
    let full = format!("{hash:#x}");
    full[..10].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signatures::TRANSFER_TOPIC;
    use alloy::primitives::{address, keccak256};

    #[test]
    fn test_global_fallback() {
        let resolver = EventNameResolver::new();
        assert_eq!(resolver.resolve(&Address::ZERO, &TRANSFER_TOPIC), "Transfer");
        let approval = keccak256("Approval(address,address,uint256)");
        assert_eq!(resolver.resolve(&Address::ZERO, &approval), "Approval");
    }

    #[test]
    fn test_address_specific_wins() {
        let mut resolver = EventNameResolver::new();
        let contract = address!("33381eC82DD811b1BABa841f1e2410468aeD7047");
        resolver.register(contract, TRANSFER_TOPIC, "HubTransfer");
        assert_eq!(resolver.resolve(&contract, &TRANSFER_TOPIC), "HubTransfer");
        assert_eq!(resolver.resolve(&Address::ZERO, &TRANSFER_TOPIC), "Transfer");
        assert_eq!(resolver.registered_count(), 1);
    }

    #[test]
    fn test_unknown_topic_gets_short_hash_label() {
        let resolver = EventNameResolver::new();
        let unknown = keccak256("SomethingNobodyRegistered(uint256)");
        let label = resolver.resolve(&Address::ZERO, &unknown);
        assert_eq!(label, format!("Event {}", &format!("{unknown:#x}")[..10]));
        assert_eq!(label.len(), "Event 0x12345678".len());
    }

    #[test]
    fn test_register_global_applies_to_every_contract() {
        let mut resolver = EventNameResolver::new();
        let topic = keccak256("VaultRebalanced(uint256,uint256)");
        let contract = address!("33381eC82DD811b1BABa841f1e2410468aeD7047");
        resolver.register_global(topic, "VaultRebalanced");
        resolver.register(contract, topic, "HubRebalanced");

        assert_eq!(resolver.resolve(&Address::ZERO, &topic), "VaultRebalanced");
        assert_eq!(resolver.resolve(&contract, &topic), "HubRebalanced");
        assert_eq!(resolver.registered_count(), 1);
    }
}
