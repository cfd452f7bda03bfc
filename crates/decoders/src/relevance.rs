use sentinel_common::types::RawLogEvent;
use sentinel_common::watchlist::WatchList;

use crate::signatures::TRANSFER_TOPIC;
use crate::transfer::decode_transfer;

/// Whether a log concerns the watched set.
///
/// Transfers qualify when either party is watched; any other event qualifies
/// when the emitting contract is watched. Logs without topics never qualify.
pub fn is_relevant(log: &RawLogEvent, watch: &WatchList) -> bool {
    let Some(topic0) = log.topic0() else {
        return false;
    };
    if topic0 == TRANSFER_TOPIC {
        return decode_transfer(log)
            .is_some_and(|t| watch.is_watched(&t.from) || watch.is_watched(&t.to));
    }
    watch.is_watched(&log.contract_address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, B256, Bytes, U256, address, keccak256};

    const HUB: Address = address!("33381eC82DD811b1BABa841f1e2410468aeD7047");
    const STRANGER: Address = address!("9999999999999999999999999999999999999999");

    fn watch() -> WatchList {
        let w = WatchList::new();
        w.insert(HUB, Some("Main App"));
        w
    }

    fn make_log(contract: Address, topics: Vec<B256>) -> RawLogEvent {
        RawLogEvent {
            contract_address: contract,
            topics,
            data: Bytes::from(U256::from(1u64).to_be_bytes::<32>().to_vec()),
            tx_hash: None,
            block_number: None,
        }
    }

    #[test]
    fn test_transfer_to_watched_is_relevant() {
        let log = make_log(
            STRANGER,
            vec![TRANSFER_TOPIC, STRANGER.into_word(), HUB.into_word()],
        );
        assert!(is_relevant(&log, &watch()));
    }

    #[test]
    fn test_transfer_between_strangers_from_watched_contract_is_not_relevant() {
        // transfers are judged on parties, not on the emitting contract
        let log = make_log(
            HUB,
            vec![TRANSFER_TOPIC, STRANGER.into_word(), STRANGER.into_word()],
        );
        assert!(!is_relevant(&log, &watch()));
    }

    #[test]
    fn test_truncated_transfer_is_not_relevant() {
        let log = make_log(HUB, vec![TRANSFER_TOPIC, HUB.into_word()]);
        assert!(!is_relevant(&log, &watch()));
    }

    #[test]
    fn test_other_event_depends_on_contract() {
        let topic = keccak256("Approval(address,address,uint256)");
        assert!(is_relevant(&make_log(HUB, vec![topic]), &watch()));
        assert!(!is_relevant(&make_log(STRANGER, vec![topic]), &watch()));
    }

    #[test]
    fn test_no_topics_is_not_relevant() {
        assert!(!is_relevant(&make_log(HUB, vec![]), &watch()));
    }
}
