use alloy::primitives::{Address, U256};
use sentinel_common::types::RawLogEvent;

use crate::signatures::TRANSFER_TOPIC;

/// Fields of an ERC20 `Transfer` log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferDetails {
    pub from: Address,
    pub to: Address,
    pub value: U256,
}

impl TransferDetails {
    pub fn involves(&self, address: &Address) -> bool {
        self.from == *address || self.to == *address
    }
}

/// Decode a `Transfer` log. Needs the signature topic plus both indexed
/// parties; a short data payload decodes as zero value.
pub fn decode_transfer(log: &RawLogEvent) -> Option<TransferDetails> {
    if log.topic0() != Some(TRANSFER_TOPIC) || log.topics.len() < 3 {
        return None;
    }
    let from = Address::from_word(log.topics[1]);
    let to = Address::from_word(log.topics[2]);
    let value = if log.data.len() >= 32 {
        U256::from_be_slice(&log.data[..32])
    } else {
        U256::ZERO
    };
    Some(TransferDetails { from, to, value })
}
