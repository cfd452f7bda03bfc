//! Ledger client abstraction.
//!
//! Ingestion tasks talk to the chain only through [`LedgerClient`], so they can
//! be driven by an in-memory fake in tests. [`AlloyLedger`] is the production
//! implementation: a typed alloy provider plus a second HTTP provider used for
//! untyped `eth_getBlockByNumber` calls when typed decoding fails.

use alloy::consensus::Transaction as _;
use alloy::network::{ReceiptResponse, TransactionResponse};
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{BlockNumberOrTag, Filter, Transaction};
use alloy::transports::{RpcError, TransportError};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::Deserialize;
use thiserror::Error;

use sentinel_common::types::{RawLogEvent, RawNativeTransfer, ReceiptSummary};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("log subscriptions unsupported by endpoint: {0}")]
    UnsupportedSubscription(String),

    #[error("transaction encoding unsupported by client: {0}")]
    UnsupportedEncoding(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("not found: {0}")]
    NotFound(String),
}

/// Live log delivery. The stream ending means the subscription dropped.
pub type LogStream = BoxStream<'static, RawLogEvent>;

/// Address/topic filter shared by subscriptions, polling and backfill.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    /// Emitting contracts; empty means any
    pub addresses: Vec<Address>,
    pub event: Option<B256>,
    /// Accepted values in topic position 1
    pub topic1: Vec<B256>,
    /// Accepted values in topic position 2
    pub topic2: Vec<B256>,
}

impl LogFilter {
    pub fn to_filter(&self) -> Filter {
        let mut filter = Filter::new();
        if !self.addresses.is_empty() {
            filter = filter.address(self.addresses.clone());
        }
        if let Some(event) = self.event {
            filter = filter.event_signature(event);
        }
        if !self.topic1.is_empty() {
            filter = filter.topic1(self.topic1.clone());
        }
        if !self.topic2.is_empty() {
            filter = filter.topic2(self.topic2.clone());
        }
        filter
    }
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn block_number(&self) -> Result<u64, LedgerError>;

    async fn subscribe_logs(&self, filter: &LogFilter) -> Result<LogStream, LedgerError>;

    /// Logs in the inclusive range `[from, to]`.
    async fn get_logs(
        &self,
        filter: &LogFilter,
        from: u64,
        to: u64,
    ) -> Result<Vec<RawLogEvent>, LedgerError>;

    /// Value-carrying view of every transaction in a block, via the typed client.
    async fn block_transfers(&self, number: u64) -> Result<Vec<RawNativeTransfer>, LedgerError>;

    /// Same as [`LedgerClient::block_transfers`] through untyped JSON-RPC.
    async fn raw_block_transfers(&self, number: u64)
    -> Result<Vec<RawNativeTransfer>, LedgerError>;

    async fn transaction(&self, tx_hash: B256) -> Result<Option<RawNativeTransfer>, LedgerError>;

    async fn receipt(&self, tx_hash: B256) -> Result<Option<ReceiptSummary>, LedgerError>;
}

pub struct AlloyLedger {
    provider: DynProvider,
    raw: DynProvider,
}

impl AlloyLedger {
    /// Dial `rpc_url` (ws or http) and the HTTP endpoint used for raw calls.
    pub async fn connect(rpc_url: &str, raw_rpc_url: &str) -> anyhow::Result<Self> {
        let provider = ProviderBuilder::new().connect(rpc_url).await?.erased();
        let raw = ProviderBuilder::new()
            .connect_http(raw_rpc_url.parse()?)
            .erased();
        Ok(Self { provider, raw })
    }

    pub async fn chain_id(&self) -> Result<u64, LedgerError> {
        self.provider.get_chain_id().await.map_err(transport)
    }
}

#[async_trait]
impl LedgerClient for AlloyLedger {
    async fn block_number(&self) -> Result<u64, LedgerError> {
        self.provider.get_block_number().await.map_err(transport)
    }

    async fn subscribe_logs(&self, filter: &LogFilter) -> Result<LogStream, LedgerError> {
        let subscription = self
            .provider
            .subscribe_logs(&filter.to_filter())
            .await
            .map_err(|e| {
                let msg = e.to_string();
                if is_unsupported_subscription(&msg) {
                    LedgerError::UnsupportedSubscription(msg)
                } else {
                    LedgerError::Transport(msg)
                }
            })?;
        Ok(subscription
            .into_stream()
            .map(|log| RawLogEvent::from(&log))
            .boxed())
    }

    async fn get_logs(
        &self,
        filter: &LogFilter,
        from: u64,
        to: u64,
    ) -> Result<Vec<RawLogEvent>, LedgerError> {
        let filter = filter.to_filter().from_block(from).to_block(to);
        let logs = self.provider.get_logs(&filter).await.map_err(transport)?;
        Ok(logs.iter().map(RawLogEvent::from).collect())
    }

    async fn block_transfers(&self, number: u64) -> Result<Vec<RawNativeTransfer>, LedgerError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .full()
            .await
            .map_err(block_error)?
            .ok_or_else(|| LedgerError::NotFound(format!("block {number}")))?;
        Ok(block
            .transactions
            .txns()
            .map(|tx| typed_transfer(tx, Some(number)))
            .collect())
    }

    async fn raw_block_transfers(
        &self,
        number: u64,
    ) -> Result<Vec<RawNativeTransfer>, LedgerError> {
        let block: Option<RawBlock> = self
            .raw
            .raw_request(
                "eth_getBlockByNumber".into(),
                (format!("0x{number:x}"), true),
            )
            .await
            .map_err(transport)?;
        let block = block.ok_or_else(|| LedgerError::NotFound(format!("block {number}")))?;
        Ok(block
            .transactions
            .iter()
            .filter_map(|tx| parse_raw_transaction(tx, number))
            .collect())
    }

    async fn transaction(&self, tx_hash: B256) -> Result<Option<RawNativeTransfer>, LedgerError> {
        let tx = self
            .provider
            .get_transaction_by_hash(tx_hash)
            .await
            .map_err(block_error)?;
        Ok(tx.map(|tx| {
            let block = tx.block_number;
            typed_transfer(&tx, block)
        }))
    }

    async fn receipt(&self, tx_hash: B256) -> Result<Option<ReceiptSummary>, LedgerError> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(transport)?;
        Ok(receipt.map(|r| ReceiptSummary {
            success: ReceiptResponse::status(&r),
            effective_gas_price: ReceiptResponse::effective_gas_price(&r),
        }))
    }
}

fn typed_transfer(tx: &Transaction, block_number: Option<u64>) -> RawNativeTransfer {
    RawNativeTransfer {
        tx_hash: tx.tx_hash(),
        from: TransactionResponse::from(tx),
        to: tx.to(),
        value: tx.value(),
        block_number,
    }
}

fn transport(err: TransportError) -> LedgerError {
    LedgerError::Transport(err.to_string())
}

/// Typed block/transaction fetches fail to deserialize on unknown tx types.
fn block_error(err: TransportError) -> LedgerError {
    let msg = err.to_string();
    if matches!(err, RpcError::DeserError { .. }) || is_unsupported_encoding(&msg) {
        LedgerError::UnsupportedEncoding(msg)
    } else {
        LedgerError::Transport(msg)
    }
}

pub fn is_unsupported_subscription(msg: &str) -> bool {
    let msg = msg.to_lowercase();
    [
        "notifications not supported",
        "websocket",
        "pubsub",
        "subscriptions are not available",
        "invalid logs options",
    ]
    .iter()
    .any(|needle| msg.contains(needle))
}

pub fn is_unsupported_encoding(msg: &str) -> bool {
    let msg = msg.to_lowercase();
    msg.contains("transaction type not supported") || msg.contains("unknown variant")
}

#[derive(Debug, Deserialize)]
struct RawBlock {
    #[serde(default)]
    transactions: Vec<RawTransaction>,
}

/// Transaction as returned by untyped `eth_getBlockByNumber`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawTransaction {
    pub hash: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub value: Option<String>,
}

/// Convert an untyped record; malformed records yield `None`.
pub fn parse_raw_transaction(tx: &RawTransaction, block_number: u64) -> Option<RawNativeTransfer> {
    let tx_hash = tx.hash.as_deref()?.parse::<B256>().ok()?;
    let from = tx.from.as_deref()?.parse::<Address>().ok()?;
    let to = match tx.to.as_deref() {
        Some(to) if !to.is_empty() => Some(to.parse::<Address>().ok()?),
        _ => None,
    };
    let value = match tx.value.as_deref() {
        Some(v) => v.parse::<U256>().ok()?,
        None => U256::ZERO,
    };
    Some(RawNativeTransfer {
        tx_hash,
        from,
        to,
        value,
        block_number: Some(block_number),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, b256};

    fn make_raw(value: &str, to: Option<&str>) -> RawTransaction {
        RawTransaction {
            hash: Some(
                "0x1111111111111111111111111111111111111111111111111111111111111111".to_string(),
            ),
            from: Some("0x33381ec82dd811b1baba841f1e2410468aed7047".to_string()),
            to: to.map(str::to_string),
            value: Some(value.to_string()),
        }
    }

    #[test]
    fn test_parse_raw_transaction() {
        let raw = make_raw("0xde0b6b3a7640000", Some("0x9999999999999999999999999999999999999999"));
        let parsed = parse_raw_transaction(&raw, 42).unwrap();
        assert_eq!(
            parsed.tx_hash,
            b256!("1111111111111111111111111111111111111111111111111111111111111111")
        );
        assert_eq!(parsed.from, address!("33381eC82DD811b1BABa841f1e2410468aeD7047"));
        assert_eq!(parsed.to, Some(address!("9999999999999999999999999999999999999999")));
        assert_eq!(parsed.value, U256::from(1_000_000_000_000_000_000u128));
        assert_eq!(parsed.block_number, Some(42));
    }

    #[test]
    fn test_parse_raw_contract_creation() {
        let parsed = parse_raw_transaction(&make_raw("0x0", None), 1).unwrap();
        assert_eq!(parsed.to, None);
        assert!(parsed.value.is_zero());
    }

    #[test]
    fn test_parse_raw_rejects_malformed() {
        let mut raw = make_raw("0x1", None);
        raw.from = Some("not-an-address".to_string());
        assert!(parse_raw_transaction(&raw, 1).is_none());

        let raw = make_raw("0xzz", None);
        assert!(parse_raw_transaction(&raw, 1).is_none());
    }

    #[test]
    fn test_raw_block_deserializes() {
        let json = serde_json::json!({
            "number": "0x2a",
            "transactions": [
                { "hash": "0x1111111111111111111111111111111111111111111111111111111111111111",
                  "from": "0x33381ec82dd811b1baba841f1e2410468aed7047",
                  "to": null,
                  "value": "0x10",
                  "type": "0x6a" }
            ]
        });
        let block: RawBlock = serde_json::from_value(json).unwrap();
        assert_eq!(block.transactions.len(), 1);
        let parsed = parse_raw_transaction(&block.transactions[0], 42).unwrap();
        assert_eq!(parsed.value, U256::from(16));
    }

    #[test]
    fn test_error_classification() {
        assert!(is_unsupported_subscription("notifications not supported"));
        assert!(is_unsupported_subscription("PubSub unavailable"));
        assert!(!is_unsupported_subscription("connection reset by peer"));

        assert!(is_unsupported_encoding("transaction type not supported"));
        assert!(!is_unsupported_encoding("timeout"));
    }

    #[test]
    fn test_log_filter_to_filter() {
        let filter = LogFilter {
            addresses: vec![address!("33381eC82DD811b1BABa841f1e2410468aeD7047")],
            ..Default::default()
        };
        let built = filter.to_filter();
        assert!(built.address.matches(&address!("33381eC82DD811b1BABa841f1e2410468aeD7047")));
        assert!(!built.address.matches(&address!("9999999999999999999999999999999999999999")));
    }
}
