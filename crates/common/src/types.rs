use alloy::primitives::{Address, B256, Bytes, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A monitored address and its display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedAddress {
    pub address: Address,
    pub label: String,
}

/// A log record as delivered by any ingestion path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLogEvent {
    pub contract_address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub tx_hash: Option<B256>,
    pub block_number: Option<u64>,
}

impl RawLogEvent {
    /// Primary topic (event signature hash), if any.
    pub fn topic0(&self) -> Option<B256> {
        self.topics.first().copied()
    }
}

impl From<&alloy::rpc::types::Log> for RawLogEvent {
    fn from(log: &alloy::rpc::types::Log) -> Self {
        Self {
            contract_address: log.address(),
            topics: log.topics().to_vec(),
            data: log.data().data.clone(),
            tx_hash: log.transaction_hash,
            block_number: log.block_number,
        }
    }
}

/// Movement of the base asset through a transaction's value field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNativeTransfer {
    pub tx_hash: B256,
    pub from: Address,
    /// `None` for contract creation
    pub to: Option<Address>,
    pub value: U256,
    pub block_number: Option<u64>,
}

/// Direction of a native transfer relative to the watched set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Internal,
    Out,
    In,
}

impl Direction {
    /// Both sides watched is internal; otherwise the watched side decides.
    pub fn from_sides(from_watched: bool, to_watched: bool) -> Self {
        match (from_watched, to_watched) {
            (true, true) => Direction::Internal,
            (true, false) => Direction::Out,
            _ => Direction::In,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Internal => write!(f, "internal"),
            Direction::Out => write!(f, "out"),
            Direction::In => write!(f, "in"),
        }
    }
}

/// Receipt fields surfaced in native transfer alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub success: bool,
    /// Effective gas price in wei
    pub effective_gas_price: u128,
}

impl ReceiptSummary {
    pub fn status_label(&self) -> &'static str {
        if self.success { "success" } else { "reverted" }
    }

    pub fn gas_price_gwei(&self) -> f64 {
        self.effective_gas_price as f64 / 1e9
    }
}

/// Human-readable alert ready for aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedEvent {
    pub title: String,
    pub body: String,
    pub important: bool,
    pub observed_at: DateTime<Utc>,
}

impl ClassifiedEvent {
    /// Module-install keywords in title or body force `important`.
    pub fn new(title: impl Into<String>, body: impl Into<String>, important: bool) -> Self {
        let title = title.into();
        let body = body.into();
        let important = important || mentions_module_install(&title, &body);
        Self {
            title,
            body,
            important,
            observed_at: Utc::now(),
        }
    }

    /// Title and body as one message.
    pub fn render(&self) -> String {
        if self.body.is_empty() {
            self.title.clone()
        } else {
            format!("{}\n{}", self.title, self.body)
        }
    }
}

/// Module-install keyword check over title and body, case-insensitive.
pub fn mentions_module_install(title: &str, body: &str) -> bool {
    let contains_keyword = |text: &str| {
        let lower = text.to_lowercase();
        lower.contains("moduleinstalled")
            || lower.contains("installmodule")
            || (lower.contains("install") && lower.contains("module"))
    };
    contains_keyword(title) || contains_keyword(body) || title.to_lowercase().contains("diamondcut")
}

/// Timestamp format used in alert bodies.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%d.%m.%Y %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_direction_from_sides() {
        assert_eq!(Direction::from_sides(true, true), Direction::Internal);
        assert_eq!(Direction::from_sides(true, false), Direction::Out);
        assert_eq!(Direction::from_sides(false, true), Direction::In);
    }

    #[test]
    fn test_receipt_summary() {
        let receipt = ReceiptSummary {
            success: false,
            effective_gas_price: 12_500_000_000,
        };
        assert_eq!(receipt.status_label(), "reverted");
        assert!((receipt.gas_price_gwei() - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_render_joins_title_and_body() {
        let event = ClassifiedEvent::new("🔵 [Main App] Approval", "Tx: 0x01", false);
        assert_eq!(event.render(), "🔵 [Main App] Approval\nTx: 0x01");

        let bare = ClassifiedEvent::new("ping", "", true);
        assert_eq!(bare.render(), "ping");
    }

    #[test]
    fn test_module_install_keyword_forces_importance() {
        let event = ClassifiedEvent::new(
            "🔵 [Hub] Upgrade",
            "Event: DiamondCut→InstallModule",
            false,
        );
        assert!(event.important);
        let event = ClassifiedEvent::new("🔵 [Hub] Approval", "Tx: 0x01", false);
        assert!(!event.important);
    }

    #[test]
    fn test_format_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 1).unwrap();
        assert_eq!(format_timestamp(at), "07.03.2024 09:05:01");
    }
}
