//! Event classifier. Turns raw logs and native transfers into titled,
//! importance-tagged alerts.

use std::fmt::Write as _;
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use chrono::Utc;
use sentinel_common::types::{
    ClassifiedEvent, Direction, RawLogEvent, RawNativeTransfer, ReceiptSummary, format_timestamp,
};
use sentinel_common::watchlist::WatchList;
use sentinel_decoders::resolver::EventNameResolver;
use sentinel_decoders::signatures::{DIAMOND_CUT, MODULE_INSTALLED_TOPIC};
use sentinel_decoders::tokens::{format_amount, to_units_f64};
use sentinel_decoders::transfer::{TransferDetails, decode_transfer};

use crate::importance::{DEFAULT_USD_THRESHOLD, is_important_usd, mentions_module_install};
use crate::price::PriceOracle;

/// USD valuations above this are treated as bad price data.
pub const MAX_PLAUSIBLE_USD: f64 = 1_000_000.0;

const IMPORTANT_MARK: &str = "🔴";
const NORMAL_MARK: &str = "🔵";

/// Tunables for classification.
#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub usd_threshold: f64,
    pub native_usd_price: f64,
    pub native_symbol: String,
    pub special_wallet: Address,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            usd_threshold: DEFAULT_USD_THRESHOLD,
            native_usd_price: 3000.0,
            native_symbol: "ETH".to_string(),
            special_wallet: Address::ZERO,
        }
    }
}

pub struct EventClassifier {
    watch: Arc<WatchList>,
    names: Arc<EventNameResolver>,
    oracle: Arc<PriceOracle>,
    settings: ClassifierSettings,
}

impl EventClassifier {
    pub fn new(
        watch: Arc<WatchList>,
        names: Arc<EventNameResolver>,
        oracle: Arc<PriceOracle>,
        settings: ClassifierSettings,
    ) -> Self {
        Self {
            watch,
            names,
            oracle,
            settings,
        }
    }

    pub fn settings(&self) -> &ClassifierSettings {
        &self.settings
    }

    /// Classify one log. `None` means the log produces no alert.
    pub async fn classify_log(&self, log: &RawLogEvent) -> Option<ClassifiedEvent> {
        let topic0 = log.topic0()?;
        let label = self.watch.label(&log.contract_address);
        let tx = tx_display(log);
        let now = format_timestamp(Utc::now());

        if topic0 == MODULE_INSTALLED_TOPIC {
            let title = format!("{IMPORTANT_MARK} [{label}] InstallModule");
            let body = format!(
                "📋 Tx: {tx}\n🔧 Module: {}\n⏰ Time: {now}",
                alloy::hex::encode(&log.data)
            );
            return Some(ClassifiedEvent::new(title, body, true));
        }

        if let Some(transfer) = decode_transfer(log) {
            return self
                .classify_transfer(log, transfer, &label, &tx, &now)
                .await;
        }

        let name = self.names.resolve(&log.contract_address, &topic0);
        if name.eq_ignore_ascii_case(DIAMOND_CUT) {
            let title = format!("{IMPORTANT_MARK} [{label}] InstallModule");
            let body = format!("📋 Tx: {tx}\n⚙️ Event: DiamondCut→InstallModule\n⏰ Time: {now}");
            return Some(ClassifiedEvent::new(title, body, true));
        }

        let body = format!("📋 Tx: {tx}\n⏰ Time: {now}");
        Some(marked(&label, &name, body, false))
    }

    async fn classify_transfer(
        &self,
        log: &RawLogEvent,
        transfer: TransferDetails,
        label: &str,
        tx: &str,
        now: &str,
    ) -> Option<ClassifiedEvent> {
        let from_watched = self.watch.is_watched(&transfer.from);
        let to_watched = self.watch.is_watched(&transfer.to);
        if !from_watched && !to_watched {
            return None;
        }

        let token = log.contract_address;
        let tokens = self.oracle.tokens();
        let symbol = tokens.symbol(&token);
        let decimals = tokens.decimals(&token);
        let usd = self.estimate_usd(token, transfer.value, decimals).await;

        let mut body = String::new();
        let _ = writeln!(body, "📋 Tx: {tx}");
        let _ = writeln!(body, "📤 From: {}", transfer.from);
        let _ = writeln!(body, "📥 To: {}", transfer.to);
        let amount = format_amount(transfer.value, decimals);
        match symbol {
            Some(sym) => {
                let _ = writeln!(body, "💰 Value: {amount} {sym}");
            }
            None => {
                let _ = writeln!(body, "💰 Value: {amount}");
            }
        }
        if let Some(usd) = usd.filter(|v| *v > 0.0) {
            let _ = writeln!(body, "💵 USD: ~${usd:.2}");
        }
        if transfer.involves(&self.settings.special_wallet) {
            body.push_str("🚨 SPECIAL WALLET INVOLVED\n");
        }
        let _ = write!(body, "⏰ Time: {now}");

        let category = match symbol {
            Some(sym) => sym,
            None => label,
        };
        let important = is_important_usd(usd, self.settings.usd_threshold);
        tracing::debug!(
            token = %token,
            usd = usd.unwrap_or(0.0),
            threshold = self.settings.usd_threshold,
            important,
            "Transfer importance"
        );
        Some(marked(category, "Transfer", body, important))
    }

    /// USD value of a token amount. Tokens outside the known table are
    /// still priced, with default decimals.
    async fn estimate_usd(&self, token: Address, value: U256, decimals: u8) -> Option<f64> {
        let price = match self.oracle.lookup(token).await {
            Ok(price) => price,
            Err(e) => {
                tracing::debug!(token = %token, error = %e, "Transfer left unpriced");
                return None;
            }
        };
        let usd = to_units_f64(value, decimals) * price;
        if usd > MAX_PLAUSIBLE_USD {
            tracing::warn!(token = %token, usd, "Implausible USD value discarded");
            return None;
        }
        Some(usd)
    }

    /// Classify a native transfer. `None` when neither side is watched.
    pub fn classify_native(
        &self,
        transfer: &RawNativeTransfer,
        receipt: Option<ReceiptSummary>,
    ) -> Option<ClassifiedEvent> {
        let from_watched = self.watch.is_watched(&transfer.from);
        let to_watched = transfer.to.is_some_and(|to| self.watch.is_watched(&to));
        if !from_watched && !to_watched {
            return None;
        }
        let direction = Direction::from_sides(from_watched, to_watched);

        let units = to_units_f64(transfer.value, 18);
        let usd = units * self.settings.native_usd_price;
        let symbol = &self.settings.native_symbol;
        let to = transfer
            .to
            .map_or_else(|| "contract creation".to_string(), |a| a.to_string());
        let (status, gas) = match receipt {
            Some(r) => (
                r.status_label().to_string(),
                format!("{:.2} gwei", r.gas_price_gwei()),
            ),
            None => ("unknown".to_string(), "n/a".to_string()),
        };

        let body = format!(
            "📋 Tx: {:#x}\n📤 From: {}\n📥 To: {to}\n💰 Value: {units:.6} {symbol}\n💵 USD: ~${usd:.2}\n🏷️ Dir: {direction}\n📊 Status: {status}\n⛽ Gas: {gas}\n⏰ Time: {}",
            transfer.tx_hash,
            transfer.from,
            format_timestamp(Utc::now()),
        );
        let important = is_important_usd(Some(usd), self.settings.usd_threshold);
        Some(marked(symbol, "Transfer (native)", body, important))
    }
}

/// Build the event with a title marker and the keyword override applied.
fn marked(category: &str, name: &str, body: String, important: bool) -> ClassifiedEvent {
    let headline = format!("[{category}] {name}");
    let important = important || mentions_module_install(&headline, &body);
    let mark = if important { IMPORTANT_MARK } else { NORMAL_MARK };
    ClassifiedEvent::new(format!("{mark} {headline}"), body, important)
}

fn tx_display(log: &RawLogEvent) -> String {
    log.tx_hash
        .map_or_else(|| "unknown".to_string(), |h| format!("{h:#x}"))
}
