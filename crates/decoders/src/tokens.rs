use alloy::primitives::utils::format_units;
use alloy::primitives::{Address, U256, address};

/// Static metadata for a token the pipeline knows how to value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenInfo {
    pub address: Address,
    pub symbol: &'static str,
    pub decimals: u8,
    pub stablecoin: bool,
}

const KNOWN_TOKENS: &[TokenInfo] = &[
    TokenInfo {
        address: address!("Fd086bC7CD5C481DCC9C85ebE478A1C0b69FCbb9"),
        symbol: "USDT",
        decimals: 6,
        stablecoin: true,
    },
    TokenInfo {
        address: address!("82aF49447D8a07e3bd95BD0d56f35241523fBab1"),
        symbol: "WETH",
        decimals: 18,
        stablecoin: false,
    },
    TokenInfo {
        address: address!("2f2a2543B76A4166549F7aaB2e75Bef0aefC5B0f"),
        symbol: "WBTC",
        decimals: 8,
        stablecoin: false,
    },
    TokenInfo {
        address: address!("af88d065e77c8cC2239327C5EDb3A432268e5831"),
        symbol: "USDC",
        decimals: 6,
        stablecoin: true,
    },
    // legacy USDC deployment
    TokenInfo {
        address: address!("EA1523eB5F0ecDdB1875122aC2c9470a978e3010"),
        symbol: "USDC",
        decimals: 6,
        stablecoin: true,
    },
    TokenInfo {
        address: address!("c5eFb9E4EfD91E68948d5039819494Eea56FFA46"),
        symbol: "PAXG",
        decimals: 18,
        stablecoin: false,
    },
];

/// Decimals assumed for tokens outside the table.
pub const DEFAULT_DECIMALS: u8 = 18;

/// Lookup table of known tokens.
#[derive(Debug, Clone)]
pub struct TokenTable {
    tokens: Vec<TokenInfo>,
}

impl TokenTable {
    pub fn new() -> Self {
        Self {
            tokens: KNOWN_TOKENS.to_vec(),
        }
    }

    /// Table with custom entries, used by tests and alternate deployments.
    pub fn with_tokens(tokens: Vec<TokenInfo>) -> Self {
        Self { tokens }
    }

    pub fn get(&self, address: &Address) -> Option<&TokenInfo> {
        self.tokens.iter().find(|t| t.address == *address)
    }

    pub fn symbol(&self, address: &Address) -> Option<&'static str> {
        self.get(address).map(|t| t.symbol)
    }

    pub fn decimals(&self, address: &Address) -> u8 {
        self.get(address).map_or(DEFAULT_DECIMALS, |t| t.decimals)
    }

    pub fn is_stablecoin(&self, address: &Address) -> bool {
        self.get(address).is_some_and(|t| t.stablecoin)
    }
}

impl Default for TokenTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a raw integer amount with `decimals` places, trailing zeros removed.
pub fn format_amount(value: U256, decimals: u8) -> String {
    if value.is_zero() {
        return "0".to_string();
    }
    if decimals == 0 {
        return value.to_string();
    }
    match format_units(value, decimals) {
        Ok(s) if s.contains('.') => s
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string(),
        Ok(s) => s,
        Err(_) => value.to_string(),
    }
}

/// Convert a raw amount to a float in whole units.
pub fn to_units_f64(value: U256, decimals: u8) -> f64 {
    format_units(value, decimals)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0)
}
