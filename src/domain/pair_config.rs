//! Per-symbol strategy parameters and the ordered symbol book.

use crate::domain::error::TraderError;
use crate::domain::indicator::macd::DEFAULT_SIGNAL;

pub const DEFAULT_RSI_PERIOD: usize = 14;
pub const DEFAULT_RSI_UP: f64 = 70.0;
pub const DEFAULT_RSI_DOWN: f64 = 30.0;
pub const DEFAULT_EMA_SHORT: usize = 12;
pub const DEFAULT_EMA_LONG: usize = 26;
pub const DEFAULT_LOOKBACK: usize = 100;
pub const DEFAULT_GRANULARITY: &str = "M5";

#[derive(Debug, Clone, PartialEq)]
pub struct PairConfig {
    pub rsi_period: usize,
    pub rsi_up: f64,
    pub rsi_down: f64,
    pub ema_short: usize,
    pub ema_long: usize,
    pub macd_signal: usize,
    pub sl_pct: f64,
    pub tp_pct: f64,
    pub position_size: f64,
    pub lookback: usize,
    pub granularity: String,
    pub quote_currency: String,
}

impl PairConfig {
    /// Parameters with library defaults and the given risk settings.
    pub fn new(symbol: &str, sl_pct: f64, tp_pct: f64, position_size: f64) -> Self {
        PairConfig {
            rsi_period: DEFAULT_RSI_PERIOD,
            rsi_up: DEFAULT_RSI_UP,
            rsi_down: DEFAULT_RSI_DOWN,
            ema_short: DEFAULT_EMA_SHORT,
            ema_long: DEFAULT_EMA_LONG,
            macd_signal: DEFAULT_SIGNAL,
            sl_pct,
            tp_pct,
            position_size,
            lookback: DEFAULT_LOOKBACK,
            granularity: DEFAULT_GRANULARITY.to_string(),
            quote_currency: quote_currency(symbol),
        }
    }

    pub fn quoted_in_usd(&self) -> bool {
        self.quote_currency.eq_ignore_ascii_case("USD")
    }
}

/// Quote currency inferred from a pair symbol.
///
/// Handles `EUR_USD`, `EUR/USD`, `EURUSD` and the `EURUSD=X` ticker form;
/// the quote is the last three letters once separators and suffix are removed.
pub fn quote_currency(symbol: &str) -> String {
    let base = symbol.split('=').next().unwrap_or(symbol);
    let letters: String = base.chars().filter(|c| c.is_ascii_alphabetic()).collect();
    let start = letters.len().saturating_sub(3);
    letters[start..].to_ascii_uppercase()
}

/// Ordered symbol → config mapping. Insertion order is the iteration order
/// used for backtest tie-breaks and live polling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairBook {
    pairs: Vec<(String, PairConfig)>,
}

impl PairBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(mut self, symbol: &str, config: PairConfig) -> Self {
        self.insert(symbol, config);
        self
    }

    /// Insert or replace; a replaced symbol keeps its original position.
    pub fn insert(&mut self, symbol: &str, config: PairConfig) {
        match self.pairs.iter_mut().find(|(s, _)| s == symbol) {
            Some(slot) => slot.1 = config,
            None => self.pairs.push((symbol.to_string(), config)),
        }
    }

    pub fn get(&self, symbol: &str) -> Result<&PairConfig, TraderError> {
        self.pairs
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, c)| c)
            .ok_or_else(|| TraderError::UnknownSymbol {
                symbol: symbol.to_string(),
            })
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(s, _)| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PairConfig)> {
        self.pairs.iter().map(|(s, c)| (s.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
