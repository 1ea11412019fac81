#![allow(dead_code)]

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
pub use pairtrader::domain::bar::Bar;
use pairtrader::domain::error::TraderError;
use pairtrader::domain::pair_config::{PairBook, PairConfig};
use pairtrader::domain::trade::TradeRecord;
use pairtrader::ports::broker_port::{BrokerPort, BrokerPosition, OrderRequest};
use pairtrader::ports::clock_port::Clock;
use pairtrader::ports::data_port::MarketDataPort;
use pairtrader::ports::trade_log_port::TradeLogPort;
use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
    pub calls: Cell<usize>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            calls: Cell::new(0),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl MarketDataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        lookback: Option<usize>,
        _granularity: &str,
    ) -> Result<Vec<Bar>, TraderError> {
        self.calls.set(self.calls.get() + 1);
        if let Some(reason) = self.errors.get(symbol) {
            return Err(TraderError::DataFetch {
                symbol: symbol.to_string(),
                reason: reason.clone(),
            });
        }
        let mut bars = self.data.get(symbol).cloned().unwrap_or_default();
        if let Some(n) = lookback {
            let start = bars.len().saturating_sub(n);
            bars.drain(..start);
        }
        Ok(bars)
    }
}

/// Broker double that records orders. Fills move positions unless
/// `ignore_fills` is set, which simulates a position closed behind our back.
#[derive(Default)]
pub struct MockBroker {
    pub orders: Vec<OrderRequest>,
    pub positions: HashMap<String, BrokerPosition>,
    pub rejected: HashSet<String>,
    pub balance_error: bool,
    pub ignore_fills: bool,
    pub cash: f64,
}

impl MockBroker {
    pub fn new(cash: f64) -> Self {
        Self {
            cash,
            ..Default::default()
        }
    }

    pub fn with_position(mut self, symbol: &str, units: f64, average_price: f64) -> Self {
        self.positions.insert(
            symbol.to_string(),
            BrokerPosition {
                units,
                average_price,
            },
        );
        self
    }

    pub fn rejecting(mut self, symbol: &str) -> Self {
        self.rejected.insert(symbol.to_string());
        self
    }
}

impl BrokerPort for MockBroker {
    fn submit_order(&mut self, order: &OrderRequest) -> Result<(), TraderError> {
        if self.rejected.contains(&order.symbol) {
            return Err(TraderError::OrderRejected {
                symbol: order.symbol.clone(),
                reason: "insufficient margin".into(),
            });
        }
        self.orders.push(order.clone());
        if !self.ignore_fills {
            let pos = self.positions.entry(order.symbol.clone()).or_default();
            pos.units += order.units;
            pos.average_price = if pos.units == 0.0 {
                0.0
            } else {
                order.reference_price
            };
        }
        Ok(())
    }

    fn position(&self, symbol: &str) -> Result<BrokerPosition, TraderError> {
        Ok(self.positions.get(symbol).copied().unwrap_or_default())
    }

    fn balance(&self) -> Result<f64, TraderError> {
        if self.balance_error {
            return Err(TraderError::BrokerQuery {
                reason: "account endpoint unavailable".into(),
            });
        }
        Ok(self.cash)
    }
}

#[derive(Default)]
pub struct RecordingLog {
    pub records: Vec<TradeRecord>,
    pub fail: bool,
}

impl TradeLogPort for RecordingLog {
    fn append(&mut self, record: &TradeRecord) -> Result<(), TraderError> {
        if self.fail {
            return Err(TraderError::TradeLog {
                reason: "disk full".into(),
            });
        }
        self.records.push(record.clone());
        Ok(())
    }
}

/// Simulated clock: sleeping advances `now` and is recorded.
pub struct FixedClock {
    pub now: DateTime<Utc>,
    pub sleeps: Vec<Duration>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            sleeps: Vec::new(),
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn sleep(&mut self, duration: Duration) {
        self.sleeps.push(duration);
        if let Ok(step) = ChronoDuration::from_std(duration) {
            self.now += step;
        }
    }
}

pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

/// Wednesday 2024-01-03 10:00 US/Eastern.
pub fn open_market() -> DateTime<Utc> {
    utc(2024, 1, 3, 15, 0)
}

/// Saturday 2024-01-06 10:00 US/Eastern.
pub fn weekend() -> DateTime<Utc> {
    utc(2024, 1, 6, 15, 0)
}

pub fn make_bar(symbol: &str, timestamp: DateTime<Utc>, close: f64) -> Bar {
    Bar {
        symbol: symbol.to_string(),
        timestamp,
        open: close,
        high: close,
        low: close,
        close,
    }
}

/// Five-minute bars starting at `start`.
pub fn bars_at(symbol: &str, start: DateTime<Utc>, closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| make_bar(symbol, start + ChronoDuration::minutes(5 * i as i64), close))
        .collect()
}

/// Short indicator spans so a handful of bars produce signals.
pub fn fast_pair(symbol: &str) -> PairConfig {
    let mut cfg = PairConfig::new(symbol, 0.02, 0.015, 10.0);
    cfg.rsi_period = 2;
    cfg.ema_short = 2;
    cfg.ema_long = 4;
    cfg
}

pub fn fast_book(symbols: &[&str]) -> PairBook {
    symbols
        .iter()
        .fold(PairBook::new(), |book, s| book.with_pair(s, fast_pair(s)))
}
