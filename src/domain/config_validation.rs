//! Configuration loading and validation.
//!
//! Everything is parsed and checked up front, before any bars are fetched or
//! indicators computed. The first violated invariant is reported.

use chrono::NaiveTime;
use chrono_tz::Tz;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::backtest::{BacktestConfig, DEFAULT_INITIAL_BALANCE};
use crate::domain::error::TraderError;
use crate::domain::execution::{ExecutionConfig, DEFAULT_SLIPPAGE};
use crate::domain::live::{
    LiveConfig, DEFAULT_BALANCE_CAP, DEFAULT_CLOSED_INTERVAL, DEFAULT_POLL_INTERVAL,
};
use crate::domain::pair_config::{quote_currency, PairBook, PairConfig};
use crate::domain::session::TradingHours;
use crate::ports::config_port::ConfigPort;

pub const PAIRS_SECTION: &str = "pairs";
pub const SESSION_SECTION: &str = "session";
pub const BACKTEST_SECTION: &str = "backtest";
pub const LIVE_SECTION: &str = "live";

/// Parse `[section] key` when present. Blank values count as absent.
pub fn parse_value<T>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, TraderError>
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = config.get_string(section, key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<T>()
        .map(Some)
        .map_err(|e| invalid(section, key, format!("cannot parse {raw:?}: {e}")))
}

pub fn value_or<T>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, TraderError>
where
    T: FromStr,
    T::Err: Display,
{
    Ok(parse_value(config, section, key)?.unwrap_or(default))
}

pub fn required_value<T>(config: &dyn ConfigPort, section: &str, key: &str) -> Result<T, TraderError>
where
    T: FromStr,
    T::Err: Display,
{
    parse_value(config, section, key)?.ok_or_else(|| TraderError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    })
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> TraderError {
    TraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// `[pairs] symbols`, comma separated. The listed order is the run order.
pub fn parse_symbols(config: &dyn ConfigPort) -> Result<Vec<String>, TraderError> {
    let raw = config
        .get_string(PAIRS_SECTION, "symbols")
        .unwrap_or_default();
    let mut symbols: Vec<String> = Vec::new();
    for symbol in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if symbols.iter().any(|s| s == symbol) {
            return Err(invalid(
                PAIRS_SECTION,
                "symbols",
                format!("{symbol} listed more than once"),
            ));
        }
        symbols.push(symbol.to_string());
    }
    if symbols.is_empty() {
        return Err(TraderError::ConfigMissing {
            section: PAIRS_SECTION.to_string(),
            key: "symbols".to_string(),
        });
    }
    Ok(symbols)
}

/// Read one `[<symbol>]` section. Risk settings are required; indicator
/// periods and thresholds fall back to defaults.
pub fn load_pair_config(config: &dyn ConfigPort, symbol: &str) -> Result<PairConfig, TraderError> {
    if !config.has_section(symbol) {
        return Err(TraderError::ConfigMissing {
            section: symbol.to_string(),
            key: "position_size".to_string(),
        });
    }

    let sl_pct = required_value(config, symbol, "sl_pct")?;
    let tp_pct = required_value(config, symbol, "tp_pct")?;
    let position_size = required_value(config, symbol, "position_size")?;
    let defaults = PairConfig::new(symbol, sl_pct, tp_pct, position_size);

    let pair = PairConfig {
        rsi_period: value_or(config, symbol, "rsi_period", defaults.rsi_period)?,
        rsi_up: value_or(config, symbol, "rsi_up", defaults.rsi_up)?,
        rsi_down: value_or(config, symbol, "rsi_down", defaults.rsi_down)?,
        ema_short: value_or(config, symbol, "ema_short", defaults.ema_short)?,
        ema_long: value_or(config, symbol, "ema_long", defaults.ema_long)?,
        macd_signal: value_or(config, symbol, "macd_signal", defaults.macd_signal)?,
        lookback: value_or(config, symbol, "lookback", defaults.lookback)?,
        granularity: value_or(config, symbol, "granularity", defaults.granularity.clone())?,
        quote_currency: value_or(config, symbol, "quote_currency", quote_currency(symbol))?
            .to_ascii_uppercase(),
        ..defaults
    };
    validate_pair_config(symbol, &pair)?;
    Ok(pair)
}

pub fn validate_pair_config(symbol: &str, pair: &PairConfig) -> Result<(), TraderError> {
    for (key, value) in [("rsi_up", pair.rsi_up), ("rsi_down", pair.rsi_down)] {
        if !(0.0..=100.0).contains(&value) {
            return Err(invalid(symbol, key, format!("{key} must be within [0, 100]")));
        }
    }
    if pair.rsi_down >= pair.rsi_up {
        return Err(invalid(symbol, "rsi_down", "rsi_down must be below rsi_up"));
    }
    for (key, value) in [
        ("rsi_period", pair.rsi_period),
        ("ema_short", pair.ema_short),
        ("ema_long", pair.ema_long),
        ("macd_signal", pair.macd_signal),
        ("lookback", pair.lookback),
    ] {
        if value < 1 {
            return Err(invalid(symbol, key, format!("{key} must be at least 1")));
        }
    }
    for (key, value) in [("sl_pct", pair.sl_pct), ("tp_pct", pair.tp_pct)] {
        if !(value >= 0.0 && value.is_finite()) {
            return Err(invalid(symbol, key, format!("{key} must be non-negative")));
        }
    }
    if !(pair.position_size > 0.0 && pair.position_size.is_finite()) {
        return Err(invalid(symbol, "position_size", "position_size must be positive"));
    }
    if pair.granularity.trim().is_empty() {
        return Err(invalid(symbol, "granularity", "granularity must not be empty"));
    }
    Ok(())
}

pub fn load_pair_book(config: &dyn ConfigPort) -> Result<PairBook, TraderError> {
    let mut book = PairBook::new();
    for symbol in parse_symbols(config)? {
        let pair = load_pair_config(config, &symbol)?;
        book.insert(&symbol, pair);
    }
    Ok(book)
}

fn parse_time(config: &dyn ConfigPort, key: &str, default: NaiveTime) -> Result<NaiveTime, TraderError> {
    match config.get_string(SESSION_SECTION, key) {
        None => Ok(default),
        Some(raw) => NaiveTime::parse_from_str(raw.trim(), "%H:%M")
            .map_err(|_| invalid(SESSION_SECTION, key, format!("invalid {key} time, expected HH:MM"))),
    }
}

pub fn load_trading_hours(config: &dyn ConfigPort) -> Result<TradingHours, TraderError> {
    let defaults = TradingHours::default();
    let timezone = match config.get_string(SESSION_SECTION, "timezone") {
        None => defaults.timezone,
        Some(raw) => raw.trim().parse::<Tz>().map_err(|_| {
            invalid(SESSION_SECTION, "timezone", format!("unknown timezone {:?}", raw.trim()))
        })?,
    };
    let start = parse_time(config, "start", defaults.start)?;
    let end = parse_time(config, "end", defaults.end)?;
    if start >= end {
        return Err(invalid(SESSION_SECTION, "start", "start must be before end"));
    }
    Ok(TradingHours {
        timezone,
        start,
        end,
    })
}

pub fn load_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, TraderError> {
    let initial_balance: f64 =
        value_or(config, BACKTEST_SECTION, "initial_balance", DEFAULT_INITIAL_BALANCE)?;
    if !(initial_balance > 0.0 && initial_balance.is_finite()) {
        return Err(invalid(
            BACKTEST_SECTION,
            "initial_balance",
            "initial_balance must be positive",
        ));
    }
    let slippage: f64 = value_or(config, BACKTEST_SECTION, "slippage", DEFAULT_SLIPPAGE)?;
    if !(slippage >= 0.0 && slippage.is_finite()) {
        return Err(invalid(BACKTEST_SECTION, "slippage", "slippage must be non-negative"));
    }

    Ok(BacktestConfig {
        initial_balance,
        execution: ExecutionConfig { slippage },
        session: load_trading_hours(config)?,
    })
}

pub fn load_live_config(config: &dyn ConfigPort) -> Result<LiveConfig, TraderError> {
    let poll: u64 = value_or(
        config,
        LIVE_SECTION,
        "poll_interval_secs",
        DEFAULT_POLL_INTERVAL.as_secs(),
    )?;
    let closed: u64 = value_or(
        config,
        LIVE_SECTION,
        "closed_interval_secs",
        DEFAULT_CLOSED_INTERVAL.as_secs(),
    )?;
    let balance_cap: f64 = value_or(config, LIVE_SECTION, "balance_cap", DEFAULT_BALANCE_CAP)?;
    if !(balance_cap > 0.0) {
        return Err(invalid(LIVE_SECTION, "balance_cap", "balance_cap must be positive"));
    }

    Ok(LiveConfig {
        poll_interval: Duration::from_secs(poll),
        closed_interval: Duration::from_secs(closed),
        balance_cap,
        session: load_trading_hours(config)?,
    })
}
