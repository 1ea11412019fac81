//! Fill simulation and exit settlement.
//!
//! Slippage is an absolute price offset against the trader, commission is a
//! rate on notional with a floor, and profit is realized only on exit.

use crate::domain::pair_config::PairConfig;
use crate::domain::position::{OpenPosition, Side};
use crate::domain::signal::ExitReason;

pub const COMMISSION_RATE: f64 = 0.000035;
pub const MIN_COMMISSION: f64 = 0.01;
pub const DEFAULT_SLIPPAGE: f64 = 0.001;

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    /// Absolute price offset applied against every exit fill.
    pub slippage: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            slippage: DEFAULT_SLIPPAGE,
        }
    }
}

/// max(rate * size * price, floor). Uses the bar close, not the slipped fill.
pub fn calculate_commission(position_size: f64, close_price: f64) -> f64 {
    (COMMISSION_RATE * position_size * close_price).max(MIN_COMMISSION)
}

/// Long exit (sell): execution_price = market_price - slippage
pub fn apply_slippage_long_exit(market_price: f64, slippage: f64) -> f64 {
    market_price - slippage
}

/// Short exit (buy to cover): execution_price = market_price + slippage
pub fn apply_slippage_short_exit(market_price: f64, slippage: f64) -> f64 {
    market_price + slippage
}

pub fn exit_fill_price(side: Side, market_price: f64, slippage: f64) -> f64 {
    match side {
        Side::Long => apply_slippage_long_exit(market_price, slippage),
        Side::Short => apply_slippage_short_exit(market_price, slippage),
    }
}

/// Price profit of a round trip, before commission.
///
/// A pair not quoted in USD has its profit divided by the exit price. This is
/// a rough quote-to-USD approximation, not a cross-rate conversion.
pub fn gross_profit(
    position: &OpenPosition,
    exit_price: f64,
    position_size: f64,
    quoted_in_usd: bool,
) -> f64 {
    let profit = match position.side {
        Side::Long => (exit_price - position.entry_price) * position_size,
        Side::Short => (position.entry_price - exit_price) * position_size,
    };
    if quoted_in_usd {
        profit
    } else {
        profit / exit_price
    }
}

/// Outcome of closing a position.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub exit_price: f64,
    pub gross_profit: f64,
    pub commission: f64,
    /// Gross profit less commission; this is what moves the balance.
    pub profit: f64,
}

/// Settle an exit at the bar close.
///
/// Steps:
/// 1. Apply slippage against the position's direction
/// 2. Price profit on the slipped fill, converted when not quoted in USD
/// 3. Commission on size * close, floored
/// 4. Net profit = gross - commission
pub fn settle_exit(
    position: &OpenPosition,
    close_price: f64,
    config: &PairConfig,
    execution: &ExecutionConfig,
) -> Settlement {
    let exit_price = exit_fill_price(position.side, close_price, execution.slippage);
    let gross = gross_profit(
        position,
        exit_price,
        config.position_size,
        config.quoted_in_usd(),
    );
    let commission = calculate_commission(config.position_size, close_price);

    Settlement {
        exit_price,
        gross_profit: gross,
        commission,
        profit: gross - commission,
    }
}

/// Stop-loss then take-profit, first hit wins.
pub fn check_triggers(
    position: &OpenPosition,
    close_price: f64,
    config: &PairConfig,
) -> Option<ExitReason> {
    if position.should_stop_loss(close_price, config.sl_pct) {
        Some(ExitReason::StopLoss)
    } else if position.should_take_profit(close_price, config.tp_pct) {
        Some(ExitReason::TakeProfit)
    } else {
        None
    }
}
