//! Signal evaluation over an [`IndicatorSeries`].
//!
//! Every function here is total: any `i64` index is accepted, and an index
//! outside the series or an undefined indicator value yields `Hold` (or
//! `Trend::None`) rather than an error.

use std::fmt;

use crate::domain::indicator::IndicatorSeries;
use crate::domain::pair_config::PairConfig;
use crate::domain::position::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Bull,
    Bear,
    Flat,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    RsiReversal,
    StopLoss,
    TakeProfit,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "BUY"),
            Signal::Sell => write!(f, "SELL"),
            Signal::Hold => write!(f, "HOLD"),
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Bull => write!(f, "BULL"),
            Trend::Bear => write!(f, "BEAR"),
            Trend::Flat => write!(f, "FLAT"),
            Trend::None => write!(f, "NONE"),
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::RsiReversal => write!(f, "RSI Reversal"),
            ExitReason::StopLoss => write!(f, "Stop Loss"),
            ExitReason::TakeProfit => write!(f, "Take Profit"),
        }
    }
}

/// Resolve `index` and its predecessor; both must be valid.
fn pair_at(series: &IndicatorSeries, index: i64) -> Option<(usize, usize)> {
    let curr = series.resolve(index)?;
    let prev = series.resolve(index.checked_sub(1)?)?;
    Some((prev, curr))
}

/// Short/long EMA crossover between `index - 1` and `index`.
pub fn ema_crossover_signal(series: &IndicatorSeries, index: i64) -> Signal {
    let Some((prev, curr)) = pair_at(series, index) else {
        return Signal::Hold;
    };

    let (prev_short, prev_long) = (series.ema_short[prev], series.ema_long[prev]);
    let (curr_short, curr_long) = (series.ema_short[curr], series.ema_long[curr]);

    if prev_short < prev_long && curr_short > curr_long {
        Signal::Buy
    } else if prev_short > prev_long && curr_short < curr_long {
        Signal::Sell
    } else {
        Signal::Hold
    }
}

/// EMA relationship at a single bar. Valid from index 0.
pub fn ema_trend(series: &IndicatorSeries, index: i64) -> Trend {
    let Some(i) = series.resolve(index) else {
        return Trend::None;
    };

    let (short, long) = (series.ema_short[i], series.ema_long[i]);
    if short > long {
        Trend::Bull
    } else if short < long {
        Trend::Bear
    } else {
        Trend::Flat
    }
}

/// Oversold / overbought thresholds. Undefined RSI is never a trigger.
pub fn rsi_signal(series: &IndicatorSeries, index: i64, rsi_up: f64, rsi_down: f64) -> Signal {
    let Some(value) = series.resolve(index).and_then(|i| series.rsi[i]) else {
        return Signal::Hold;
    };
    if value.is_nan() {
        return Signal::Hold;
    }

    if value < rsi_down {
        Signal::Buy
    } else if value > rsi_up {
        Signal::Sell
    } else {
        Signal::Hold
    }
}

/// MACD histogram sign change between `index - 1` and `index`.
pub fn macd_crossover_signal(series: &IndicatorSeries, index: i64) -> Signal {
    let Some((prev, curr)) = pair_at(series, index) else {
        return Signal::Hold;
    };

    let (prev_hist, curr_hist) = (series.macd_hist[prev], series.macd_hist[curr]);
    if prev_hist < 0.0 && curr_hist > 0.0 {
        Signal::Buy
    } else if prev_hist > 0.0 && curr_hist < 0.0 {
        Signal::Sell
    } else {
        Signal::Hold
    }
}

/// Composite entry rule.
///
/// RSI oversold alone opens a long; a short additionally needs a bearish EMA
/// trend. The two sides are intentionally not symmetric.
pub fn entry_signal(series: &IndicatorSeries, index: i64, config: &PairConfig) -> Signal {
    let rsi = rsi_signal(series, index, config.rsi_up, config.rsi_down);
    let trend = ema_trend(series, index);

    match (rsi, trend) {
        (Signal::Buy, _) => Signal::Buy,
        (Signal::Sell, Trend::Bear) => Signal::Sell,
        _ => Signal::Hold,
    }
}

/// Composite exit rule for an open position.
///
/// Stop-loss and take-profit are not checked here.
pub fn exit_signal(
    series: &IndicatorSeries,
    index: i64,
    side: Side,
    config: &PairConfig,
) -> Option<ExitReason> {
    let rsi = rsi_signal(series, index, config.rsi_up, config.rsi_down);
    let trend = ema_trend(series, index);

    let reversal = match side {
        Side::Long => rsi == Signal::Sell && trend != Trend::Bull,
        Side::Short => rsi == Signal::Buy && trend != Trend::Bear,
    };
    reversal.then_some(ExitReason::RsiReversal)
}
