//! MACD (Moving Average Convergence Divergence).
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! All EMAs are first-value seeded, so the output is aligned with the input
//! and has no warmup.

use crate::domain::indicator::ema::ema;

pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Macd {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(values: &[f64], fast: usize, slow: usize, signal_period: usize) -> Macd {
    if values.is_empty() || fast == 0 || slow == 0 || signal_period == 0 {
        return Macd::default();
    }

    let ema_fast = ema(values, fast);
    let ema_slow = ema(values, slow);

    let line: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| f - s)
        .collect();
    let signal = ema(&line, signal_period);
    let histogram = line.iter().zip(&signal).map(|(l, s)| l - s).collect();

    Macd {
        line,
        signal,
        histogram,
    }
}
