//! Technical indicators over a single symbol's close prices.
//!
//! Each indicator is a pure function from a price slice to a column aligned
//! index-for-index with it. [`IndicatorSeries`] bundles the columns the signal
//! evaluator reads for one symbol.

pub mod ema;
pub mod macd;
pub mod rsi;

pub use ema::ema;
pub use macd::{macd, Macd};
pub use rsi::rsi;

use crate::domain::bar::{closes, Bar};
use crate::domain::pair_config::PairConfig;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorSeries {
    pub ema_short: Vec<f64>,
    pub ema_long: Vec<f64>,
    /// `None` where there is not yet enough history.
    pub rsi: Vec<Option<f64>>,
    pub macd: Vec<f64>,
    pub signal_line: Vec<f64>,
    pub macd_hist: Vec<f64>,
}

impl IndicatorSeries {
    /// Compute every column from bars using the pair's periods.
    ///
    /// Recomputing over the same bars yields identical values, and values at an
    /// index depend only on bars up to that index.
    pub fn compute(bars: &[Bar], config: &PairConfig) -> Self {
        Self::from_closes(&closes(bars), config)
    }

    pub fn from_closes(values: &[f64], config: &PairConfig) -> Self {
        let Macd {
            line,
            signal,
            histogram,
        } = macd(values, config.ema_short, config.ema_long, config.macd_signal);

        IndicatorSeries {
            ema_short: ema(values, config.ema_short),
            ema_long: ema(values, config.ema_long),
            rsi: rsi(values, config.rsi_period),
            macd: line,
            signal_line: signal,
            macd_hist: histogram,
        }
    }

    pub fn len(&self) -> usize {
        self.ema_short.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the most recent bar, or -1 when empty.
    pub fn last_index(&self) -> i64 {
        self.len() as i64 - 1
    }

    /// Map an arbitrary index onto a position valid for every column.
    pub fn resolve(&self, index: i64) -> Option<usize> {
        let i = usize::try_from(index).ok()?;
        let valid = i < self.ema_short.len()
            && i < self.ema_long.len()
            && i < self.rsi.len()
            && i < self.macd_hist.len();
        valid.then_some(i)
    }
}
