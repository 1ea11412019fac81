//! Per-symbol bars with their indicator columns, and the merged backtest timeline.

use chrono::{DateTime, Utc};

use crate::domain::bar::{normalize, Bar};
use crate::domain::indicator::IndicatorSeries;
use crate::domain::pair_config::PairConfig;

#[derive(Debug, Clone)]
pub struct SymbolData {
    pub symbol: String,
    pub bars: Vec<Bar>,
    pub indicators: IndicatorSeries,
}

impl SymbolData {
    /// Bars are normalized first, so non-finite prices never reach the indicators.
    pub fn new(symbol: &str, bars: Vec<Bar>, config: &PairConfig) -> Self {
        let bars = normalize(bars);
        let indicators = IndicatorSeries::compute(&bars, config);
        SymbolData {
            symbol: symbol.to_string(),
            bars,
            indicators,
        }
    }
}

/// One bar of one symbol on the merged timeline. `slot` indexes the
/// `SymbolData` slice the timeline was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineEvent {
    pub timestamp: DateTime<Utc>,
    pub slot: usize,
    pub index: usize,
}

/// Every bar of every symbol, ordered by timestamp and then by slot.
///
/// Slot order is the configured symbol order, so simultaneous bars are
/// processed in that order.
pub fn build_unified_timeline(symbols: &[SymbolData]) -> Vec<TimelineEvent> {
    let mut events: Vec<TimelineEvent> = symbols
        .iter()
        .enumerate()
        .flat_map(|(slot, data)| {
            data.bars
                .iter()
                .enumerate()
                .map(move |(index, bar)| TimelineEvent {
                    timestamp: bar.timestamp,
                    slot,
                    index,
                })
        })
        .collect();
    events.sort_by_key(|e| (e.timestamp, e.slot));
    events
}
