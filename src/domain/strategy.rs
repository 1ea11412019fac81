//! Per-bar decision shared by the backtest and live loops.

use crate::domain::execution::check_triggers;
use crate::domain::indicator::IndicatorSeries;
use crate::domain::pair_config::PairConfig;
use crate::domain::position::{PositionState, Side};
use crate::domain::signal::{entry_signal, exit_signal, ExitReason, Signal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Hold,
    Enter(Side),
    Exit(ExitReason),
}

/// One action per bar: a flat symbol may enter, an open one may exit.
///
/// For an open position the indicator exit is checked first, then stop-loss,
/// then take-profit, all against `close`.
pub fn decide(
    state: &PositionState,
    series: &IndicatorSeries,
    index: i64,
    close: f64,
    config: &PairConfig,
) -> Decision {
    match state {
        PositionState::Flat => match entry_signal(series, index, config) {
            Signal::Buy => Decision::Enter(Side::Long),
            Signal::Sell => Decision::Enter(Side::Short),
            Signal::Hold => Decision::Hold,
        },
        PositionState::Open(position) => exit_signal(series, index, position.side, config)
            .or_else(|| check_triggers(position, close, config))
            .map_or(Decision::Hold, Decision::Exit),
    }
}
