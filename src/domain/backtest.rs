//! Backtest engine: a deterministic fold over the merged multi-symbol timeline.

use tracing::{debug, info};

use crate::domain::error::TraderError;
use crate::domain::execution::ExecutionConfig;
use crate::domain::pair_config::{PairBook, PairConfig};
use crate::domain::portfolio::Portfolio;
use crate::domain::session::TradingHours;
use crate::domain::strategy::{decide, Decision};
use crate::domain::symbol_data::{build_unified_timeline, SymbolData};

pub const DEFAULT_INITIAL_BALANCE: f64 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_balance: f64,
    pub execution: ExecutionConfig,
    pub session: TradingHours,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_balance: DEFAULT_INITIAL_BALANCE,
            execution: ExecutionConfig::default(),
            session: TradingHours::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub portfolio: Portfolio,
    pub bars_processed: usize,
    pub bars_skipped: usize,
}

/// Replay every symbol's bars in timestamp order.
///
/// `symbols` should be in configured order; simultaneous bars are handled in
/// slice order. Bars outside the session window are skipped. Each bar is
/// evaluated against its own symbol's indicator series at its own index, and
/// takes at most one action: enter when flat, otherwise consider an exit.
pub fn run_backtest(
    symbols: &[SymbolData],
    pairs: &PairBook,
    config: &BacktestConfig,
) -> Result<BacktestResult, TraderError> {
    let configs: Vec<&PairConfig> = symbols
        .iter()
        .map(|data| pairs.get(&data.symbol))
        .collect::<Result<_, _>>()?;

    let mut portfolio = Portfolio::new(
        symbols.iter().map(|d| d.symbol.as_str()),
        config.initial_balance,
    );
    let timeline = build_unified_timeline(symbols);
    let mut bars_processed = 0usize;
    let mut bars_skipped = 0usize;

    for event in &timeline {
        if !config.session.contains_bar(event.timestamp) {
            bars_skipped += 1;
            continue;
        }
        bars_processed += 1;

        let data = &symbols[event.slot];
        let pair = configs[event.slot];
        let symbol = data.symbol.as_str();
        let close = data.bars[event.index].close;

        let decision = decide(
            portfolio.state(symbol)?,
            &data.indicators,
            event.index as i64,
            close,
            pair,
        );

        match decision {
            Decision::Hold => {
                debug!(%symbol, timestamp = %event.timestamp, close, "hold");
            }
            Decision::Enter(side) => {
                portfolio.open_position(symbol, side, close, event.timestamp, pair)?;
                info!(%symbol, timestamp = %event.timestamp, %side, price = close, "entry");
            }
            Decision::Exit(reason) => {
                let (record, settlement) = portfolio.close_position(
                    symbol,
                    close,
                    event.timestamp,
                    &reason.to_string(),
                    pair,
                    &config.execution,
                )?;
                info!(
                    %symbol,
                    timestamp = %event.timestamp,
                    action = %record.action,
                    fill = settlement.exit_price,
                    profit = settlement.profit,
                    balance = record.balance.unwrap_or_default(),
                    %reason,
                    "exit"
                );
            }
        }
    }

    info!(
        bars_processed,
        bars_skipped,
        trades = portfolio.trades.len(),
        balance = portfolio.balance,
        "backtest complete"
    );

    Ok(BacktestResult {
        portfolio,
        bars_processed,
        bars_skipped,
    })
}
