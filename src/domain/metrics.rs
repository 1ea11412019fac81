//! Trade summary statistics over a finished backtest.
//!
//! Only exits carry a realized profit, so every figure here is computed from
//! exit records; open positions left at the end of a run are not marked.

use super::portfolio::Portfolio;
use super::trade::TradeRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub initial_balance: f64,
    pub final_balance: f64,
    pub net_profit: f64,
    pub total_return: f64,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    /// Peak-to-trough fall of the balance, sampled after each exit.
    pub max_drawdown: f64,
}

impl Metrics {
    pub fn compute(portfolio: &Portfolio) -> Self {
        let initial_balance = portfolio.initial_balance;
        let final_balance = portfolio.balance;
        let profits: Vec<f64> = realized_profits(&portfolio.trades).collect();

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;

        for &profit in &profits {
            if profit > 0.0 {
                trades_won += 1;
                total_wins += profit;
                largest_win = largest_win.max(profit);
            } else if profit < 0.0 {
                trades_lost += 1;
                total_losses += profit.abs();
                largest_loss = largest_loss.max(profit.abs());
            } else {
                trades_breakeven += 1;
            }
        }

        let total_trades = profits.len();
        let win_rate = if total_trades > 0 {
            trades_won as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = if trades_won > 0 {
            total_wins / trades_won as f64
        } else {
            0.0
        };

        let avg_loss = if trades_lost > 0 {
            total_losses / trades_lost as f64
        } else {
            0.0
        };

        let total_return = if initial_balance > 0.0 {
            (final_balance - initial_balance) / initial_balance
        } else {
            0.0
        };

        Metrics {
            initial_balance,
            final_balance,
            net_profit: final_balance - initial_balance,
            total_return,
            total_trades,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate,
            profit_factor,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            max_drawdown: compute_drawdown(initial_balance, &portfolio.trades),
        }
    }
}

fn realized_profits(trades: &[TradeRecord]) -> impl Iterator<Item = f64> + '_ {
    trades.iter().filter_map(|t| t.profit)
}

fn compute_drawdown(initial_balance: f64, trades: &[TradeRecord]) -> f64 {
    let mut peak = initial_balance;
    let mut max_dd = 0.0_f64;

    for balance in trades.iter().filter_map(|t| t.balance) {
        if balance > peak {
            peak = balance;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - balance) / peak);
        }
    }
    max_dd
}

/// Per-symbol breakdown, in order of first appearance in the trade log.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolResult {
    pub symbol: String,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub total_profit: f64,
    pub win_rate: f64,
}

impl SymbolResult {
    pub fn compute_per_symbol(trades: &[TradeRecord]) -> Vec<SymbolResult> {
        let mut results: Vec<SymbolResult> = Vec::new();

        for trade in trades {
            let Some(profit) = trade.profit else {
                continue;
            };
            let idx = match results.iter().position(|r| r.symbol == trade.symbol) {
                Some(idx) => idx,
                None => {
                    results.push(SymbolResult {
                        symbol: trade.symbol.clone(),
                        total_trades: 0,
                        winning_trades: 0,
                        losing_trades: 0,
                        total_profit: 0.0,
                        win_rate: 0.0,
                    });
                    results.len() - 1
                }
            };

            let entry = &mut results[idx];
            entry.total_trades += 1;
            entry.total_profit += profit;
            if profit > 0.0 {
                entry.winning_trades += 1;
            } else if profit < 0.0 {
                entry.losing_trades += 1;
            }
        }

        for r in &mut results {
            r.win_rate = r.winning_trades as f64 / r.total_trades as f64;
        }
        results
    }
}
