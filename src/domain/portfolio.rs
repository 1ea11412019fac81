//! Per-symbol position slots, running balance and the trade ledger.

use chrono::{DateTime, Utc};

use super::error::TraderError;
use super::execution::{settle_exit, ExecutionConfig, Settlement};
use super::pair_config::PairConfig;
use super::position::{OpenPosition, PositionState, Side};
use super::trade::{TradeAction, TradeRecord};

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub balance: f64,
    pub initial_balance: f64,
    slots: Vec<(String, PositionState)>,
    pub trades: Vec<TradeRecord>,
}

impl Portfolio {
    /// One flat slot per symbol. The slot set is fixed for the portfolio's lifetime.
    pub fn new<'a>(symbols: impl IntoIterator<Item = &'a str>, initial_balance: f64) -> Self {
        Portfolio {
            balance: initial_balance,
            initial_balance,
            slots: symbols
                .into_iter()
                .map(|s| (s.to_string(), PositionState::Flat))
                .collect(),
            trades: Vec::new(),
        }
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|(s, _)| s.as_str())
    }

    pub fn state(&self, symbol: &str) -> Result<&PositionState, TraderError> {
        self.slots
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, state)| state)
            .ok_or_else(|| unknown(symbol))
    }

    fn state_mut(&mut self, symbol: &str) -> Result<&mut PositionState, TraderError> {
        self.slots
            .iter_mut()
            .find(|(s, _)| s == symbol)
            .map(|(_, state)| state)
            .ok_or_else(|| unknown(symbol))
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|(_, s)| !s.is_flat()).count()
    }

    /// FLAT → LONG/SHORT. Entering an open slot is an error.
    pub fn enter(
        &mut self,
        symbol: &str,
        side: Side,
        entry_price: f64,
        entry_time: Option<DateTime<Utc>>,
    ) -> Result<(), TraderError> {
        let state = self.state_mut(symbol)?;
        if let PositionState::Open(existing) = state {
            return Err(TraderError::InvalidTransition {
                symbol: symbol.to_string(),
                reason: format!("cannot enter {side}: already {}", existing.side),
            });
        }
        *state = PositionState::Open(OpenPosition {
            side,
            entry_price,
            entry_time,
        });
        Ok(())
    }

    /// LONG/SHORT → FLAT, returning the closed position. Exiting a flat slot is an error.
    pub fn exit(&mut self, symbol: &str) -> Result<OpenPosition, TraderError> {
        let state = self.state_mut(symbol)?;
        match std::mem::take(state) {
            PositionState::Open(position) => Ok(position),
            PositionState::Flat => Err(TraderError::InvalidTransition {
                symbol: symbol.to_string(),
                reason: "cannot exit: no open position".into(),
            }),
        }
    }

    /// Overwrite the slot from an external source of truth (broker reconciliation).
    pub fn sync(&mut self, symbol: &str, state: PositionState) -> Result<(), TraderError> {
        *self.state_mut(symbol)? = state;
        Ok(())
    }

    /// Enter at `price` and record a Buy / Short Sell.
    pub fn open_position(
        &mut self,
        symbol: &str,
        side: Side,
        price: f64,
        timestamp: DateTime<Utc>,
        config: &PairConfig,
    ) -> Result<&TradeRecord, TraderError> {
        self.enter(symbol, side, price, Some(timestamp))?;
        self.trades.push(TradeRecord {
            timestamp,
            symbol: symbol.to_string(),
            action: TradeAction::entry(side),
            price,
            quantity: side.sign() * config.position_size,
            profit: None,
            balance: None,
            reason: String::new(),
        });
        Ok(self.last_trade())
    }

    /// Exit at the bar close, settle, move the balance and record a
    /// Sell / Buy to Cover carrying the profit and new balance.
    pub fn close_position(
        &mut self,
        symbol: &str,
        close: f64,
        timestamp: DateTime<Utc>,
        reason: &str,
        config: &PairConfig,
        execution: &ExecutionConfig,
    ) -> Result<(&TradeRecord, Settlement), TraderError> {
        let position = self.exit(symbol)?;
        let settlement = settle_exit(&position, close, config, execution);
        self.balance += settlement.profit;

        self.trades.push(TradeRecord {
            timestamp,
            symbol: symbol.to_string(),
            action: TradeAction::exit(position.side),
            price: close,
            quantity: -position.side.sign() * config.position_size,
            profit: Some(settlement.profit),
            balance: Some(self.balance),
            reason: reason.to_string(),
        });
        Ok((self.last_trade(), settlement))
    }

    fn last_trade(&self) -> &TradeRecord {
        &self.trades[self.trades.len() - 1]
    }
}

fn unknown(symbol: &str) -> TraderError {
    TraderError::UnknownSymbol {
        symbol: symbol.to_string(),
    }
}
