//! Append-only trade records.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::domain::position::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeAction {
    Buy,
    Sell,
    ShortSell,
    BuyToCover,
}

impl TradeAction {
    pub fn entry(side: Side) -> Self {
        match side {
            Side::Long => TradeAction::Buy,
            Side::Short => TradeAction::ShortSell,
        }
    }

    pub fn exit(side: Side) -> Self {
        match side {
            Side::Long => TradeAction::Sell,
            Side::Short => TradeAction::BuyToCover,
        }
    }

    pub fn is_entry(self) -> bool {
        matches!(self, TradeAction::Buy | TradeAction::ShortSell)
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "Buy"),
            TradeAction::Sell => write!(f, "Sell"),
            TradeAction::ShortSell => write!(f, "Short Sell"),
            TradeAction::BuyToCover => write!(f, "Buy to Cover"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub action: TradeAction,
    pub price: f64,
    /// Signed units: positive buys, negative sells.
    pub quantity: f64,
    /// Realized profit after commission; exits only.
    pub profit: Option<f64>,
    /// Running balance after this exit; exits only.
    pub balance: Option<f64>,
    pub reason: String,
}
