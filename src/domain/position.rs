//! Per-symbol position state.

use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Sign applied to order units: +1 buys, -1 sells.
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    /// Side implied by a broker's signed net units; `None` when flat.
    pub fn from_units(units: f64) -> Option<Side> {
        if units > 0.0 {
            Some(Side::Long)
        } else if units < 0.0 {
            Some(Side::Short)
        } else {
            None
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub side: Side,
    pub entry_price: f64,
    /// Unknown when the position was adopted from a broker.
    pub entry_time: Option<DateTime<Utc>>,
}

impl OpenPosition {
    /// Long: entry * (1 - sl_pct). Short: entry * (1 + sl_pct).
    pub fn stop_loss(&self, sl_pct: f64) -> f64 {
        match self.side {
            Side::Long => self.entry_price * (1.0 - sl_pct),
            Side::Short => self.entry_price * (1.0 + sl_pct),
        }
    }

    /// Long: entry * (1 + tp_pct). Short: entry * (1 - tp_pct).
    pub fn take_profit(&self, tp_pct: f64) -> f64 {
        match self.side {
            Side::Long => self.entry_price * (1.0 + tp_pct),
            Side::Short => self.entry_price * (1.0 - tp_pct),
        }
    }

    pub fn should_stop_loss(&self, price: f64, sl_pct: f64) -> bool {
        let stop = self.stop_loss(sl_pct);
        match self.side {
            Side::Long => price <= stop,
            Side::Short => price >= stop,
        }
    }

    pub fn should_take_profit(&self, price: f64, tp_pct: f64) -> bool {
        let target = self.take_profit(tp_pct);
        match self.side {
            Side::Long => price >= target,
            Side::Short => price <= target,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum PositionState {
    #[default]
    Flat,
    Open(OpenPosition),
}

impl PositionState {
    pub fn is_flat(&self) -> bool {
        matches!(self, PositionState::Flat)
    }

    pub fn side(&self) -> Option<Side> {
        match self {
            PositionState::Flat => None,
            PositionState::Open(p) => Some(p.side),
        }
    }

    pub fn entry_price(&self) -> Option<f64> {
        match self {
            PositionState::Flat => None,
            PositionState::Open(p) => Some(p.entry_price),
        }
    }
}
