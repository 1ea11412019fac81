//! In-memory paper broker.
//!
//! Market orders fill immediately at their reference price. Net positions
//! carry a volume-weighted average price; reducing a position realizes its
//! P&L into the cash balance.

use std::collections::HashMap;

use crate::domain::error::TraderError;
use crate::ports::broker_port::{BrokerPort, BrokerPosition, OrderRequest};

#[derive(Debug, Clone, Default)]
pub struct PaperBroker {
    cash: f64,
    positions: HashMap<String, BrokerPosition>,
    fills: Vec<OrderRequest>,
}

impl PaperBroker {
    pub fn new(cash: f64) -> Self {
        PaperBroker {
            cash,
            ..Default::default()
        }
    }

    /// Seed an existing position, as if opened before the session started.
    pub fn with_position(mut self, symbol: &str, units: f64, average_price: f64) -> Self {
        self.positions.insert(
            symbol.to_string(),
            BrokerPosition {
                units,
                average_price,
            },
        );
        self
    }

    pub fn fills(&self) -> &[OrderRequest] {
        &self.fills
    }
}

fn apply_fill(pos: BrokerPosition, units: f64, price: f64) -> (BrokerPosition, f64) {
    let new_units = pos.units + units;
    let same_direction = pos.units == 0.0 || pos.units.signum() == units.signum();

    if same_direction {
        let average_price =
            (pos.units.abs() * pos.average_price + units.abs() * price) / new_units.abs();
        return (
            BrokerPosition {
                units: new_units,
                average_price,
            },
            0.0,
        );
    }

    let closed = units.abs().min(pos.units.abs());
    let realized = closed * (price - pos.average_price) * pos.units.signum();
    let average_price = if new_units == 0.0 {
        0.0
    } else if new_units.signum() == pos.units.signum() {
        pos.average_price
    } else {
        price
    };
    (
        BrokerPosition {
            units: new_units,
            average_price,
        },
        realized,
    )
}

impl BrokerPort for PaperBroker {
    fn submit_order(&mut self, order: &OrderRequest) -> Result<(), TraderError> {
        let reject = |reason: &str| TraderError::OrderRejected {
            symbol: order.symbol.clone(),
            reason: reason.to_string(),
        };
        if order.units == 0.0 || !order.units.is_finite() {
            return Err(reject("order units must be non-zero"));
        }
        if !(order.reference_price > 0.0 && order.reference_price.is_finite()) {
            return Err(reject("no valid price to fill at"));
        }

        let current = self
            .positions
            .get(&order.symbol)
            .copied()
            .unwrap_or_default();
        let (next, realized) = apply_fill(current, order.units, order.reference_price);
        self.cash += realized;
        self.positions.insert(order.symbol.clone(), next);
        self.fills.push(order.clone());
        Ok(())
    }

    fn position(&self, symbol: &str) -> Result<BrokerPosition, TraderError> {
        Ok(self.positions.get(symbol).copied().unwrap_or_default())
    }

    fn balance(&self) -> Result<f64, TraderError> {
        Ok(self.cash)
    }
}
