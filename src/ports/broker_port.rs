//! Brokerage account port trait.

use std::fmt;

use crate::domain::error::TraderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Market,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    /// Signed: positive buys, negative sells.
    pub units: f64,
    pub order_type: OrderType,
    /// Last close seen when the order was decided.
    pub reference_price: f64,
}

/// Net position as the broker reports it. Zero units means flat.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BrokerPosition {
    pub units: f64,
    pub average_price: f64,
}

pub trait BrokerPort {
    fn submit_order(&mut self, order: &OrderRequest) -> Result<(), TraderError>;
    fn position(&self, symbol: &str) -> Result<BrokerPosition, TraderError>;
    fn balance(&self) -> Result<f64, TraderError>;
}
