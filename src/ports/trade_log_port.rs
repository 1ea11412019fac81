//! Append-only trade log port trait.

use crate::domain::error::TraderError;
use crate::domain::trade::TradeRecord;

pub trait TradeLogPort {
    fn append(&mut self, record: &TradeRecord) -> Result<(), TraderError>;
}
