//! Market data port trait.

use crate::domain::bar::Bar;
use crate::domain::error::TraderError;

pub trait MarketDataPort {
    /// Most recent `lookback` bars at `granularity` (all available when `None`),
    /// ascending and unique by timestamp. An empty vec means no data this time.
    fn fetch_bars(
        &self,
        symbol: &str,
        lookback: Option<usize>,
        granularity: &str,
    ) -> Result<Vec<Bar>, TraderError>;
}
