//! CSV file market data adapter.
//!
//! One file per symbol at `{base_path}/{symbol}.csv` with the header
//! `timestamp,open,high,low,close`. Timestamps are RFC 3339, or
//! `YYYY-MM-DD HH:MM:SS` read as UTC. Rows with a NaN or infinite price are
//! dropped with a warning.

use crate::domain::bar::{normalize, Bar};
use crate::domain::error::TraderError;
use crate::ports::data_port::MarketDataPort;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fs;
use std::path::PathBuf;
use tracing::warn;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

impl MarketDataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        lookback: Option<usize>,
        _granularity: &str,
    ) -> Result<Vec<Bar>, TraderError> {
        let fetch_err = |reason: String| TraderError::DataFetch {
            symbol: symbol.to_string(),
            reason,
        };

        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path)
            .map_err(|e| fetch_err(format!("failed to read {}: {}", path.display(), e)))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| fetch_err(format!("CSV parse error: {e}")))?;

            let ts_str = record
                .get(0)
                .ok_or_else(|| fetch_err("missing timestamp column".into()))?;
            let timestamp = parse_timestamp(ts_str).ok_or_else(|| {
                fetch_err(format!("invalid timestamp {ts_str:?} on row {}", line + 1))
            })?;

            let column = |idx: usize, name: &str| -> Result<f64, TraderError> {
                record
                    .get(idx)
                    .ok_or_else(|| fetch_err(format!("missing {name} column")))?
                    .trim()
                    .parse()
                    .map_err(|e| fetch_err(format!("invalid {name} value on row {}: {e}", line + 1)))
            };

            let bar = Bar {
                symbol: symbol.to_string(),
                timestamp,
                open: column(1, "open")?,
                high: column(2, "high")?,
                low: column(3, "low")?,
                close: column(4, "close")?,
            };
            if !bar.is_finite() {
                warn!(%symbol, row = line + 1, %timestamp, "dropping row with non-finite price");
                continue;
            }
            bars.push(bar);
        }

        let mut bars = normalize(bars);
        if let Some(n) = lookback {
            let start = bars.len().saturating_sub(n);
            bars.drain(..start);
        }
        Ok(bars)
    }
}
