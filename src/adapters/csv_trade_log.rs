//! CSV trade log sink.
//!
//! Two layouts: the backtest results sheet
//! (`Date,Type,Price,Profit,Balance,Reason,Symbol`) and the live order log
//! (`timestamp,trade_type,symbol,quantity,price,reason`).

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::domain::error::TraderError;
use crate::domain::trade::TradeRecord;
use crate::ports::trade_log_port::TradeLogPort;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeLogFormat {
    Backtest,
    Live,
}

impl TradeLogFormat {
    fn header(self) -> &'static [&'static str] {
        match self {
            TradeLogFormat::Backtest => {
                &["Date", "Type", "Price", "Profit", "Balance", "Reason", "Symbol"]
            }
            TradeLogFormat::Live => &["timestamp", "trade_type", "symbol", "quantity", "price", "reason"],
        }
    }

    fn row(self, record: &TradeRecord) -> Vec<String> {
        let timestamp = record.timestamp.format(TIMESTAMP_FORMAT).to_string();
        let optional = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
        match self {
            TradeLogFormat::Backtest => vec![
                timestamp,
                record.action.to_string(),
                record.price.to_string(),
                optional(record.profit),
                optional(record.balance),
                record.reason.clone(),
                record.symbol.clone(),
            ],
            TradeLogFormat::Live => vec![
                timestamp,
                if record.action.is_entry() { "ENTRY" } else { "EXIT" }.to_string(),
                record.symbol.clone(),
                record.quantity.to_string(),
                record.price.to_string(),
                record.reason.clone(),
            ],
        }
    }
}

pub struct CsvTradeLog {
    path: PathBuf,
    format: TradeLogFormat,
}

fn log_err(path: &Path, e: impl std::fmt::Display) -> TraderError {
    TraderError::TradeLog {
        reason: format!("{}: {}", path.display(), e),
    }
}

impl CsvTradeLog {
    /// Append to `path`, writing the header only if the file is new or empty.
    pub fn append_to(path: impl Into<PathBuf>, format: TradeLogFormat) -> Self {
        CsvTradeLog {
            path: path.into(),
            format,
        }
    }

    /// Start `path` afresh with just the header.
    pub fn create(path: impl Into<PathBuf>, format: TradeLogFormat) -> Result<Self, TraderError> {
        let log = Self::append_to(path, format);
        let file = File::create(&log.path).map_err(|e| log_err(&log.path, e))?;
        log.write_rows(file, true, &[])?;
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_rows(&self, file: File, header: bool, rows: &[Vec<String>]) -> Result<(), TraderError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if header {
            writer
                .write_record(self.format.header())
                .map_err(|e| log_err(&self.path, e))?;
        }
        for row in rows {
            writer.write_record(row).map_err(|e| log_err(&self.path, e))?;
        }
        writer.flush().map_err(|e| log_err(&self.path, e))
    }
}

impl TradeLogPort for CsvTradeLog {
    fn append(&mut self, record: &TradeRecord) -> Result<(), TraderError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| log_err(&self.path, e))?;
        let empty = file.metadata().map_err(|e| log_err(&self.path, e))?.len() == 0;
        self.write_rows(file, empty, &[self.format.row(record)])
    }
}
