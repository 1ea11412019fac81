//! Domain error types.

/// Top-level error type for pairtrader.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("symbol {symbol} is not configured")]
    UnknownSymbol { symbol: String },

    #[error("invalid position transition for {symbol}: {reason}")]
    InvalidTransition { symbol: String, reason: String },

    #[error("failed to fetch bars for {symbol}: {reason}")]
    DataFetch { symbol: String, reason: String },

    #[error("order for {symbol} rejected: {reason}")]
    OrderRejected { symbol: String, reason: String },

    #[error("broker query failed: {reason}")]
    BrokerQuery { reason: String },

    #[error("trade log error: {reason}")]
    TradeLog { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TraderError {
    /// Transient failures: the live loop skips the current symbol or cycle and carries on.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TraderError::DataFetch { .. }
                | TraderError::OrderRejected { .. }
                | TraderError::BrokerQuery { .. }
        )
    }
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io(_) | TraderError::TradeLog { .. } => 1,
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. } => 2,
            TraderError::UnknownSymbol { .. } | TraderError::InvalidTransition { .. } => 3,
            TraderError::DataFetch { .. } => 5,
            TraderError::OrderRejected { .. } | TraderError::BrokerQuery { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
