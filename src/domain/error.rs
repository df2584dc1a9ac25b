//! Domain error types.

/// Top-level error type for papertrader.
#[derive(Debug, thiserror::Error)]
pub enum PaperTraderError {
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("invalid parameter: {reason}")]
    InvalidParameter { reason: String },

    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: f64, available: f64 },

    #[error("insufficient asset: requested {requested}, available {available}")]
    InsufficientAsset { requested: f64, available: f64 },

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

    #[error("market data unavailable for {pair}: {reason}")]
    MarketData { pair: String, reason: String },

    #[error("storage error: {reason}")]
    Storage { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PaperTraderError {
    /// True for per-attempt trade rejections that leave the ledger untouched.
    pub fn is_trade_rejection(&self) -> bool {
        matches!(
            self,
            PaperTraderError::InvalidParameter { .. }
                | PaperTraderError::InsufficientFunds { .. }
                | PaperTraderError::InsufficientAsset { .. }
        )
    }
}

impl From<&PaperTraderError> for std::process::ExitCode {
    fn from(err: &PaperTraderError) -> Self {
        let code: u8 = match err {
            PaperTraderError::Io(_) | PaperTraderError::Storage { .. } => 1,
            PaperTraderError::ConfigParse { .. }
            | PaperTraderError::ConfigMissing { .. }
            | PaperTraderError::ConfigInvalid { .. }
            | PaperTraderError::InvalidInput { .. } => 2,
            PaperTraderError::MarketData { .. } => 3,
            PaperTraderError::InvalidParameter { .. }
            | PaperTraderError::InsufficientFunds { .. }
            | PaperTraderError::InsufficientAsset { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}
