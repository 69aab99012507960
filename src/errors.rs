use thiserror::Error;

/// Failures that abort a run. Per-ticker problems never surface here.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl From<crate::external::price_provider::PriceProviderError> for AppError {
    fn from(value: crate::external::price_provider::PriceProviderError) -> Self {
        AppError::Config(value.to_string())
    }
}
