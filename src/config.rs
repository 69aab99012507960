use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::AppError;
use crate::external::alphavantage::AlphaVantageProvider;
use crate::external::csv_dir::CsvDirProvider;
use crate::external::price_provider::{PriceProvider, ReferenceDataProvider};
use crate::external::synthetic::SyntheticProvider;
use crate::external::yahoo::YahooProvider;
use crate::models::Thresholds;
use crate::services::analyzer_service::AnalyzerConfig;

const DEFAULT_TICKERS: &str = "AAPL,MSFT,GOOGL,AMZN,TSLA";

/// Where price history and fundamentals come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Yahoo,
    AlphaVantage,
    /// `<DATA_DIR>/<TICKER>.csv` and `<DATA_DIR>/fundamentals.csv`
    Csv,
    /// Seeded random walk, no network
    Synthetic,
}

impl FromStr for ProviderKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "yahoo" => Ok(ProviderKind::Yahoo),
            "alphavantage" => Ok(ProviderKind::AlphaVantage),
            "csv" => Ok(ProviderKind::Csv),
            "synthetic" => Ok(ProviderKind::Synthetic),
            other => Err(AppError::Config(format!(
                "Invalid provider '{}'. Must be 'yahoo', 'alphavantage', 'csv', or 'synthetic'",
                other
            ))),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderKind::Yahoo => "yahoo",
            ProviderKind::AlphaVantage => "alphavantage",
            ProviderKind::Csv => "csv",
            ProviderKind::Synthetic => "synthetic",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub analyzer: AnalyzerConfig,
    pub thresholds: Thresholds,
    pub price_provider: ProviderKind,
    pub reference_provider: ProviderKind,
    pub data_dir: PathBuf,
    pub requests_per_minute: u32,
    pub request_timeout: Duration,
    pub export_path: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup; unset keys take their defaults.
    pub fn from_lookup<F>(get: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let tickers = parse_tickers(&get("TICKERS").unwrap_or_else(|| DEFAULT_TICKERS.to_string()))?;

        let price_provider: ProviderKind = parse_or(&get, "PRICE_PROVIDER", ProviderKind::Yahoo)?;
        let reference_provider = parse_or(&get, "REFERENCE_PROVIDER", price_provider)?;

        let config = Self {
            analyzer: AnalyzerConfig {
                tickers,
                lookback_years: parse_or(&get, "LOOKBACK_YEARS", 5)?,
                max_concurrent_tickers: parse_or(&get, "MAX_CONCURRENT_TICKERS", 3)?,
            },
            thresholds: Thresholds {
                max_volatility: parse_or(&get, "MAX_VOLATILITY", 25.0)?,
                min_cagr: parse_or(&get, "MIN_CAGR", 5.0)?,
                pe_band: (parse_or(&get, "PE_LOW", 10.0)?, parse_or(&get, "PE_HIGH", 30.0)?),
            },
            price_provider,
            reference_provider,
            data_dir: get("DATA_DIR").map_or_else(|| PathBuf::from("data"), PathBuf::from),
            requests_per_minute: parse_or(&get, "REQUESTS_PER_MINUTE", 60)?,
            request_timeout: Duration::from_secs(parse_or(&get, "REQUEST_TIMEOUT_SECS", 10)?),
            export_path: get("EXPORT_PATH").map_or_else(|| PathBuf::from("stock_metrics.csv"), PathBuf::from),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.analyzer.tickers.is_empty() {
            return Err(AppError::Config("TICKERS must name at least one ticker".to_string()));
        }
        if self.analyzer.lookback_years == 0 {
            return Err(AppError::Config("LOOKBACK_YEARS must be greater than 0".to_string()));
        }
        if self.analyzer.max_concurrent_tickers == 0 {
            return Err(AppError::Config("MAX_CONCURRENT_TICKERS must be greater than 0".to_string()));
        }
        if self.requests_per_minute == 0 {
            return Err(AppError::Config("REQUESTS_PER_MINUTE must be greater than 0".to_string()));
        }
        if self.request_timeout.is_zero() {
            return Err(AppError::Config("REQUEST_TIMEOUT_SECS must be greater than 0".to_string()));
        }

        let t = &self.thresholds;
        let (low, high) = t.pe_band;
        if ![t.max_volatility, t.min_cagr, low, high].iter().all(|v| v.is_finite()) {
            return Err(AppError::Config("Thresholds must be finite numbers".to_string()));
        }
        if low > high {
            return Err(AppError::Config(format!(
                "PE_LOW ({}) must not exceed PE_HIGH ({})",
                low, high
            )));
        }
        Ok(())
    }

    pub fn build_price_provider(&self) -> Result<Arc<dyn PriceProvider>, AppError> {
        Ok(match self.price_provider {
            ProviderKind::Yahoo => Arc::new(YahooProvider::new(self.request_timeout)),
            ProviderKind::AlphaVantage => Arc::new(AlphaVantageProvider::from_env(self.request_timeout)?),
            ProviderKind::Csv => Arc::new(CsvDirProvider::new(&self.data_dir)),
            ProviderKind::Synthetic => Arc::new(SyntheticProvider::default()),
        })
    }

    pub fn build_reference_provider(&self) -> Result<Arc<dyn ReferenceDataProvider>, AppError> {
        Ok(match self.reference_provider {
            ProviderKind::Yahoo => Arc::new(YahooProvider::new(self.request_timeout)),
            ProviderKind::AlphaVantage => Arc::new(AlphaVantageProvider::from_env(self.request_timeout)?),
            ProviderKind::Csv => Arc::new(CsvDirProvider::new(&self.data_dir)),
            ProviderKind::Synthetic => Arc::new(SyntheticProvider::default()),
        })
    }
}

fn parse_or<F, T>(get: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match get(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("Invalid value for {}: '{}'", key, raw))),
    }
}

/// Comma-separated list, upper-cased, blanks dropped, first occurrence kept.
pub fn parse_tickers(raw: &str) -> Result<Vec<String>, AppError> {
    let mut seen = HashSet::new();
    let tickers: Vec<String> = raw
        .split(',')
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.clone()))
        .collect();

    if tickers.is_empty() {
        return Err(AppError::Config("TICKERS must name at least one ticker".to_string()));
    }
    Ok(tickers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, AppError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c.analyzer, AnalyzerConfig::default());
        assert_eq!(c.thresholds, Thresholds::default());
        assert_eq!(c.price_provider, ProviderKind::Yahoo);
        assert_eq!(c.reference_provider, ProviderKind::Yahoo);
        assert_eq!(c.data_dir, PathBuf::from("data"));
        assert_eq!(c.requests_per_minute, 60);
        assert_eq!(c.request_timeout, Duration::from_secs(10));
        assert_eq!(c.export_path, PathBuf::from("stock_metrics.csv"));
    }

    #[test]
    fn test_tickers_normalized() {
        let c = config(&[("TICKERS", " aapl, MSFT,,msft , brk-b ")]).unwrap();
        assert_eq!(c.analyzer.tickers, vec!["AAPL", "MSFT", "BRK-B"]);
    }

    #[test]
    fn test_reference_provider_follows_price_provider() {
        let c = config(&[("PRICE_PROVIDER", "CSV")]).unwrap();
        assert_eq!(c.reference_provider, ProviderKind::Csv);

        let c = config(&[("PRICE_PROVIDER", "synthetic"), ("REFERENCE_PROVIDER", "yahoo")]).unwrap();
        assert_eq!(c.price_provider, ProviderKind::Synthetic);
        assert_eq!(c.reference_provider, ProviderKind::Yahoo);
    }

    #[test]
    fn test_overrides() {
        let c = config(&[
            ("LOOKBACK_YEARS", "3"),
            ("MAX_VOLATILITY", "30.5"),
            ("MIN_CAGR", "-2"),
            ("PE_LOW", "12"),
            ("PE_HIGH", "12"),
            ("MAX_CONCURRENT_TICKERS", "8"),
            ("EXPORT_PATH", "/tmp/out.csv"),
        ])
        .unwrap();
        assert_eq!(c.analyzer.lookback_years, 3);
        assert_eq!(c.analyzer.max_concurrent_tickers, 8);
        assert_eq!(c.thresholds.max_volatility, 30.5);
        assert_eq!(c.thresholds.min_cagr, -2.0);
        assert_eq!(c.thresholds.pe_band, (12.0, 12.0));
        assert_eq!(c.export_path, PathBuf::from("/tmp/out.csv"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad: [(&str, &str); 8] = [
            ("LOOKBACK_YEARS", "0"),
            ("LOOKBACK_YEARS", "-1"),
            ("MAX_VOLATILITY", "lots"),
            ("MAX_CONCURRENT_TICKERS", "0"),
            ("REQUESTS_PER_MINUTE", "0"),
            ("REQUEST_TIMEOUT_SECS", "0"),
            ("PRICE_PROVIDER", "bloomberg"),
            ("TICKERS", " , ,"),
        ];
        for (key, value) in bad {
            assert!(
                matches!(config(&[(key, value)]), Err(AppError::Config(_))),
                "{}={} should be rejected",
                key,
                value
            );
        }
    }

    #[test]
    fn test_inverted_pe_band_rejected() {
        let err = config(&[("PE_LOW", "40"), ("PE_HIGH", "20")]).unwrap_err();
        assert!(err.to_string().contains("PE_LOW"));
    }

    #[test]
    fn test_non_finite_threshold_rejected() {
        assert!(config(&[("MIN_CAGR", "NaN")]).is_err());
    }

    #[test]
    fn test_offline_providers_build() {
        let c = config(&[("PRICE_PROVIDER", "synthetic"), ("REFERENCE_PROVIDER", "csv")]).unwrap();
        assert_eq!(c.build_price_provider().unwrap().name(), "synthetic");
        assert_eq!(c.build_reference_provider().unwrap().name(), "csv");
    }
}
