use crate::external::price_frame::{ColumnLabel, PriceFrame, ADJ_CLOSE};
use crate::external::price_provider::{
    Fundamentals, PriceProvider, PriceProviderError, ReferenceDataProvider, TRAILING_PE,
};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a over `bytes`; output is fixed across toolchains.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(FNV_OFFSET_BASIS, |h, b| (h ^ u64::from(*b)).wrapping_mul(FNV_PRIME))
}

/// Offline provider generating a seeded random walk per ticker.
///
/// The same ticker always yields the same series and P/E, which keeps demo
/// runs and tests reproducible without network access.
#[derive(Default)]
pub struct SyntheticProvider {
    seed: u64,
}

impl SyntheticProvider {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn rng_for(&self, ticker: &str) -> StdRng {
        StdRng::seed_from_u64(self.seed ^ fnv1a(ticker.to_uppercase().as_bytes()))
    }
}

#[async_trait]
impl PriceProvider for SyntheticProvider {
    async fn fetch_daily_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceFrame, PriceProviderError> {
        let mut rng = self.rng_for(ticker);

        // Per-ticker drift and daily volatility
        let drift = rng.random_range(-0.0002..0.0008);
        let sigma = rng.random_range(0.008..0.03);
        let mut current = rng.random_range(20.0..400.0_f64);

        let mut dates = Vec::new();
        let mut closes = Vec::new();

        let mut day = start;
        while day < end {
            if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                current *= 1.0 + drift + (rng.random::<f64>() - 0.5) * 2.0 * sigma;
                dates.push(day);
                closes.push(Some(current));
            }
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }

        if dates.is_empty() {
            return Err(PriceProviderError::NotFound);
        }

        Ok(PriceFrame::new(dates)
            .with_column(ColumnLabel::Flat("Close".into()), closes.clone())
            .with_column(ColumnLabel::Flat(ADJ_CLOSE.into()), closes))
    }

    fn name(&self) -> &'static str {
        "synthetic"
    }
}

#[async_trait]
impl ReferenceDataProvider for SyntheticProvider {
    async fn fetch_fundamentals(&self, ticker: &str) -> Result<Fundamentals, PriceProviderError> {
        let mut rng = self.rng_for(ticker);
        let mut fundamentals = Fundamentals::default();
        fundamentals.insert(TRAILING_PE, json!(rng.random_range(5.0..45.0_f64)));
        Ok(fundamentals)
    }

    fn name(&self) -> &'static str {
        "synthetic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn test_series_is_reproducible_and_skips_weekends() {
        let provider = SyntheticProvider::new(7);
        let a = provider
            .fetch_daily_history("AAPL", date("2024-01-01"), date("2024-01-15"))
            .await
            .unwrap();
        let b = provider
            .fetch_daily_history("AAPL", date("2024-01-01"), date("2024-01-15"))
            .await
            .unwrap();

        assert_eq!(a.series(ADJ_CLOSE), b.series(ADJ_CLOSE));
        assert_eq!(a.dates.len(), 10);
        assert!(a.dates.iter().all(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun)));
    }

    #[tokio::test]
    async fn test_empty_window_is_not_found() {
        let provider = SyntheticProvider::default();
        let err = provider
            .fetch_daily_history("AAPL", date("2024-01-06"), date("2024-01-08"))
            .await
            .unwrap_err();
        assert!(matches!(err, PriceProviderError::NotFound));
    }

    #[test]
    fn test_ticker_hash_is_fixed() {
        assert_eq!(fnv1a(b""), FNV_OFFSET_BASIS);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(fnv1a(b"AAPL"), 0x8910_6b8b_9f08_6ccb);
        assert_eq!(fnv1a(b"MSFT"), 0xe4bf_0daf_276e_fd73);
    }

    #[tokio::test]
    async fn test_seed_changes_series() {
        let window = (date("2024-01-01"), date("2024-02-01"));
        let a = SyntheticProvider::new(1)
            .fetch_daily_history("AAPL", window.0, window.1)
            .await
            .unwrap();
        let b = SyntheticProvider::new(2)
            .fetch_daily_history("AAPL", window.0, window.1)
            .await
            .unwrap();
        assert_ne!(a.series(ADJ_CLOSE), b.series(ADJ_CLOSE));
    }

    #[tokio::test]
    async fn test_pe_is_reproducible() {
        let provider = SyntheticProvider::new(1);
        let a = provider.fetch_fundamentals("MSFT").await.unwrap().trailing_pe();
        let b = provider.fetch_fundamentals("msft").await.unwrap().trailing_pe();
        assert!(a.is_some());
        assert_eq!(a, b);
    }
}
