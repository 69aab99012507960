use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::external::price_frame::{PriceFrame, ADJ_CLOSE};
use crate::external::price_provider::{PriceProvider, PriceProviderError};
use crate::models::{PricePoint, PriceSeries};
use crate::services::rate_limiter::RateLimiter;

/// Calendar days per lookback year.
const DAYS_PER_YEAR: i64 = 365;

/// Fetches adjusted-close history and turns it into a [`PriceSeries`].
///
/// Every failure mode (provider error, timeout, empty response, missing
/// adjusted-close column) comes back as `None`; the reason is only logged.
#[derive(Clone)]
pub struct DataFetcher {
    provider: Arc<dyn PriceProvider>,
    rate_limiter: Arc<RateLimiter>,
    timeout: Duration,
}

impl DataFetcher {
    pub fn new(provider: Arc<dyn PriceProvider>, rate_limiter: Arc<RateLimiter>, timeout: Duration) -> Self {
        Self {
            provider,
            rate_limiter,
            timeout,
        }
    }

    /// Window `[today - years*365 days, today + 1 day)`, so today's bar is included.
    pub fn window(today: NaiveDate, lookback_years: u32) -> (NaiveDate, NaiveDate) {
        let start = today - ChronoDuration::days(DAYS_PER_YEAR * i64::from(lookback_years));
        (start, today + ChronoDuration::days(1))
    }

    pub async fn fetch(&self, ticker: &str, lookback_years: u32) -> Option<PriceSeries> {
        self.fetch_as_of(ticker, lookback_years, Utc::now().date_naive()).await
    }

    pub async fn fetch_as_of(&self, ticker: &str, lookback_years: u32, today: NaiveDate) -> Option<PriceSeries> {
        let ticker = ticker.trim();
        if ticker.is_empty() {
            warn!("Refusing to fetch prices for an empty ticker");
            return None;
        }
        if lookback_years == 0 {
            warn!("Refusing to fetch prices for {} with a zero-year lookback", ticker);
            return None;
        }

        let (start, end) = Self::window(today, lookback_years);

        let frame = match self.request(ticker, start, end).await {
            Ok(frame) => frame,
            Err(e) => {
                warn!(
                    "✗ No price data for {} from {} ({}): {}",
                    ticker,
                    self.provider.name(),
                    e.kind(),
                    e
                );
                return None;
            }
        };

        let series = series_from_frame(ticker, frame, start, end)?;
        info!("✓ Fetched {} price points for {}", series.len(), ticker);
        Some(series)
    }

    async fn request(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<PriceFrame, PriceProviderError> {
        let _guard = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| PriceProviderError::Network(e.to_string()))?;

        debug!("Requesting {} history for {} in [{}, {})", self.provider.name(), ticker, start, end);

        tokio::time::timeout(self.timeout, self.provider.fetch_daily_history(ticker, start, end))
            .await
            .map_err(|_| PriceProviderError::Timeout(self.timeout.as_secs()))?
    }
}

/// Normalize a provider frame and extract the adjusted-close series.
///
/// Compound column labels are flattened first; if `Adj Close` is still
/// missing, or no rows fall inside the window, there is no usable series.
pub fn series_from_frame(ticker: &str, mut frame: PriceFrame, start: NaiveDate, end: NaiveDate) -> Option<PriceSeries> {
    if frame.is_empty() {
        warn!("✗ Empty price history for {}", ticker);
        return None;
    }

    if frame.has_compound_labels() {
        debug!("Flattening compound column labels for {}", ticker);
        frame.flatten_columns(ticker);
    }

    let Some(rows) = frame.series(ADJ_CLOSE) else {
        warn!("✗ '{}' column missing for {}", ADJ_CLOSE, ticker);
        return None;
    };

    let series = PriceSeries::new(
        ticker,
        rows.into_iter()
            .filter(|(date, _)| *date >= start && *date < end)
            .map(|(date, price)| PricePoint::new(date, price)),
    );

    if series.is_empty() {
        warn!("✗ No usable adjusted closes for {} in [{}, {})", ticker, start, end);
        return None;
    }

    Some(series)
}
