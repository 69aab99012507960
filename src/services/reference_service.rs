use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::external::price_provider::{Fundamentals, PriceProviderError, ReferenceDataProvider};
use crate::services::metrics_service::round2;
use crate::services::rate_limiter::RateLimiter;

/// Best-effort trailing P/E lookup.
///
/// Callers only ever see `Some(pe)` or `None`; whether the field was missing
/// or the provider failed is a logging concern.
#[derive(Clone)]
pub struct ReferenceDataFetcher {
    provider: Arc<dyn ReferenceDataProvider>,
    rate_limiter: Arc<RateLimiter>,
    timeout: Duration,
}

impl ReferenceDataFetcher {
    pub fn new(
        provider: Arc<dyn ReferenceDataProvider>,
        rate_limiter: Arc<RateLimiter>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            rate_limiter,
            timeout,
        }
    }

    pub async fn fetch_pe(&self, ticker: &str) -> Option<f64> {
        let fundamentals = match self.request(ticker).await {
            Ok(f) => f,
            Err(e) => {
                warn!("P/E unavailable for {} from {} ({}): {}", ticker, self.provider.name(), e.kind(), e);
                return None;
            }
        };

        match fundamentals.trailing_pe() {
            Some(pe) => Some(round2(pe)),
            None => {
                debug!("No trailing P/E field for {}", ticker);
                None
            }
        }
    }

    async fn request(&self, ticker: &str) -> Result<Fundamentals, PriceProviderError> {
        let _guard = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| PriceProviderError::Network(e.to_string()))?;

        tokio::time::timeout(self.timeout, self.provider.fetch_fundamentals(ticker))
            .await
            .map_err(|_| PriceProviderError::Timeout(self.timeout.as_secs()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::price_provider::TRAILING_PE;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    enum Reply {
        Field(Value),
        Empty,
        Fail,
        Hang,
    }

    struct StubReference(Reply);

    #[async_trait]
    impl ReferenceDataProvider for StubReference {
        async fn fetch_fundamentals(&self, _ticker: &str) -> Result<Fundamentals, PriceProviderError> {
            match &self.0 {
                Reply::Field(v) => {
                    let mut f = Fundamentals::default();
                    f.insert(TRAILING_PE, v.clone());
                    Ok(f)
                }
                Reply::Empty => Ok(Fundamentals::default()),
                Reply::Fail => Err(PriceProviderError::BadResponse("HTTP 500".into())),
                Reply::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(PriceProviderError::NotFound)
                }
            }
        }

        fn name(&self) -> &'static str {
            "stub"
        }
    }

    fn fetcher(reply: Reply) -> ReferenceDataFetcher {
        ReferenceDataFetcher::new(
            Arc::new(StubReference(reply)),
            Arc::new(RateLimiter::new(4, 60_000)),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_present_value_is_rounded() {
        assert_eq!(fetcher(Reply::Field(json!(29.3749))).fetch_pe("AAPL").await, Some(29.37));
    }

    #[tokio::test]
    async fn test_missing_field_is_absent() {
        assert_eq!(fetcher(Reply::Empty).fetch_pe("AAPL").await, None);
    }

    #[tokio::test]
    async fn test_provider_failure_is_absent() {
        assert_eq!(fetcher(Reply::Fail).fetch_pe("AAPL").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_absent() {
        assert_eq!(fetcher(Reply::Hang).fetch_pe("AAPL").await, None);
    }
}
