pub mod analyzer_service;
pub mod metrics_service;
pub mod price_service;
pub mod rate_limiter;
pub mod reference_service;
pub mod report_service;
