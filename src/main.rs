use std::sync::Arc;

use stock_trend_analyzer::config::AppConfig;
use stock_trend_analyzer::logging::{init_logging, LoggingConfig};
use stock_trend_analyzer::render::render_table;
use stock_trend_analyzer::services::analyzer_service::Analyzer;
use stock_trend_analyzer::services::price_service::DataFetcher;
use stock_trend_analyzer::services::rate_limiter::RateLimiter;
use stock_trend_analyzer::services::reference_service::ReferenceDataFetcher;
use stock_trend_analyzer::services::report_service::ReportBuilder;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging FIRST
    let logging = init_logging(LoggingConfig::from_env())?;

    let result = run().await;

    // Flush buffered log shipping before the runtime goes away
    logging.shutdown().await;

    result
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        "📊 Using price provider: {}, reference provider: {}",
        config.price_provider,
        config.reference_provider
    );

    // Both fetchers hit the same upstream, so they share one limiter
    let rate_limiter = Arc::new(RateLimiter::new(
        config.analyzer.max_concurrent_tickers,
        config.requests_per_minute,
    ));

    let analyzer = Analyzer::new(
        config.analyzer.clone(),
        DataFetcher::new(config.build_price_provider()?, rate_limiter.clone(), config.request_timeout),
        ReferenceDataFetcher::new(config.build_reference_provider()?, rate_limiter, config.request_timeout),
    );

    let records = analyzer.analyze_all().await;
    let report = ReportBuilder::build(records, &config.thresholds);

    if !report.has_data() {
        tracing::warn!("⚠️ No valid stock data found.");
        println!("No valid stock data found.");
        return Ok(());
    }

    println!("{}", render_table("Stock Metrics", &report.results.records));

    let t = &report.filtered.thresholds;
    let title = format!(
        "Steady Performers (volatility <= {}%, CAGR >= {}%, P/E {}-{})",
        t.max_volatility, t.min_cagr, t.pe_band.0, t.pe_band.1
    );
    println!("{}", render_table(&title, &report.filtered.records));

    report.results.export(&config.export_path)?;

    Ok(())
}
