use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::errors::AppError;

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub loki_enabled: bool,
    pub loki_url: Option<String>,
    pub service_name: String,
    pub environment: String,
    pub log_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            loki_enabled: false,
            loki_url: None,
            service_name: "stock-trend-analyzer".to_string(),
            environment: "development".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            loki_enabled: std::env::var("LOKI_ENABLED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.loki_enabled),
            loki_url: std::env::var("LOKI_URL").ok(),
            service_name: std::env::var("SERVICE_NAME").unwrap_or(defaults.service_name),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.loki_enabled && self.loki_url.is_none() {
            return Err(AppError::Logging(
                "LOKI_ENABLED is true but LOKI_URL is not set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Keeps the Loki shipper alive until [`LoggingGuard::shutdown`] is awaited.
///
/// Console-only logging has nothing to flush, so its guard is empty.
#[derive(Default)]
pub struct LoggingGuard {
    #[cfg(feature = "loki")]
    loki: Option<(tracing_loki::BackgroundTaskController, tokio::task::JoinHandle<()>)>,
}

impl LoggingGuard {
    /// Send any buffered events and wait for the background task to finish.
    pub async fn shutdown(self) {
        #[cfg(feature = "loki")]
        {
            if let Some((controller, task)) = self.loki {
                controller.shutdown().await;
                if let Err(e) = task.await {
                    eprintln!("Loki background task failed: {}", e);
                }
            }
        }
    }
}

/// Install the global subscriber. Logs go to stderr so stdout carries only the tables.
pub fn init_logging(config: LoggingConfig) -> Result<LoggingGuard, AppError> {
    config.validate()?;

    #[cfg(feature = "loki")]
    {
        if config.loki_enabled {
            if let Some(loki_url) = config.loki_url.clone() {
                return init_with_loki(config, &loki_url);
            }
        }
    }

    init_console_only(config)?;
    Ok(LoggingGuard::default())
}

fn init_console_only(config: LoggingConfig) -> Result<(), AppError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))?;

    tracing::debug!("📊 Console logging initialized at '{}'", config.log_level);
    Ok(())
}

#[cfg(feature = "loki")]
fn init_with_loki(config: LoggingConfig, loki_url: &str) -> Result<LoggingGuard, AppError> {
    let url = url::Url::parse(loki_url).map_err(|e| AppError::Logging(format!("Invalid LOKI_URL: {}", e)))?;

    let (loki_layer, controller, task) = tracing_loki::builder()
        .label("service", &config.service_name)
        .and_then(|b| b.label("environment", &config.environment))
        .and_then(|b| b.build_controller_url(url))
        .map_err(|e| AppError::Logging(e.to_string()))?;

    // Ships buffered events to Loki until the guard shuts it down
    let handle = tokio::spawn(task);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(loki_layer)
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))?;

    tracing::info!("✅ Loki logging initialized at {}", loki_url);
    Ok(LoggingGuard {
        loki: Some((controller, handle)),
    })
}
