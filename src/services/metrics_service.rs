//! Descriptive metrics over an already-fetched [`PriceSeries`].
//!
//! Everything here is pure: no I/O, no logging, and the same series always
//! produces bit-identical results.

use thiserror::Error;

use crate::models::PriceSeries;

/// Approximate number of trading days per year, used to annualize.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricError {
    #[error("{metric} undefined: {reason}")]
    ComputationUndefined {
        metric: &'static str,
        reason: String,
    },
}

fn undefined(metric: &'static str, reason: impl Into<String>) -> MetricError {
    MetricError::ComputationUndefined {
        metric,
        reason: reason.into(),
    }
}

/// Round to 2 decimal places, normalizing `-0.0` to `0.0`.
pub fn round2(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Compound annual growth rate as a percentage.
///
/// `n = observations / 252`; result is `final_growth^(1/n) - 1`.
pub fn cagr(series: &PriceSeries) -> Result<f64, MetricError> {
    let observations = series.len();
    if observations == 0 {
        return Err(undefined("cagr", "series is empty"));
    }

    let years = observations as f64 / TRADING_DAYS_PER_YEAR;
    let final_growth = series
        .final_growth()
        .ok_or_else(|| undefined("cagr", "series is empty"))?;

    if final_growth <= 0.0 {
        return Err(undefined("cagr", format!("final growth {} is not positive", final_growth)));
    }

    let rate = final_growth.powf(1.0 / years) - 1.0;
    let pct = round2(rate * 100.0);
    if !pct.is_finite() {
        return Err(undefined("cagr", "result is not finite"));
    }

    Ok(pct)
}

/// Annualized volatility as a percentage: sample standard deviation of the
/// per-period returns scaled by `sqrt(252)`.
pub fn volatility(series: &PriceSeries) -> Result<f64, MetricError> {
    let returns = series.returns();
    if returns.len() < 2 {
        return Err(undefined(
            "volatility",
            format!("need at least 2 returns, have {}", returns.len()),
        ));
    }

    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns
        .iter()
        .map(|r| (r - mean).powi(2))
        .sum::<f64>()
        / (returns.len() as f64 - 1.0);

    let pct = round2(variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt() * 100.0);
    if !pct.is_finite() {
        return Err(undefined("volatility", "result is not finite"));
    }

    Ok(pct)
}

/// Maximum drawdown of the series' cumulative growth, as a non-positive percentage.
pub fn max_drawdown(series: &PriceSeries) -> Result<f64, MetricError> {
    max_drawdown_of(series.cumulative_growth())
}

/// Maximum drawdown of any cumulative growth sequence, as a non-positive percentage.
///
/// Drawdown at each point is `(g - running_max) / running_max`.
pub fn max_drawdown_of(growth: &[f64]) -> Result<f64, MetricError> {
    let first = *growth
        .first()
        .ok_or_else(|| undefined("max_drawdown", "series is empty"))?;

    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &g in growth {
        if g > peak {
            peak = g;
        }
        if peak <= 0.0 {
            return Err(undefined("max_drawdown", "running maximum is not positive"));
        }
        let dd = (g - peak) / peak;
        if dd < max_dd {
            max_dd = dd;
        }
    }

    Ok(round2(max_dd * 100.0))
}
