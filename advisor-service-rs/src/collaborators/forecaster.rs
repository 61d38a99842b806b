//! Numeric price forecaster with a graceful method ladder.
//!
//! The method degrades with the available history: a full trend
//! projection with three or more points, a linear extrapolation with one
//! or two, and the industry default with none.

use async_trait::async_trait;

use shared_types::{
    PricePoint, Result, TrendDirection, INDUSTRY_DEFAULT_MOM_RATE, INDUSTRY_DEFAULT_PRICE,
};

/// How the numeric forecast was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastMethod {
    MarketDefault,
    Linear,
    Trend,
}

impl ForecastMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastMethod::MarketDefault => "market_default",
            ForecastMethod::Linear => "linear",
            ForecastMethod::Trend => "trend",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NumericForecast {
    pub forecast_30d: f64,
    pub forecast_90d: f64,
    /// Projected one-month change in percent.
    pub pct_change_30d: f64,
    pub direction: TrendDirection,
    pub method: ForecastMethod,
}

#[async_trait]
pub trait ForecastModel: Send + Sync {
    async fn project(&self, history: &[PricePoint]) -> Result<NumericForecast>;
}

/// Projects the average month-over-month rate of the recent history.
pub struct TrendProjectionForecaster;

/// Intervals considered by the trend method.
const TREND_WINDOW_INTERVALS: usize = 6;
/// Monthly move below which the direction reads as stable, in percent.
const STABLE_BAND_PCT: f64 = 0.5;

fn direction_for(monthly_pct: f64) -> TrendDirection {
    if monthly_pct > STABLE_BAND_PCT {
        TrendDirection::Rising
    } else if monthly_pct < -STABLE_BAND_PCT {
        TrendDirection::Falling
    } else {
        TrendDirection::Stable
    }
}

#[async_trait]
impl ForecastModel for TrendProjectionForecaster {
    async fn project(&self, history: &[PricePoint]) -> Result<NumericForecast> {
        let forecast = match history.len() {
            0 => {
                let last = INDUSTRY_DEFAULT_PRICE;
                let rate = INDUSTRY_DEFAULT_MOM_RATE;
                NumericForecast {
                    forecast_30d: last * (1.0 + rate),
                    forecast_90d: last * (1.0 + rate).powi(3),
                    pct_change_30d: rate * 100.0,
                    direction: direction_for(rate * 100.0),
                    method: ForecastMethod::MarketDefault,
                }
            }
            1 | 2 => {
                let last = history[history.len() - 1].avg_price;
                let rate = if history.len() == 2 && history[0].avg_price > 0.0 {
                    (history[1].avg_price - history[0].avg_price) / history[0].avg_price
                } else {
                    INDUSTRY_DEFAULT_MOM_RATE
                };
                NumericForecast {
                    forecast_30d: last * (1.0 + rate),
                    forecast_90d: last * (1.0 + 3.0 * rate),
                    pct_change_30d: rate * 100.0,
                    direction: direction_for(rate * 100.0),
                    method: ForecastMethod::Linear,
                }
            }
            _ => {
                let last = history[history.len() - 1].avg_price;
                let window_start = history.len().saturating_sub(TREND_WINDOW_INTERVALS + 1);
                let window = &history[window_start..];

                let mut rates = Vec::with_capacity(window.len() - 1);
                for pair in window.windows(2) {
                    if pair[0].avg_price > 0.0 {
                        rates.push((pair[1].avg_price - pair[0].avg_price) / pair[0].avg_price);
                    }
                }
                let rate = if rates.is_empty() {
                    0.0
                } else {
                    rates.iter().sum::<f64>() / rates.len() as f64
                };

                NumericForecast {
                    forecast_30d: last * (1.0 + rate),
                    forecast_90d: last * (1.0 + rate).powi(3),
                    pct_change_30d: rate * 100.0,
                    direction: direction_for(rate * 100.0),
                    method: ForecastMethod::Trend,
                }
            }
        };
        Ok(forecast)
    }
}
