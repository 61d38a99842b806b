//! Analytical stage payloads: trend, forecast, risk, and ethics outputs.

use serde::{Deserialize, Serialize};

use crate::report::ShapFactor;

/// Direction of the projected price trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Rising,
    Falling,
    Stable,
}

/// Output of the trend stage: realized price momentum projected forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSignal {
    /// Projected 30-day price change in percent.
    pub pct_change_30d: f64,
    /// Projected 90-day price change in percent. Drives decision rule input.
    pub pct_change_90d: f64,
    pub direction: TrendDirection,
}

/// Output of the forecast stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastOutcome {
    /// Point estimate of current market price from the price model.
    pub fair_value: f64,
    pub forecast_30d: f64,
    pub forecast_90d: f64,
    /// 0-100. Derived from history depth, boosted when reasoning-blended,
    /// reduced on fallback.
    pub confidence: u8,
    /// How the forecast was produced: `market_default`, `linear`, `trend`,
    /// or `reasoning_blended`.
    pub method: String,
    /// One-sentence insight from the reasoning service, when available.
    pub key_insight: Option<String>,
    /// Top feature attributions from the price model.
    pub shap_top_factors: Vec<ShapFactor>,
}

/// Output of the risk stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    /// 0-100, higher is riskier.
    pub risk_score: u8,
    pub volatility: crate::recommendation::Volatility,
    /// Half-width of the uncertainty band around fair value, as a fraction
    /// (e.g. 0.08 means +/-8%).
    pub uncertainty_pct: f64,
}

/// Output of the ethics audit stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EthicsFindings {
    pub passed: bool,
    pub notes: Vec<String>,
}
