//! The final report returned to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::recommendation::{Signal, Volatility};
use crate::stage::AgentLogEntry;

/// One feature attribution from the price model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapFactor {
    pub feature: String,
    /// Dollar impact on the predicted price.
    pub impact: f64,
    /// "positive" or "negative".
    pub direction: String,
}

/// Aggregated pipeline output for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub run_id: Uuid,
    pub signal: Signal,
    pub confidence: u8,
    pub fair_value: f64,
    pub forecast_30d: f64,
    pub forecast_90d: f64,
    pub risk_score: u8,
    pub volatility: Volatility,
    /// [low, high] price band.
    pub uncertainty_range: [f64; 2],
    pub explanation: String,
    pub shap_top_factors: Vec<ShapFactor>,
    /// Ordered agent log, settlement order.
    pub agent_log: Vec<AgentLogEntry>,
    pub generated_at: DateTime<Utc>,
}
