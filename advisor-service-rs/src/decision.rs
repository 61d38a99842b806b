//! The decision engine: a fixed, ordered rule table.
//!
//! Rules are evaluated top to bottom and the first match wins, so the
//! same inputs always yield the same signal and the matched rule id
//! makes every recommendation auditable.

use config_rs::env_or;
use shared_types::{Recommendation, Signal, StageName, Volatility};

/// Named thresholds of the rule table.
#[derive(Debug, Clone)]
pub struct DecisionConfig {
    /// Projected 90-day drop (percent, negative) that triggers WAIT.
    pub wait_drop_pct: f64,
    /// Minimum confidence for the high-conviction rules.
    pub confidence_floor: u8,
    /// Projected 90-day rise (percent) that triggers BUY NOW.
    pub buy_rise_pct: f64,
    /// Price-vs-median gap (percent, negative) that triggers BUY NOW.
    pub buy_below_median_pct: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            wait_drop_pct: -3.0,
            confidence_floor: 75,
            buy_rise_pct: 2.0,
            buy_below_median_pct: -10.0,
        }
    }
}

impl DecisionConfig {
    pub fn from_env() -> Self {
        Self {
            wait_drop_pct: env_or("DECISION_WAIT_DROP_PCT", -3.0),
            confidence_floor: env_or("DECISION_CONFIDENCE_FLOOR", 75),
            buy_rise_pct: env_or("DECISION_BUY_RISE_PCT", 2.0),
            buy_below_median_pct: env_or("DECISION_BUY_BELOW_MEDIAN_PCT", -10.0),
        }
    }
}

/// Everything the rule table looks at, assembled by the orchestrator
/// from the settled Phase 1 and Phase 2 outcomes.
#[derive(Debug, Clone)]
pub struct DecisionInputs {
    pub pct_change_90d: f64,
    pub confidence: u8,
    pub volatility: Volatility,
    pub risk_score: u8,
    pub price_vs_median_pct: f64,
    pub fair_value: f64,
    pub uncertainty_pct: f64,
    /// Stages that settled degraded, for the disclosure bullet.
    pub degraded_stages: Vec<StageName>,
}

/// Evaluate the rule table. Pure and deterministic.
pub fn decide(config: &DecisionConfig, inputs: &DecisionInputs) -> Recommendation {
    let (signal, matched_rule) = if inputs.pct_change_90d <= config.wait_drop_pct
        && inputs.confidence >= config.confidence_floor
    {
        (Signal::Wait, "wait_on_decline")
    } else if inputs.pct_change_90d >= config.buy_rise_pct
        && inputs.volatility == Volatility::Low
    {
        (Signal::BuyNow, "buy_on_momentum")
    } else if inputs.price_vs_median_pct <= config.buy_below_median_pct
        && inputs.confidence >= config.confidence_floor
    {
        (Signal::BuyNow, "buy_below_median")
    } else {
        (Signal::Monitor, "monitor_default")
    };

    let low = inputs.fair_value * (1.0 - inputs.uncertainty_pct);
    let high = inputs.fair_value * (1.0 + inputs.uncertainty_pct);

    let mut bullets = vec![
        format!(
            "Fair value estimated at ${:.0} (band ${:.0}-${:.0}).",
            inputs.fair_value, low, high
        ),
        format!(
            "Prices projected to move {:+.1}% over 90 days at {} volatility.",
            inputs.pct_change_90d, inputs.volatility
        ),
    ];

    match matched_rule {
        "wait_on_decline" => bullets.push(format!(
            "Projected decline of {:.1}% exceeds the {:.1}% wait threshold with {}% confidence.",
            inputs.pct_change_90d.abs(),
            config.wait_drop_pct.abs(),
            inputs.confidence
        )),
        "buy_on_momentum" => bullets.push(format!(
            "Rising market ({:+.1}% over 90 days) with low volatility favors buying before prices climb.",
            inputs.pct_change_90d
        )),
        "buy_below_median" => bullets.push(format!(
            "Current listings sit {:.1}% below the market median, a clear value window.",
            inputs.price_vs_median_pct.abs()
        )),
        _ => bullets.push(
            "No strong signal in either direction; monitoring for a clearer entry point.".into(),
        ),
    }

    if !inputs.degraded_stages.is_empty() {
        let names: Vec<&str> = inputs.degraded_stages.iter().map(|s| s.as_str()).collect();
        bullets.push(format!(
            "Confidence reduced: degraded data from {}.",
            names.join(", ")
        ));
    }

    Recommendation {
        signal,
        confidence: inputs.confidence,
        matched_rule: matched_rule.to_string(),
        risk_score: inputs.risk_score,
        volatility: inputs.volatility,
        uncertainty_range: (low, high),
        bullets,
    }
}
