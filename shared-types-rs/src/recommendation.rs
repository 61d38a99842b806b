//! The recommendation produced by the decision engine.

use serde::{Deserialize, Serialize};

/// The final buy signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    #[serde(rename = "BUY NOW")]
    BuyNow,
    #[serde(rename = "WAIT")]
    Wait,
    #[serde(rename = "MONITOR")]
    Monitor,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::BuyNow => write!(f, "BUY NOW"),
            Signal::Wait => write!(f, "WAIT"),
            Signal::Monitor => write!(f, "MONITOR"),
        }
    }
}

/// Price volatility class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Volatility {
    Low,
    Moderate,
    High,
}

impl std::fmt::Display for Volatility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Volatility::Low => write!(f, "Low"),
            Volatility::Moderate => write!(f, "Moderate"),
            Volatility::High => write!(f, "High"),
        }
    }
}

/// Produced exactly once per run by the decision engine; later stages attach
/// to it but never alter it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub signal: Signal,
    /// 0-100.
    pub confidence: u8,
    /// Identifier of the first decision rule that matched, for auditability.
    pub matched_rule: String,
    /// 0-100.
    pub risk_score: u8,
    pub volatility: Volatility,
    /// (low, high) price band around fair value.
    pub uncertainty_range: (f64, f64),
    /// Explanatory bullets citing the numbers that drove the signal.
    pub bullets: Vec<String>,
}
