//! Ethics stage: audits the recommendation for internal consistency.

use shared_types::{
    EthicsFindings, Recommendation, Signal, StageName, StageOutcome, StageOutput,
};

use super::Stages;

/// Confidence above this must be backed by fully healthy inputs.
const MAX_DEGRADED_CONFIDENCE: u8 = 85;

impl Stages {
    /// Phase 4. The audit never blocks the report; failed checks are
    /// recorded as findings for the caller to see.
    pub async fn ethics(
        &self,
        recommendation: Recommendation,
        degraded_stages: Vec<StageName>,
    ) -> StageOutcome {
        let mut notes = Vec::new();
        let mut passed = true;

        if !degraded_stages.is_empty() && recommendation.confidence > MAX_DEGRADED_CONFIDENCE {
            passed = false;
            notes.push(format!(
                "confidence {} despite degraded stages: {}",
                recommendation.confidence,
                degraded_stages
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }

        if !rule_matches_signal(&recommendation) {
            passed = false;
            notes.push(format!(
                "rule '{}' is inconsistent with signal '{}'",
                recommendation.matched_rule, recommendation.signal
            ));
        }

        if !degraded_stages.is_empty() {
            let disclosed = recommendation
                .bullets
                .iter()
                .any(|b| b.contains("degraded") || b.contains("Confidence reduced"));
            if !disclosed {
                passed = false;
                notes.push("degraded inputs not disclosed in the recommendation".to_string());
            }
        }

        if passed {
            notes.push("recommendation consistent with its inputs".to_string());
        }

        StageOutcome::Ok(StageOutput::Ethics(EthicsFindings { passed, notes }))
    }
}

fn rule_matches_signal(recommendation: &Recommendation) -> bool {
    match recommendation.matched_rule.as_str() {
        "wait_on_decline" => recommendation.signal == Signal::Wait,
        "buy_on_momentum" | "buy_below_median" => recommendation.signal == Signal::BuyNow,
        "monitor_default" => recommendation.signal == Signal::Monitor,
        _ => false,
    }
}
