//! Explanation stage: a short narrative for the final report.

use shared_types::{ForecastOutcome, Recommendation, StageOutcome, StageOutput};

use super::Stages;

impl Stages {
    /// Phase 4. The narrative comes from the reasoning service when
    /// possible, otherwise from a deterministic template. Either way the
    /// caller gets prose.
    pub async fn explanation(
        &self,
        label: String,
        recommendation: Recommendation,
        forecast: ForecastOutcome,
    ) -> StageOutcome {
        let template = template_explanation(&label, &recommendation, &forecast);

        if !self.reasoning.is_configured() {
            return StageOutcome::Fallback {
                output: StageOutput::Explanation(template),
                reason: "reasoning_unconfigured".to_string(),
            };
        }

        if self.reasoning_breaker.check().is_err() {
            return StageOutcome::Fallback {
                output: StageOutput::Explanation(template),
                reason: "circuit_open".to_string(),
            };
        }

        let system = "You are a plain-spoken car buying advisor. \
            Write exactly three sentences for a non-expert. No markdown.";
        let prompt = format!(
            "Vehicle: {}.\nSignal: {} ({}% confidence, rule {}).\n\
             Fair value ${:.0}, 30-day forecast ${:.0}, 90-day forecast ${:.0}.\n\
             Risk score {} with {} volatility.\nKey points: {}",
            label,
            recommendation.signal,
            recommendation.confidence,
            recommendation.matched_rule,
            forecast.fair_value,
            forecast.forecast_30d,
            forecast.forecast_90d,
            recommendation.risk_score,
            recommendation.volatility,
            recommendation.bullets.join(" "),
        );

        match self.reasoning.complete(system, &prompt).await {
            Ok(text) if !text.trim().is_empty() => {
                self.reasoning_breaker.record_success();
                StageOutcome::Ok(StageOutput::Explanation(text.trim().to_string()))
            }
            Ok(_) => {
                self.reasoning_breaker.record_failure();
                StageOutcome::Fallback {
                    output: StageOutput::Explanation(template),
                    reason: "reasoning_error: empty response".to_string(),
                }
            }
            Err(err) => {
                self.reasoning_breaker.record_failure();
                StageOutcome::Fallback {
                    output: StageOutput::Explanation(template),
                    reason: format!("reasoning_error: {}", err),
                }
            }
        }
    }
}

pub(crate) fn template_explanation(
    label: &str,
    recommendation: &Recommendation,
    forecast: &ForecastOutcome,
) -> String {
    let move_30d_pct = if forecast.fair_value > 0.0 {
        (forecast.forecast_30d - forecast.fair_value) / forecast.fair_value * 100.0
    } else {
        0.0
    };

    format!(
        "The {} is currently valued around ${:.0}. \
         Prices are expected to move about {:+.1}% over the next 30 days. \
         Our recommendation is {} with {}% confidence.",
        label, forecast.fair_value, move_30d_pct, recommendation.signal, recommendation.confidence
    )
}
