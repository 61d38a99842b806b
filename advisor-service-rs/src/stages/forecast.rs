//! Forecast stage: fair value, numeric projection, and the
//! reasoning-blended forecast.

use serde::Deserialize;

use shared_types::{
    ForecastOutcome, MarketContext, StageOutcome, StageOutput, VehicleQuery,
};

use super::Stages;
use crate::collaborators::NumericForecast;

/// Confidence floor/ceiling of the history-depth model.
const BASE_CONFIDENCE: u8 = 40;
const CONFIDENCE_PER_POINT: u8 = 6;
const MAX_NUMERIC_CONFIDENCE: u8 = 85;
const MAX_BLENDED_CONFIDENCE: u8 = 95;
const FALLBACK_CONFIDENCE_PENALTY: u8 = 15;
const MIN_FALLBACK_CONFIDENCE: u8 = 20;

/// What the reasoning service must return for the forecast prompt.
#[derive(Debug, Deserialize)]
struct ReasoningForecast {
    forecast_30d: f64,
    forecast_90d: f64,
    #[allow(dead_code)]
    trend_direction: Option<String>,
    #[allow(dead_code)]
    confidence: Option<String>,
    key_insight: Option<String>,
    best_time_to_buy: Option<String>,
}

impl Stages {
    /// Phase 2. The price model and numeric forecaster are load-bearing;
    /// the reasoning layer only ever upgrades the result.
    pub async fn forecast(&self, query: VehicleQuery, ctx: MarketContext) -> StageOutcome {
        let prediction = match self.pricer.predict(&query, &ctx).await {
            Ok(prediction) => prediction,
            Err(err) => {
                return StageOutcome::Error {
                    reason: format!("price_model: {}", err),
                }
            }
        };

        let numeric = match self.forecaster.project(&ctx.history).await {
            Ok(numeric) => numeric,
            Err(err) => {
                return StageOutcome::Error {
                    reason: format!("forecaster: {}", err),
                }
            }
        };

        let base_confidence = (BASE_CONFIDENCE
            + CONFIDENCE_PER_POINT.saturating_mul(ctx.history.len().min(24) as u8))
        .min(MAX_NUMERIC_CONFIDENCE);

        let numeric_outcome = |reason: String| {
            let confidence = base_confidence
                .saturating_sub(FALLBACK_CONFIDENCE_PENALTY)
                .max(MIN_FALLBACK_CONFIDENCE);
            StageOutcome::Fallback {
                output: StageOutput::Forecast(ForecastOutcome {
                    fair_value: prediction.price,
                    forecast_30d: numeric.forecast_30d,
                    forecast_90d: numeric.forecast_90d,
                    confidence,
                    method: numeric.method.as_str().to_string(),
                    key_insight: None,
                    shap_top_factors: prediction.attributions.clone(),
                }),
                reason,
            }
        };

        if !self.reasoning.is_configured() {
            return numeric_outcome("reasoning_unconfigured".to_string());
        }

        if self.reasoning_breaker.check().is_err() {
            return numeric_outcome("circuit_open".to_string());
        }

        match self.reasoning_forecast(&query, &ctx, &prediction.price, &numeric).await {
            Ok(verdict) => {
                self.reasoning_breaker.record_success();
                let forecast_30d = (1.0 - self.blend.blend_30d) * numeric.forecast_30d
                    + self.blend.blend_30d * verdict.forecast_30d;
                let forecast_90d = (1.0 - self.blend.blend_90d) * numeric.forecast_90d
                    + self.blend.blend_90d * verdict.forecast_90d;
                let key_insight = verdict.key_insight.or(verdict.best_time_to_buy);

                StageOutcome::Ok(StageOutput::Forecast(ForecastOutcome {
                    fair_value: prediction.price,
                    forecast_30d,
                    forecast_90d,
                    confidence: base_confidence.saturating_add(10).min(MAX_BLENDED_CONFIDENCE),
                    method: "reasoning_blended".to_string(),
                    key_insight,
                    shap_top_factors: prediction.attributions.clone(),
                }))
            }
            Err(reason) => {
                self.reasoning_breaker.record_failure();
                numeric_outcome(format!("reasoning_error: {}", reason))
            }
        }
    }

    async fn reasoning_forecast(
        &self,
        query: &VehicleQuery,
        ctx: &MarketContext,
        fair_value: &f64,
        numeric: &NumericForecast,
    ) -> Result<ReasoningForecast, String> {
        let system = "You are a used-car market analyst. \
            Respond with a single JSON object and nothing else.";

        let recent: Vec<String> = ctx
            .history
            .iter()
            .rev()
            .take(6)
            .rev()
            .map(|p| format!("{}: ${:.0}", p.date, p.avg_price))
            .collect();

        let prompt = format!(
            "Vehicle: {} ({} miles, {} condition).\n\
             Fair value estimate: ${:.0}.\n\
             Recent monthly average prices: {}.\n\
             Numeric projection: 30d ${:.0}, 90d ${:.0} ({}).\n\
             Return JSON with keys: forecast_30d (number), forecast_90d (number), \
             trend_direction (rising|falling|stable), confidence (HIGH|MODERATE|LOW), \
             key_insight (one sentence), best_time_to_buy (short phrase).",
            query.label(),
            query.mileage,
            query.condition,
            fair_value,
            recent.join(", "),
            numeric.forecast_30d,
            numeric.forecast_90d,
            numeric.method.as_str(),
        );

        let raw = self
            .reasoning
            .complete(system, &prompt)
            .await
            .map_err(|e| e.to_string())?;

        serde_json::from_str::<ReasoningForecast>(extract_json(&raw))
            .map_err(|e| format!("bad json: {}", e))
    }
}

/// Strip markdown code fences the model sometimes wraps around JSON.
fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}
