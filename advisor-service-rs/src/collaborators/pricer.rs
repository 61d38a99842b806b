//! Price model: fair-value estimate with feature attributions.

use async_trait::async_trait;
use chrono::{Datelike, Utc};

use shared_types::{
    Condition, MarketContext, Result, ShapFactor, VehicleQuery, INDUSTRY_AVG_PRICE,
};

/// A fair-value estimate plus the feature attributions behind it.
#[derive(Debug, Clone)]
pub struct PricePrediction {
    pub price: f64,
    /// Top attributions, largest absolute impact first.
    pub attributions: Vec<ShapFactor>,
}

#[async_trait]
pub trait PricePredictor: Send + Sync {
    async fn predict(&self, query: &VehicleQuery, ctx: &MarketContext) -> Result<PricePrediction>;
}

/// Deterministic hedonic pricer. Starts from the latest market average
/// for the vehicle (or the industry average when no history exists) and
/// adjusts for age, mileage, and condition.
pub struct HedonicPricer;

/// Annual depreciation applied when pricing from the industry baseline.
const ANNUAL_DEPRECIATION: f64 = 0.08;
/// Expected miles driven per year for mileage adjustment.
const EXPECTED_MILES_PER_YEAR: f64 = 12_000.0;
/// Dollar value of one mile above or below expectation.
const DOLLARS_PER_MILE: f64 = 0.05;

impl HedonicPricer {
    fn condition_multiplier(condition: Condition) -> f64 {
        match condition {
            Condition::Excellent => 1.08,
            Condition::Good => 1.0,
            Condition::Fair => 0.85,
            Condition::Salvage => 0.5,
        }
    }
}

#[async_trait]
impl PricePredictor for HedonicPricer {
    async fn predict(&self, query: &VehicleQuery, ctx: &MarketContext) -> Result<PricePrediction> {
        let age_years = (Utc::now().year() - query.year).max(0) as f64;
        let mut attributions = Vec::new();

        // Market history for the exact vehicle already prices in its age;
        // the depreciation curve only applies to the generic baseline.
        let base = match ctx.latest_price() {
            Some(price) => price,
            None => {
                let depreciated =
                    INDUSTRY_AVG_PRICE * (1.0 - ANNUAL_DEPRECIATION).powf(age_years);
                attributions.push(ShapFactor {
                    feature: "age".into(),
                    impact: depreciated - INDUSTRY_AVG_PRICE,
                    direction: "negative".into(),
                });
                depreciated
            }
        };

        let expected_miles = EXPECTED_MILES_PER_YEAR * age_years;
        let mileage_delta = (expected_miles - query.mileage as f64) * DOLLARS_PER_MILE;
        if mileage_delta.abs() >= 1.0 {
            attributions.push(ShapFactor {
                feature: "mileage".into(),
                impact: mileage_delta,
                direction: if mileage_delta >= 0.0 { "positive" } else { "negative" }.into(),
            });
        }

        let multiplier = Self::condition_multiplier(query.condition);
        let condition_delta = base * (multiplier - 1.0);
        if condition_delta.abs() >= 1.0 {
            attributions.push(ShapFactor {
                feature: "condition".into(),
                impact: condition_delta,
                direction: if condition_delta >= 0.0 { "positive" } else { "negative" }.into(),
            });
        }

        let price = ((base + mileage_delta + condition_delta).max(500.0) * 100.0).round() / 100.0;

        attributions.sort_by(|a, b| {
            b.impact
                .abs()
                .partial_cmp(&a.impact.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        attributions.truncate(3);

        Ok(PricePrediction { price, attributions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{MarketContext, PricePoint};

    fn query(mileage: u32, condition: Condition) -> VehicleQuery {
        VehicleQuery {
            make: "honda".into(),
            model: "civic".into(),
            year: Utc::now().year() - 5,
            mileage,
            condition,
            region: "florida".into(),
        }
    }

    fn ctx_with_price(price: f64) -> MarketContext {
        let mut ctx = MarketContext::default_context();
        ctx.push_point(PricePoint {
            date: "2026-07".into(),
            avg_price: price,
        });
        ctx
    }

    #[tokio::test]
    async fn test_market_history_anchors_the_estimate() {
        let pricer = HedonicPricer;
        // Expected mileage for a five-year-old car, neutral condition
        let p = pricer
            .predict(&query(60_000, Condition::Good), &ctx_with_price(20_000.0))
            .await
            .unwrap();
        assert!((p.price - 20_000.0).abs() < 1.0);
    }

    #[tokio::test]
    async fn test_high_mileage_lowers_price() {
        let pricer = HedonicPricer;
        let low = pricer
            .predict(&query(30_000, Condition::Good), &ctx_with_price(20_000.0))
            .await
            .unwrap();
        let high = pricer
            .predict(&query(120_000, Condition::Good), &ctx_with_price(20_000.0))
            .await
            .unwrap();
        assert!(high.price < low.price);
        assert!(high
            .attributions
            .iter()
            .any(|a| a.feature == "mileage" && a.direction == "negative"));
    }

    #[tokio::test]
    async fn test_salvage_condition_halves_base() {
        let pricer = HedonicPricer;
        let p = pricer
            .predict(&query(60_000, Condition::Salvage), &ctx_with_price(20_000.0))
            .await
            .unwrap();
        assert!((p.price - 10_000.0).abs() < 1.0);
    }

    #[tokio::test]
    async fn test_empty_history_uses_depreciated_industry_average() {
        let pricer = HedonicPricer;
        let p = pricer
            .predict(
                &query(60_000, Condition::Good),
                &MarketContext::default_context(),
            )
            .await
            .unwrap();
        let expected = INDUSTRY_AVG_PRICE * (1.0 - ANNUAL_DEPRECIATION).powf(5.0);
        assert!((p.price - expected).abs() < 1.0);
        assert!(p.attributions.iter().any(|a| a.feature == "age"));
    }

    #[tokio::test]
    async fn test_attributions_are_capped_at_three() {
        let pricer = HedonicPricer;
        let p = pricer
            .predict(
                &query(150_000, Condition::Fair),
                &MarketContext::default_context(),
            )
            .await
            .unwrap();
        assert!(p.attributions.len() <= 3);
    }
}
