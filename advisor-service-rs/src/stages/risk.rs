//! Risk stage: volatility class, risk score, and the uncertainty band.

use shared_types::{
    Condition, InventoryTrend, MarketContext, RiskProfile, StageOutcome, StageOutput,
    VehicleQuery, Volatility,
};

use super::Stages;

/// Coefficient-of-variation cutoffs for the volatility classes.
const LOW_VOLATILITY_CV: f64 = 0.03;
const MODERATE_VOLATILITY_CV: f64 = 0.08;

/// Mileage above which ownership risk gets a surcharge.
const HIGH_MILEAGE: u32 = 120_000;

const BASE_RISK: u8 = 30;

impl Stages {
    /// Phase 2. Purely statistical; never touches a network.
    pub async fn risk(&self, query: VehicleQuery, ctx: MarketContext) -> StageOutcome {
        match coefficient_of_variation(&ctx) {
            Some(cv) => {
                let volatility = if cv < LOW_VOLATILITY_CV {
                    Volatility::Low
                } else if cv < MODERATE_VOLATILITY_CV {
                    Volatility::Moderate
                } else {
                    Volatility::High
                };
                StageOutcome::Ok(StageOutput::Risk(profile(&query, &ctx, volatility)))
            }
            None => StageOutcome::Fallback {
                output: StageOutput::Risk(profile(&query, &ctx, Volatility::Moderate)),
                reason: "insufficient_history".to_string(),
            },
        }
    }
}

/// CV of the price history. `None` with fewer than two points.
fn coefficient_of_variation(ctx: &MarketContext) -> Option<f64> {
    if ctx.history.len() < 2 {
        return None;
    }
    let prices: Vec<f64> = ctx.history.iter().map(|p| p.avg_price).collect();
    let mean = prices.iter().sum::<f64>() / prices.len() as f64;
    if mean <= 0.0 {
        return None;
    }
    let variance =
        prices.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / prices.len() as f64;
    Some(variance.sqrt() / mean)
}

fn profile(query: &VehicleQuery, ctx: &MarketContext, volatility: Volatility) -> RiskProfile {
    let mut score = BASE_RISK as u32;

    score += match volatility {
        Volatility::Low => 0,
        Volatility::Moderate => 20,
        Volatility::High => 40,
    };
    if ctx.inventory_trend == InventoryTrend::Declining {
        score += 10;
    }
    if query.mileage > HIGH_MILEAGE {
        score += 10;
    }
    score += match query.condition {
        Condition::Excellent | Condition::Good => 0,
        Condition::Fair => 10,
        Condition::Salvage => 20,
    };

    let uncertainty_pct = match volatility {
        Volatility::Low => 0.04,
        Volatility::Moderate => 0.08,
        Volatility::High => 0.15,
    };

    RiskProfile {
        risk_score: score.min(100) as u8,
        volatility,
        uncertainty_pct,
    }
}
