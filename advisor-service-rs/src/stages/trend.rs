//! Trend stage: realized momentum from recent history.

use shared_types::{
    MarketContext, StageOutcome, StageOutput, TrendDirection, TrendSignal,
    INDUSTRY_DEFAULT_MOM_RATE,
};

use super::Stages;

/// Only the most recent intervals count; a price move half a year ago
/// says little about where the market goes next quarter.
const MOMENTUM_WINDOW_INTERVALS: usize = 3;

/// Monthly move below which the direction reads as stable, in percent.
const STABLE_BAND_PCT: f64 = 0.5;

impl Stages {
    /// Phase 2. Pure computation over the market context.
    pub async fn trend(&self, ctx: MarketContext) -> StageOutcome {
        if ctx.history.len() < 2 {
            // Industry default drift: mild appreciation
            let monthly_pct = INDUSTRY_DEFAULT_MOM_RATE * 100.0;
            return StageOutcome::Fallback {
                output: StageOutput::Trend(TrendSignal {
                    pct_change_30d: monthly_pct,
                    pct_change_90d: monthly_pct * 3.0,
                    direction: TrendDirection::Rising,
                }),
                reason: "insufficient_history".to_string(),
            };
        }

        let start = ctx
            .history
            .len()
            .saturating_sub(MOMENTUM_WINDOW_INTERVALS + 1);
        let window = &ctx.history[start..];

        let mut rates = Vec::with_capacity(window.len() - 1);
        for pair in window.windows(2) {
            if pair[0].avg_price > 0.0 {
                rates.push((pair[1].avg_price - pair[0].avg_price) / pair[0].avg_price);
            }
        }
        let monthly_pct = if rates.is_empty() {
            0.0
        } else {
            rates.iter().sum::<f64>() / rates.len() as f64 * 100.0
        };

        let direction = if monthly_pct > STABLE_BAND_PCT {
            TrendDirection::Rising
        } else if monthly_pct < -STABLE_BAND_PCT {
            TrendDirection::Falling
        } else {
            TrendDirection::Stable
        };

        StageOutcome::Ok(StageOutput::Trend(TrendSignal {
            pct_change_30d: monthly_pct,
            pct_change_90d: monthly_pct * 3.0,
            direction,
        }))
    }
}
