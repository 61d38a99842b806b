//! Data stage: assemble the market context from cache or store.

use shared_types::{
    DataSource, InventoryTrend, MarketContext, PricePoint, StageOutcome, StageOutput, VehicleQuery,
};

use super::Stages;
use crate::collaborators::MarketSnapshot;

/// Relative listing change treated as a real inventory move.
const INVENTORY_SHIFT_THRESHOLD: f64 = 0.05;

impl Stages {
    /// Phase 1. A store failure never fails the run: the stage settles
    /// with the default context and downstream confidence pays for it.
    pub async fn data(&self, query: VehicleQuery) -> StageOutcome {
        let key = query.cache_key();

        if let Some(mut ctx) = self.cache.get(&key) {
            log::debug!("Market context cache hit for {}", key);
            ctx.source = DataSource::Cache;
            return StageOutcome::Ok(StageOutput::Market(ctx));
        }

        let snapshots = match self.store.find_snapshots(&query).await {
            Ok(snapshots) => snapshots,
            Err(err) => {
                log::warn!("Snapshot store failed for {}: {}", key, err);
                return StageOutcome::Fallback {
                    output: StageOutput::Market(MarketContext::default_context()),
                    reason: format!("store_error: {}", err),
                };
            }
        };

        if snapshots.is_empty() {
            return StageOutcome::Fallback {
                output: StageOutput::Market(MarketContext::default_context()),
                reason: "no_market_data".to_string(),
            };
        }

        let ctx = build_context(&snapshots);
        self.cache.put(key, ctx.clone());
        StageOutcome::Ok(StageOutput::Market(ctx))
    }
}

fn build_context(snapshots: &[MarketSnapshot]) -> MarketContext {
    let mut ctx = MarketContext::default_context();
    ctx.source = DataSource::Store;

    for snap in snapshots {
        ctx.push_point(PricePoint {
            date: snap.date.clone(),
            avg_price: snap.avg_price,
        });
    }

    ctx.inventory_count = snapshots.last().map(|s| s.listing_count).unwrap_or(0);
    ctx.inventory_trend = inventory_trend(snapshots);

    let median = median_price(&ctx.history);
    if let (Some(latest), Some(median)) = (ctx.latest_price(), median) {
        if median > 0.0 {
            ctx.price_vs_median_pct = (latest - median) / median * 100.0;
        }
    }
    ctx
}

fn inventory_trend(snapshots: &[MarketSnapshot]) -> InventoryTrend {
    if snapshots.len() < 2 {
        return InventoryTrend::Stable;
    }
    let prev = snapshots[snapshots.len() - 2].listing_count as f64;
    let last = snapshots[snapshots.len() - 1].listing_count as f64;
    if prev <= 0.0 {
        return InventoryTrend::Stable;
    }
    let shift = (last - prev) / prev;
    if shift > INVENTORY_SHIFT_THRESHOLD {
        InventoryTrend::Growing
    } else if shift < -INVENTORY_SHIFT_THRESHOLD {
        InventoryTrend::Declining
    } else {
        InventoryTrend::Stable
    }
}

fn median_price(history: &[PricePoint]) -> Option<f64> {
    if history.is_empty() {
        return None;
    }
    let mut prices: Vec<f64> = history.iter().map(|p| p.avg_price).collect();
    prices.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = prices.len() / 2;
    Some(if prices.len() % 2 == 0 {
        (prices[mid - 1] + prices[mid]) / 2.0
    } else {
        prices[mid]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snaps(data: &[(f64, u64)]) -> Vec<MarketSnapshot> {
        data.iter()
            .enumerate()
            .map(|(i, (price, listings))| MarketSnapshot {
                date: format!("2026-{:02}", i + 1),
                avg_price: *price,
                listing_count: *listings,
            })
            .collect()
    }

    #[test]
    fn test_build_context_computes_median_gap() {
        let ctx = build_context(&snaps(&[(22_000.0, 100), (20_000.0, 100), (18_000.0, 100)]));
        // Median 20_000, latest 18_000
        assert!((ctx.price_vs_median_pct - (-10.0)).abs() < 1e-9);
        assert_eq!(ctx.source, DataSource::Store);
        assert_eq!(ctx.history.len(), 3);
    }

    #[test]
    fn test_inventory_trend_from_last_two_snapshots() {
        assert_eq!(
            inventory_trend(&snaps(&[(1.0, 100), (1.0, 120)])),
            InventoryTrend::Growing
        );
        assert_eq!(
            inventory_trend(&snaps(&[(1.0, 100), (1.0, 80)])),
            InventoryTrend::Declining
        );
        assert_eq!(
            inventory_trend(&snaps(&[(1.0, 100), (1.0, 102)])),
            InventoryTrend::Stable
        );
        assert_eq!(inventory_trend(&snaps(&[(1.0, 100)])), InventoryTrend::Stable);
    }

    #[test]
    fn test_median_of_even_count() {
        let history: Vec<PricePoint> = [10.0, 20.0, 30.0, 40.0]
            .iter()
            .map(|p| PricePoint {
                date: "2026-01".into(),
                avg_price: *p,
            })
            .collect();
        assert_eq!(median_price(&history), Some(25.0));
        assert_eq!(median_price(&[]), None);
    }
}
