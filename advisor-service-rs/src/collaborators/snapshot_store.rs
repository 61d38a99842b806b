//! Snapshot store: monthly market observations per vehicle.

use std::collections::HashMap;

use async_trait::async_trait;

use shared_types::{Result, VehicleQuery};

/// One monthly observation for a (make, model, year, region) tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    /// Year-month label, e.g. "2026-05".
    pub date: String,
    pub avg_price: f64,
    pub listing_count: u64,
}

/// Source of market snapshots. Implementations must return snapshots in
/// chronological order, oldest first.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn find_snapshots(&self, query: &VehicleQuery) -> Result<Vec<MarketSnapshot>>;
}

/// In-memory store keyed by the query's cache key, seeded with a small
/// catalog of common vehicles so the service answers out of the box.
pub struct InMemorySnapshotStore {
    series: HashMap<String, Vec<MarketSnapshot>>,
}

impl InMemorySnapshotStore {
    pub fn empty() -> Self {
        Self {
            series: HashMap::new(),
        }
    }

    /// Build a store pre-populated with the seed catalog.
    pub fn seeded() -> Self {
        let mut store = Self::empty();
        for (key, start_price, monthly_drift, base_listings) in SEED_CATALOG {
            store.series.insert(
                (*key).to_string(),
                synthesize_series(*start_price, *monthly_drift, *base_listings),
            );
        }
        store
    }

    /// Register a snapshot series for one vehicle key.
    pub fn with_series(mut self, key: &str, snapshots: Vec<MarketSnapshot>) -> Self {
        self.series.insert(key.to_string(), snapshots);
        self
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn find_snapshots(&self, query: &VehicleQuery) -> Result<Vec<MarketSnapshot>> {
        Ok(self
            .series
            .get(&query.cache_key())
            .cloned()
            .unwrap_or_default())
    }
}

/// (cache key, starting price, month-over-month drift, baseline listings)
const SEED_CATALOG: &[(&str, f64, f64, u64)] = &[
    ("honda:civic:2020:california", 21_200.0, -0.006, 340),
    ("honda:civic:2020:florida", 20_800.0, -0.004, 210),
    ("toyota:camry:2021:california", 24_900.0, -0.003, 280),
    ("toyota:camry:2021:texas", 24_100.0, 0.002, 190),
    ("ford:f-150:2019:texas", 31_500.0, 0.004, 420),
    ("tesla:model 3:2022:california", 33_800.0, -0.011, 510),
    ("chevrolet:silverado:2018:texas", 27_400.0, 0.001, 230),
    ("toyota:corolla:2019:florida", 17_300.0, -0.002, 160),
];

/// Twelve months of synthetic history ending in the current month.
fn synthesize_series(start_price: f64, drift: f64, base_listings: u64) -> Vec<MarketSnapshot> {
    use chrono::{Datelike, Months, Utc};

    let months = 12u32;
    let now = Utc::now();
    let mut out = Vec::with_capacity(months as usize);
    let mut price = start_price;

    for i in (0..months).rev() {
        let month = now
            .checked_sub_months(Months::new(i))
            .unwrap_or(now);
        // Listings ebb with a small seasonal wobble
        let listings = (base_listings as f64 * (1.0 + 0.08 * ((i % 4) as f64 - 1.5) / 1.5)) as u64;
        out.push(MarketSnapshot {
            date: format!("{:04}-{:02}", month.year(), month.month()),
            avg_price: (price * 100.0).round() / 100.0,
            listing_count: listings,
        });
        price *= 1.0 + drift;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{Condition, VehicleQuery};

    fn query(make: &str, model: &str, year: i32, region: &str) -> VehicleQuery {
        VehicleQuery {
            make: make.into(),
            model: model.into(),
            year,
            mileage: 50_000,
            condition: Condition::Good,
            region: region.into(),
        }
    }

    #[tokio::test]
    async fn test_seeded_store_serves_catalog_vehicles() {
        let store = InMemorySnapshotStore::seeded();
        let snaps = store
            .find_snapshots(&query("honda", "civic", 2020, "california"))
            .await
            .unwrap();
        assert_eq!(snaps.len(), 12);
        // Chronological, oldest first
        assert!(snaps[0].date < snaps[11].date);
    }

    #[tokio::test]
    async fn test_unknown_vehicle_yields_empty_series() {
        let store = InMemorySnapshotStore::seeded();
        let snaps = store
            .find_snapshots(&query("yugo", "gv", 1987, "alaska"))
            .await
            .unwrap();
        assert!(snaps.is_empty());
    }

    #[tokio::test]
    async fn test_with_series_overrides() {
        let store = InMemorySnapshotStore::empty().with_series(
            "honda:civic:2020:florida",
            vec![MarketSnapshot {
                date: "2026-07".into(),
                avg_price: 18_000.0,
                listing_count: 42,
            }],
        );
        let snaps = store
            .find_snapshots(&query("honda", "civic", 2020, "florida"))
            .await
            .unwrap();
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].avg_price, 18_000.0);
    }
}
