//! Market context assembled by the data stage.

use serde::{Deserialize, Serialize};

/// Upper bound on retained history points (monthly snapshots, two years).
pub const MAX_HISTORY_POINTS: usize = 24;

/// Direction of listing inventory over recent snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InventoryTrend {
    Growing,
    Stable,
    Declining,
}

/// Where the market context came from. Degrades decision confidence when the
/// pipeline had to fall back to defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Store,
    Cache,
    Default,
}

/// One month of averaged price data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Year-month label, e.g. "2025-06".
    pub date: String,
    pub avg_price: f64,
}

/// Market context for one (make, model, year, region) tuple.
///
/// Mutable only while the data stage builds it; once handed to Phase 2 it is
/// read-only for the rest of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketContext {
    pub inventory_count: u64,
    pub inventory_trend: InventoryTrend,
    /// Latest average price vs the overall median, in percent. Negative means
    /// the vehicle currently trades below market.
    pub price_vs_median_pct: f64,
    /// Bounded monthly price history, oldest first.
    pub history: Vec<PricePoint>,
    pub source: DataSource,
}

impl MarketContext {
    /// Best-effort default used when the snapshot store yields nothing.
    pub fn default_context() -> Self {
        Self {
            inventory_count: 0,
            inventory_trend: InventoryTrend::Stable,
            price_vs_median_pct: 0.0,
            history: Vec::new(),
            source: DataSource::Default,
        }
    }

    /// Append a history point, dropping the oldest beyond the bound.
    pub fn push_point(&mut self, point: PricePoint) {
        self.history.push(point);
        if self.history.len() > MAX_HISTORY_POINTS {
            let excess = self.history.len() - MAX_HISTORY_POINTS;
            self.history.drain(..excess);
        }
    }

    /// Most recent average price, if any history exists.
    pub fn latest_price(&self) -> Option<f64> {
        self.history.last().map(|p| p.avg_price)
    }

    pub fn is_default(&self) -> bool {
        matches!(self.source, DataSource::Default)
    }
}
