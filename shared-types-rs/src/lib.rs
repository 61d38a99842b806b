//! Shared domain types for the Car Market Advisor pipeline.
//!
//! Every crate in the workspace speaks these types: the vehicle query and its
//! validation rules, the market context assembled by the data stage, the
//! settled stage results and agent log, the recommendation produced by the
//! decision engine, the final report shape, and the error taxonomy.

pub mod analysis;
pub mod error;
pub mod market;
pub mod query;
pub mod recommendation;
pub mod report;
pub mod stage;

pub use analysis::{
    EthicsFindings, ForecastOutcome, RiskProfile, TrendDirection, TrendSignal,
};
pub use error::{AdvisorError, Result};
pub use market::{DataSource, InventoryTrend, MarketContext, PricePoint};
pub use query::{Condition, RawQuery, VehicleQuery};
pub use recommendation::{Recommendation, Signal, Volatility};
pub use report::{Report, ShapFactor};
pub use stage::{
    AgentLogEntry, RunState, SettledStage, StageName, StageOutcome, StageOutput, StageStatus,
};

/// US industry-average used-car price, derived from the listings corpus the
/// price model was trained against. Used as the median proxy when the
/// snapshot store has no market context for a vehicle.
pub const INDUSTRY_AVG_PRICE: f64 = 19_384.0;

/// Default last-known price when no market data exists at all.
pub const INDUSTRY_DEFAULT_PRICE: f64 = 18_500.0;

/// Default month-over-month price drift (~3.6% annual appreciation).
pub const INDUSTRY_DEFAULT_MOM_RATE: f64 = 0.003;
