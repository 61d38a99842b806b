//! External collaborators of the pipeline, behind traits so stages can be
//! tested against in-process fakes.

pub mod forecaster;
pub mod pricer;
pub mod reasoning;
pub mod snapshot_store;

pub use forecaster::{ForecastMethod, ForecastModel, NumericForecast, TrendProjectionForecaster};
pub use pricer::{HedonicPricer, PricePrediction, PricePredictor};
pub use reasoning::{OpenAiCompatClient, ReasoningService};
pub use snapshot_store::{InMemorySnapshotStore, MarketSnapshot, SnapshotStore};
