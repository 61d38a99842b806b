//! Stage implementations.
//!
//! Each stage is an async method on [`Stages`] returning a
//! [`StageOutcome`]; timeouts, panics, logging, and publication are the
//! stage runner's job, never the stage's.

mod data;
mod ethics;
mod explanation;
mod forecast;
mod risk;
mod trend;

pub(crate) use explanation::template_explanation;

use std::sync::Arc;

use resilience::{CircuitBreaker, TtlCache};
use shared_types::MarketContext;

use crate::collaborators::{ForecastModel, PricePredictor, ReasoningService, SnapshotStore};
use crate::settings::BlendWeights;

/// Shared collaborators for every stage. Cheap to clone behind an `Arc`
/// so each stage future can own its handle.
pub struct Stages {
    pub(crate) store: Arc<dyn SnapshotStore>,
    pub(crate) pricer: Arc<dyn PricePredictor>,
    pub(crate) forecaster: Arc<dyn ForecastModel>,
    pub(crate) reasoning: Arc<dyn ReasoningService>,
    pub(crate) cache: Arc<TtlCache<String, MarketContext>>,
    pub(crate) reasoning_breaker: Arc<CircuitBreaker>,
    pub(crate) blend: BlendWeights,
}

impl Stages {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        pricer: Arc<dyn PricePredictor>,
        forecaster: Arc<dyn ForecastModel>,
        reasoning: Arc<dyn ReasoningService>,
        cache: Arc<TtlCache<String, MarketContext>>,
        reasoning_breaker: Arc<CircuitBreaker>,
        blend: BlendWeights,
    ) -> Self {
        Self {
            store,
            pricer,
            forecaster,
            reasoning,
            cache,
            reasoning_breaker,
            blend,
        }
    }
}
