//! advisor-service-rs
//!
//! Car market advisor: a multi-stage decision pipeline that turns a
//! vehicle query into a BUY NOW / WAIT / MONITOR recommendation, served
//! over REST. Stage failures degrade the answer instead of failing the
//! request; only invalid input aborts a run.

pub mod collaborators;
pub mod decision;
pub mod event_bus;
pub mod gateway;
pub mod orchestrator;
pub mod settings;
pub mod stage_runner;
pub mod stages;

use std::sync::Arc;

use resilience::{CircuitBreaker, RateLimiter, TtlCache};

use collaborators::{
    HedonicPricer, InMemorySnapshotStore, OpenAiCompatClient, TrendProjectionForecaster,
};
use event_bus::EventBus;
use gateway::AppState;
use orchestrator::Orchestrator;
use settings::AdvisorSettings;
use stages::Stages;

/// Wire up the full service with its default collaborators. Fails only
/// when the reasoning HTTP client cannot be constructed.
pub fn build_app_state(settings: AdvisorSettings) -> shared_types::Result<AppState> {
    let cache = Arc::new(TtlCache::new(settings.cache_ttl));
    let reasoning_breaker = Arc::new(CircuitBreaker::new("reasoning", settings.breaker.clone()));
    let rate_limiter = Arc::new(RateLimiter::new(settings.rate_limit.clone()));

    let stages = Arc::new(Stages::new(
        Arc::new(InMemorySnapshotStore::seeded()),
        Arc::new(HedonicPricer),
        Arc::new(TrendProjectionForecaster),
        Arc::new(OpenAiCompatClient::new(settings.reasoning.clone())?),
        cache.clone(),
        reasoning_breaker.clone(),
        settings.blend.clone(),
    ));

    let orchestrator = Arc::new(Orchestrator::new(stages, EventBus::default(), settings));

    Ok(AppState {
        orchestrator,
        rate_limiter,
        cache,
        reasoning_breaker,
    })
}
