//! End-to-end pipeline runs against in-process collaborators.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use advisor_service::collaborators::{
    ForecastModel, HedonicPricer, InMemorySnapshotStore, MarketSnapshot, NumericForecast,
    ReasoningService, SnapshotStore, TrendProjectionForecaster,
};
use advisor_service::event_bus::EventBus;
use advisor_service::orchestrator::Orchestrator;
use advisor_service::settings::AdvisorSettings;
use advisor_service::stages::Stages;
use resilience::{CircuitBreaker, CircuitBreakerConfig, TtlCache};
use shared_types::{AdvisorError, PricePoint, RawQuery, Result, Signal, StageStatus};

struct JsonReasoning;

#[async_trait]
impl ReasoningService for JsonReasoning {
    async fn complete(&self, _system: &str, prompt: &str) -> Result<String> {
        if prompt.contains("Return JSON") {
            Ok(serde_json::json!({
                "forecast_30d": 17_300.0,
                "forecast_90d": 17_250.0,
                "trend_direction": "stable",
                "confidence": "HIGH",
                "key_insight": "Listings below median suggest a value window.",
                "best_time_to_buy": "now"
            })
            .to_string())
        } else {
            Ok("This car trades below the market median. Prices look stable. Buying now locks in the discount.".to_string())
        }
    }
}

struct OffReasoning;

#[async_trait]
impl ReasoningService for OffReasoning {
    fn is_configured(&self) -> bool {
        false
    }
    async fn complete(&self, _system: &str, _prompt: &str) -> Result<String> {
        Err(AdvisorError::DependencyUnavailable {
            dependency: "reasoning".into(),
            reason: "unconfigured".into(),
        })
    }
}

struct SlowForecaster;

#[async_trait]
impl ForecastModel for SlowForecaster {
    async fn project(&self, _history: &[PricePoint]) -> Result<NumericForecast> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        unreachable!("the stage budget must fire first")
    }
}

fn raw_query() -> RawQuery {
    RawQuery {
        make: "Honda".into(),
        model: "Civic".into(),
        year: 2020,
        mileage: 55_000,
        condition: "good".into(),
        region: "Florida".into(),
    }
}

/// Monthly series that trades well below its historical median while
/// staying flat over the recent months.
fn below_median_series() -> Vec<MarketSnapshot> {
    let prices = [
        22_800.0, 22_400.0, 22_000.0, 21_600.0, 17_350.0, 17_320.0, 17_340.0, 17_330.0,
    ];
    prices
        .iter()
        .enumerate()
        .map(|(i, price)| MarketSnapshot {
            date: format!("2026-{:02}", i + 1),
            avg_price: *price,
            listing_count: 100,
        })
        .collect()
}

struct Harness {
    orchestrator: Orchestrator,
    breaker: Arc<CircuitBreaker>,
}

fn harness(
    store: Arc<dyn SnapshotStore>,
    forecaster: Arc<dyn ForecastModel>,
    reasoning: Arc<dyn ReasoningService>,
    settings: AdvisorSettings,
) -> Harness {
    let breaker = Arc::new(CircuitBreaker::new("reasoning", settings.breaker.clone()));
    let cache = Arc::new(TtlCache::new(settings.cache_ttl));
    let stages = Arc::new(Stages::new(
        store,
        Arc::new(HedonicPricer),
        forecaster,
        reasoning,
        cache,
        breaker.clone(),
        settings.blend.clone(),
    ));
    Harness {
        orchestrator: Orchestrator::new(stages, EventBus::default(), settings),
        breaker,
    }
}

#[tokio::test]
async fn test_below_median_vehicle_gets_buy_now() {
    let store = Arc::new(
        InMemorySnapshotStore::empty().with_series("honda:civic:2020:florida", below_median_series()),
    );
    let h = harness(
        store,
        Arc::new(TrendProjectionForecaster),
        Arc::new(JsonReasoning),
        AdvisorSettings::default(),
    );

    let report = h.orchestrator.run(raw_query()).await.unwrap();

    assert_eq!(report.signal, Signal::BuyNow);
    // Eight history points blended with reasoning: full confidence
    assert_eq!(report.confidence, 95);
    assert_eq!(report.agent_log.len(), 7);

    let decision_log = report
        .agent_log
        .iter()
        .find(|e| e.agent == "decision")
        .unwrap();
    assert_eq!(decision_log.detail["matched_rule"], "buy_below_median");

    // All seven stages are in the log exactly once
    for agent in ["data", "trend", "forecast", "risk", "decision", "explanation", "ethics"] {
        assert_eq!(
            report.agent_log.iter().filter(|e| e.agent == agent).count(),
            1,
            "missing or duplicated log entry for {}",
            agent
        );
    }

    let ethics_log = report.agent_log.iter().find(|e| e.agent == "ethics").unwrap();
    assert_eq!(ethics_log.detail["passed"], true);
    assert!(!report.explanation.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_forecast_timeout_degrades_without_aborting() {
    let store = Arc::new(
        InMemorySnapshotStore::empty().with_series("honda:civic:2020:florida", below_median_series()),
    );
    let settings = AdvisorSettings {
        stage_timeout: Duration::from_millis(100),
        phase_grace: Duration::from_millis(50),
        ..AdvisorSettings::default()
    };
    let h = harness(
        store,
        Arc::new(SlowForecaster),
        Arc::new(OffReasoning),
        settings,
    );

    let report = h.orchestrator.run(raw_query()).await.unwrap();

    let forecast_log = report
        .agent_log
        .iter()
        .find(|e| e.agent == "forecast")
        .unwrap();
    assert_eq!(forecast_log.status, StageStatus::Error);
    assert_eq!(forecast_log.message, "error: timeout");

    // Dead forecast pins confidence to the floor and blocks the
    // confidence-gated rules
    assert_eq!(report.confidence, 25);
    assert_eq!(report.signal, Signal::Monitor);
    assert_eq!(report.agent_log.len(), 7);
}

#[tokio::test]
async fn test_invalid_input_aborts_the_run() {
    let h = harness(
        Arc::new(InMemorySnapshotStore::seeded()),
        Arc::new(TrendProjectionForecaster),
        Arc::new(OffReasoning),
        AdvisorSettings::default(),
    );

    let mut raw = raw_query();
    raw.year = 1700;
    let err = h.orchestrator.run(raw).await.unwrap_err();
    assert!(matches!(err, AdvisorError::Validation(_)));
}

#[tokio::test]
async fn test_open_circuit_forces_numeric_fallbacks() {
    let store = Arc::new(
        InMemorySnapshotStore::empty().with_series("honda:civic:2020:florida", below_median_series()),
    );
    let settings = AdvisorSettings {
        breaker: CircuitBreakerConfig {
            failure_threshold: 1,
            cooldown: Duration::from_secs(600),
        },
        ..AdvisorSettings::default()
    };
    let h = harness(
        store,
        Arc::new(TrendProjectionForecaster),
        Arc::new(JsonReasoning),
        settings,
    );
    h.breaker.record_failure();

    let report = h.orchestrator.run(raw_query()).await.unwrap();

    let forecast_log = report
        .agent_log
        .iter()
        .find(|e| e.agent == "forecast")
        .unwrap();
    assert_eq!(forecast_log.status, StageStatus::Fallback);
    assert!(forecast_log.message.contains("circuit_open"));

    let explanation_log = report
        .agent_log
        .iter()
        .find(|e| e.agent == "explanation")
        .unwrap();
    assert_eq!(explanation_log.status, StageStatus::Fallback);

    // Ethics still settles and the report still carries prose
    assert!(report.agent_log.iter().any(|e| e.agent == "ethics"));
    assert!(!report.explanation.is_empty());
    // Numeric-only confidence: base 85 minus the fallback penalty
    assert_eq!(report.confidence, 70);
}

#[tokio::test]
async fn test_unknown_vehicle_runs_on_default_context() {
    let h = harness(
        Arc::new(InMemorySnapshotStore::empty()),
        Arc::new(TrendProjectionForecaster),
        Arc::new(OffReasoning),
        AdvisorSettings::default(),
    );

    let report = h.orchestrator.run(raw_query()).await.unwrap();

    let data_log = report.agent_log.iter().find(|e| e.agent == "data").unwrap();
    assert_eq!(data_log.status, StageStatus::Fallback);
    assert!(data_log.message.contains("no_market_data"));

    // Degradation must be disclosed in the report's confidence
    assert!(report.confidence < 50);
    assert_eq!(report.agent_log.len(), 7);
}

#[tokio::test]
async fn test_second_run_hits_the_market_cache() {
    let store = Arc::new(
        InMemorySnapshotStore::empty().with_series("honda:civic:2020:florida", below_median_series()),
    );
    let h = harness(
        store,
        Arc::new(TrendProjectionForecaster),
        Arc::new(OffReasoning),
        AdvisorSettings::default(),
    );

    let first = h.orchestrator.run(raw_query()).await.unwrap();
    let second = h.orchestrator.run(raw_query()).await.unwrap();

    let source_of = |report: &shared_types::Report| {
        report
            .agent_log
            .iter()
            .find(|e| e.agent == "data")
            .unwrap()
            .detail["source"]
            .clone()
    };
    assert_eq!(source_of(&first), "store");
    assert_eq!(source_of(&second), "cache");
    assert_eq!(first.signal, second.signal);
}
