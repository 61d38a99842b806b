//! The pipeline orchestrator.
//!
//! Drives one run through its phases: data (sequential), the analytical
//! fan-out (trend, forecast, risk), the decision, and the closing
//! fan-out (explanation, ethics). Stage failures degrade the run; only
//! input validation aborts it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use uuid::Uuid;

use shared_types::{
    AgentLogEntry, ForecastOutcome, MarketContext, RawQuery, Recommendation, Report, Result,
    RunState, SettledStage, StageName, StageOutcome, StageOutput, StageStatus, VehicleQuery,
    Volatility, INDUSTRY_AVG_PRICE, INDUSTRY_DEFAULT_PRICE,
};

use crate::decision::{decide, DecisionInputs};
use crate::event_bus::{EventBus, PipelineEvent};
use crate::settings::AdvisorSettings;
use crate::stage_runner::StageRunner;
use crate::stages::{template_explanation, Stages};

/// Confidence penalty for each analytical stage that settled as a hard
/// error, and for running on the default market context.
const STAGE_ERROR_PENALTY: u8 = 10;
const DEFAULT_CONTEXT_PENALTY: u8 = 15;
const MIN_CONFIDENCE: u8 = 5;
/// Confidence when the forecast itself is gone.
const FORECAST_ERROR_CONFIDENCE: u8 = 25;

/// Mutable state of one run while the orchestrator drives it.
struct PipelineRun {
    id: Uuid,
    query: VehicleQuery,
    state: RunState,
    context: MarketContext,
    results: HashMap<StageName, StageOutcome>,
    agent_log: Vec<AgentLogEntry>,
    recommendation: Option<Recommendation>,
}

pub struct Orchestrator {
    stages: Arc<Stages>,
    runner: StageRunner,
    bus: EventBus,
    settings: AdvisorSettings,
}

impl Orchestrator {
    pub fn new(stages: Arc<Stages>, bus: EventBus, settings: AdvisorSettings) -> Self {
        let runner = StageRunner::new(settings.stage_timeout, bus.clone());
        Self {
            stages,
            runner,
            bus,
            settings,
        }
    }

    /// Execute one full pipeline run. Returns a report unless the input
    /// itself is invalid.
    pub async fn run(&self, raw: RawQuery) -> Result<Report> {
        let run_id = Uuid::new_v4();

        let query = match VehicleQuery::parse(&raw) {
            Ok(query) => query,
            Err(err) => {
                log::warn!("Run {} rejected: {}", run_id, err);
                self.bus.publish(PipelineEvent::RunStateChanged {
                    run_id,
                    state: RunState::Failed,
                });
                return Err(err);
            }
        };

        let mut run = PipelineRun {
            id: run_id,
            query,
            state: RunState::Received,
            context: MarketContext::default_context(),
            results: HashMap::new(),
            agent_log: Vec::new(),
            recommendation: None,
        };
        self.set_state(&mut run, RunState::Received);
        log::info!("Run {} started for {}", run.id, run.query.label());

        // Phase 1: market data, sequential.
        self.set_state(&mut run, RunState::Phase1Running);
        let settled = {
            let stages = self.stages.clone();
            let query = run.query.clone();
            self.runner
                .run(run.id, StageName::Data, async move { stages.data(query).await })
                .await
        };
        if let Some(StageOutput::Market(ctx)) = settled.outcome.output() {
            run.context = ctx.clone();
        }
        self.record(&mut run, settled);

        // Phase 2: analytical fan-out.
        self.set_state(&mut run, RunState::Phase2Running);
        let mut rx = self.bus.subscribe();
        {
            let stages = self.stages.clone();
            let ctx = run.context.clone();
            let runner = self.runner.clone();
            let id = run.id;
            tokio::spawn(async move {
                runner
                    .run(id, StageName::Trend, async move { stages.trend(ctx).await })
                    .await
            });
        }
        {
            let stages = self.stages.clone();
            let query = run.query.clone();
            let ctx = run.context.clone();
            let runner = self.runner.clone();
            let id = run.id;
            tokio::spawn(async move {
                runner
                    .run(id, StageName::Forecast, async move {
                        stages.forecast(query, ctx).await
                    })
                    .await
            });
        }
        {
            let stages = self.stages.clone();
            let query = run.query.clone();
            let ctx = run.context.clone();
            let runner = self.runner.clone();
            let id = run.id;
            tokio::spawn(async move {
                runner
                    .run(id, StageName::Risk, async move { stages.risk(query, ctx).await })
                    .await
            });
        }
        let settled = self
            .collect_phase(
                run.id,
                &mut rx,
                &[StageName::Trend, StageName::Forecast, StageName::Risk],
            )
            .await;
        for stage in settled {
            self.record(&mut run, stage);
        }

        // Phase 3: decision, sequential.
        self.set_state(&mut run, RunState::Phase3Running);
        let inputs = self.decision_inputs(&run);
        let settled = {
            let config = self.settings.decision.clone();
            let decision_inputs = inputs.clone();
            self.runner
                .run(run.id, StageName::Decision, async move {
                    StageOutcome::Ok(StageOutput::Decision(decide(&config, &decision_inputs)))
                })
                .await
        };
        let recommendation = match settled.outcome.output() {
            Some(StageOutput::Decision(rec)) => rec.clone(),
            // The rule table is pure; rebuild inline if its task died
            _ => decide(&self.settings.decision, &inputs),
        };
        run.recommendation = Some(recommendation.clone());
        self.record(&mut run, settled);

        // Phase 4: closing fan-out.
        self.set_state(&mut run, RunState::Phase4Running);
        let forecast = self.forecast_payload(&run);
        let mut rx = self.bus.subscribe();
        {
            let stages = self.stages.clone();
            let label = run.query.label();
            let rec = recommendation.clone();
            let fc = forecast.clone();
            let runner = self.runner.clone();
            let id = run.id;
            tokio::spawn(async move {
                runner
                    .run(id, StageName::Explanation, async move {
                        stages.explanation(label, rec, fc).await
                    })
                    .await
            });
        }
        {
            let stages = self.stages.clone();
            let rec = recommendation.clone();
            let degraded = degraded_stages(&run);
            let runner = self.runner.clone();
            let id = run.id;
            tokio::spawn(async move {
                runner
                    .run(id, StageName::Ethics, async move {
                        stages.ethics(rec, degraded).await
                    })
                    .await
            });
        }
        let settled = self
            .collect_phase(run.id, &mut rx, &[StageName::Explanation, StageName::Ethics])
            .await;
        for stage in settled {
            self.record(&mut run, stage);
        }

        self.set_state(&mut run, RunState::Aggregated);
        let report = self.aggregate(&run, &forecast);
        self.set_state(&mut run, RunState::Complete);
        log::info!(
            "Run {} complete: {} via {}",
            run.id,
            recommendation.signal,
            recommendation.matched_rule
        );
        Ok(report)
    }

    fn set_state(&self, run: &mut PipelineRun, state: RunState) {
        run.state = state;
        log::debug!("Run {} -> {}", run.id, run.state);
        self.bus.publish(PipelineEvent::RunStateChanged {
            run_id: run.id,
            state,
        });
    }

    fn record(&self, run: &mut PipelineRun, settled: SettledStage) {
        run.results.insert(settled.stage, settled.outcome);
        run.agent_log.push(settled.log);
    }

    /// Wait for every expected stage of the current phase to settle.
    /// Stragglers past the grace window settle as timeouts here.
    async fn collect_phase(
        &self,
        run_id: Uuid,
        rx: &mut broadcast::Receiver<PipelineEvent>,
        expected: &[StageName],
    ) -> Vec<SettledStage> {
        let deadline =
            tokio::time::Instant::now() + self.settings.stage_timeout + self.settings.phase_grace;
        let mut collected: Vec<SettledStage> = Vec::with_capacity(expected.len());

        while collected.len() < expected.len() {
            let event = match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Ok(event)) => event,
                Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    log::warn!("Phase collector lagged, skipped {} events", skipped);
                    continue;
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => break,
                Err(_) => break,
            };

            if let PipelineEvent::StageSettled { run_id: id, settled } = event {
                if id == run_id
                    && expected.contains(&settled.stage)
                    && !collected.iter().any(|s| s.stage == settled.stage)
                {
                    collected.push(settled);
                }
            }
        }

        for stage in expected {
            if !collected.iter().any(|s| s.stage == *stage) {
                log::warn!("Stage {} never settled, recording timeout", stage);
                collected.push(timeout_placeholder(
                    *stage,
                    self.settings.stage_timeout.as_millis() as u64,
                ));
            }
        }
        collected
    }

    /// Assemble the rule-table inputs from the settled phases, applying
    /// the confidence penalties for whatever degraded along the way.
    fn decision_inputs(&self, run: &PipelineRun) -> DecisionInputs {
        let mut penalties: u8 = 0;

        let pct_change_90d = match run.results.get(&StageName::Trend).and_then(|o| o.output()) {
            Some(StageOutput::Trend(signal)) => signal.pct_change_90d,
            _ => {
                penalties = penalties.saturating_add(STAGE_ERROR_PENALTY);
                0.0
            }
        };

        let forecast = self.forecast_payload(run);
        let mut confidence = forecast.confidence;
        if run
            .results
            .get(&StageName::Forecast)
            .map(|o| o.output().is_none())
            .unwrap_or(true)
        {
            confidence = FORECAST_ERROR_CONFIDENCE;
        }

        let (volatility, risk_score, uncertainty_pct) =
            match run.results.get(&StageName::Risk).and_then(|o| o.output()) {
                Some(StageOutput::Risk(risk)) => {
                    (risk.volatility, risk.risk_score, risk.uncertainty_pct)
                }
                _ => {
                    penalties = penalties.saturating_add(STAGE_ERROR_PENALTY);
                    (Volatility::Moderate, 50, 0.10)
                }
            };

        if run.context.is_default() {
            penalties = penalties.saturating_add(DEFAULT_CONTEXT_PENALTY);
        }

        // No store context to compare against: proxy the median gap from
        // the fair value versus the industry average.
        let price_vs_median_pct = if run.context.is_default() {
            (forecast.fair_value - INDUSTRY_AVG_PRICE) / INDUSTRY_AVG_PRICE * 100.0
        } else {
            run.context.price_vs_median_pct
        };

        DecisionInputs {
            pct_change_90d,
            confidence: confidence.saturating_sub(penalties).max(MIN_CONFIDENCE).min(100),
            volatility,
            risk_score,
            price_vs_median_pct,
            fair_value: forecast.fair_value,
            uncertainty_pct,
            degraded_stages: degraded_stages(run),
        }
    }

    /// The forecast payload, or conservative defaults when the stage
    /// settled as a hard error.
    fn forecast_payload(&self, run: &PipelineRun) -> ForecastOutcome {
        match run.results.get(&StageName::Forecast).and_then(|o| o.output()) {
            Some(StageOutput::Forecast(forecast)) => forecast.clone(),
            _ => ForecastOutcome {
                fair_value: INDUSTRY_DEFAULT_PRICE,
                forecast_30d: INDUSTRY_DEFAULT_PRICE,
                forecast_90d: INDUSTRY_DEFAULT_PRICE,
                confidence: FORECAST_ERROR_CONFIDENCE,
                method: "unavailable".to_string(),
                key_insight: None,
                shap_top_factors: Vec::new(),
            },
        }
    }

    fn aggregate(&self, run: &PipelineRun, forecast: &ForecastOutcome) -> Report {
        let recommendation = match &run.recommendation {
            Some(recommendation) => recommendation.clone(),
            None => decide(&self.settings.decision, &self.decision_inputs(run)),
        };
        let explanation = match run
            .results
            .get(&StageName::Explanation)
            .and_then(|o| o.output())
        {
            Some(StageOutput::Explanation(text)) => text.clone(),
            _ => template_explanation(&run.query.label(), &recommendation, forecast),
        };

        Report {
            run_id: run.id,
            signal: recommendation.signal,
            confidence: recommendation.confidence,
            fair_value: forecast.fair_value,
            forecast_30d: forecast.forecast_30d,
            forecast_90d: forecast.forecast_90d,
            risk_score: recommendation.risk_score,
            volatility: recommendation.volatility,
            uncertainty_range: [
                recommendation.uncertainty_range.0,
                recommendation.uncertainty_range.1,
            ],
            explanation,
            shap_top_factors: forecast.shap_top_factors.clone(),
            agent_log: run.agent_log.clone(),
            generated_at: Utc::now(),
        }
    }
}

fn degraded_stages(run: &PipelineRun) -> Vec<StageName> {
    let order = [
        StageName::Data,
        StageName::Trend,
        StageName::Forecast,
        StageName::Risk,
    ];
    order
        .iter()
        .filter(|stage| {
            run.results
                .get(stage)
                .map(|o| o.is_degraded())
                .unwrap_or(false)
        })
        .copied()
        .collect()
}

fn timeout_placeholder(stage: StageName, budget_ms: u64) -> SettledStage {
    SettledStage {
        stage,
        outcome: StageOutcome::Error {
            reason: "timeout".to_string(),
        },
        log: AgentLogEntry {
            agent: stage.as_str().to_string(),
            status: StageStatus::Error,
            message: "error: timeout".to_string(),
            latency_ms: budget_ms,
            detail: serde_json::Map::new(),
        },
    }
}
