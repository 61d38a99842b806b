//! Uniform execution wrapper around every pipeline stage.
//!
//! The runner enforces the per-stage timeout, converts panics into
//! settled errors, stamps the latency, builds the agent log entry, and
//! publishes the settlement on the event bus. Stage logic itself never
//! sees any of this.

use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use shared_types::{AgentLogEntry, SettledStage, StageName, StageOutcome, StageOutput};

use crate::event_bus::{EventBus, PipelineEvent};

#[derive(Clone)]
pub struct StageRunner {
    timeout: Duration,
    bus: EventBus,
}

impl StageRunner {
    pub fn new(timeout: Duration, bus: EventBus) -> Self {
        Self { timeout, bus }
    }

    /// Drive one stage future to settlement. Never returns an error: a
    /// timeout or panic settles the stage as `StageOutcome::Error`.
    pub async fn run<F>(&self, run_id: Uuid, stage: StageName, fut: F) -> SettledStage
    where
        F: std::future::Future<Output = StageOutcome> + Send + 'static,
    {
        let started = Instant::now();
        let handle = tokio::spawn(fut);
        let abort = handle.abort_handle();

        let outcome = match tokio::time::timeout(self.timeout, handle).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_err)) => {
                log::error!("Stage {} panicked: {}", stage, join_err);
                StageOutcome::Error {
                    reason: format!("panicked: {}", join_err),
                }
            }
            Err(_) => {
                // The stage future is past saving; stop its task too
                abort.abort();
                log::warn!(
                    "Stage {} exceeded its {}ms budget",
                    stage,
                    self.timeout.as_millis()
                );
                StageOutcome::Error {
                    reason: "timeout".to_string(),
                }
            }
        };

        let latency_ms = started.elapsed().as_millis() as u64;
        let log = build_log_entry(stage, &outcome, latency_ms);
        let settled = SettledStage {
            stage,
            outcome,
            log,
        };

        self.bus.publish(PipelineEvent::StageSettled {
            run_id,
            settled: settled.clone(),
        });
        settled
    }
}

/// Assemble the log entry for a settled stage, with the stage-specific
/// detail fields that make the log useful without the full payload.
fn build_log_entry(stage: StageName, outcome: &StageOutcome, latency_ms: u64) -> AgentLogEntry {
    let mut detail = serde_json::Map::new();

    if let Some(output) = outcome.output() {
        match output {
            StageOutput::Market(ctx) => {
                detail.insert("source".into(), serde_json::json!(ctx.source));
                detail.insert("history_points".into(), serde_json::json!(ctx.history.len()));
            }
            StageOutput::Trend(signal) => {
                detail.insert(
                    "pct_change_90d".into(),
                    serde_json::json!(signal.pct_change_90d),
                );
            }
            StageOutput::Forecast(forecast) => {
                detail.insert("method".into(), serde_json::json!(forecast.method));
                detail.insert("confidence".into(), serde_json::json!(forecast.confidence));
            }
            StageOutput::Risk(risk) => {
                detail.insert("volatility".into(), serde_json::json!(risk.volatility));
            }
            StageOutput::Decision(rec) => {
                detail.insert("signal".into(), serde_json::json!(rec.signal));
                detail.insert("matched_rule".into(), serde_json::json!(rec.matched_rule));
            }
            StageOutput::Explanation(_) => {}
            StageOutput::Ethics(findings) => {
                detail.insert("passed".into(), serde_json::json!(findings.passed));
            }
        }
    }

    AgentLogEntry {
        agent: stage.as_str().to_string(),
        status: outcome.status(),
        message: outcome.message(),
        latency_ms,
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{StageStatus, TrendDirection, TrendSignal};

    fn runner(timeout_ms: u64) -> StageRunner {
        StageRunner::new(Duration::from_millis(timeout_ms), EventBus::default())
    }

    fn trend_outcome() -> StageOutcome {
        StageOutcome::Ok(StageOutput::Trend(TrendSignal {
            pct_change_30d: 0.5,
            pct_change_90d: 1.5,
            direction: TrendDirection::Rising,
        }))
    }

    #[tokio::test]
    async fn test_successful_stage_settles_ok() {
        let settled = runner(1000)
            .run(Uuid::new_v4(), StageName::Trend, async { trend_outcome() })
            .await;

        assert_eq!(settled.stage, StageName::Trend);
        assert_eq!(settled.log.status, StageStatus::Ok);
        assert_eq!(settled.log.agent, "trend");
        assert_eq!(settled.log.detail["pct_change_90d"], 1.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_stage_settles_as_timeout_error() {
        let settled = runner(50)
            .run(Uuid::new_v4(), StageName::Forecast, async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                trend_outcome()
            })
            .await;

        assert_eq!(settled.log.status, StageStatus::Error);
        assert_eq!(settled.log.message, "error: timeout");
        assert!(settled.outcome.output().is_none());
    }

    #[tokio::test]
    async fn test_panicking_stage_settles_as_error() {
        let settled = runner(1000)
            .run(Uuid::new_v4(), StageName::Risk, async {
                panic!("boom");
            })
            .await;

        assert_eq!(settled.log.status, StageStatus::Error);
        assert!(settled.log.message.contains("panicked"));
    }

    #[tokio::test]
    async fn test_settlement_is_published() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let runner = StageRunner::new(Duration::from_millis(500), bus);
        let run_id = Uuid::new_v4();

        runner
            .run(run_id, StageName::Trend, async { trend_outcome() })
            .await;

        match rx.recv().await.unwrap() {
            PipelineEvent::StageSettled { run_id: got, settled } => {
                assert_eq!(got, run_id);
                assert_eq!(settled.stage, StageName::Trend);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
