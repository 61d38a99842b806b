//! Stage identity, settled results, and the agent log.

use serde::{Deserialize, Serialize};

use crate::analysis::{EthicsFindings, ForecastOutcome, RiskProfile, TrendSignal};
use crate::market::MarketContext;
use crate::recommendation::Recommendation;

/// The analytical stages of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageName {
    Data,
    Trend,
    Forecast,
    Risk,
    Decision,
    Explanation,
    Ethics,
}

impl StageName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Data => "data",
            StageName::Trend => "trend",
            StageName::Forecast => "forecast",
            StageName::Risk => "risk",
            StageName::Decision => "decision",
            StageName::Explanation => "explanation",
            StageName::Ethics => "ethics",
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal status of a settled stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Ok,
    Fallback,
    Error,
}

/// Typed payload a stage can produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageOutput {
    Market(MarketContext),
    Trend(TrendSignal),
    Forecast(ForecastOutcome),
    Risk(RiskProfile),
    Decision(Recommendation),
    Explanation(String),
    Ethics(EthicsFindings),
}

/// Tagged union over the three ways a stage can settle. Every stage produces
/// exactly one of these; failures never propagate past the stage boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageOutcome {
    Ok(StageOutput),
    Fallback { output: StageOutput, reason: String },
    Error { reason: String },
}

impl StageOutcome {
    pub fn status(&self) -> StageStatus {
        match self {
            StageOutcome::Ok(_) => StageStatus::Ok,
            StageOutcome::Fallback { .. } => StageStatus::Fallback,
            StageOutcome::Error { .. } => StageStatus::Error,
        }
    }

    /// The payload, present unless the stage errored.
    pub fn output(&self) -> Option<&StageOutput> {
        match self {
            StageOutcome::Ok(output) | StageOutcome::Fallback { output, .. } => Some(output),
            StageOutcome::Error { .. } => None,
        }
    }

    /// True when the stage settled on a degraded path (fallback or error).
    pub fn is_degraded(&self) -> bool {
        !matches!(self, StageOutcome::Ok(_))
    }

    /// Human-readable settlement message for the agent log.
    pub fn message(&self) -> String {
        match self {
            StageOutcome::Ok(_) => "completed".to_string(),
            StageOutcome::Fallback { reason, .. } => format!("fallback: {}", reason),
            StageOutcome::Error { reason } => format!("error: {}", reason),
        }
    }
}

/// One entry of the run's ordered agent log. Entries are appended in
/// settlement order, which within a concurrent phase is completion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentLogEntry {
    pub agent: String,
    pub status: StageStatus,
    pub message: String,
    pub latency_ms: u64,
    /// Stage-specific fields, flattened into the entry on the wire.
    #[serde(flatten)]
    pub detail: serde_json::Map<String, serde_json::Value>,
}

/// A stage that reached a terminal outcome, with its log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettledStage {
    pub stage: StageName,
    pub outcome: StageOutcome,
    pub log: AgentLogEntry,
}

/// Orchestrator run states. `Failed` is reachable only from an unrecoverable
/// input-validation error, never from a stage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Received,
    Phase1Running,
    Phase2Running,
    Phase3Running,
    Phase4Running,
    Aggregated,
    Complete,
    Failed,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunState::Received => "received",
            RunState::Phase1Running => "phase1_running",
            RunState::Phase2Running => "phase2_running",
            RunState::Phase3Running => "phase3_running",
            RunState::Phase4Running => "phase4_running",
            RunState::Aggregated => "aggregated",
            RunState::Complete => "complete",
            RunState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}
