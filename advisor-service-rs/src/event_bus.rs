//! Broadcast event bus connecting the orchestrator to its stages.
//!
//! Stages publish settlement events; the orchestrator's fan-in collector
//! subscribes before spawning a phase so no settlement can be missed.

use tokio::sync::broadcast;
use uuid::Uuid;

use shared_types::{RunState, SettledStage};

/// Events published during a pipeline run.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    RunStateChanged { run_id: Uuid, state: RunState },
    StageSettled { run_id: Uuid, settled: SettledStage },
}

/// Cloneable handle around a broadcast channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. A send error only means no subscriber is
    /// currently listening, which is fine for state-change events.
    pub fn publish(&self, event: PipelineEvent) {
        if self.sender.send(event).is_err() {
            log::trace!("No subscribers for pipeline event");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        // Enough for several concurrent runs worth of events
        Self::new(256)
    }
}
