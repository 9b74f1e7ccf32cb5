//! Real-time push channel and periodic statistics publishing.
//!
//! Named events fan out to zero-or-more subscribers; a send to a dead
//! subscriber is silently dropped and the subscriber pruned. The periodic
//! statistics task reads run state snapshot-style on its own cadence and
//! never blocks case execution.

use crate::model::{RunRecord, RunStatus};
use crate::store::RunStore;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub const EVENT_REAL_TIME_DATA: &str = "realTimeData";
pub const EVENT_STATISTICS_REPORT: &str = "statisticsReport";
pub const EVENT_EXECUTION_UPDATE: &str = "testExecutionUpdate";

/// One named event pushed to subscribers
#[derive(Debug, Clone)]
pub struct PushEvent {
    pub name: String,
    pub payload: Value,
}

/// Fan-out channel for named monitoring events
#[derive(Default)]
pub struct PushChannel {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<PushEvent>>>,
}

impl PushChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<PushEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    /// Publish to every live subscriber, pruning the dead ones
    pub fn publish(&self, name: &str, payload: Value) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| {
            tx.send(PushEvent {
                name: name.to_string(),
                payload: payload.clone(),
            })
            .is_ok()
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    /// Push a per-run status update
    pub fn publish_execution_update(&self, run: &RunRecord) {
        self.publish(
            EVENT_EXECUTION_UPDATE,
            json!({
                "executionId": run.id,
                "suiteId": run.suite_id,
                "status": run.status,
            }),
        );
    }
}

/// Snapshot statistics over the run store
pub fn statistics_snapshot(runs: &dyn RunStore) -> Value {
    let completed = runs.list_by_status(RunStatus::Completed).len();
    let failed = runs.list_by_status(RunStatus::Failed).len();
    let running = runs.list_by_status(RunStatus::Running).len();
    let pending = runs.list_by_status(RunStatus::Pending).len();
    let total = completed + failed + running + pending;
    json!({
        "totalExecutions": total,
        "completed": completed,
        "failed": failed,
        "running": running,
        "pending": pending,
        "successRate": if completed + failed > 0 {
            completed as f64 / (completed + failed) as f64 * 100.0
        } else {
            0.0
        },
    })
}

/// Spawn the periodic statistics publisher. Runs until the channel has no
/// owner left; stale reads are acceptable by design.
pub fn spawn_statistics_task(
    channel: Arc<PushChannel>,
    runs: Arc<dyn RunStore>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let snapshot = statistics_snapshot(runs.as_ref());
            channel.publish(EVENT_STATISTICS_REPORT, snapshot.clone());
            channel.publish(EVENT_REAL_TIME_DATA, snapshot);
        }
    })
}
