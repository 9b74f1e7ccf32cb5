use crate::model::RunStatus;
use tokio::sync::broadcast;

/// Run execution events for real-time updates
#[derive(Debug, Clone)]
pub enum TestEvent {
    RunStarted {
        run_id: String,
        suite_name: String,
        case_count: usize,
    },
    RunFinished {
        run_id: String,
        status: RunStatus,
        passed: u32,
        failed: u32,
        duration_ms: u64,
    },

    CaseStarted {
        run_id: String,
        index: usize,
        case_name: String,
    },
    CaseFinished {
        run_id: String,
        index: usize,
        case_name: String,
        success: bool,
        duration_ms: i64,
        message: String,
    },
}

/// Event emitter for broadcasting run events. Slow or dropped receivers
/// never block execution.
pub struct EventEmitter {
    sender: broadcast::Sender<TestEvent>,
}

impl EventEmitter {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    pub fn emit(&self, event: TestEvent) {
        // No receivers is fine; events are best-effort
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TestEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}
