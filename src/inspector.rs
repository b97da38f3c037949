use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

use crate::types::WorkspaceEvent;

const LOG_TARGET: &str = "agentspace::inspector";

/// Debug monitor attached to a workspace when `-debug` is given. Keeps a
/// bounded history of workspace events and fans them out to subscribers.
#[derive(Clone)]
pub struct Inspector {
    sink: LogSink,
}

/// Handle engines use to report workspace activity.
#[derive(Clone)]
pub struct LogSink {
    history: Arc<RwLock<VecDeque<WorkspaceEvent>>>,
    capacity: usize,
    events: broadcast::Sender<WorkspaceEvent>,
}

impl Inspector {
    pub fn start(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (events, _) = broadcast::channel(capacity);
        log::info!(target: LOG_TARGET, "Inspector started (history {})", capacity);
        Self {
            sink: LogSink {
                history: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
                capacity,
                events,
            },
        }
    }

    pub fn log_sink(&self) -> LogSink {
        self.sink.clone()
    }

    pub fn history(&self) -> Vec<WorkspaceEvent> {
        self.sink.history()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkspaceEvent> {
        self.sink.events.subscribe()
    }
}

impl LogSink {
    pub fn emit(&self, event: WorkspaceEvent) {
        log::debug!(target: LOG_TARGET, "{:?}", event);

        if let Ok(mut history) = self.history.write() {
            if history.len() == self.capacity {
                history.pop_front();
            }
            history.push_back(event.clone());
        }

        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub fn history(&self) -> Vec<WorkspaceEvent> {
        self.history
            .read()
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink")
            .field("capacity", &self.capacity)
            .finish()
    }
}
