//! Caller identity, anonymous usage quota and the usage-event sink

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

/// Identity of the caller issuing an extraction request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// Unauthenticated caller, identified only by a session id.
    Anonymous { session: String },
    /// Authenticated user; bypasses the anonymous ceiling.
    User { id: i64 },
}

/// Per-session counter bounding anonymous use.
///
/// The counter is read and incremented under a single lock so concurrent
/// requests from the same session cannot undercount.
#[derive(Debug)]
pub struct QuotaStore {
    counts: Mutex<HashMap<String, u32>>,
    ceiling: u32,
}

impl QuotaStore {
    pub fn new(ceiling: u32) -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
            ceiling,
        }
    }

    /// Returns true when the caller may proceed. Anonymous callers consume
    /// one use; authenticated callers always pass and consume nothing.
    pub fn check_and_increment(&self, caller: &Caller) -> bool {
        let session = match caller {
            Caller::User { .. } => return true,
            Caller::Anonymous { session } => session,
        };

        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        let used = counts.entry(session.clone()).or_insert(0);
        if *used >= self.ceiling {
            return false;
        }
        *used += 1;
        true
    }
}

/// Append-only usage recorder. Fire-and-forget from the pipeline's
/// perspective; implementations must not fail the request.
pub trait UsageSink: Send + Sync {
    fn record(&self, caller: &Caller, tool_name: &str, metadata: Value);
}

/// Default sink: emits a structured log line per usage event.
#[derive(Debug, Default)]
pub struct LogUsageSink;

impl UsageSink for LogUsageSink {
    fn record(&self, caller: &Caller, tool_name: &str, metadata: Value) {
        tracing::info!(?caller, tool_name, %metadata, "tool usage");
    }
}

/// In-memory sink for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub events: Mutex<Vec<(Caller, String, Value)>>,
}

impl UsageSink for MemorySink {
    fn record(&self, caller: &Caller, tool_name: &str, metadata: Value) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((caller.clone(), tool_name.to_string(), metadata));
    }
}
