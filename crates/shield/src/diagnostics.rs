use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use tokio::sync::broadcast;
use uuid::Uuid;

/// How many records the sink keeps
pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CallStatus {
    Success,
    Failure,
}

/// One observed call to the model service or a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub endpoint: String,
    pub status: CallStatus,
    pub latency_ms: u64,
    pub details: String,
}

impl ApiRecord {
    pub fn new<E, D>(endpoint: E, status: CallStatus, latency: Duration, details: D) -> Self
    where
        E: Into<String>,
        D: Into<String>,
    {
        Self {
            id: Uuid::new_v4().simple().to_string()[..9].to_string(),
            timestamp: Utc::now(),
            endpoint: endpoint.into(),
            status,
            latency_ms: latency.as_millis() as u64,
            details: details.into(),
        }
    }
}

/// Bounded window of recent call records with live subscribers
///
/// Writers only append. Readers take a snapshot with [`DiagnosticsSink::recent`] or follow
/// new records through [`DiagnosticsSink::subscribe`].
pub struct DiagnosticsSink {
    records: Mutex<VecDeque<ApiRecord>>,
    capacity: usize,
    notify: broadcast::Sender<ApiRecord>,
}

impl Default for DiagnosticsSink {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl DiagnosticsSink {
    pub fn new(capacity: usize) -> Self {
        let (notify, _) = broadcast::channel(capacity.max(1));
        let sink = Self {
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            notify,
        };
        sink.record(ApiRecord::new(
            "SYSTEM_BOOT",
            CallStatus::Success,
            Duration::ZERO,
            "Shield initialized with the bundled cyclone scenario.",
        ));
        sink
    }

    /// Add a record, evicting the oldest beyond capacity, and notify subscribers
    pub fn record(&self, record: ApiRecord) {
        {
            let mut records = self.records.lock();
            records.push_front(record.clone());
            records.truncate(self.capacity);
        }
        // no subscribers is fine
        let _ = self.notify.send(record);
    }

    /// Records newest first
    pub fn recent(&self) -> Vec<ApiRecord> {
        self.records.lock().iter().cloned().collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ApiRecord> {
        self.notify.subscribe()
    }

    pub fn failures(&self) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|r| r.status == CallStatus::Failure)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boot_record() {
        let sink = DiagnosticsSink::default();
        let recent = sink.recent();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].endpoint, "SYSTEM_BOOT");
        assert_eq!(recent[0].id.len(), 9);
    }

    #[test]
    fn test_bounded_newest_first() {
        let sink = DiagnosticsSink::new(3);
        for i in 0..5 {
            sink.record(ApiRecord::new(
                "Model Chat",
                CallStatus::Success,
                Duration::from_millis(i),
                format!("call {}", i),
            ));
        }
        let recent = sink.recent();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].details, "call 4");
        assert_eq!(recent[2].details, "call 2");
    }

    #[tokio::test]
    async fn test_subscribe() {
        let sink = DiagnosticsSink::default();
        let mut rx = sink.subscribe();
        sink.record(ApiRecord::new(
            "Model Chat",
            CallStatus::Failure,
            Duration::from_millis(1200),
            "Agent Error: timeout",
        ));
        let record = rx.recv().await.unwrap();
        assert_eq!(record.status, CallStatus::Failure);
        assert_eq!(record.latency_ms, 1200);
        assert_eq!(sink.failures(), 1);
    }
}
