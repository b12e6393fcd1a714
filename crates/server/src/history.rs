//! Session history
//!
//! Every dispatched request leaves a [`SessionRecord`]. Legacy shell
//! sessions have no exit status on the wire, so the history is where a
//! test looks one up.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::handler::SessionOutcome;

/// Oldest records are dropped past this many
pub const MAX_RECORDS: usize = 1024;

/// One served (or refused) request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Serial of the target device, if the request had one
    pub serial: Option<String>,
    /// Request text as sent by the client
    pub request: String,
    pub outcome: SessionOutcome,
}

impl SessionRecord {
    pub fn new(
        serial: Option<String>,
        request: impl Into<String>,
        outcome: SessionOutcome,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at,
            serial,
            request: request.into(),
            outcome,
        }
    }
}

/// Bounded, append-only log of sessions
#[derive(Debug, Default)]
pub struct SessionHistory {
    records: Mutex<VecDeque<SessionRecord>>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, record: SessionRecord) {
        let mut records = self.records.lock();
        if records.len() >= MAX_RECORDS {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// All records, oldest first
    pub fn snapshot(&self) -> Vec<SessionRecord> {
        self.records.lock().iter().cloned().collect()
    }

    /// Most recent record whose request starts with `prefix`
    pub fn last_matching(&self, prefix: &str) -> Option<SessionRecord> {
        self.records
            .lock()
            .iter()
            .rev()
            .find(|r| r.request.starts_with(prefix))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(request: &str, code: u8) -> SessionRecord {
        SessionRecord::new(Some("a".into()), request, SessionOutcome::exited(code), Utc::now())
    }

    #[test]
    fn test_last_matching() {
        let history = SessionHistory::new();
        history.record(record("shell:echo one", 0));
        history.record(record("shell:cat /nope", 1));
        history.record(record("host:version", 0));

        let last = history.last_matching("shell:").unwrap();
        assert_eq!(last.request, "shell:cat /nope");
        assert_eq!(last.outcome.exit_code(), Some(1));
        assert!(history.last_matching("sync:").is_none());
    }

    #[test]
    fn test_history_is_bounded() {
        let history = SessionHistory::new();
        for i in 0..MAX_RECORDS + 5 {
            history.record(record(&format!("shell:echo {}", i), 0));
        }
        assert_eq!(history.len(), MAX_RECORDS);
        assert_eq!(history.snapshot()[0].request, "shell:echo 5");
    }

    #[test]
    fn test_record_ids_are_unique() {
        let a = record("x", 0);
        let b = record("x", 0);
        assert_ne!(a.id, b.id);
    }
}
