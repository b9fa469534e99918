use crate::event::VisitEvent;
use crate::storage::store::{LogStore, StoreError};
use std::sync::Arc;

/// Path under which every visit event is appended.
pub const LOGS_PATH: &str = "analytics/logs";

/// Typed view of the visit events stored under [`LOGS_PATH`].
#[derive(Clone)]
pub struct VisitLog {
    store: Arc<dyn LogStore>,
}

impl VisitLog {
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self { store }
    }

    /// Append one event. Returns the generated record key.
    pub fn append(&self, event: &VisitEvent) -> Result<String, StoreError> {
        let value = serde_json::to_value(event).map_err(StoreError::Encode)?;
        self.store.push(LOGS_PATH, &value)
    }

    /// Read every stored event, discarding the generated keys.
    ///
    /// Records that do not decode as a visit (e.g. not a JSON object) are
    /// skipped with a warning; missing fields fall back to their defaults.
    pub fn load_all(&self) -> Result<Vec<VisitEvent>, StoreError> {
        let records = self.store.get(LOGS_PATH)?;
        let total = records.len();
        let events: Vec<VisitEvent> = records
            .into_iter()
            .filter_map(|(key, value)| match serde_json::from_value(value) {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Skipping malformed visit record");
                    None
                }
            })
            .collect();
        tracing::debug!(total, decoded = events.len(), "Loaded visit log");
        Ok(events)
    }
}
