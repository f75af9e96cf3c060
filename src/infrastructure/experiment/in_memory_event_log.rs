//! In-memory implementation of the event log

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::experiment::{Event, EventLog, TestId};
use crate::domain::DomainError;

#[derive(Debug, Default)]
struct LogState {
    events: HashMap<TestId, Vec<Event>>,
    next_sequence: u64,
}

impl LogState {
    fn push(&mut self, mut event: Event) -> Event {
        self.next_sequence += 1;
        event.sequence = self.next_sequence;
        self.events
            .entry(event.test_id.clone())
            .or_default()
            .push(event.clone());
        event
    }
}

/// Append-only in-memory event log, partitioned by test
///
/// Sequence numbers are assigned under the write lock, so a caller's
/// sequential appends keep their submission order.
#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    state: RwLock<LogState>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append(&self, event: Event) -> Result<Event, DomainError> {
        let mut state = self
            .state
            .write()
            .map_err(|e| DomainError::storage(format!("Failed to acquire write lock: {}", e)))?;

        Ok(state.push(event))
    }

    async fn append_unique(&self, event: Event) -> Result<Option<Event>, DomainError> {
        let mut state = self
            .state
            .write()
            .map_err(|e| DomainError::storage(format!("Failed to acquire write lock: {}", e)))?;

        let duplicate = state
            .events
            .get(&event.test_id)
            .is_some_and(|events| {
                events
                    .iter()
                    .any(|e| e.user_id == event.user_id && e.metric_name == event.metric_name)
            });

        if duplicate {
            return Ok(None);
        }

        Ok(Some(state.push(event)))
    }

    async fn list_by_test(&self, test_id: &TestId) -> Result<Vec<Event>, DomainError> {
        let state = self
            .state
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(state.events.get(test_id).cloned().unwrap_or_default())
    }

    async fn count_by_test(&self, test_id: &TestId) -> Result<usize, DomainError> {
        let state = self
            .state
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(state.events.get(test_id).map_or(0, Vec::len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::experiment::VariationId;

    fn event(test: &str, user: &str) -> Event {
        Event::new(
            TestId::new(test).unwrap(),
            user,
            VariationId::new("control").unwrap(),
            "click",
        )
    }

    #[tokio::test]
    async fn test_append_preserves_submission_order() {
        let log = InMemoryEventLog::new();

        for i in 0..5 {
            log.append(event("exp-1", "user-1").with_value(i as f64))
                .await
                .unwrap();
        }

        let events = log.list_by_test(&TestId::new("exp-1").unwrap()).await.unwrap();
        let values: Vec<f64> = events.iter().map(|e| e.value).collect();
        assert_eq!(values, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert!(events.windows(2).all(|w| w[0].sequence < w[1].sequence));
    }

    #[tokio::test]
    async fn test_append_accumulates_repeats() {
        let log = InMemoryEventLog::new();
        log.append(event("exp-1", "user-1")).await.unwrap();
        log.append(event("exp-1", "user-1")).await.unwrap();

        assert_eq!(
            log.count_by_test(&TestId::new("exp-1").unwrap()).await.unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_append_unique_rejects_repeat_user_metric() {
        let log = InMemoryEventLog::new();

        let first = log.append_unique(event("exp-1", "user-1")).await.unwrap();
        let second = log
            .append_unique(event("exp-1", "user-1").with_value(3.0))
            .await
            .unwrap();

        assert!(first.is_some());
        assert!(second.is_none());

        // Other users, other metrics and other tests are unaffected
        assert!(log.append_unique(event("exp-1", "user-2")).await.unwrap().is_some());
        let mut purchase = event("exp-1", "user-1");
        purchase.metric_name = "purchase".to_string();
        assert!(log.append_unique(purchase).await.unwrap().is_some());
        assert!(log.append_unique(event("exp-2", "user-1")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unknown_test_is_empty() {
        let log = InMemoryEventLog::new();
        let id = TestId::new("missing").unwrap();
        assert!(log.list_by_test(&id).await.unwrap().is_empty());
        assert_eq!(log.count_by_test(&id).await.unwrap(), 0);
    }
}
