// ==========================================
// Scrap Recycling - Workflow Event Publishing
// ==========================================
// The engine emits one event after every committed command. Publishing
// never affects the command outcome: a failed publish is logged only.
// ==========================================

use crate::domain::batch::RecyclingBatch;
use crate::domain::drobilka::DrobilkaProcess;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;
use tokio::sync::broadcast;

// ==========================================
// Event types
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowEventType {
    BatchStarted,
    BatchCompleted,
    ProcessStarted,
    ProcessCompleted,
    /// Scrap reported, confirmed or written off
    ScrapChanged,
}

impl WorkflowEventType {
    pub fn as_str(&self) -> &str {
        match self {
            WorkflowEventType::BatchStarted => "BatchStarted",
            WorkflowEventType::BatchCompleted => "BatchCompleted",
            WorkflowEventType::ProcessStarted => "ProcessStarted",
            WorkflowEventType::ProcessCompleted => "ProcessCompleted",
            WorkflowEventType::ScrapChanged => "ScrapChanged",
        }
    }
}

/// Committed state change, carrying the entity as stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub event_type: WorkflowEventType,
    pub batch: Option<RecyclingBatch>,
    pub process: Option<DrobilkaProcess>,
    pub scrap_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl WorkflowEvent {
    pub fn for_batch(event_type: WorkflowEventType, batch: &RecyclingBatch) -> Self {
        Self {
            event_type,
            batch: Some(batch.clone()),
            process: None,
            scrap_id: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn for_process(event_type: WorkflowEventType, process: &DrobilkaProcess) -> Self {
        Self {
            event_type,
            batch: None,
            process: Some(process.clone()),
            scrap_id: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn scrap_changed(scrap_id: &str) -> Self {
        Self {
            event_type: WorkflowEventType::ScrapChanged,
            batch: None,
            process: None,
            scrap_id: Some(scrap_id.to_string()),
            occurred_at: Utc::now(),
        }
    }

    /// Batch id this event concerns, if any
    pub fn batch_id(&self) -> Option<&str> {
        self.batch
            .as_ref()
            .map(|b| b.batch_id.as_str())
            .or_else(|| self.process.as_ref().map(|p| p.batch_id.as_str()))
    }
}

// ==========================================
// Publisher trait
// ==========================================

pub trait WorkflowEventPublisher: Send + Sync {
    /// Publish one event
    ///
    /// Returns the number of receivers reached (0 when unsupported).
    fn publish(&self, event: WorkflowEvent) -> Result<usize, Box<dyn Error + Send + Sync>>;
}

/// Drops every event (tests, one-shot CLI commands)
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl WorkflowEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: WorkflowEvent) -> Result<usize, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: skipping event - event_type={}, batch_id={:?}",
            event.event_type.as_str(),
            event.batch_id()
        );
        Ok(0)
    }
}

/// In-process fan-out over a tokio broadcast channel
///
/// Having no subscribers is not an error.
#[derive(Debug, Clone)]
pub struct BroadcastEventPublisher {
    sender: broadcast::Sender<WorkflowEvent>,
}

impl BroadcastEventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.sender.subscribe()
    }
}

impl WorkflowEventPublisher for BroadcastEventPublisher {
    fn publish(&self, event: WorkflowEvent) -> Result<usize, Box<dyn Error + Send + Sync>> {
        if self.sender.receiver_count() == 0 {
            return Ok(0);
        }
        Ok(self.sender.send(event)?)
    }
}

/// Option<Arc<dyn WorkflowEventPublisher>> with logging on failure
#[derive(Clone)]
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn WorkflowEventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn WorkflowEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    pub fn publish(&self, event: WorkflowEvent) -> Result<usize, Box<dyn Error + Send + Sync>> {
        match &self.inner {
            Some(publisher) => publisher.publish(event),
            None => {
                tracing::debug!(
                    "OptionalEventPublisher: no publisher configured, skipping event - event_type={}",
                    event.event_type.as_str()
                );
                Ok(0)
            }
        }
    }

    /// Publish after commit; failures are logged and swallowed
    pub fn publish_committed(&self, event: WorkflowEvent) {
        let event_type = event.event_type;
        if let Err(e) = self.publish(event) {
            tracing::warn!(
                event_type = event_type.as_str(),
                error = %e,
                "failed to publish workflow event"
            );
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::scrap::ScrapTotals;

    fn sample_batch() -> RecyclingBatch {
        RecyclingBatch::start(
            7,
            ScrapTotals {
                hard_total: 5.0,
                soft_total: 3.0,
            },
            "lead".to_string(),
        )
    }

    #[test]
    fn test_event_batch_id_from_batch_or_process() {
        let batch = sample_batch();
        let event = WorkflowEvent::for_batch(WorkflowEventType::BatchStarted, &batch);
        assert_eq!(event.batch_id(), Some(batch.batch_id.as_str()));

        let process = DrobilkaProcess::start(
            batch.batch_id.clone(),
            crate::domain::types::DrobilkaType::Hard,
            5.0,
            "WC-1".to_string(),
            "op".to_string(),
            vec![],
        );
        let event = WorkflowEvent::for_process(WorkflowEventType::ProcessStarted, &process);
        assert_eq!(event.batch_id(), Some(batch.batch_id.as_str()));

        let event = WorkflowEvent::scrap_changed("S1");
        assert_eq!(event.batch_id(), None);
    }

    #[test]
    fn test_noop_publisher() {
        let publisher = NoOpEventPublisher;
        let result = publisher.publish(WorkflowEvent::scrap_changed("S1"));
        assert_eq!(result.unwrap(), 0);
    }

    #[test]
    fn test_optional_publisher_none() {
        let publisher = OptionalEventPublisher::none();
        assert!(!publisher.is_configured());
        assert!(publisher.publish(WorkflowEvent::scrap_changed("S1")).is_ok());
    }

    #[test]
    fn test_broadcast_publisher_without_subscribers() {
        let publisher = BroadcastEventPublisher::new(8);
        let result = publisher.publish(WorkflowEvent::scrap_changed("S1"));
        assert_eq!(result.unwrap(), 0);
    }

    #[test]
    fn test_broadcast_publisher_delivers_to_subscriber() {
        let broadcast = BroadcastEventPublisher::new(8);
        let mut rx = broadcast.subscribe();
        let publisher = OptionalEventPublisher::with_publisher(Arc::new(broadcast));
        assert!(publisher.is_configured());

        let batch = sample_batch();
        publisher.publish_committed(WorkflowEvent::for_batch(
            WorkflowEventType::BatchCompleted,
            &batch,
        ));

        let received = rx.try_recv().unwrap();
        assert_eq!(received.event_type, WorkflowEventType::BatchCompleted);
        assert_eq!(received.batch.unwrap().batch_number, 7);
    }
}
