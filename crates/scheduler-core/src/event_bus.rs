//! Topic-based pub/sub for progress and status-change events.
//!
//! Consumers are the WebSocket adapter (one subscription per `workflow.<id>`
//! topic) and, in process, anything else that wants to observe scheduling
//! activity without coupling to the registries directly.
//!
//! Each topic is backed by an independent `tokio::sync::broadcast` channel:
//! publication order within a topic is preserved per subscription, a slow
//! subscriber that falls behind the channel's capacity does not block the
//! publisher, and instead of silently losing events it observes the lag as
//! an explicit [`Envelope::Overflow`] marker before resuming at the next
//! live event. No subscriber state is shared across topics.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::ids::{JobId, WorkflowId};
use crate::registry::job::JobStatus;
use crate::registry::workflow::WorkflowStatus;

const TRACING_TARGET: &str = "scheduler_core::event_bus";

/// A single published event. Every variant carries enough information to be
/// serialized directly into the corresponding WebSocket message shape.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Published whenever a job's status or progress changes.
    #[serde(rename = "progress")]
    JobProgress {
        job_id: JobId,
        status: JobStatus,
        progress_percent: u8,
        tiles_processed: u64,
        tiles_total: u64,
    },
    /// Published whenever a workflow's derived aggregate changes.
    #[serde(rename = "workflow_progress")]
    WorkflowProgress {
        workflow_id: WorkflowId,
        status: WorkflowStatus,
        progress_percent: f64,
        completed_jobs: u32,
        failed_jobs: u32,
        total_jobs: u32,
    },
    /// Published on the `system` topic with a global status snapshot.
    #[serde(rename = "system_status")]
    SystemStatus {
        running_jobs: usize,
        max_workers: usize,
        active_users: usize,
        max_active_users: usize,
        queued_users: usize,
    },
}

impl Event {
    /// The topic this event is published to.
    #[must_use]
    pub fn topic(&self) -> String {
        match self {
            Self::JobProgress { job_id, .. } => job_topic(*job_id),
            Self::WorkflowProgress { workflow_id, .. } => workflow_topic(*workflow_id),
            Self::SystemStatus { .. } => SYSTEM_TOPIC.to_owned(),
        }
    }
}

/// The `system` topic name.
pub const SYSTEM_TOPIC: &str = "system";

/// Returns the topic name for a job's events: `job.<id>`.
#[must_use]
pub fn job_topic(job_id: JobId) -> String {
    format!("job.{job_id}")
}

/// Returns the topic name for a workflow's events: `workflow.<id>`.
#[must_use]
pub fn workflow_topic(workflow_id: WorkflowId) -> String {
    format!("workflow.{workflow_id}")
}

/// What a subscription actually yields: either a live event, or a marker
/// that some number of events were dropped because the subscriber fell too
/// far behind the publisher.
#[derive(Debug, Clone)]
pub enum Envelope {
    /// A live, in-order event.
    Event(Event),
    /// The subscriber lagged and `skipped` older events were dropped.
    Overflow { skipped: u64 },
}

/// A live subscription to one topic.
///
/// Dropping a `Subscription` (or calling [`Subscription::close`] explicitly)
/// releases it; the event bus does not need to be told, a closed
/// subscription simply stops being a receiver of its channel.
pub struct Subscription {
    topic: String,
    rx: broadcast::Receiver<Event>,
}

impl Subscription {
    /// The topic this subscription was created for.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Waits for the next event, or `None` once the bus has no more
    /// publishers for this topic (the bus itself is never torn down while
    /// the process is alive, so in practice this only returns `None` after
    /// [`close`](Self::close)).
    pub async fn recv(&mut self) -> Option<Envelope> {
        match self.rx.recv().await {
            Ok(event) => Some(Envelope::Event(event)),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    topic = %self.topic,
                    skipped,
                    "subscriber lagged, dropping oldest events"
                );
                Some(Envelope::Overflow { skipped })
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }

    /// Releases the subscription. Equivalent to dropping it, spelled out for
    /// call sites that want to be explicit about the lifecycle.
    pub fn close(self) {
        drop(self);
    }
}

/// Process-wide pub/sub bus. Cheaply cloneable; every clone shares the same
/// topic table.
#[derive(Clone)]
pub struct EventBus {
    inner: std::sync::Arc<Inner>,
}

struct Inner {
    capacity: usize,
    topics: Mutex<HashMap<String, broadcast::Sender<Event>>>,
}

impl EventBus {
    /// Creates a new bus whose per-topic channels buffer up to `capacity`
    /// events before a slow subscriber starts lagging.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: std::sync::Arc::new(Inner {
                capacity: capacity.max(1),
                topics: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<Event> {
        let mut topics = self.inner.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics
            .entry(topic.to_owned())
            .or_insert_with(|| broadcast::channel(self.inner.capacity).0)
            .clone()
    }

    /// Subscribes to a topic, yielding a bounded queue of its future events.
    #[must_use]
    pub fn subscribe(&self, topic: impl Into<String>) -> Subscription {
        let topic = topic.into();
        let sender = self.sender_for(&topic);
        Subscription {
            topic,
            rx: sender.subscribe(),
        }
    }

    /// Publishes an event to its topic. Non-blocking: delivery to every live
    /// subscription happens independently, and publishing with zero
    /// subscribers is a no-op rather than an error.
    pub fn publish(&self, event: Event) {
        let topic = event.topic();
        let sender = self.sender_for(&topic);
        let receiver_count = sender.send(event).unwrap_or(0);
        tracing::trace!(
            target: TRACING_TARGET,
            topic = %topic,
            receivers = receiver_count,
            "published event"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_events_in_publication_order() {
        let bus = EventBus::new(16);
        let mut sub = bus.subscribe(SYSTEM_TOPIC);

        for running_jobs in 0..3 {
            bus.publish(Event::SystemStatus {
                running_jobs,
                max_workers: 4,
                active_users: 1,
                max_active_users: 2,
                queued_users: 0,
            });
        }

        for expected in 0..3 {
            match sub.recv().await {
                Some(Envelope::Event(Event::SystemStatus { running_jobs, .. })) => {
                    assert_eq!(running_jobs, expected);
                }
                other => panic!("unexpected envelope: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn overflow_yields_marker_then_resumes() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe(SYSTEM_TOPIC);

        for running_jobs in 0..5u32 {
            bus.publish(Event::SystemStatus {
                running_jobs: running_jobs as usize,
                max_workers: 4,
                active_users: 1,
                max_active_users: 2,
                queued_users: 0,
            });
        }

        match sub.recv().await {
            Some(Envelope::Overflow { skipped }) => assert!(skipped > 0),
            other => panic!("expected overflow marker, got {other:?}"),
        }

        match sub.recv().await {
            Some(Envelope::Event(Event::SystemStatus { running_jobs, .. })) => {
                assert_eq!(running_jobs, 4);
            }
            other => panic!("expected final event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_is_a_no_op() {
        let bus = EventBus::new(4);
        bus.publish(Event::SystemStatus {
            running_jobs: 0,
            max_workers: 1,
            active_users: 0,
            max_active_users: 1,
            queued_users: 0,
        });
    }

    #[tokio::test]
    async fn close_stops_delivery() {
        let bus = EventBus::new(4);
        let sub = bus.subscribe(SYSTEM_TOPIC);
        sub.close();

        bus.publish(Event::SystemStatus {
            running_jobs: 0,
            max_workers: 1,
            active_users: 0,
            max_active_users: 1,
            queued_users: 0,
        });

        let mut still_subscribed = bus.subscribe(SYSTEM_TOPIC);
        bus.publish(Event::SystemStatus {
            running_jobs: 7,
            max_workers: 1,
            active_users: 0,
            max_active_users: 1,
            queued_users: 0,
        });
        match still_subscribed.recv().await {
            Some(Envelope::Event(Event::SystemStatus { running_jobs, .. })) => {
                assert_eq!(running_jobs, 7);
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }
}
