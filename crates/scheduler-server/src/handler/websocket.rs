//! The workflow-scoped WebSocket bridge: forwards `workflow.<id>` events to
//! a connected client as JSON text frames.
//!
//! There is no client -> server protocol here beyond the initial upgrade and
//! ordinary close/ping frames; this is a read-only feed. A subscriber that
//! falls behind the event bus's per-topic buffer receives a close frame
//! instead of a silently incomplete history — the adapter does not attempt
//! to replay or resync a lagged connection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use uuid::Uuid;

use scheduler_core::{Envelope, SchedulerCore, WorkflowId};

use crate::TRACING_TARGET_WEBSOCKET;
use crate::error::HttpError;

const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Default)]
struct ConnectionMetrics {
    sent: AtomicU64,
    dropped: AtomicU64,
    errors: AtomicU64,
}

impl ConnectionMetrics {
    fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.sent.load(Ordering::Relaxed),
            self.dropped.load(Ordering::Relaxed),
            self.errors.load(Ordering::Relaxed),
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename = "snapshot")]
struct Snapshot {
    workflow: scheduler_core::Workflow,
    jobs: Vec<scheduler_core::Job>,
}

pub async fn upgrade(
    State(core): State<SchedulerCore>,
    Path(id): Path<Uuid>,
    ws: WebSocketUpgrade,
) -> Result<Response, HttpError> {
    let workflow_id = WorkflowId::from(id);
    // Fail the upgrade with a normal HTTP error if the workflow doesn't
    // exist, rather than accepting the connection only to close it.
    let workflow = core.get_workflow(workflow_id).await?;
    let jobs = core.list_jobs(workflow_id).await?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, core, workflow, jobs)))
}

async fn handle_socket(
    mut socket: WebSocket,
    core: SchedulerCore,
    workflow: scheduler_core::Workflow,
    jobs: Vec<scheduler_core::Job>,
) {
    let workflow_id = workflow.id;
    let metrics = ConnectionMetrics::default();

    let snapshot = Snapshot { workflow, jobs };
    if let Ok(text) = serde_json::to_string(&snapshot) {
        if socket.send(Message::Text(text.into())).await.is_err() {
            tracing::debug!(
                target: TRACING_TARGET_WEBSOCKET,
                workflow_id = %workflow_id,
                "client disconnected before snapshot was sent"
            );
            return;
        }
        metrics.sent.fetch_add(1, Ordering::Relaxed);
    }

    let topic = scheduler_core::event_bus::workflow_topic(workflow_id);
    let mut subscription = core.events().subscribe(topic);

    loop {
        tokio::select! {
            envelope = subscription.recv() => {
                match envelope {
                    Some(Envelope::Event(event)) => {
                        match serde_json::to_string(&event) {
                            Ok(text) => {
                                if socket.send(Message::Text(text.into())).await.is_err() {
                                    break;
                                }
                                metrics.sent.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(err) => {
                                metrics.errors.fetch_add(1, Ordering::Relaxed);
                                tracing::warn!(
                                    target: TRACING_TARGET_WEBSOCKET,
                                    workflow_id = %workflow_id,
                                    error = %err,
                                    "failed to serialize event"
                                );
                            }
                        }
                    }
                    Some(Envelope::Overflow { skipped }) => {
                        metrics.dropped.fetch_add(skipped, Ordering::Relaxed);
                        tracing::warn!(
                            target: TRACING_TARGET_WEBSOCKET,
                            workflow_id = %workflow_id,
                            skipped,
                            "subscriber lagged, closing connection"
                        );
                        let _ = tokio::time::timeout(
                            GRACEFUL_SHUTDOWN_TIMEOUT,
                            socket.send(Message::Close(None)),
                        ).await;
                        break;
                    }
                    None => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {
                        // No client -> server protocol; any other frame is ignored.
                    }
                    Some(Err(err)) => {
                        metrics.errors.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(
                            target: TRACING_TARGET_WEBSOCKET,
                            workflow_id = %workflow_id,
                            error = %err,
                            "socket read error"
                        );
                        break;
                    }
                }
            }
        }
    }

    let (sent, dropped, errors) = metrics.snapshot();
    tracing::info!(
        target: TRACING_TARGET_WEBSOCKET,
        workflow_id = %workflow_id,
        sent,
        dropped,
        errors,
        "websocket connection closed"
    );
}
