//! # Audit Dispatch
//!
//! Every successful mutation emits one [`AuditEvent`] after commit. Events go
//! through a bounded channel to a detached worker, which hands them to the
//! [`ActivityLogger`] collaborator.
//!
//! ```text
//! OrderService ──try_send──► mpsc (bounded) ──► AuditWorker ──► ActivityLogger::log
//!      │                         │                  │
//!      │ never awaits            │ full / closed:   │ per-event timeout,
//!      │ the logger              │ event dropped,   │ failures logged,
//!      ▼                         │ warn!            │ never surfaced
//!  caller gets result
//! ```
//!
//! Ordering between events for the same order is not guaranteed.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tally_core::ActorId;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

/// What happened to the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    UpdateItems,
    Cancel,
    Payment,
    PaymentInitiated,
    ApplyPromotion,
    UpdateStatus,
    GatewayNotification,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::UpdateItems => "UPDATE_ITEMS",
            AuditAction::Cancel => "CANCEL",
            AuditAction::Payment => "PAYMENT",
            AuditAction::PaymentInitiated => "PAYMENT_INITIATED",
            AuditAction::ApplyPromotion => "APPLY_PROMOTION",
            AuditAction::UpdateStatus => "UPDATE_STATUS",
            AuditAction::GatewayNotification => "GATEWAY_NOTIFICATION",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One activity-log entry.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub actor_id: Option<ActorId>,
    pub action: AuditAction,
    pub entity_type: &'static str,
    pub entity_id: String,
    pub details: Value,
}

impl AuditEvent {
    /// An event about an order.
    pub fn order(
        actor_id: Option<ActorId>,
        action: AuditAction,
        order_id: impl Into<String>,
        details: Value,
    ) -> Self {
        AuditEvent {
            actor_id,
            action,
            entity_type: "order",
            entity_id: order_id.into(),
            details,
        }
    }
}

/// External activity-log sink.
#[async_trait]
pub trait ActivityLogger: Send + Sync {
    async fn log(&self, event: &AuditEvent) -> anyhow::Result<()>;
}

/// Writes events to the tracing output. Used when no sink is configured.
#[derive(Debug, Default, Clone)]
pub struct TracingActivityLogger;

#[async_trait]
impl ActivityLogger for TracingActivityLogger {
    async fn log(&self, event: &AuditEvent) -> anyhow::Result<()> {
        tracing::info!(
            actor = ?event.actor_id.as_ref().map(ActorId::as_str),
            action = %event.action,
            entity = event.entity_type,
            entity_id = %event.entity_id,
            details = %event.details,
            "Activity"
        );
        Ok(())
    }
}

/// Sending half of the audit channel.
#[derive(Clone)]
pub struct AuditDispatcher {
    tx: mpsc::Sender<AuditEvent>,
}

impl AuditDispatcher {
    /// Starts the worker on the current runtime.
    ///
    /// The worker stops once every dispatcher clone is dropped and the
    /// buffered events are drained.
    pub fn spawn(
        logger: Arc<dyn ActivityLogger>,
        buffer: usize,
        timeout: Duration,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let worker = AuditWorker { logger, timeout };
        let handle = tokio::spawn(worker.run(rx));
        (AuditDispatcher { tx }, handle)
    }

    /// Queues an event without waiting.
    pub fn emit(&self, event: AuditEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!(
                    action = %event.action,
                    entity_id = %event.entity_id,
                    "Audit channel full, event dropped"
                );
            }
            Err(TrySendError::Closed(event)) => {
                tracing::warn!(
                    action = %event.action,
                    entity_id = %event.entity_id,
                    "Audit worker stopped, event dropped"
                );
            }
        }
    }
}

struct AuditWorker {
    logger: Arc<dyn ActivityLogger>,
    timeout: Duration,
}

impl AuditWorker {
    async fn run(self, mut rx: mpsc::Receiver<AuditEvent>) {
        tracing::info!("Audit worker started");

        while let Some(event) = rx.recv().await {
            match tokio::time::timeout(self.timeout, self.logger.log(&event)).await {
                Ok(Ok(())) => {
                    tracing::debug!(
                        action = %event.action,
                        entity_id = %event.entity_id,
                        "Audit event recorded"
                    );
                }
                Ok(Err(e)) => {
                    tracing::error!(
                        action = %event.action,
                        entity_id = %event.entity_id,
                        "Failed to record audit event: {:?}",
                        e
                    );
                }
                Err(_) => {
                    tracing::error!(
                        action = %event.action,
                        entity_id = %event.entity_id,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "Activity logger timed out"
                    );
                }
            }
        }

        tracing::info!("Audit channel closed, worker stopping");
    }
}
