use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

/// Handle for emitting workflow events onto the in-process channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Events emitted by the workflow engines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order lifecycle
    OrderCreated(Uuid),
    OrderCancelled(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },

    // Negotiation
    OfferSent {
        order_id: Uuid,
        negotiation_id: Uuid,
        superseded: u64,
    },
    OfferAccepted {
        order_id: Uuid,
        negotiation_id: Uuid,
    },
    OfferRejected {
        order_id: Uuid,
        negotiation_id: Uuid,
    },

    // Production workflow
    ProductionTrackingCreated(Uuid),
    ProductionPlanSent(Uuid),
    ProductionPlanApproved(Uuid),
    ProductionPlanRejected {
        tracking_id: Uuid,
        revision_count: i32,
    },
    ProductionStageUpdated {
        tracking_id: Uuid,
        stage: String,
        status: String,
    },

    // Revision workflow
    RevisionCreated(Uuid),
    RevisionSubmitted(Uuid),
    RevisionApproved(Uuid),
    RevisionRejected(Uuid),
    RevisionImplemented(Uuid),
}

/// Drains the event channel, logging each event. Runs until every sender is
/// dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(order_id = %order_id, from = %old_status, to = %new_status, "Order status changed");
            }
            Event::OfferSent {
                order_id,
                negotiation_id,
                superseded,
            } => {
                info!(order_id = %order_id, negotiation_id = %negotiation_id, superseded = superseded, "Offer sent");
            }
            other => {
                debug!(event = ?other, "Event processed");
            }
        }
    }

    info!("Event processing loop stopped");
}
