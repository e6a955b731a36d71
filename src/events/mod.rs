use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::entities::product::Stage;
use crate::entities::role_assignment::RoleKind;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, waiting for channel capacity
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Publishes an event for an already committed command.
    ///
    /// Never blocks and never fails the caller: a full or closed channel only
    /// costs the notification.
    pub fn send_or_log(&self, event: Event) {
        let name = event.name();
        match self.sender.try_send(event) {
            Ok(()) => counter!("ledger_events.published", 1, "event" => name),
            Err(e) => {
                counter!("ledger_events.dropped", 1, "event" => name);
                warn!(event = name, "Failed to publish event: {}", e);
            }
        }
    }
}

/// Notifications emitted after a ledger command commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // Registry events
    VendorRegistered {
        vendor_id: i32,
        identity: String,
    },
    ParticipantRegistered {
        role: RoleKind,
        id: i32,
        identity: String,
    },
    VendorDeactivated(i32),

    // Inventory events
    MaterialAdded {
        material_id: i32,
        vendor_id: i32,
        quantity: i64,
        price_per_unit: Decimal,
    },
    MaterialRestocked {
        material_id: i32,
        quantity: i64,
        total_quantity: i64,
    },
    MaterialReturned {
        material_id: i32,
        quantity: i64,
        available_quantity: i64,
    },
    MaterialDeactivated(i32),

    // Lifecycle events
    ProductCreated(i32),
    MaterialAssigned {
        product_id: i32,
        material_id: i32,
        quantity: i64,
    },
    StageAdvanced {
        product_id: i32,
        from: Stage,
        to: Stage,
        at: DateTime<Utc>,
    },

    // Vendor performance events
    VendorVerified(i32),
    VendorRated {
        vendor_id: i32,
        rating: i32,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::VendorRegistered { .. } => "vendor_registered",
            Event::ParticipantRegistered { .. } => "participant_registered",
            Event::VendorDeactivated(_) => "vendor_deactivated",
            Event::MaterialAdded { .. } => "material_added",
            Event::MaterialRestocked { .. } => "material_restocked",
            Event::MaterialReturned { .. } => "material_returned",
            Event::MaterialDeactivated(_) => "material_deactivated",
            Event::ProductCreated(_) => "product_created",
            Event::MaterialAssigned { .. } => "material_assigned",
            Event::StageAdvanced { .. } => "stage_advanced",
            Event::VendorVerified(_) => "vendor_verified",
            Event::VendorRated { .. } => "vendor_rated",
        }
    }
}

/// Drains the event channel until every sender is gone.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::StageAdvanced {
                product_id,
                from,
                to,
                ..
            } => {
                info!(product_id, from = %from, to = %to, "Product advanced to {}", to.label());
            }
            Event::MaterialAssigned {
                product_id,
                material_id,
                quantity,
            } => {
                info!(product_id, material_id, quantity, "Material bound to product");
            }
            other => info!(event = other.name(), "Received event: {:?}", other),
        }
        counter!("ledger_events.processed", 1, "event" => event.name());
    }

    info!("Event channel closed, stopping event processing loop");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_or_log_survives_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        sender.send_or_log(Event::ProductCreated(1));
        assert!(sender.send(Event::ProductCreated(2)).await.is_err());
    }

    #[tokio::test]
    async fn send_or_log_drops_when_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let sender = EventSender::new(tx);
        sender.send_or_log(Event::VendorVerified(1));
        sender.send_or_log(Event::VendorVerified(2));

        assert_eq!(rx.recv().await, Some(Event::VendorVerified(1)));
        assert!(rx.try_recv().is_err());
    }
}
