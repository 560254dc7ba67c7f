use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::entity::sea_orm_active_enums::OrderStatus;

/// Stock at or below this after a sale raises [`OrderEvent::StockLow`].
pub const LOW_STOCK_THRESHOLD: i32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    OrderCreated {
        order_id: Uuid,
        order_number: String,
        user_id: Uuid,
        total: i64,
    },
    OrderCancelled {
        order_id: Uuid,
        order_number: String,
        user_id: Uuid,
        reason: String,
    },
    OrderStatusChanged {
        order_id: Uuid,
        order_number: String,
        user_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    },
    StockLow {
        product_id: Uuid,
        name: String,
        stock: i32,
    },
}

/// Fire-and-forget notification sink. Publishing never fails the caller.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: OrderEvent);
}

pub struct BroadcastPublisher {
    sender: broadcast::Sender<OrderEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, event: OrderEvent) {
        match self.sender.send(event) {
            Ok(receivers) => tracing::debug!(receivers, "event published"),
            Err(broadcast::error::SendError(event)) => {
                tracing::trace!(?event, "event dropped, no subscribers")
            }
        }
    }
}

pub fn stock_low(product_id: Uuid, name: &str, stock: i32) -> Option<OrderEvent> {
    (stock <= LOW_STOCK_THRESHOLD).then(|| OrderEvent::StockLow {
        product_id,
        name: name.to_string(),
        stock,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let publisher = BroadcastPublisher::new(8);
        let mut rx = publisher.subscribe();
        let event = OrderEvent::StockLow {
            product_id: Uuid::new_v4(),
            name: "Mug".into(),
            stock: 2,
        };
        publisher.publish(event.clone());
        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[test]
    fn publishing_without_subscribers_is_silent() {
        BroadcastPublisher::default().publish(OrderEvent::StockLow {
            product_id: Uuid::new_v4(),
            name: "Mug".into(),
            stock: 0,
        });
    }

    #[test]
    fn stock_low_only_at_or_below_threshold() {
        assert!(stock_low(Uuid::new_v4(), "Mug", 5).is_some());
        assert!(stock_low(Uuid::new_v4(), "Mug", 6).is_none());
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(OrderEvent::StockLow {
            product_id: Uuid::nil(),
            name: "Mug".into(),
            stock: 1,
        })
        .unwrap();
        assert_eq!(json["type"], "stock_low");
    }
}
