use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info};

use crate::entities::order::OrderStatus;

/// Domain events published after a transaction commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: i32,
        order_number: String,
    },
    OrderStatusChanged {
        order_id: i32,
        from: OrderStatus,
        to: OrderStatus,
    },
}

impl Event {
    pub fn order_id(&self) -> i32 {
        match self {
            Event::OrderCreated { order_id, .. } | Event::OrderStatusChanged { order_id, .. } => {
                *order_id
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Event::OrderCreated { .. } => "order_created",
            Event::OrderStatusChanged { .. } => "order_status_changed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Enqueues an event for the background processor without waiting. A full
    /// channel drops the event so a slow handler never stalls the caller.
    pub fn publish(&self, event: Event) -> Result<(), String> {
        self.sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(event) => format!(
                "Event channel full, dropped {} for order {}",
                event.kind(),
                event.order_id()
            ),
            TrySendError::Closed(event) => format!(
                "Event processor stopped, dropped {} for order {}",
                event.kind(),
                event.order_id()
            ),
        })
    }
}

/// Reacts to published events. Failures are logged by the processor and never
/// propagate back to the request that produced the event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle_event(&self, event: &Event) -> Result<(), String>;
}

/// Drains the channel, fanning every event out to all handlers.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, handlers: Vec<Arc<dyn EventHandler>>) {
    info!(handlers = handlers.len(), "Starting event processing loop");

    while let Some(event) = rx.recv().await {
        debug!(kind = event.kind(), order_id = event.order_id(), "Received event");

        let results = join_all(handlers.iter().map(|handler| {
            let event = &event;
            async move { (handler.name(), handler.handle_event(event).await) }
        }))
        .await;

        for (name, result) in results {
            if let Err(e) = result {
                error!(
                    handler = name,
                    kind = event.kind(),
                    order_id = event.order_id(),
                    error = %e,
                    "Event handler failed"
                );
            }
        }
    }

    info!("Event channel closed, stopping event processing loop");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<Event>>,
    }

    #[async_trait]
    impl EventHandler for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn handle_event(&self, event: &Event) -> Result<(), String> {
            self.seen.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl EventHandler for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn handle_event(&self, _event: &Event) -> Result<(), String> {
            Err("boom".into())
        }
    }

    #[tokio::test]
    async fn every_handler_sees_every_event_even_when_one_fails() {
        let (tx, rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);
        let recording = Arc::new(Recording::default());
        let handlers: Vec<Arc<dyn EventHandler>> = vec![Arc::new(Failing), recording.clone()];

        sender
            .publish(Event::OrderCreated {
                order_id: 1,
                order_number: "ORD-20250115-0001".into(),
            })
            .unwrap();
        sender
            .publish(Event::OrderStatusChanged {
                order_id: 1,
                from: OrderStatus::Pending,
                to: OrderStatus::Confirmed,
            })
            .unwrap();
        drop(sender);

        process_events(rx, handlers).await;

        let seen = recording.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].kind(), "order_status_changed");
    }

    #[test]
    fn publish_fails_once_the_processor_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        let result = sender.publish(Event::OrderCreated {
            order_id: 9,
            order_number: "ORD-20250115-0009".into(),
        });
        assert!(result.unwrap_err().starts_with("Event processor stopped"));
    }

    #[test]
    fn full_channel_drops_instead_of_waiting() {
        let (tx, mut rx) = mpsc::channel(1);
        let sender = EventSender::new(tx);
        let created = |order_id| Event::OrderCreated {
            order_id,
            order_number: format!("ORD-20250115-{:04}", order_id),
        };

        sender.publish(created(1)).unwrap();
        let err = sender.publish(created(2)).unwrap_err();
        assert_eq!(err, "Event channel full, dropped order_created for order 2");

        assert_eq!(rx.try_recv().unwrap().order_id(), 1);
        assert!(rx.try_recv().is_err());
    }
}
