//! Event fan-out to live subscribers.

use std::sync::{RwLock, RwLockReadGuard};
use tally_core::EventRecord;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

/// Receiving end of a ledger event subscription
pub struct EventSubscriber {
    receiver: broadcast::Receiver<EventRecord>,
}

impl EventSubscriber {
    /// Next event, skipping over any the subscriber fell behind on.
    pub async fn recv(&mut self) -> Option<EventRecord> {
        loop {
            match self.receiver.recv().await {
                Ok(record) => return Some(record),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Subscriber lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<EventRecord> {
        self.receiver.try_recv().ok()
    }

    /// Live records as a stream; lagged gaps are skipped.
    pub fn into_stream(self) -> impl Stream<Item = EventRecord> + Send + 'static {
        BroadcastStream::new(self.receiver).filter_map(|item| match item {
            Ok(record) => Some(record),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                debug!("Stream subscriber lagged, skipped {} events", skipped);
                None
            }
        })
    }
}

/// Publishes committed ledger events
///
/// Once closed, subscribers see the end of the stream and later
/// subscriptions are closed from the start.
pub struct EventPublisher {
    sender: RwLock<Option<broadcast::Sender<EventRecord>>>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: RwLock::new(Some(sender)),
        }
    }

    fn sender(&self) -> RwLockReadGuard<'_, Option<broadcast::Sender<EventRecord>>> {
        self.sender.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe(&self) -> EventSubscriber {
        let receiver = match self.sender().as_ref() {
            Some(sender) => sender.subscribe(),
            // Sender dropped right away, so the receiver reports Closed.
            None => broadcast::channel(1).1,
        };
        EventSubscriber { receiver }
    }

    pub fn publish(&self, record: EventRecord) {
        debug!("Publishing {} event #{}", record.event.kind(), record.sequence);
        match self.sender().as_ref() {
            Some(sender) => {
                if sender.send(record).is_err() {
                    debug!("No subscribers to receive event");
                }
            }
            None => debug!("Publisher closed, event not broadcast"),
        }
    }

    /// End every live subscription.
    pub fn close(&self) {
        let mut sender = self
            .sender
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if sender.take().is_some() {
            debug!("Event publisher closed");
        }
    }

    /// Number of live subscribers
    pub fn active_subscribers(&self) -> usize {
        self.sender()
            .as_ref()
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1024)
    }
}
