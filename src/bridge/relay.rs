//! Event relay
//!
//! The injected script signals the host by touching attributes named
//! `data-ld-<event>`. Every such `DOM.attributeModified` notification is
//! republished locally as event `<event>`; other attributes are ignored.

use chrono::{DateTime, Utc};
use futures::Stream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::cdp::types::AttributeModified;
use crate::{Error, Result};

/// Attribute prefix marking relayed events
pub const EVENT_ATTRIBUTE_PREFIX: &str = "data-ld-";

/// Event republished from the page
#[derive(Debug, Clone, PartialEq)]
pub struct RelayedEvent {
    /// Event name (attribute name without prefix)
    pub name: String,
    /// Notification as received
    pub payload: AttributeModified,
    /// When the notification was relayed
    pub received_at: DateTime<Utc>,
}

/// Local emitter for relayed events
#[derive(Debug, Clone)]
pub struct EventRelay {
    tx: broadcast::Sender<RelayedEvent>,
}

impl EventRelay {
    /// Create a relay buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Event name carried by an attribute, if it follows the naming convention
    pub fn event_name(attribute: &str) -> Option<&str> {
        attribute
            .strip_prefix(EVENT_ATTRIBUTE_PREFIX)
            .filter(|name| !name.is_empty())
    }

    /// Republish one notification; returns whether a local event was emitted
    pub fn relay(&self, notification: &AttributeModified) -> bool {
        let Some(name) = Self::event_name(&notification.name) else {
            return false;
        };

        let event = RelayedEvent {
            name: name.to_string(),
            payload: notification.clone(),
            received_at: Utc::now(),
        };

        match self.tx.send(event) {
            Ok(receivers) => {
                debug!("Relayed event '{}' to {} subscriber(s)", name, receivers);
                true
            }
            Err(_) => {
                debug!("Dropped event '{}': no subscribers", name);
                false
            }
        }
    }

    /// Receive every relayed event
    pub fn subscribe(&self) -> broadcast::Receiver<RelayedEvent> {
        self.tx.subscribe()
    }

    /// Receive events named `name`
    pub fn subscribe_to<S: Into<String>>(&self, name: S) -> NamedEvents {
        NamedEvents {
            name: name.into(),
            inner: self.tx.subscribe(),
        }
    }

    /// Every relayed event as a stream; lagged events are skipped
    pub fn stream(&self) -> impl Stream<Item = RelayedEvent> + Send + 'static {
        BroadcastStream::new(self.tx.subscribe()).filter_map(|item| match item {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("Relayed event stream lagged: {}", e);
                None
            }
        })
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receiver filtered to a single event name
#[derive(Debug)]
pub struct NamedEvents {
    name: String,
    inner: broadcast::Receiver<RelayedEvent>,
}

impl NamedEvents {
    /// Event name this receiver listens for
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Receive the next matching event
    pub async fn recv(&mut self) -> Result<RelayedEvent> {
        loop {
            match self.inner.recv().await {
                Ok(event) if event.name == self.name => return Ok(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Subscriber for '{}' lagged by {} events", self.name, n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(Error::internal("Event relay closed"));
                }
            }
        }
    }

    /// Take the next matching event if one is already buffered
    pub fn try_recv(&mut self) -> Option<RelayedEvent> {
        loop {
            match self.inner.try_recv() {
                Ok(event) if event.name == self.name => return Some(event),
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modified(name: &str, value: &str) -> AttributeModified {
        AttributeModified {
            node_id: 4,
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_event_name() {
        assert_eq!(EventRelay::event_name("data-ld-foo"), Some("foo"));
        assert_eq!(EventRelay::event_name("data-ld-"), None);
        assert_eq!(EventRelay::event_name("other-attr"), None);
        assert_eq!(EventRelay::event_name("x-data-ld-foo"), None);
    }

    #[test]
    fn test_matching_attribute_emits_once() {
        let relay = EventRelay::new(16);
        let mut rx = relay.subscribe();

        assert!(relay.relay(&modified("data-ld-foo", "1")));
        assert!(!relay.relay(&modified("other-attr", "1")));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.name, "foo");
        assert_eq!(event.payload.value, "1");
        assert_eq!(event.payload.name, "data-ld-foo");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_no_subscriber_drops() {
        let relay = EventRelay::new(16);
        assert!(!relay.relay(&modified("data-ld-foo", "1")));

        let mut rx = relay.subscribe();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_named_subscription_filters() {
        let relay = EventRelay::new(16);
        let mut highlights = relay.subscribe_to("highlight");

        relay.relay(&modified("data-ld-scroll", "10"));
        relay.relay(&modified("data-ld-highlight", "on"));

        let event = highlights.recv().await.unwrap();
        assert_eq!(event.payload.value, "on");
        assert!(highlights.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_stream() {
        let relay = EventRelay::new(16);
        let mut stream = Box::pin(relay.stream());

        relay.relay(&modified("data-ld-a", "1"));
        relay.relay(&modified("data-ld-b", "2"));

        assert_eq!(stream.next().await.unwrap().name, "a");
        assert_eq!(stream.next().await.unwrap().name, "b");
    }
}
