//! Message bus over a broadcast channel

use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use super::hub::{BroadcastHub, ChannelEndpoint};
use super::registry::{HandlerRegistry, Subscription};
use super::{ClinicEvent, EventKind, Handler, MessageBus};
use crate::{Error, Result};

/// One tab's view of the event channel.
///
/// `publish` runs this tab's handlers synchronously, then posts the event to
/// the other tabs. Events from other tabs are dispatched on a listener thread
/// in the order they were posted.
pub struct ChannelBus {
    registry: HandlerRegistry,
    endpoint: ChannelEndpoint,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl ChannelBus {
    /// Join `channel` on `hub`. Fails if the hub cannot provide the channel.
    pub fn open(hub: &BroadcastHub, channel: &str) -> Result<Self> {
        let endpoint = hub.open(channel)?;
        let registry = HandlerRegistry::new();

        let inbox = endpoint.receiver();
        let dispatcher = registry.clone();
        let listener = thread::Builder::new()
            .name(format!("bus-{}-{}", channel, endpoint.id()))
            .spawn(move || {
                for message in inbox.iter() {
                    match ClinicEvent::from_json(&message) {
                        Ok(event) => {
                            let handled = dispatcher.dispatch(&event);
                            tracing::debug!(kind = %event.kind(), handled, "Remote event dispatched");
                        }
                        Err(e) => tracing::warn!("Dropping malformed channel message: {}", e),
                    }
                }
            })
            .map_err(|e| Error::ChannelUnavailable(format!("failed to start listener: {}", e)))?;

        tracing::debug!(channel, endpoint = endpoint.id(), "Bus opened");
        Ok(Self {
            registry,
            endpoint,
            listener: Mutex::new(Some(listener)),
        })
    }

    pub fn channel(&self) -> &str {
        self.endpoint.name()
    }

    pub fn is_closed(&self) -> bool {
        self.endpoint.is_closed()
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.registry.handler_count(kind)
    }
}

impl MessageBus for ChannelBus {
    fn publish(&self, event: ClinicEvent) -> Result<()> {
        if self.endpoint.is_closed() {
            return Err(Error::ChannelClosed);
        }
        let message = event.to_json()?;

        let local = self.registry.dispatch(&event);
        let remote = self.endpoint.post(&message)?;
        tracing::debug!(kind = %event.kind(), local, remote, "Event published");
        Ok(())
    }

    fn subscribe(&self, kind: EventKind, handler: Handler) -> Subscription {
        self.registry.subscribe(kind, handler)
    }

    fn close(&self) {
        if self.endpoint.is_closed() {
            return;
        }
        self.registry.clear();
        self.endpoint.close();

        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = listener {
            // close() may run inside a handler on the listener thread itself
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                tracing::warn!("Bus listener panicked");
            }
        }
        tracing::debug!(channel = self.endpoint.name(), "Bus closed");
    }
}

impl Drop for ChannelBus {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Doctor;
    use crossbeam::channel;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(2);

    fn doctor_event(id: i64) -> ClinicEvent {
        ClinicEvent::DoctorAdded(Doctor {
            id,
            name: format!("Dr. {}", id),
            age: 40,
            specialization: "Cardiology".into(),
            phone: "1234567890".into(),
            notes: String::new(),
        })
    }

    fn forward(tx: channel::Sender<ClinicEvent>) -> Handler {
        Box::new(move |event| {
            let _ = tx.send(event.clone());
        })
    }

    #[test]
    fn test_local_delivery_is_synchronous_and_single() {
        let hub = BroadcastHub::new();
        let bus = ChannelBus::open(&hub, "clinic").unwrap();
        let count = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&count);
        let _sub = bus.subscribe(
            EventKind::DoctorAdded,
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.publish(doctor_event(1)).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cross_tab_delivery_in_order() {
        let hub = BroadcastHub::new();
        let tab_a = ChannelBus::open(&hub, "clinic").unwrap();
        let tab_b = ChannelBus::open(&hub, "clinic").unwrap();

        let (tx, rx) = channel::unbounded();
        let _sub = tab_b.subscribe(EventKind::DoctorAdded, forward(tx));

        for id in 1..=3 {
            tab_a.publish(doctor_event(id)).unwrap();
        }

        for id in 1..=3 {
            assert_eq!(rx.recv_timeout(WAIT).unwrap(), doctor_event(id));
        }
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_unsubscribed_handler_receives_nothing() {
        let hub = BroadcastHub::new();
        let tab_a = ChannelBus::open(&hub, "clinic").unwrap();
        let tab_b = ChannelBus::open(&hub, "clinic").unwrap();

        let (tx, rx) = channel::unbounded();
        tab_a.subscribe(EventKind::DoctorAdded, forward(tx.clone())).unsubscribe();
        tab_b.subscribe(EventKind::DoctorAdded, forward(tx)).unsubscribe();

        tab_a.publish(doctor_event(1)).unwrap();
        tab_b.publish(doctor_event(2)).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_malformed_message_is_dropped() {
        let hub = BroadcastHub::new();
        let bus = ChannelBus::open(&hub, "clinic").unwrap();
        let raw = hub.open("clinic").unwrap();

        let (tx, rx) = channel::unbounded();
        let _sub = bus.subscribe(EventKind::DoctorAdded, forward(tx));

        raw.post("{not json").unwrap();
        raw.post(&doctor_event(7).to_json().unwrap()).unwrap();
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), doctor_event(7));
    }

    #[test]
    fn test_close_is_idempotent() {
        let hub = BroadcastHub::new();
        let bus = ChannelBus::open(&hub, "clinic").unwrap();
        let _sub = bus.subscribe(EventKind::DoctorAdded, Box::new(|_| {}));

        bus.close();
        bus.close();
        assert!(bus.is_closed());
        assert_eq!(bus.handler_count(EventKind::DoctorAdded), 0);
        assert_eq!(hub.peer_count("clinic"), 0);
        assert!(matches!(bus.publish(doctor_event(1)), Err(Error::ChannelClosed)));
    }

    #[test]
    fn test_construction_fails_fast() {
        let hub = BroadcastHub::new();
        hub.shutdown();
        assert!(matches!(
            ChannelBus::open(&hub, "clinic"),
            Err(Error::ChannelUnavailable(_))
        ));
    }
}
