//! Handler bookkeeping for a bus

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::{ClinicEvent, EventKind, Handler};

type SharedHandler = Arc<dyn Fn(&ClinicEvent) + Send + Sync + 'static>;

struct RegistryInner {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<EventKind, Vec<(u64, SharedHandler)>>>,
}

impl RegistryInner {
    fn handlers(&self) -> MutexGuard<'_, HashMap<EventKind, Vec<(u64, SharedHandler)>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, kind: EventKind, id: u64) -> bool {
        let mut handlers = self.handlers();
        let Some(list) = handlers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(handler_id, _)| *handler_id != id);
        before != list.len()
    }
}

/// Handlers per event kind, invoked in registration order
#[derive(Clone)]
pub struct HandlerRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                next_id: AtomicU64::new(1),
                handlers: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn subscribe(&self, kind: EventKind, handler: Handler) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let handler: SharedHandler = Arc::from(handler);
        self.inner.handlers().entry(kind).or_default().push((id, handler));
        tracing::debug!(%kind, id, "Handler registered");

        Subscription {
            registry: Arc::downgrade(&self.inner),
            kind,
            id,
            detached: false,
        }
    }

    /// Invoke every handler registered for the event's kind.
    ///
    /// The list is copied before invoking, so handlers may subscribe or
    /// unsubscribe while being called. Returns the number of handlers run.
    pub fn dispatch(&self, event: &ClinicEvent) -> usize {
        let snapshot: Vec<SharedHandler> = self
            .inner
            .handlers()
            .get(&event.kind())
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        for handler in &snapshot {
            handler(event);
        }
        snapshot.len()
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.inner.handlers().get(&kind).map_or(0, Vec::len)
    }

    /// Remove every handler of every kind
    pub fn clear(&self) {
        self.inner.handlers().clear();
    }
}

/// Capability returned by `subscribe`.
///
/// Removes exactly its own registration when [`unsubscribe`](Self::unsubscribe)
/// is called or when it is dropped. Repeated calls, and calls after the bus
/// went away, do nothing.
#[must_use = "dropping a Subscription unsubscribes its handler; call detach() to keep it"]
pub struct Subscription {
    registry: Weak<RegistryInner>,
    kind: EventKind,
    id: u64,
    detached: bool,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            if registry.remove(self.kind, self.id) {
                tracing::debug!(kind = %self.kind, id = self.id, "Handler removed");
            }
        }
    }

    /// Keep the handler registered for the lifetime of the bus
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.detached {
            self.unsubscribe();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Subscription({}, {})", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Patient;
    use std::sync::Mutex;

    fn patient_event(id: i64) -> ClinicEvent {
        ClinicEvent::PatientAdded(Patient {
            id,
            name: "P1".into(),
            age: 30,
            condition: "Flu".into(),
            phone: "0987654321".into(),
            notes: String::new(),
        })
    }

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Handler {
        let log = Arc::clone(log);
        Box::new(move |event| {
            if let ClinicEvent::PatientAdded(p) = event {
                log.lock().unwrap().push(format!("{}:{}", tag, p.id));
            }
        })
    }

    #[test]
    fn test_registration_order() {
        let registry = HandlerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let _a = registry.subscribe(EventKind::PatientAdded, recorder(&log, "a"));
        let _b = registry.subscribe(EventKind::PatientAdded, recorder(&log, "b"));
        let _other = registry.subscribe(EventKind::DoctorAdded, recorder(&log, "x"));

        assert_eq!(registry.dispatch(&patient_event(1)), 2);
        assert_eq!(*log.lock().unwrap(), vec!["a:1", "b:1"]);
    }

    #[test]
    fn test_unsubscribe_removes_only_its_handler() {
        let registry = HandlerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let a = registry.subscribe(EventKind::PatientAdded, recorder(&log, "a"));
        let _b = registry.subscribe(EventKind::PatientAdded, recorder(&log, "b"));

        a.unsubscribe();
        a.unsubscribe();
        registry.dispatch(&patient_event(2));

        assert_eq!(*log.lock().unwrap(), vec!["b:2"]);
        assert_eq!(registry.handler_count(EventKind::PatientAdded), 1);
    }

    #[test]
    fn test_drop_and_detach() {
        let registry = HandlerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        drop(registry.subscribe(EventKind::PatientAdded, recorder(&log, "dropped")));
        registry.subscribe(EventKind::PatientAdded, recorder(&log, "kept")).detach();
        registry.dispatch(&patient_event(3));

        assert_eq!(*log.lock().unwrap(), vec!["kept:3"]);
    }

    #[test]
    fn test_handler_may_unsubscribe_itself() {
        let registry = HandlerRegistry::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicU64::new(0));

        let sub = {
            let slot = Arc::clone(&slot);
            let calls = Arc::clone(&calls);
            registry.subscribe(
                EventKind::PatientAdded,
                Box::new(move |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if let Some(sub) = slot.lock().unwrap().take() {
                        sub.unsubscribe();
                    }
                }),
            )
        };
        *slot.lock().unwrap() = Some(sub);

        registry.dispatch(&patient_event(4));
        registry.dispatch(&patient_event(5));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_after_registry_dropped() {
        let registry = HandlerRegistry::new();
        let sub = registry.subscribe(EventKind::DoctorAdded, Box::new(|_| {}));
        drop(registry);
        sub.unsubscribe();
    }
}
