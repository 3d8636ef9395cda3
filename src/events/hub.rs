//! Named broadcast channels between tabs
//!
//! A message posted on an endpoint reaches every other endpoint opened on the
//! same channel name, in posting order, and never the sender itself.

use crossbeam::channel::{self, Receiver, Sender};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::{Error, Result};

static GLOBAL: OnceLock<BroadcastHub> = OnceLock::new();

struct Peer {
    id: u64,
    inbox: Sender<String>,
}

struct HubInner {
    available: AtomicBool,
    next_id: AtomicU64,
    channels: Mutex<HashMap<String, Vec<Peer>>>,
}

impl HubInner {
    fn channels(&self) -> MutexGuard<'_, HashMap<String, Vec<Peer>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn leave(&self, name: &str, id: u64) {
        let mut channels = self.channels();
        if let Some(peers) = channels.get_mut(name) {
            peers.retain(|p| p.id != id);
            if peers.is_empty() {
                channels.remove(name);
            }
        }
    }
}

/// Registry of named channels; one hub stands for one origin
#[derive(Clone)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner {
                available: AtomicBool::new(true),
                next_id: AtomicU64::new(1),
                channels: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The process-wide hub
    pub fn global() -> &'static BroadcastHub {
        GLOBAL.get_or_init(BroadcastHub::new)
    }

    /// Join the channel called `name`
    pub fn open(&self, name: &str) -> Result<ChannelEndpoint> {
        if !self.inner.available.load(Ordering::SeqCst) {
            return Err(Error::ChannelUnavailable("broadcast hub has been shut down".to_string()));
        }
        if name.trim().is_empty() {
            return Err(Error::ChannelUnavailable("channel name is empty".to_string()));
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (inbox, receiver) = channel::unbounded();
        self.inner
            .channels()
            .entry(name.to_string())
            .or_default()
            .push(Peer { id, inbox });
        tracing::debug!(channel = name, endpoint = id, "Endpoint opened");

        Ok(ChannelEndpoint {
            hub: Arc::clone(&self.inner),
            name: name.to_string(),
            id,
            receiver,
            closed: AtomicBool::new(false),
        })
    }

    /// Number of endpoints currently open on `name`
    pub fn peer_count(&self, name: &str) -> usize {
        self.inner.channels().get(name).map_or(0, Vec::len)
    }

    /// Make the hub unavailable and disconnect every endpoint
    pub fn shutdown(&self) {
        self.inner.available.store(false, Ordering::SeqCst);
        self.inner.channels().clear();
    }
}

/// One tab's membership in a channel
pub struct ChannelEndpoint {
    hub: Arc<HubInner>,
    name: String,
    id: u64,
    receiver: Receiver<String>,
    closed: AtomicBool,
}

impl ChannelEndpoint {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Queue `message` for every other endpoint on the channel
    pub fn post(&self, message: &str) -> Result<usize> {
        if self.is_closed() {
            return Err(Error::ChannelClosed);
        }
        if !self.hub.available.load(Ordering::SeqCst) {
            return Err(Error::ChannelUnavailable("broadcast hub has been shut down".to_string()));
        }

        let channels = self.hub.channels();
        let mut delivered = 0;
        for peer in channels.get(&self.name).into_iter().flatten() {
            if peer.id != self.id && peer.inbox.send(message.to_string()).is_ok() {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    /// Incoming messages. Disconnects once the endpoint is closed.
    pub fn receiver(&self) -> Receiver<String> {
        self.receiver.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Leave the channel. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.hub.leave(&self.name, self.id);
            tracing::debug!(channel = %self.name, endpoint = self.id, "Endpoint closed");
        }
    }
}

impl Drop for ChannelEndpoint {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_post_skips_sender() {
        let hub = BroadcastHub::new();
        let a = hub.open("clinic").unwrap();
        let b = hub.open("clinic").unwrap();
        let other = hub.open("elsewhere").unwrap();

        assert_eq!(a.post("one").unwrap(), 1);
        a.post("two").unwrap();

        assert_eq!(b.receiver().try_recv().unwrap(), "one");
        assert_eq!(b.receiver().try_recv().unwrap(), "two");
        assert!(a.receiver().try_recv().is_err());
        assert!(other.receiver().try_recv().is_err());
    }

    #[test]
    fn test_close_disconnects() {
        let hub = BroadcastHub::new();
        let a = hub.open("clinic").unwrap();
        let b = hub.open("clinic").unwrap();
        let inbox = b.receiver();

        b.close();
        b.close();
        assert_eq!(hub.peer_count("clinic"), 1);
        assert_eq!(a.post("lost").unwrap(), 0);
        assert!(inbox.recv_timeout(Duration::from_millis(50)).is_err());
        assert!(matches!(b.post("x"), Err(Error::ChannelClosed)));
    }

    #[test]
    fn test_unavailable_hub() {
        let hub = BroadcastHub::new();
        assert!(matches!(hub.open(""), Err(Error::ChannelUnavailable(_))));

        hub.shutdown();
        assert!(matches!(hub.open("clinic"), Err(Error::ChannelUnavailable(_))));
    }
}
