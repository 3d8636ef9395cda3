//! Tab-wide store handle, opened on first use

use std::sync::{Arc, Mutex, PoisonError};

use super::sqlite::{ClinicStore, StoreLocation};
use crate::{Error, Result};

/// Lazily opened, shared [`ClinicStore`].
///
/// The first successful [`LazyStore::get`] opens the store; every later call
/// returns the same handle. Racing callers are serialized on the init lock,
/// so at most one connection is ever opened. A failed open leaves the handle
/// empty and reports [`Error::StoreUnavailable`].
pub struct LazyStore {
    location: StoreLocation,
    store: Mutex<Option<Arc<ClinicStore>>>,
}

impl LazyStore {
    pub fn new(location: StoreLocation) -> Self {
        Self {
            location,
            store: Mutex::new(None),
        }
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    pub fn is_initialized(&self) -> bool {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn get(&self) -> Result<Arc<ClinicStore>> {
        let mut slot = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(store) = slot.as_ref() {
            return Ok(Arc::clone(store));
        }

        tracing::info!("Initializing clinic store at {}", self.location);
        let store = ClinicStore::open_location(&self.location)
            .map(Arc::new)
            .map_err(|e| Error::StoreUnavailable(format!("{}: {}", self.location, e)))?;
        *slot = Some(Arc::clone(&store));
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_get_is_idempotent() {
        let lazy = LazyStore::new(StoreLocation::Memory);
        assert!(!lazy.is_initialized());

        let first = lazy.get().unwrap();
        let second = lazy.get().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(lazy.is_initialized());
    }

    #[test]
    fn test_racing_callers_share_one_store() {
        let dir = tempfile::tempdir().unwrap();
        let lazy = Arc::new(LazyStore::new(StoreLocation::File(dir.path().join("clinic.db"))));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lazy = Arc::clone(&lazy);
                thread::spawn(move || lazy.get().unwrap())
            })
            .collect();
        let stores: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(stores.iter().all(|s| Arc::ptr_eq(s, &stores[0])));
    }

    #[test]
    fn test_unavailable_location() {
        let dir = tempfile::tempdir().unwrap();
        let lazy = LazyStore::new(StoreLocation::File(dir.path().join("missing").join("clinic.db")));

        let err = lazy.get().err().unwrap();
        assert!(matches!(err, Error::StoreUnavailable(_)), "unexpected error: {err}");
        assert!(!lazy.is_initialized());
    }
}
