//! SQL console state
//!
//! Keeps the last successful result apart from the last error, so a failing
//! query never wipes what is already on screen.

use crate::Result;
use crate::service::ClinicService;
use crate::storage::{QueryRows, SqlValue};

#[derive(Debug, Default)]
pub struct SqlConsole {
    last_result: Option<QueryRows>,
    last_error: Option<String>,
}

impl SqlConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `sql` and record the outcome.
    ///
    /// Success replaces the result and clears the error. Failure records the
    /// store's message and leaves the previous result in place.
    pub fn run(&mut self, service: &ClinicService, sql: &str, params: &[SqlValue]) -> Result<&QueryRows> {
        match service.raw_query(sql, params) {
            Ok(rows) => {
                self.last_error = None;
                Ok(self.last_result.insert(rows))
            }
            Err(e) => {
                tracing::warn!("Failed to run query: {}", e);
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn result(&self) -> Option<&QueryRows> {
        self.last_result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear(&mut self) {
        self.last_result = None;
        self.last_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{BroadcastHub, ChannelBus};
    use crate::storage::{LazyStore, StoreLocation};
    use std::sync::Arc;

    fn service() -> ClinicService {
        let bus = ChannelBus::open(&BroadcastHub::new(), "console").unwrap();
        ClinicService::new(LazyStore::new(StoreLocation::Memory), Arc::new(bus))
    }

    #[test]
    fn test_failure_keeps_previous_result() {
        let service = service();
        let mut console = SqlConsole::new();

        let rows = console.run(&service, "SELECT 1 AS one", &[]).unwrap();
        assert_eq!(rows.get(0, "one"), Some(&SqlValue::Integer(1)));

        assert!(console.run(&service, "SELECT * FROM missing_table", &[]).is_err());
        assert!(console.error().unwrap().contains("no such table"));
        assert_eq!(console.result().unwrap().get(0, "one"), Some(&SqlValue::Integer(1)));

        console.run(&service, "SELECT 2 AS two", &[]).unwrap();
        assert!(console.error().is_none());

        console.clear();
        assert!(console.result().is_none());
    }
}
