//! # Clinicsync - local clinic registry
//!
//! Doctors, patients and appointments kept in an embedded SQLite database,
//! with every open view ("tab") kept in step through a broadcast channel.
//!
//! Clinicsync provides:
//! - SQLite-backed storage with foreign keys and insert-returning writes
//! - A data access service that publishes an event for every created row
//! - A typed publish/subscribe bus with capability-returning subscriptions
//! - Date-scoped appointment reads for dashboards
//! - A raw SQL console for inspection

pub mod model;
pub mod storage;
pub mod events;
pub mod service;
pub mod console;
pub mod dashboard;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use model::{Appointment, Doctor, NewAppointment, NewDoctor, NewPatient, Patient};
pub use storage::{ClinicStore, LazyStore, QueryRows, SqlValue, StoreLocation};
pub use events::{BroadcastHub, ChannelBus, ClinicEvent, EventKind, MessageBus, Subscription};
pub use service::ClinicService;
pub use console::SqlConsole;
pub use dashboard::{Dashboard, DashboardView};

/// Result type alias for Clinicsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Clinicsync operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(rusqlite::Error),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Channel unavailable: {0}")]
    ChannelUnavailable(String),

    #[error("Channel is closed")]
    ChannelClosed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, message)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Error::ConstraintViolation(
                    message.unwrap_or_else(|| code.to_string()),
                )
            }
            other => Error::Storage(other),
        }
    }
}

impl Error {
    /// True when the store rejected a write because of a constraint
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Error::ConstraintViolation(_))
    }
}
