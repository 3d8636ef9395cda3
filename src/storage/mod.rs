//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with tables:
//! - doctors(id, name, age, specialization, phone, notes)
//! - patients(id, name, age, condition, phone, notes)
//! - appointments(id, doctor_id, patient_id, date, time, notes)

pub mod schema;
pub mod sqlite;
pub mod lazy;
pub mod value;

pub use sqlite::{ClinicStore, DateRange, DbStats, SortOrder, StoreLocation};
pub use lazy::LazyStore;
pub use value::{QueryRows, SqlValue};
