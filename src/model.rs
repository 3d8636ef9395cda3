//! Clinic entities and the input records used to create them
//!
//! Rows are append-only: they are created once with a store-assigned id and
//! never updated or deleted.

use chrono::{DateTime, NaiveDate, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::{Error, Result};

/// Storage format of appointment dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Storage format of appointment times
pub const TIME_FORMAT: &str = "%H:%M";

static PHONE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{10}$").unwrap());

/// A registered doctor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: i64,
    pub name: String,
    pub age: u32,
    pub specialization: String,
    pub phone: String,
    pub notes: String,
}

/// A registered patient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub name: String,
    pub age: u32,
    pub condition: String,
    pub phone: String,
    pub notes: String,
}

/// A scheduled appointment, decorated with the names of both parties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub doctor_id: i64,
    pub patient_id: i64,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`, 24h
    pub time: String,
    pub notes: String,
    pub doctor_name: String,
    pub patient_name: String,
}

impl Appointment {
    /// Calendar date of the appointment, if the stored text is well formed
    pub fn naive_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, DATE_FORMAT).ok()
    }
}

/// Input for registering a doctor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDoctor {
    pub name: String,
    pub age: u32,
    pub specialization: String,
    pub phone: String,
    #[serde(default)]
    pub notes: String,
}

impl NewDoctor {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().chars().count() < 2 {
            return Err(invalid("name must be at least 2 characters"));
        }
        if !(18..=100).contains(&self.age) {
            return Err(invalid("doctor age must be between 18 and 100"));
        }
        if self.specialization.trim().is_empty() {
            return Err(invalid("specialization is required"));
        }
        check_phone(&self.phone)
    }
}

/// Input for registering a patient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPatient {
    pub name: String,
    pub age: u32,
    pub condition: String,
    pub phone: String,
    #[serde(default)]
    pub notes: String,
}

impl NewPatient {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(invalid("name is required"));
        }
        if self.age > 150 {
            return Err(invalid("patient age must be at most 150"));
        }
        if self.condition.trim().is_empty() {
            return Err(invalid("condition is required"));
        }
        check_phone(&self.phone)
    }
}

/// Input for scheduling an appointment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAppointment {
    pub doctor_id: i64,
    pub patient_id: i64,
    pub date: String,
    pub time: String,
    #[serde(default)]
    pub notes: String,
}

impl NewAppointment {
    /// Validate the record and return the date and time in storage format.
    ///
    /// Dates may also be given as RFC 3339 timestamps; only the date part is kept.
    pub fn normalized(&self) -> Result<(String, String)> {
        if self.doctor_id <= 0 {
            return Err(invalid("a doctor must be selected"));
        }
        if self.patient_id <= 0 {
            return Err(invalid("a patient must be selected"));
        }

        let date = NaiveDate::parse_from_str(self.date.trim(), DATE_FORMAT)
            .or_else(|_| DateTime::parse_from_rfc3339(self.date.trim()).map(|dt| dt.date_naive()))
            .map_err(|_| invalid(&format!("invalid date '{}', expected YYYY-MM-DD", self.date)))?;
        let time = NaiveTime::parse_from_str(self.time.trim(), TIME_FORMAT)
            .map_err(|_| invalid(&format!("invalid time '{}', expected HH:MM", self.time)))?;

        Ok((
            date.format(DATE_FORMAT).to_string(),
            time.format(TIME_FORMAT).to_string(),
        ))
    }
}

fn check_phone(phone: &str) -> Result<()> {
    if PHONE.is_match(phone) {
        Ok(())
    } else {
        Err(invalid("phone number must be 10 digits"))
    }
}

fn invalid(message: &str) -> Error {
    Error::Validation(message.to_string())
}
