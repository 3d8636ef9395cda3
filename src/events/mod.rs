//! Event Synchronization Layer
//!
//! Every created row is announced as a [`ClinicEvent`]. A [`MessageBus`]
//! delivers it to the handlers of the publishing tab and to every other tab
//! listening on the same channel.
//!
//! - `registry`: per-kind handler lists and [`Subscription`] capabilities
//! - `hub`: named broadcast channels that never echo to the sender
//! - `bus`: [`ChannelBus`], the bus over a hub channel

pub mod registry;
pub mod hub;
pub mod bus;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::{Appointment, Doctor, Patient};
use crate::{Error, Result};

pub use bus::ChannelBus;
pub use hub::{BroadcastHub, ChannelEndpoint};
pub use registry::{HandlerRegistry, Subscription};

/// Default channel shared by all tabs of the app
pub const DEFAULT_CHANNEL: &str = "patient_registration_channel";

/// Callback invoked with each delivered event
pub type Handler = Box<dyn Fn(&ClinicEvent) + Send + Sync + 'static>;

/// Kind of a [`ClinicEvent`], used to subscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    DoctorAdded,
    PatientAdded,
    #[serde(alias = "appointment-added")]
    AppointmentScheduled,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [
        EventKind::DoctorAdded,
        EventKind::PatientAdded,
        EventKind::AppointmentScheduled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::DoctorAdded => "doctor-added",
            EventKind::PatientAdded => "patient-added",
            EventKind::AppointmentScheduled => "appointment-scheduled",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "doctor-added" => Ok(EventKind::DoctorAdded),
            "patient-added" => Ok(EventKind::PatientAdded),
            "appointment-scheduled" | "appointment-added" => Ok(EventKind::AppointmentScheduled),
            other => Err(Error::Validation(format!("unknown event type '{}'", other))),
        }
    }
}

/// An "entity created" notification carrying the full created row.
///
/// On the wire: `{"type": "doctor-added", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ClinicEvent {
    DoctorAdded(Doctor),
    PatientAdded(Patient),
    #[serde(alias = "appointment-added")]
    AppointmentScheduled(Appointment),
}

impl ClinicEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ClinicEvent::DoctorAdded(_) => EventKind::DoctorAdded,
            ClinicEvent::PatientAdded(_) => EventKind::PatientAdded,
            ClinicEvent::AppointmentScheduled(_) => EventKind::AppointmentScheduled,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(message: &str) -> Result<Self> {
        Ok(serde_json::from_str(message)?)
    }
}

/// Publish/subscribe contract shared by views and the data access layer
pub trait MessageBus: Send + Sync {
    /// Deliver `event` to this tab's handlers, then to every other tab
    fn publish(&self, event: ClinicEvent) -> Result<()>;

    /// Register `handler` for events of `kind`
    fn subscribe(&self, kind: EventKind, handler: Handler) -> Subscription;

    /// Drop every handler and leave the channel. Idempotent.
    fn close(&self);
}
