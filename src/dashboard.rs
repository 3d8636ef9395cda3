//! Dashboard view-model
//!
//! Lists loaded with one full fetch and then grown from incoming events.
//! Events only ever add rows; a fresh [`Dashboard::load`] is the way back to a
//! consistent snapshot.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use crate::events::{ClinicEvent, EventKind, Subscription};
use crate::model::{Appointment, Doctor, Patient};
use crate::service::{AppointmentWindow, ClinicService};
use crate::{Error, Result};

/// Which appointments the dashboard table shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DashboardView {
    #[default]
    Today,
    Week,
    Month,
}

impl FromStr for DashboardView {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "today" => Ok(DashboardView::Today),
            "week" => Ok(DashboardView::Week),
            "month" => Ok(DashboardView::Month),
            other => Err(Error::Validation(format!(
                "unknown view '{}', expected today, week or month",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub doctors: Vec<Doctor>,
    pub patients: Vec<Patient>,
    pub appointments_count: usize,
    pub today: Vec<Appointment>,
    pub upcoming_week: Vec<Appointment>,
    pub next_month: Vec<Appointment>,
    pub completed_last_month: Vec<Appointment>,
    /// Every appointment id counted so far, inside a window or not
    #[serde(skip)]
    seen_appointments: HashSet<i64>,
}

impl Dashboard {
    /// Full fetch of every list
    pub fn load(service: &ClinicService) -> Result<Self> {
        let seen_appointments = service.get_appointments()?.iter().map(|a| a.id).collect();
        Ok(Self {
            doctors: service.get_doctors()?,
            patients: service.get_patients()?,
            appointments_count: service.appointments_count()?,
            today: service.todays_appointments()?,
            upcoming_week: service.upcoming_week_appointments()?,
            next_month: service.next_month_appointments()?,
            completed_last_month: service.completed_last_month_appointments()?,
            seen_appointments,
        })
    }

    /// Replace the shared dashboard with a full fetch.
    ///
    /// The lock is held while loading, so events arriving meanwhile are
    /// applied on top of the fresh lists and deduplicated by id. Call after
    /// [`Dashboard::follow`] so nothing written in between is missed.
    pub fn refresh(dashboard: &Arc<Mutex<Dashboard>>, service: &ClinicService) -> Result<()> {
        let mut guard = dashboard.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = Dashboard::load(service)?;
        Ok(())
    }

    /// Fold one event in. Rows already present (same id) are ignored.
    pub fn apply(&mut self, event: &ClinicEvent, today: NaiveDate) {
        match event {
            ClinicEvent::DoctorAdded(doctor) => {
                if !self.doctors.iter().any(|d| d.id == doctor.id) {
                    self.doctors.push(doctor.clone());
                }
            }
            ClinicEvent::PatientAdded(patient) => {
                if !self.patients.iter().any(|p| p.id == patient.id) {
                    self.patients.push(patient.clone());
                }
            }
            ClinicEvent::AppointmentScheduled(appointment) => self.add_appointment(appointment, today),
        }
    }

    fn add_appointment(&mut self, appointment: &Appointment, today: NaiveDate) {
        if !self.seen_appointments.insert(appointment.id) {
            return;
        }
        self.appointments_count += 1;

        let Some(date) = appointment.naive_date() else {
            tracing::warn!(id = appointment.id, "Appointment with unparseable date: {}", appointment.date);
            return;
        };
        for (window, list) in [
            (AppointmentWindow::Today, &mut self.today),
            (AppointmentWindow::NextWeek, &mut self.upcoming_week),
            (AppointmentWindow::NextMonth, &mut self.next_month),
            (AppointmentWindow::LastMonth, &mut self.completed_last_month),
        ] {
            if window.range(today).contains(date) {
                list.push(appointment.clone());
                sort_appointments(list, window == AppointmentWindow::LastMonth);
            }
        }
    }

    /// Appointments for the selected view. `Month` merges next month with
    /// last month, oldest first.
    pub fn view(&self, view: DashboardView) -> Vec<Appointment> {
        match view {
            DashboardView::Today => self.today.clone(),
            DashboardView::Week => self.upcoming_week.clone(),
            DashboardView::Month => {
                let mut all: Vec<Appointment> = self
                    .next_month
                    .iter()
                    .chain(self.completed_last_month.iter())
                    .cloned()
                    .collect();
                sort_appointments(&mut all, false);
                all
            }
        }
    }

    /// Keep `dashboard` current from `service`'s bus.
    ///
    /// Dropping the returned subscriptions stops the updates.
    pub fn follow(dashboard: &Arc<Mutex<Dashboard>>, service: &ClinicService) -> Vec<Subscription> {
        EventKind::ALL
            .iter()
            .map(|&kind| {
                let dashboard = Arc::clone(dashboard);
                let clock = service.clock();
                service.bus().subscribe(
                    kind,
                    Box::new(move |event| {
                        let today = clock();
                        dashboard
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .apply(event, today);
                    }),
                )
            })
            .collect()
    }
}

fn sort_appointments(list: &mut [Appointment], newest_first: bool) {
    list.sort_by(|a, b| {
        let ord = (&a.date, &a.time).cmp(&(&b.date, &b.time));
        if newest_first { ord.reverse() } else { ord }
    });
}
