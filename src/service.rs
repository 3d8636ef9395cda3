//! Data access layer
//!
//! The only path through which views read and write clinic rows. Writes
//! validate their input, insert with a returning statement and announce the
//! created row on the message bus.

use chrono::{Days, Local, Months, NaiveDate};
use std::sync::Arc;

use crate::events::{ClinicEvent, MessageBus};
use crate::model::{Appointment, Doctor, NewAppointment, NewDoctor, NewPatient, Patient};
use crate::storage::{ClinicStore, DateRange, DbStats, LazyStore, QueryRows, SortOrder, SqlValue};
use crate::Result;

/// Source of "today" for date-scoped reads
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Date windows used by the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentWindow {
    /// `date = today`
    Today,
    /// `today <= date <= today + 7 days`
    NextWeek,
    /// `today <= date <= today + 1 month`
    NextMonth,
    /// `today - 1 month <= date < today`, newest first
    LastMonth,
}

impl AppointmentWindow {
    pub fn range(self, today: NaiveDate) -> DateRange {
        match self {
            AppointmentWindow::Today => DateRange::day(today),
            AppointmentWindow::NextWeek => DateRange::closed(today, today + Days::new(7)),
            AppointmentWindow::NextMonth => DateRange::closed(today, today + Months::new(1)),
            AppointmentWindow::LastMonth => DateRange::half_open(today - Months::new(1), today),
        }
    }

    pub fn order(self) -> SortOrder {
        match self {
            AppointmentWindow::LastMonth => SortOrder::Descending,
            _ => SortOrder::Ascending,
        }
    }
}

pub struct ClinicService {
    store: LazyStore,
    bus: Arc<dyn MessageBus>,
    clock: Clock,
}

impl ClinicService {
    pub fn new(store: LazyStore, bus: Arc<dyn MessageBus>) -> Self {
        Self {
            store,
            bus,
            clock: Arc::new(|| Local::now().date_naive()),
        }
    }

    /// Replace the wall clock, mostly for tests
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn bus(&self) -> &Arc<dyn MessageBus> {
        &self.bus
    }

    /// Today according to the service clock
    pub fn today(&self) -> NaiveDate {
        (self.clock)()
    }

    pub fn clock(&self) -> Clock {
        Arc::clone(&self.clock)
    }

    fn store(&self) -> Result<Arc<ClinicStore>> {
        self.store.get()
    }

    /// Publish after a committed write. The row exists either way, so a bus
    /// failure is logged rather than returned.
    fn announce(&self, event: ClinicEvent) {
        let kind = event.kind();
        if let Err(e) = self.bus.publish(event) {
            tracing::warn!(%kind, "Failed to broadcast event: {}", e);
        }
    }

    // ========== Writes ==========

    pub fn add_doctor(&self, input: &NewDoctor) -> Result<Doctor> {
        input.validate()?;
        let doctor = self.store()?.insert_doctor(input).inspect_err(|e| {
            tracing::error!("ADD_DOCTOR failed: {}", e);
        })?;
        tracing::info!(id = doctor.id, "Doctor registered: {}", doctor.name);

        self.announce(ClinicEvent::DoctorAdded(doctor.clone()));
        Ok(doctor)
    }

    pub fn add_patient(&self, input: &NewPatient) -> Result<Patient> {
        input.validate()?;
        let patient = self.store()?.insert_patient(input).inspect_err(|e| {
            tracing::error!("ADD_PATIENT failed: {}", e);
        })?;
        tracing::info!(id = patient.id, "Patient registered: {}", patient.name);

        self.announce(ClinicEvent::PatientAdded(patient.clone()));
        Ok(patient)
    }

    pub fn schedule_appointment(&self, input: &NewAppointment) -> Result<Appointment> {
        input.normalized()?;
        let appointment = self.store()?.insert_appointment(input).inspect_err(|e| {
            tracing::error!("SCHEDULE_APPOINTMENT failed: {}", e);
        })?;
        tracing::info!(
            id = appointment.id,
            "Appointment scheduled: {} with {} on {} {}",
            appointment.patient_name,
            appointment.doctor_name,
            appointment.date,
            appointment.time
        );

        self.announce(ClinicEvent::AppointmentScheduled(appointment.clone()));
        Ok(appointment)
    }

    // ========== Reads ==========

    pub fn get_doctors(&self) -> Result<Vec<Doctor>> {
        self.store()?.list_doctors()
    }

    pub fn get_patients(&self) -> Result<Vec<Patient>> {
        self.store()?.list_patients()
    }

    /// All appointments with doctor and patient names
    pub fn get_appointments(&self) -> Result<Vec<Appointment>> {
        self.store()?.list_appointments()
    }

    pub fn appointments_count(&self) -> Result<usize> {
        self.store()?.count_appointments()
    }

    /// Appointments inside `window`, with the range computed from the clock now
    pub fn appointments_in(&self, window: AppointmentWindow) -> Result<Vec<Appointment>> {
        let range = window.range(self.today());
        self.store()?.appointments_between(range, window.order())
    }

    pub fn todays_appointments(&self) -> Result<Vec<Appointment>> {
        self.appointments_in(AppointmentWindow::Today)
    }

    pub fn upcoming_week_appointments(&self) -> Result<Vec<Appointment>> {
        self.appointments_in(AppointmentWindow::NextWeek)
    }

    pub fn next_month_appointments(&self) -> Result<Vec<Appointment>> {
        self.appointments_in(AppointmentWindow::NextMonth)
    }

    pub fn completed_last_month_appointments(&self) -> Result<Vec<Appointment>> {
        self.appointments_in(AppointmentWindow::LastMonth)
    }

    /// Run an arbitrary statement. No allow-list: this backs the SQL console.
    pub fn raw_query(&self, sql: &str, params: &[SqlValue]) -> Result<QueryRows> {
        self.store()?.raw_query(sql, params)
    }

    pub fn stats(&self) -> Result<DbStats> {
        self.store()?.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{BroadcastHub, ChannelBus, EventKind};
    use crate::storage::StoreLocation;
    use crate::Error;
    use crossbeam::channel;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn service_in_memory(hub: &BroadcastHub) -> ClinicService {
        let bus = ChannelBus::open(hub, "clinic").unwrap();
        ClinicService::new(LazyStore::new(StoreLocation::Memory), Arc::new(bus))
    }

    fn service_on(path: &Path, hub: &BroadcastHub) -> ClinicService {
        let bus = ChannelBus::open(hub, "clinic").unwrap();
        ClinicService::new(LazyStore::new(StoreLocation::File(path.to_path_buf())), Arc::new(bus))
    }

    fn dr_a() -> NewDoctor {
        NewDoctor {
            name: "Dr. A".into(),
            age: 40,
            specialization: "Cardiology".into(),
            phone: "1234567890".into(),
            notes: String::new(),
        }
    }

    fn p1() -> NewPatient {
        NewPatient {
            name: "P1".into(),
            age: 30,
            condition: "Flu".into(),
            phone: "0987654321".into(),
            notes: String::new(),
        }
    }

    fn visit(doctor_id: i64, patient_id: i64, date: &str, time: &str) -> NewAppointment {
        NewAppointment {
            doctor_id,
            patient_id,
            date: date.into(),
            time: time.into(),
            notes: String::new(),
        }
    }

    #[test]
    fn test_register_and_schedule_scenario() {
        let hub = BroadcastHub::new();
        let service = service_in_memory(&hub);

        let doctor = service.add_doctor(&dr_a()).unwrap();
        let doctors = service.get_doctors().unwrap();
        assert_eq!(doctors.len(), 1);
        assert_eq!(doctors[0], doctor);
        assert_eq!(doctors[0].name, "Dr. A");
        assert_eq!(doctors[0].specialization, "Cardiology");

        let patient = service.add_patient(&p1()).unwrap();
        assert_eq!(service.get_patients().unwrap(), vec![patient.clone()]);

        service
            .schedule_appointment(&visit(doctor.id, patient.id, "2024-06-01", "09:00"))
            .unwrap();
        let appointments = service.get_appointments().unwrap();
        assert_eq!(appointments.len(), 1);
        assert_eq!(appointments[0].doctor_name, "Dr. A");
        assert_eq!(appointments[0].patient_name, "P1");
        assert_eq!(appointments[0].date, "2024-06-01");
        assert_eq!(appointments[0].time, "09:00");
    }

    #[test]
    fn test_ids_strictly_increase() {
        let hub = BroadcastHub::new();
        let service = service_in_memory(&hub);

        let mut last = 0;
        for name in ["Dr. A", "Dr. B", "Dr. C"] {
            let doctor = service.add_doctor(&NewDoctor { name: name.into(), ..dr_a() }).unwrap();
            assert!(doctor.id > last);
            last = doctor.id;
        }
    }

    #[test]
    fn test_missing_reference_creates_nothing_and_publishes_nothing() {
        let hub = BroadcastHub::new();
        let service = service_in_memory(&hub);
        let (tx, rx) = channel::unbounded();
        let _sub = service.bus().subscribe(
            EventKind::AppointmentScheduled,
            Box::new(move |event| {
                let _ = tx.send(event.clone());
            }),
        );

        let doctor = service.add_doctor(&dr_a()).unwrap();
        let err = service
            .schedule_appointment(&visit(doctor.id, 42, "2024-06-01", "09:00"))
            .unwrap_err();

        assert!(err.is_constraint_violation(), "unexpected error: {err}");
        assert_eq!(service.appointments_count().unwrap(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_invalid_input_never_reaches_store() {
        let hub = BroadcastHub::new();
        let dir = tempfile::tempdir().unwrap();
        let service = service_on(&dir.path().join("clinic.db"), &hub);

        let err = service.add_doctor(&NewDoctor { phone: "123".into(), ..dr_a() }).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(!service.store.is_initialized());
    }

    #[test]
    fn test_store_unavailable_surfaces_on_first_use() {
        let hub = BroadcastHub::new();
        let dir = tempfile::tempdir().unwrap();
        let service = service_on(&dir.path().join("no").join("such").join("clinic.db"), &hub);

        let err = service.get_doctors().unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)), "unexpected error: {err}");
    }

    #[test]
    fn test_each_handler_gets_exactly_one_event() {
        let hub = BroadcastHub::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinic.db");
        let tab_a = service_on(&path, &hub);
        let tab_b = service_on(&path, &hub);

        let local_hits = Arc::new(AtomicUsize::new(0));
        let hits = Arc::clone(&local_hits);
        let _local = tab_a.bus().subscribe(
            EventKind::AppointmentScheduled,
            Box::new(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let (tx, rx) = channel::unbounded();
        let _remote = tab_b.bus().subscribe(
            EventKind::AppointmentScheduled,
            Box::new(move |event| {
                let _ = tx.send(event.clone());
            }),
        );

        let doctor = tab_a.add_doctor(&dr_a()).unwrap();
        let patient = tab_a.add_patient(&p1()).unwrap();
        let created = tab_a
            .schedule_appointment(&visit(doctor.id, patient.id, "2024-06-01", "09:00"))
            .unwrap();

        assert_eq!(local_hits.load(Ordering::SeqCst), 1);
        let received = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(received, ClinicEvent::AppointmentScheduled(created.clone()));
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        // the other tab sees the row through its own connection
        assert_eq!(tab_b.get_appointments().unwrap(), vec![created]);
    }

    #[test]
    fn test_date_windows_follow_the_clock() {
        let hub = BroadcastHub::new();
        let service = service_in_memory(&hub).with_clock(|| day("2024-06-10"));

        let d = service.add_doctor(&dr_a()).unwrap();
        let p = service.add_patient(&p1()).unwrap();
        for (date, time) in [
            ("2024-06-10", "15:00"),
            ("2024-06-10", "09:00"),
            ("2024-06-17", "10:00"),
            ("2024-06-18", "10:00"),
            ("2024-07-10", "10:00"),
            ("2024-07-11", "10:00"),
            ("2024-06-09", "16:00"),
            ("2024-05-10", "08:00"),
            ("2024-05-09", "08:00"),
        ] {
            service.schedule_appointment(&visit(d.id, p.id, date, time)).unwrap();
        }

        let keys = |list: Vec<Appointment>| -> Vec<String> {
            list.into_iter().map(|a| format!("{} {}", a.date, a.time)).collect()
        };

        assert_eq!(
            keys(service.todays_appointments().unwrap()),
            vec!["2024-06-10 09:00", "2024-06-10 15:00"]
        );
        assert_eq!(
            keys(service.upcoming_week_appointments().unwrap()),
            vec!["2024-06-10 09:00", "2024-06-10 15:00", "2024-06-17 10:00"]
        );
        assert_eq!(
            keys(service.next_month_appointments().unwrap()),
            vec![
                "2024-06-10 09:00",
                "2024-06-10 15:00",
                "2024-06-17 10:00",
                "2024-06-18 10:00",
                "2024-07-10 10:00",
            ]
        );
        assert_eq!(
            keys(service.completed_last_month_appointments().unwrap()),
            vec!["2024-06-09 16:00", "2024-05-10 08:00"]
        );
        assert_eq!(service.appointments_count().unwrap(), 9);
    }

    #[test]
    fn test_month_window_clamps_to_month_end() {
        let range = AppointmentWindow::NextMonth.range(day("2024-01-31"));
        assert!(range.contains(day("2024-02-29")));
        assert!(!range.contains(day("2024-03-01")));

        let past = AppointmentWindow::LastMonth.range(day("2024-03-31"));
        assert!(past.contains(day("2024-02-29")));
        assert!(!past.contains(day("2024-02-28")));
        assert!(!past.contains(day("2024-03-31")));
    }

    #[test]
    fn test_raw_query_passthrough() {
        let hub = BroadcastHub::new();
        let service = service_in_memory(&hub);
        service.add_doctor(&dr_a()).unwrap();

        let rows = service
            .raw_query("SELECT COUNT(*) AS n FROM doctors WHERE age > ?1", &[SqlValue::Integer(30)])
            .unwrap();
        assert_eq!(rows.get(0, "n"), Some(&SqlValue::Integer(1)));

        assert!(matches!(service.raw_query("SELEC 1", &[]), Err(Error::Query(_))));
    }
}
