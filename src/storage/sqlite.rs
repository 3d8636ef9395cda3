//! SQLite storage implementation

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params, params_from_iter};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::schema;
use super::value::{QueryRows, SqlValue};
use crate::model::{Appointment, DATE_FORMAT, Doctor, NewAppointment, NewDoctor, NewPatient, Patient};
use crate::{Error, Result};

/// How long a connection waits on a lock held by another connection
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const APPOINTMENT_SELECT: &str = r#"
    SELECT a.id, a.doctor_id, a.patient_id, a.date, a.time, a.notes, d.name, p.name
    FROM appointments a
    JOIN doctors d ON a.doctor_id = d.id
    JOIN patients p ON a.patient_id = p.id
"#;

/// Where the database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// File-based database, shared by every connection opened on the same path
    File(PathBuf),
    /// Private in-memory database (for testing)
    Memory,
}

impl std::fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreLocation::File(path) => write!(f, "{}", path.display()),
            StoreLocation::Memory => write!(f, ":memory:"),
        }
    }
}

/// Inclusive/exclusive bounds on appointment dates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: Bound<NaiveDate>,
    pub end: Bound<NaiveDate>,
}

impl DateRange {
    /// Exactly one day
    pub fn day(day: NaiveDate) -> Self {
        Self {
            start: Bound::Included(day),
            end: Bound::Included(day),
        }
    }

    /// `start <= date <= end`
    pub fn closed(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Bound::Included(start),
            end: Bound::Included(end),
        }
    }

    /// `start <= date < end`
    pub fn half_open(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Bound::Included(start),
            end: Bound::Excluded(end),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        let above = match self.start {
            Bound::Included(s) => date >= s,
            Bound::Excluded(s) => date > s,
            Bound::Unbounded => true,
        };
        let below = match self.end {
            Bound::Included(e) => date <= e,
            Bound::Excluded(e) => date < e,
            Bound::Unbounded => true,
        };
        above && below
    }

    /// WHERE fragment over `a.date` plus its bound values
    fn to_sql(self) -> (String, Vec<String>) {
        let mut clauses = Vec::new();
        let mut values = Vec::new();
        for (bound, inclusive, exclusive) in [(self.start, ">=", ">"), (self.end, "<=", "<")] {
            let (op, day) = match bound {
                Bound::Included(d) => (inclusive, d),
                Bound::Excluded(d) => (exclusive, d),
                Bound::Unbounded => continue,
            };
            values.push(day.format(DATE_FORMAT).to_string());
            clauses.push(format!("a.date {} ?{}", op, values.len()));
        }
        if clauses.is_empty() {
            clauses.push("1 = 1".to_string());
        }
        (clauses.join(" AND "), values)
    }
}

/// Ordering of appointment listings by date then time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    fn order_by(self) -> &'static str {
        match self {
            SortOrder::Ascending => "ORDER BY a.date ASC, a.time ASC, a.id ASC",
            SortOrder::Descending => "ORDER BY a.date DESC, a.time DESC, a.id DESC",
        }
    }
}

/// SQLite-backed storage for the clinic tables
///
/// One store is one connection. Every tab opens its own store on the same
/// location; SQLite serializes their writes.
pub struct ClinicStore {
    conn: Mutex<Connection>,
    location: StoreLocation,
}

impl ClinicStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_location(&StoreLocation::File(path.to_path_buf()))
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::open_location(&StoreLocation::Memory)
    }

    pub fn open_location(location: &StoreLocation) -> Result<Self> {
        let conn = match location {
            StoreLocation::File(path) => Connection::open(path)?,
            StoreLocation::Memory => Connection::open_in_memory()?,
        };
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(schema::CONNECTION_PRAGMAS)?;

        let store = Self {
            conn: Mutex::new(conn),
            location: location.clone(),
        };
        store.initialize_schema()?;
        tracing::debug!("Opened clinic store at {}", location);
        Ok(store)
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn();
        for stmt in schema::all_schema_statements() {
            conn.execute(stmt, [])?;
        }
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========== Doctor Operations ==========

    /// Insert a doctor and return the stored row
    pub fn insert_doctor(&self, doctor: &NewDoctor) -> Result<Doctor> {
        let conn = self.conn();
        let row = conn.query_row(
            r#"
            INSERT INTO doctors (name, age, specialization, phone, notes)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING id, name, age, specialization, phone, notes
            "#,
            params![
                doctor.name.trim(),
                doctor.age,
                doctor.specialization.trim(),
                doctor.phone.trim(),
                doctor.notes,
            ],
            Self::row_to_doctor,
        )?;
        Ok(row)
    }

    /// All doctors in registration order
    pub fn list_doctors(&self) -> Result<Vec<Doctor>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, age, specialization, phone, notes FROM doctors ORDER BY id",
        )?;
        let doctors = stmt
            .query_map([], Self::row_to_doctor)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(doctors)
    }

    fn row_to_doctor(row: &rusqlite::Row) -> rusqlite::Result<Doctor> {
        Ok(Doctor {
            id: row.get(0)?,
            name: row.get(1)?,
            age: row.get(2)?,
            specialization: row.get(3)?,
            phone: row.get(4)?,
            notes: row.get(5)?,
        })
    }

    // ========== Patient Operations ==========

    /// Insert a patient and return the stored row
    pub fn insert_patient(&self, patient: &NewPatient) -> Result<Patient> {
        let conn = self.conn();
        let row = conn.query_row(
            r#"
            INSERT INTO patients (name, age, condition, phone, notes)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING id, name, age, condition, phone, notes
            "#,
            params![
                patient.name.trim(),
                patient.age,
                patient.condition.trim(),
                patient.phone.trim(),
                patient.notes,
            ],
            Self::row_to_patient,
        )?;
        Ok(row)
    }

    /// All patients in registration order
    pub fn list_patients(&self) -> Result<Vec<Patient>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, age, condition, phone, notes FROM patients ORDER BY id",
        )?;
        let patients = stmt
            .query_map([], Self::row_to_patient)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(patients)
    }

    fn row_to_patient(row: &rusqlite::Row) -> rusqlite::Result<Patient> {
        Ok(Patient {
            id: row.get(0)?,
            name: row.get(1)?,
            age: row.get(2)?,
            condition: row.get(3)?,
            phone: row.get(4)?,
            notes: row.get(5)?,
        })
    }

    // ========== Appointment Operations ==========

    /// Insert an appointment and return it joined with both names.
    ///
    /// The insert and the join run in one transaction keyed by the returned id.
    pub fn insert_appointment(&self, appointment: &NewAppointment) -> Result<Appointment> {
        let (date, time) = appointment.normalized()?;

        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let id: i64 = tx.query_row(
            r#"
            INSERT INTO appointments (doctor_id, patient_id, date, time, notes)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING id
            "#,
            params![
                appointment.doctor_id,
                appointment.patient_id,
                date,
                time,
                appointment.notes,
            ],
            |row| row.get(0),
        )?;
        let created = tx.query_row(
            &format!("{} WHERE a.id = ?1", APPOINTMENT_SELECT),
            [id],
            Self::row_to_appointment,
        )?;
        tx.commit()?;
        Ok(created)
    }

    /// Get an appointment by id
    pub fn get_appointment(&self, id: i64) -> Result<Option<Appointment>> {
        let conn = self.conn();
        conn.query_row(
            &format!("{} WHERE a.id = ?1", APPOINTMENT_SELECT),
            [id],
            Self::row_to_appointment,
        )
        .optional()
        .map_err(Into::into)
    }

    /// All appointments by date and time
    pub fn list_appointments(&self) -> Result<Vec<Appointment>> {
        self.appointments_between(
            DateRange {
                start: Bound::Unbounded,
                end: Bound::Unbounded,
            },
            SortOrder::Ascending,
        )
    }

    /// Appointments whose date falls inside `range`
    pub fn appointments_between(&self, range: DateRange, order: SortOrder) -> Result<Vec<Appointment>> {
        let (clause, values) = range.to_sql();
        let sql = format!("{} WHERE {} {}", APPOINTMENT_SELECT, clause, order.order_by());
        tracing::debug!(?range, ?order, "Listing appointments");

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let appointments = stmt
            .query_map(params_from_iter(values.iter()), Self::row_to_appointment)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(appointments)
    }

    /// Count all appointments
    pub fn count_appointments(&self) -> Result<usize> {
        let count: i64 = self.conn().query_row("SELECT COUNT(*) FROM appointments", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn row_to_appointment(row: &rusqlite::Row) -> rusqlite::Result<Appointment> {
        Ok(Appointment {
            id: row.get(0)?,
            doctor_id: row.get(1)?,
            patient_id: row.get(2)?,
            date: row.get(3)?,
            time: row.get(4)?,
            notes: row.get(5)?,
            doctor_name: row.get(6)?,
            patient_name: row.get(7)?,
        })
    }

    // ========== Raw Queries ==========

    /// Run one arbitrary statement with positional parameters.
    ///
    /// Failures carry SQLite's message verbatim; constraint failures keep
    /// their own variant.
    pub fn raw_query(&self, sql: &str, params: &[SqlValue]) -> Result<QueryRows> {
        if sql.trim().is_empty() {
            return Err(Error::Query("query is empty".to_string()));
        }
        tracing::debug!(sql, params = params.len(), "Running raw query");

        let conn = self.conn();
        let run = || -> rusqlite::Result<QueryRows> {
            let mut stmt = conn.prepare(sql)?;
            let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

            if columns.is_empty() {
                let affected = stmt.execute(params_from_iter(params.iter()))?;
                return Ok(QueryRows {
                    columns,
                    rows: Vec::new(),
                    affected,
                });
            }

            let width = columns.len();
            let mut rows = stmt.query(params_from_iter(params.iter()))?;
            let mut values = Vec::new();
            while let Some(row) = rows.next()? {
                let mut cells = Vec::with_capacity(width);
                for idx in 0..width {
                    cells.push(row.get::<_, SqlValue>(idx)?);
                }
                values.push(cells);
            }
            Ok(QueryRows {
                columns,
                rows: values,
                affected: 0,
            })
        };

        run().map_err(|e| match Error::from(e) {
            Error::Storage(inner) => Error::Query(inner.to_string()),
            other => other,
        })
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        let conn = self.conn();
        let count = |table: &str| -> Result<usize> {
            let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
            Ok(n as usize)
        };
        Ok(DbStats {
            doctors: count("doctors")?,
            patients: count("patients")?,
            appointments: count("appointments")?,
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DbStats {
    pub doctors: usize,
    pub patients: usize,
    pub appointments: usize,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Doctors: {}", self.doctors)?;
        writeln!(f, "  Patients: {}", self.patients)?;
        writeln!(f, "  Appointments: {}", self.appointments)
    }
}
