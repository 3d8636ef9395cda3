//! Database schema definitions

/// Connection settings applied to every new connection
pub const CONNECTION_PRAGMAS: &str = "
    PRAGMA foreign_keys=ON;
    PRAGMA journal_mode=WAL;
    PRAGMA synchronous=NORMAL;
";

/// SQL to create the doctors table
pub const CREATE_DOCTORS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS doctors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    age INTEGER NOT NULL,
    specialization TEXT NOT NULL,
    phone TEXT NOT NULL,
    notes TEXT NOT NULL DEFAULT ''
)
"#;

/// SQL to create the patients table
pub const CREATE_PATIENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS patients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    age INTEGER NOT NULL,
    condition TEXT NOT NULL,
    phone TEXT NOT NULL,
    notes TEXT NOT NULL DEFAULT ''
)
"#;

/// SQL to create the appointments table
/// Dates are `YYYY-MM-DD` and times `HH:MM`, so text order is chronological
pub const CREATE_APPOINTMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS appointments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    doctor_id INTEGER NOT NULL,
    patient_id INTEGER NOT NULL,
    date TEXT NOT NULL,
    time TEXT NOT NULL,
    notes TEXT NOT NULL DEFAULT '',
    FOREIGN KEY(doctor_id) REFERENCES doctors(id),
    FOREIGN KEY(patient_id) REFERENCES patients(id)
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_appointments_date ON appointments(date, time)",
    "CREATE INDEX IF NOT EXISTS idx_appointments_doctor ON appointments(doctor_id)",
    "CREATE INDEX IF NOT EXISTS idx_appointments_patient ON appointments(patient_id)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_DOCTORS_TABLE,
        CREATE_PATIENTS_TABLE,
        CREATE_APPOINTMENTS_TABLE,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
