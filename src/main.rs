//! Clinicsync CLI - register doctors and patients, schedule appointments

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use clinicsync::config;
use clinicsync::events::{BroadcastHub, ChannelBus};
use clinicsync::storage::{LazyStore, StoreLocation};
use clinicsync::ClinicService;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "clinicsync")]
#[command(version)]
#[command(about = "Local clinic registry - doctors, patients and appointments")]
#[command(long_about = r#"
Clinicsync keeps a clinic's doctors, patients and appointments in a local
SQLite database and announces every new row on a broadcast channel.

Example usage:
  clinicsync add-doctor --name "Dr. A" --age 40 --specialization Cardiology --phone 1234567890
  clinicsync add-patient --name P1 --age 30 --condition Flu --phone 0987654321
  clinicsync schedule --doctor-id 1 --patient-id 1 --date 2024-06-01 --time 09:00
  clinicsync dashboard --view week
  clinicsync sql "SELECT * FROM doctors WHERE age > ?1" --param 35
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the database file (overrides the config)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a clinic.toml with the default settings
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Register a doctor
    AddDoctor {
        #[arg(long)]
        name: String,
        #[arg(long)]
        age: u32,
        #[arg(long)]
        specialization: String,
        /// Ten digit phone number
        #[arg(long)]
        phone: String,
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Register a patient
    AddPatient {
        #[arg(long)]
        name: String,
        #[arg(long)]
        age: u32,
        /// Medical condition
        #[arg(long)]
        condition: String,
        /// Ten digit phone number
        #[arg(long)]
        phone: String,
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Schedule an appointment
    Schedule {
        #[arg(long)]
        doctor_id: i64,
        #[arg(long)]
        patient_id: i64,
        /// Date as YYYY-MM-DD
        #[arg(long)]
        date: String,
        /// Time as HH:MM
        #[arg(long)]
        time: String,
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// List registered doctors
    Doctors,

    /// List registered patients
    Patients,

    /// List all appointments
    Appointments,

    /// Show dashboard summaries
    Dashboard {
        /// today, week or month
        #[arg(long, default_value = "today")]
        view: String,
    },

    /// Show row counts
    Stats,

    /// Run a raw SQL statement
    Sql {
        /// The statement to run
        query: String,

        /// Positional parameter, repeatable (?1, ?2, ...)
        #[arg(short, long = "param")]
        params: Vec<String>,
    },

    /// Open two tabs on the database, write through one and watch the other follow
    Demo,
}

/// How results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn is_human(&self) -> bool {
        matches!(self, OutputMode::Human)
    }
}

/// Print a JSON success envelope for `command`
pub fn emit_success(output_mode: OutputMode, command: &str, data: serde_json::Value) -> anyhow::Result<()> {
    if output_mode == OutputMode::Json {
        let envelope = serde_json::json!({
            "ok": true,
            "command": command,
            "data": data,
        });
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    }
    Ok(())
}

/// Resolved settings for one invocation
pub struct Settings {
    pub config_path: PathBuf,
    pub database: PathBuf,
    pub channel: String,
}

impl Settings {
    /// Open this process's tab: a store handle plus a bus on the process hub
    pub fn open_service(&self) -> anyhow::Result<ClinicService> {
        self.open_tab(BroadcastHub::global())
    }

    pub fn open_tab(&self, hub: &BroadcastHub) -> anyhow::Result<ClinicService> {
        config::ensure_db_dir(&self.database)?;
        let bus = ChannelBus::open(hub, &self.channel)?;
        let store = LazyStore::new(StoreLocation::File(self.database.clone()));
        Ok(ClinicService::new(store, Arc::new(bus)))
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let output_mode = if cli.json { OutputMode::Json } else { OutputMode::Human };

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let file_config = config::load_config(Some(&config_path))?.unwrap_or_default();
    let base = std::env::current_dir()?;
    let settings = Settings {
        database: cli.database.clone().unwrap_or_else(|| file_config.database_path(&base)),
        channel: file_config.channel_name().to_string(),
        config_path,
    };
    tracing::debug!(database = %settings.database.display(), channel = %settings.channel, "Settings resolved");

    let result = match cli.command {
        Commands::Init { force } => commands::run_init(output_mode, &settings, force),
        Commands::AddDoctor { name, age, specialization, phone, notes } => commands::run_add_doctor(
            output_mode,
            &settings,
            clinicsync::NewDoctor { name, age, specialization, phone, notes },
        ),
        Commands::AddPatient { name, age, condition, phone, notes } => commands::run_add_patient(
            output_mode,
            &settings,
            clinicsync::NewPatient { name, age, condition, phone, notes },
        ),
        Commands::Schedule { doctor_id, patient_id, date, time, notes } => commands::run_schedule(
            output_mode,
            &settings,
            clinicsync::NewAppointment { doctor_id, patient_id, date, time, notes },
        ),
        Commands::Doctors => commands::run_doctors(output_mode, &settings),
        Commands::Patients => commands::run_patients(output_mode, &settings),
        Commands::Appointments => commands::run_appointments(output_mode, &settings),
        Commands::Dashboard { view } => commands::run_dashboard(output_mode, &settings, &view),
        Commands::Stats => commands::run_stats(output_mode, &settings),
        Commands::Sql { query, params } => commands::run_sql(output_mode, &settings, &query, &params),
        Commands::Demo => commands::run_demo(output_mode, &settings),
    };

    if let Err(e) = &result {
        if output_mode.is_human() {
            clinicsync::ui::error(&e.to_string());
        } else {
            let envelope = serde_json::json!({ "ok": false, "error": e.to_string() });
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }
        std::process::exit(1);
    }

    Ok(())
}
