use crate::{OutputMode, Settings, emit_success};
use clinicsync::config::{self, ClinicConfig};
use clinicsync::events::{BroadcastHub, ClinicEvent, EventKind, MessageBus};
use clinicsync::ui::{self, Icons, banner, section, success, summary_row};
use clinicsync::{Dashboard, DashboardView, NewAppointment, NewDoctor, NewPatient, SqlConsole, SqlValue};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// How long the demo waits for the second tab to catch up
const DEMO_TIMEOUT: Duration = Duration::from_secs(2);

pub fn run_init(output_mode: OutputMode, settings: &Settings, force: bool) -> anyhow::Result<()> {
    let config = ClinicConfig {
        database: Some(settings.database.display().to_string()),
        channel: Some(settings.channel.clone()),
    };
    config::write_config(&settings.config_path, &config, force)?;
    config::ensure_db_dir(&settings.database)?;

    if output_mode.is_human() {
        success(&format!("Wrote {}", settings.config_path.display()));
        ui::info("Database", &settings.database.display().to_string());
        ui::info("Channel", &settings.channel);
    } else {
        emit_success(output_mode, "init", serde_json::to_value(&config)?)?;
    }
    Ok(())
}

/// Print every event this tab publishes, the way a subscribed view would see it
fn echo_events(bus: &Arc<dyn MessageBus>, output_mode: OutputMode) -> Vec<clinicsync::Subscription> {
    if !output_mode.is_human() {
        return Vec::new();
    }
    EventKind::ALL
        .iter()
        .map(|&kind| bus.subscribe(kind, Box::new(|event: &ClinicEvent| println!("{}", ui::event_line(event)))))
        .collect()
}

pub fn run_add_doctor(output_mode: OutputMode, settings: &Settings, input: NewDoctor) -> anyhow::Result<()> {
    let service = settings.open_service()?;
    let _echo = echo_events(service.bus(), output_mode);

    let doctor = service.add_doctor(&input)?;
    if output_mode.is_human() {
        success(&format!("Doctor registered with id {}", doctor.id));
    } else {
        emit_success(output_mode, "add-doctor", serde_json::to_value(&doctor)?)?;
    }
    Ok(())
}

pub fn run_add_patient(output_mode: OutputMode, settings: &Settings, input: NewPatient) -> anyhow::Result<()> {
    let service = settings.open_service()?;
    let _echo = echo_events(service.bus(), output_mode);

    let patient = service.add_patient(&input)?;
    if output_mode.is_human() {
        success(&format!("Patient registered with id {}", patient.id));
    } else {
        emit_success(output_mode, "add-patient", serde_json::to_value(&patient)?)?;
    }
    Ok(())
}

pub fn run_schedule(output_mode: OutputMode, settings: &Settings, input: NewAppointment) -> anyhow::Result<()> {
    let service = settings.open_service()?;
    let _echo = echo_events(service.bus(), output_mode);

    let appointment = match service.schedule_appointment(&input) {
        Ok(appointment) => appointment,
        Err(e) if e.is_constraint_violation() => {
            anyhow::bail!(
                "doctor {} or patient {} does not exist ({})",
                input.doctor_id,
                input.patient_id,
                e
            );
        }
        Err(e) => return Err(e.into()),
    };

    if output_mode.is_human() {
        success(&format!("Appointment scheduled with id {}", appointment.id));
    } else {
        emit_success(output_mode, "schedule", serde_json::to_value(&appointment)?)?;
    }
    Ok(())
}

pub fn run_doctors(output_mode: OutputMode, settings: &Settings) -> anyhow::Result<()> {
    let doctors = settings.open_service()?.get_doctors()?;
    if !output_mode.is_human() {
        return emit_success(output_mode, "doctors", serde_json::to_value(&doctors)?);
    }

    section(&format!("{} Doctors ({})", Icons::DOCTOR, doctors.len()));
    if doctors.is_empty() {
        println!("{} No doctors registered.", Icons::EMPTY);
    } else {
        println!("{}", ui::doctors_table(&doctors));
    }
    Ok(())
}

pub fn run_patients(output_mode: OutputMode, settings: &Settings) -> anyhow::Result<()> {
    let patients = settings.open_service()?.get_patients()?;
    if !output_mode.is_human() {
        return emit_success(output_mode, "patients", serde_json::to_value(&patients)?);
    }

    section(&format!("{} Patients ({})", Icons::PERSON, patients.len()));
    if patients.is_empty() {
        println!("{} No patients registered.", Icons::EMPTY);
    } else {
        println!("{}", ui::patients_table(&patients));
    }
    Ok(())
}

pub fn run_appointments(output_mode: OutputMode, settings: &Settings) -> anyhow::Result<()> {
    let appointments = settings.open_service()?.get_appointments()?;
    if !output_mode.is_human() {
        return emit_success(output_mode, "appointments", serde_json::to_value(&appointments)?);
    }

    section(&format!("{} Appointments ({})", Icons::CALENDAR, appointments.len()));
    if appointments.is_empty() {
        println!("{} No appointments scheduled.", Icons::EMPTY);
    } else {
        println!("{}", ui::appointments_table(&appointments));
    }
    Ok(())
}

pub fn run_dashboard(output_mode: OutputMode, settings: &Settings, view: &str) -> anyhow::Result<()> {
    let view: DashboardView = view.parse()?;
    let service = settings.open_service()?;
    let dashboard = Dashboard::load(&service)?;
    print_dashboard(output_mode, &dashboard, view)
}

fn print_dashboard(output_mode: OutputMode, dashboard: &Dashboard, view: DashboardView) -> anyhow::Result<()> {
    let rows = dashboard.view(view);
    if !output_mode.is_human() {
        let data = serde_json::json!({
            "doctors": dashboard.doctors.len(),
            "patients": dashboard.patients.len(),
            "appointments": dashboard.appointments_count,
            "upcoming_week": dashboard.upcoming_week.len(),
            "completed_last_month": dashboard.completed_last_month.len(),
            "view": format!("{:?}", view).to_lowercase(),
            "rows": rows,
        });
        return emit_success(output_mode, "dashboard", data);
    }

    section(&format!("{} Dashboard", Icons::STATS));
    println!(
        "{}",
        ui::stats_table(&[
            ("Doctors", &dashboard.doctors.len().to_string()),
            ("Patients", &dashboard.patients.len().to_string()),
            ("Appointments", &dashboard.appointments_count.to_string()),
            ("Next 7 days", &dashboard.upcoming_week.len().to_string()),
            ("Last month", &dashboard.completed_last_month.len().to_string()),
        ])
    );

    section(&format!("{} {:?}", Icons::CALENDAR, view));
    if rows.is_empty() {
        println!("{} No appointments in this view.", Icons::EMPTY);
    } else {
        println!("{}", ui::appointments_table(&rows));
    }
    Ok(())
}

pub fn run_stats(output_mode: OutputMode, settings: &Settings) -> anyhow::Result<()> {
    let stats = settings.open_service()?.stats()?;
    if !output_mode.is_human() {
        return emit_success(output_mode, "stats", serde_json::to_value(&stats)?);
    }

    ui::header("Clinic Statistics");
    summary_row(&format!("{} Database:", Icons::DATABASE), &settings.database.display().to_string());
    println!(
        "{}",
        ui::stats_table(&[
            ("Doctors", &stats.doctors.to_string()),
            ("Patients", &stats.patients.to_string()),
            ("Appointments", &stats.appointments.to_string()),
        ])
    );
    Ok(())
}

pub fn run_sql(output_mode: OutputMode, settings: &Settings, query: &str, params: &[String]) -> anyhow::Result<()> {
    let service = settings.open_service()?;
    let params: Vec<SqlValue> = params.iter().map(|p| SqlValue::parse_param(p)).collect();

    let mut console = SqlConsole::new();
    let rows = console.run(&service, query, &params)?;

    if !output_mode.is_human() {
        return emit_success(output_mode, "sql", serde_json::to_value(rows)?);
    }
    if rows.columns.is_empty() {
        success(&format!("{} row(s) affected", rows.affected));
    } else if rows.is_empty() {
        println!("{} No rows.", Icons::EMPTY);
    } else {
        println!("{}", ui::query_table(rows));
        println!("{}", ui::muted(&format!("{} row(s)", rows.len())));
    }
    if let Some(preview) = query.lines().next() {
        println!("{}", ui::dim(preview));
    }
    Ok(())
}

/// Two tabs on one database and one private channel. Tab A writes, tab B only
/// listens, and its dashboard is printed once the events have arrived.
pub fn run_demo(output_mode: OutputMode, settings: &Settings) -> anyhow::Result<()> {
    let hub = BroadcastHub::new();
    let tab_a = settings.open_tab(&hub)?;
    let tab_b = settings.open_tab(&hub)?;

    let dashboard = Arc::new(Mutex::new(Dashboard::default()));
    let _follow = Dashboard::follow(&dashboard, &tab_b);
    Dashboard::refresh(&dashboard, &tab_b)?;
    let baseline = dashboard.lock().map(|d| d.appointments_count).unwrap_or_default();
    let _echo = echo_events(tab_b.bus(), output_mode);

    if output_mode.is_human() {
        banner("Two-tab demo", "Tab A writes, tab B follows through the broadcast channel");
    }

    let doctor = tab_a.add_doctor(&NewDoctor {
        name: "Dr. A".to_string(),
        age: 40,
        specialization: "Cardiology".to_string(),
        phone: "1234567890".to_string(),
        notes: String::new(),
    })?;
    let patient = tab_a.add_patient(&NewPatient {
        name: "P1".to_string(),
        age: 30,
        condition: "Flu".to_string(),
        phone: "0987654321".to_string(),
        notes: String::new(),
    })?;
    tab_a.schedule_appointment(&NewAppointment {
        doctor_id: doctor.id,
        patient_id: patient.id,
        date: tab_a.today().format(clinicsync::model::DATE_FORMAT).to_string(),
        time: "09:00".to_string(),
        notes: "demo".to_string(),
    })?;

    let deadline = Instant::now() + DEMO_TIMEOUT;
    let synced = loop {
        let caught_up = dashboard
            .lock()
            .map(|d| d.appointments_count > baseline)
            .unwrap_or(false);
        if caught_up {
            break true;
        }
        if Instant::now() >= deadline {
            break false;
        }
        std::thread::sleep(Duration::from_millis(10));
    };
    if !synced {
        ui::warn("Tab B did not receive every event in time");
    }

    let snapshot = dashboard
        .lock()
        .map_err(|_| anyhow::anyhow!("dashboard lock poisoned"))?
        .clone();
    print_dashboard(output_mode, &snapshot, DashboardView::Today)
}
