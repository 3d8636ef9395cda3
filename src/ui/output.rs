use crate::events::ClinicEvent;
use crate::ui::{theme, Icons};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::HOSPITAL, text.style(theme().header.clone()));
}

pub fn banner(title: &str, subtitle: &str) {
    println!();
    println!("{} {}", Icons::HOSPITAL, title.style(theme().header.clone()));
    println!("   {}", subtitle.style(theme().faint.clone()));
    println!();
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().ok.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().failure.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().caution.clone()));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().label.clone()),
        label.style(theme().faint.clone()),
        value
    );
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().header.clone()));
}

pub fn dim(text: &str) -> String {
    text.style(theme().faint.clone()).to_string()
}

pub fn muted(text: &str) -> String {
    text.style(theme().label.clone()).to_string()
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", label.style(theme().faint.clone()), value);
}

/// One line describing a received event
pub fn event_line(event: &ClinicEvent) -> String {
    let (icon, detail) = match event {
        ClinicEvent::DoctorAdded(d) => (Icons::DOCTOR, format!("#{} {} ({})", d.id, d.name, d.specialization)),
        ClinicEvent::PatientAdded(p) => (Icons::PERSON, format!("#{} {} ({})", p.id, p.name, p.condition)),
        ClinicEvent::AppointmentScheduled(a) => (
            Icons::CALENDAR,
            format!("#{} {} with {} on {} {}", a.id, a.patient_name, a.doctor_name, a.date, a.time),
        ),
    };
    format!(
        "{} {} {}",
        icon,
        event.kind().to_string().style(theme().event(event.kind())),
        detail
    )
}
