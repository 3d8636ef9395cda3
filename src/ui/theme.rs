use owo_colors::Style;
use std::sync::OnceLock;

use crate::events::EventKind;

static THEME: OnceLock<Theme> = OnceLock::new();

/// Terminal styles. Each entity kind gets its own colour so event lines,
/// section titles and tables read the same way.
#[derive(Debug, Clone)]
pub struct Theme {
    pub header: Style,
    pub ok: Style,
    pub failure: Style,
    pub caution: Style,
    pub label: Style,
    pub faint: Style,
    pub doctor: Style,
    pub patient: Style,
    pub appointment: Style,
}

impl Theme {
    /// Colors only on an interactive terminal that has not opted out
    pub fn detect() -> Self {
        if console::Term::stdout().is_term() && console::colors_enabled() {
            Self::colored()
        } else {
            Self::plain()
        }
    }

    pub fn colored() -> Self {
        Self {
            header: Style::new().blue().bold(),
            ok: Style::new().green().bold(),
            failure: Style::new().red().bold(),
            caution: Style::new().yellow().bold(),
            label: Style::new().bright_black(),
            faint: Style::new().dimmed(),
            doctor: Style::new().cyan(),
            patient: Style::new().magenta(),
            appointment: Style::new().bright_blue().italic(),
        }
    }

    pub fn plain() -> Self {
        Self {
            header: Style::new(),
            ok: Style::new(),
            failure: Style::new(),
            caution: Style::new(),
            label: Style::new(),
            faint: Style::new(),
            doctor: Style::new(),
            patient: Style::new(),
            appointment: Style::new(),
        }
    }

    /// Style for lines about `kind`
    pub fn event(&self, kind: EventKind) -> Style {
        match kind {
            EventKind::DoctorAdded => self.doctor.clone(),
            EventKind::PatientAdded => self.patient.clone(),
            EventKind::AppointmentScheduled => self.appointment.clone(),
        }
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use owo_colors::OwoColorize;

    #[test]
    fn test_plain_theme_emits_no_escapes() {
        let plain = Theme::plain();
        for kind in EventKind::ALL {
            assert_eq!("Dr. A".style(plain.event(kind)).to_string(), "Dr. A");
        }
    }

    #[test]
    fn test_each_kind_is_styled() {
        let colored = Theme::colored();
        for kind in EventKind::ALL {
            assert!("P1".style(colored.event(kind)).to_string().contains('\u{1b}'));
        }
    }
}
