use tabled::{builder::Builder, settings::Style, Table, Tabled};

use crate::model::{Appointment, Doctor, Patient};
use crate::storage::QueryRows;

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

pub fn stats_table(stats: &[(&str, &str)]) -> String {
    let mut builder = TableBuilder::new();
    for (label, value) in stats {
        builder.add_row(label, value);
    }
    builder.build()
}

fn grid(header: &[&str], rows: impl IntoIterator<Item = Vec<String>>) -> String {
    let mut builder = Builder::default();
    builder.push_record(header.iter().copied());
    for row in rows {
        builder.push_record(row);
    }
    builder.build().with(Style::rounded()).to_string()
}

pub fn doctors_table(doctors: &[Doctor]) -> String {
    grid(
        &["ID", "Name", "Age", "Specialization", "Phone", "Notes"],
        doctors.iter().map(|d| {
            vec![
                d.id.to_string(),
                d.name.clone(),
                d.age.to_string(),
                d.specialization.clone(),
                d.phone.clone(),
                d.notes.clone(),
            ]
        }),
    )
}

pub fn patients_table(patients: &[Patient]) -> String {
    grid(
        &["ID", "Name", "Age", "Condition", "Phone", "Notes"],
        patients.iter().map(|p| {
            vec![
                p.id.to_string(),
                p.name.clone(),
                p.age.to_string(),
                p.condition.clone(),
                p.phone.clone(),
                p.notes.clone(),
            ]
        }),
    )
}

pub fn appointments_table(appointments: &[Appointment]) -> String {
    grid(
        &["ID", "Date", "Time", "Doctor", "Patient", "Notes"],
        appointments.iter().map(|a| {
            vec![
                a.id.to_string(),
                a.date.clone(),
                a.time.clone(),
                a.doctor_name.clone(),
                a.patient_name.clone(),
                a.notes.clone(),
            ]
        }),
    )
}

/// Raw query rows; each header carries the column name, cells their value
pub fn query_table(result: &QueryRows) -> String {
    let header: Vec<&str> = result.columns.iter().map(String::as_str).collect();
    grid(
        &header,
        result
            .rows
            .iter()
            .map(|row| row.iter().map(ToString::to_string).collect()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqlValue;

    #[test]
    fn test_query_table_renders_cells() {
        let rows = QueryRows {
            columns: vec!["id".into(), "name".into()],
            rows: vec![vec![SqlValue::Integer(1), SqlValue::Null]],
            affected: 0,
        };
        let rendered = query_table(&rows);
        assert!(rendered.contains("name"));
        assert!(rendered.contains("NULL"));
    }

    #[test]
    fn test_empty_stats_table() {
        assert!(stats_table(&[]).is_empty());
        assert!(stats_table(&[("Doctors", "2")]).contains("Doctors"));
    }
}
