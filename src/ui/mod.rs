pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{banner, dim, error, event_line, header, info, muted, section, success, summary_row, warn};
pub use table::{TableBuilder, appointments_table, doctors_table, patients_table, query_table, stats_table};
pub use theme::{theme, Theme};
