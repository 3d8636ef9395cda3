pub struct Icons;

impl Icons {
    pub const HOSPITAL: &str = "🏥";
    pub const CHECK: &str = "✅";
    pub const CROSS: &str = "❌";
    pub const WARN: &str = "⚠️";
    pub const INFO: &str = "ℹ️";
    pub const STATS: &str = "📊";
    pub const DATABASE: &str = "🗄️";
    pub const DOCTOR: &str = "🩺";
    pub const PERSON: &str = "👤";
    pub const CALENDAR: &str = "📅";
    pub const EMPTY: &str = "∅";
}
