/// Wall-clock time as reported by the equipment logs (no zone information).
pub type EventTime = chrono::NaiveDateTime;

/// All server-generated timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
