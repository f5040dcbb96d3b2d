//! Equipment log line parser.
//!
//! Each line carries exactly seven comma-separated fields in the order
//! `serial,line,partNumber,process,equipment,status,timestamp`. There is no
//! header row and no quoting. Lines that fail any rule are dropped and logged
//! at debug level; parsing never fails upward.

use chrono::NaiveDateTime;

use crate::record::{EventRecord, EventStatus};

/// Layout of the timestamp field, e.g. `03/14/2025 08:15:42`.
pub const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// Number of fields on every log line.
pub const FIELD_COUNT: usize = 7;

/// Why a line was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    FieldCount,
    EmptySerial,
    WrongLine,
    EmptyPartNumber,
    EmptyProcess,
    EmptyEquipment,
    UnknownStatus,
    BadTimestamp,
}

impl DiscardReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FieldCount => "wrong field count",
            Self::EmptySerial => "empty serial",
            Self::WrongLine => "line does not match",
            Self::EmptyPartNumber => "empty part number",
            Self::EmptyProcess => "empty process",
            Self::EmptyEquipment => "empty equipment",
            Self::UnknownStatus => "unrecognized status",
            Self::BadTimestamp => "unparsable timestamp",
        }
    }
}

/// Validate one raw line against the configured line id.
pub fn try_parse_line(raw: &str, line_id: &str) -> Result<EventRecord, DiscardReason> {
    let fields: Vec<&str> = raw.split(',').map(str::trim).collect();
    if fields.len() != FIELD_COUNT {
        return Err(DiscardReason::FieldCount);
    }

    let [serial, line, part_number, process, equipment, status, timestamp] = [
        fields[0], fields[1], fields[2], fields[3], fields[4], fields[5], fields[6],
    ];

    if serial.is_empty() {
        return Err(DiscardReason::EmptySerial);
    }
    if line != line_id {
        return Err(DiscardReason::WrongLine);
    }
    if part_number.is_empty() {
        return Err(DiscardReason::EmptyPartNumber);
    }
    if process.is_empty() {
        return Err(DiscardReason::EmptyProcess);
    }
    if equipment.is_empty() {
        return Err(DiscardReason::EmptyEquipment);
    }
    let status = EventStatus::from_literal(status).ok_or(DiscardReason::UnknownStatus)?;
    let timestamp = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
        .map_err(|_| DiscardReason::BadTimestamp)?;

    Ok(EventRecord {
        serial: serial.to_string(),
        line: line.to_string(),
        part_number: part_number.to_string(),
        process: process.to_string(),
        equipment: equipment.to_string(),
        status,
        timestamp,
    })
}

/// Parse one line, returning `None` (and logging) when it is discarded.
pub fn parse_line(raw: &str, line_id: &str) -> Option<EventRecord> {
    match try_parse_line(raw, line_id) {
        Ok(record) => Some(record),
        Err(reason) => {
            tracing::debug!(reason = reason.as_str(), raw, "Discarding log line");
            None
        }
    }
}

/// Parse a whole log body. Blank lines are skipped silently.
pub fn parse_batch(text: &str, line_id: &str) -> Vec<EventRecord> {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| parse_line(l, line_id))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
