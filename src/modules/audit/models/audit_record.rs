use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a calculation audit row justifies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    /// Entry computed during generation
    Calculated,
    /// Entry recomputed after an irregular payment changed
    Recalculated,
    /// Entry locked when its run was processed
    Processed,
}

impl AuditEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Calculated => "calculated",
            Self::Recalculated => "recalculated",
            Self::Processed => "processed",
        }
    }
}

impl std::fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<String> for AuditEvent {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.as_str() {
            "calculated" => Ok(Self::Calculated),
            "recalculated" => Ok(Self::Recalculated),
            "processed" => Ok(Self::Processed),
            _ => Err(format!("Invalid audit event: {}", value)),
        }
    }
}

/// Append-only record of one entry calculation.
///
/// `checksum` is the hex SHA-256 of every other field, so a row edited
/// after the fact no longer verifies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    pub run_id: String,
    pub entry_id: String,
    pub employee_id: String,
    pub event: AuditEvent,
    pub tax_year_id: String,
    pub tax_year_version: String,
    /// Employee snapshot, additions and advances the entry was computed from
    pub inputs: Value,
    /// Calculation trace, resulting figures and warnings
    pub intermediates: Value,
    pub checksum: String,
    pub recorded_at: DateTime<Utc>,
}
