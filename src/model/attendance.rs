use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Roll-call status of one member on one Sunday.
///
/// Anything the database or a client sends that is not `present` or
/// `absent` is kept verbatim in `Other` (the roll sheet's "unset"
/// placeholder, legacy codes) and never counts as checked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Other(String),
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Other(raw) => raw,
        }
    }

    /// Present and absent both mean the leader took the roll.
    pub fn is_checked(&self) -> bool {
        matches!(self, AttendanceStatus::Present | AttendanceStatus::Absent)
    }
}

impl From<String> for AttendanceStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "present" => AttendanceStatus::Present,
            "absent" => AttendanceStatus::Absent,
            _ => AttendanceStatus::Other(raw),
        }
    }
}

impl From<AttendanceStatus> for String {
    fn from(status: AttendanceStatus) -> Self {
        status.as_str().to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttendanceRecord {
    #[schema(example = 7)]
    pub member_id: u64,
    #[schema(example = "2025-03-02", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "present", value_type = String)]
    pub status: AttendanceStatus,
}

/// Raw `attendance` row; `status` is free text in the table.
#[derive(Debug, sqlx::FromRow)]
pub struct AttendanceRow {
    pub member_id: u64,
    pub date: NaiveDate,
    pub status: String,
}

impl From<AttendanceRow> for AttendanceRecord {
    fn from(row: AttendanceRow) -> Self {
        AttendanceRecord {
            member_id: row.member_id,
            date: row.date,
            status: row.status.into(),
        }
    }
}
