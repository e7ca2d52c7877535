use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::semester::{Semester, current_semester};

/// Reads the local calendar day out of a date or date-time string.
///
/// Only the leading `YYYY-MM-DD` is used; a time of day or a UTC offset
/// after it is dropped without any conversion, so `2025-03-02T23:30:00-08:00`
/// is still the 2nd.
pub fn parse_local_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let day = raw.get(..10)?;
    if raw.len() > 10 && !raw[10..].starts_with(['T', 't', ' ']) {
        return None;
    }
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Inclusive reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReportWindow {
    #[schema(example = "2025-03-02", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2025-06-29", value_type = String, format = "date")]
    pub end_date: NaiveDate,
}

impl ReportWindow {
    /// Window from optional raw bounds. Either bound missing or malformed
    /// means there is nothing to report.
    pub fn from_raw(start: Option<&str>, end: Option<&str>) -> Option<Self> {
        Some(ReportWindow {
            start_date: parse_local_date(start?)?,
            end_date: parse_local_date(end?)?,
        })
    }

    /// Explicit bounds take precedence over the semester's range.
    pub fn resolve(
        start: Option<&str>,
        end: Option<&str>,
        semester: Option<&Semester>,
    ) -> Option<Self> {
        if start.is_some() || end.is_some() {
            return Self::from_raw(start, end);
        }
        semester.map(|s| ReportWindow {
            start_date: s.start_date,
            end_date: s.end_date,
        })
    }
}

/// Window of a report request: explicit dates, else the semester named by
/// `semester_id`, else the semester containing `today`.
///
/// `Err` carries a `semester_id` that matches no semester. It is only
/// looked up when no explicit date was given.
pub fn resolve_report_window(
    start: Option<&str>,
    end: Option<&str>,
    semester_id: Option<u64>,
    semesters: &[Semester],
    today: NaiveDate,
) -> Result<Option<ReportWindow>, u64> {
    if start.is_some() || end.is_some() {
        return Ok(ReportWindow::from_raw(start, end));
    }

    let semester = match semester_id {
        Some(id) => Some(semesters.iter().find(|s| s.id == id).ok_or(id)?),
        None => current_semester(semesters, today),
    };
    Ok(ReportWindow::resolve(None, None, semester))
}
