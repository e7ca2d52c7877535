use crate::{
    api::{
        attendance::{fetch_assigned_attendance, fetch_cell_attendance},
        cell::{fetch_cell, fetch_cell_members},
        member::{display_names, fetch_assigned_members},
        semester::load_semesters,
    },
    model::{
        attendance::{AttendanceRecord, AttendanceStatus},
        cell::Cell,
        member::Member,
    },
    report::{
        completeness::{count_incomplete_weeks, weekly_completeness},
        display_name::disambiguate_names,
        window::{ReportWindow, parse_local_date, resolve_report_window},
    },
    auth::auth::AuthUser,
    utils::semester_cache::SemesterCache,
};
use actix_web::{HttpResponse, Responder, error::ErrorInternalServerError, web};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use std::collections::HashMap;
use tracing::{debug, error, info};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct CompletenessQuery {
    #[schema(example = 3)]
    pub cell_id: u64,
    /// Inclusive; together with `end_date` overrides `semester_id`
    #[schema(example = "2025-03-01")]
    pub start_date: Option<String>,
    #[schema(example = "2025-06-30")]
    pub end_date: Option<String>,
    /// Semester to report on; the current one when nothing is given
    #[schema(example = 4)]
    pub semester_id: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MissingMember {
    #[schema(example = 12)]
    pub id: u64,
    #[schema(example = "Grace Kim (2)")]
    pub display_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WeekReport {
    #[schema(example = "2025-03-09", value_type = String, format = "date")]
    pub sunday: NaiveDate,
    #[schema(example = 8)]
    pub active_members: usize,
    #[schema(example = 7)]
    pub checked_members: usize,
    pub missing: Vec<MissingMember>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CompletenessReport {
    #[schema(example = 3, nullable = true)]
    pub cell_id: Option<u64>,
    #[schema(example = "2025-03-01", value_type = Option<String>, format = "date")]
    pub start_date: Option<NaiveDate>,
    #[schema(example = "2025-06-30", value_type = Option<String>, format = "date")]
    pub end_date: Option<NaiveDate>,
    #[schema(example = "2025-05-14", value_type = String, format = "date")]
    pub today: NaiveDate,
    /// Sundays up to today with at least one unchecked active member
    #[schema(example = 2)]
    pub incomplete_weeks: usize,
    pub weeks: Vec<WeekReport>,
}

fn semester_not_found(semester_id: u64) -> HttpResponse {
    info!(semester_id, "Report requested for unknown semester");
    HttpResponse::NotFound().json(json!({
        "message": "Semester not found"
    }))
}

pub fn build_report(
    cell_id: Option<u64>,
    members: &[Member],
    attendances: &[AttendanceRecord],
    window: Option<ReportWindow>,
    today: NaiveDate,
    names: &HashMap<u64, String>,
) -> CompletenessReport {
    let weeks: Vec<WeekReport> = weekly_completeness(members, attendances, window, today)
        .into_iter()
        .map(|week| WeekReport {
            sunday: week.sunday,
            active_members: week.active_members,
            checked_members: week.checked_members,
            missing: week
                .missing_member_ids
                .into_iter()
                .map(|id| MissingMember {
                    id,
                    display_name: names.get(&id).cloned().unwrap_or_else(|| format!("#{id}")),
                })
                .collect(),
        })
        .collect();

    CompletenessReport {
        cell_id,
        start_date: window.map(|w| w.start_date),
        end_date: window.map(|w| w.end_date),
        today,
        incomplete_weeks: weeks.iter().filter(|w| !w.missing.is_empty()).count(),
        weeks,
    }
}

#[utoipa::path(
    get,
    path = "/api/reports/completeness",
    params(CompletenessQuery),
    responses(
        (status = 200, description = "Missing check-ins per Sunday", body = CompletenessReport),
        (status = 404, description = "Cell or semester not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Report"
)]
pub async fn cell_completeness(
    pool: web::Data<MySqlPool>,
    cache: web::Data<SemesterCache>,
    query: web::Query<CompletenessQuery>,
) -> actix_web::Result<impl Responder> {
    let cell_id = query.cell_id;
    let today = Local::now().date_naive();
    let db_error = |e: sqlx::Error| {
        error!(error = %e, cell_id, "Failed to build completeness report");
        ErrorInternalServerError("Database error")
    };

    if fetch_cell(pool.get_ref(), cell_id).await.map_err(db_error)?.is_none() {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Cell not found"
        })));
    }

    let semesters = load_semesters(pool.get_ref(), cache.get_ref()).await?;
    let window = match resolve_report_window(
        query.start_date.as_deref(),
        query.end_date.as_deref(),
        query.semester_id,
        &semesters,
        today,
    ) {
        Ok(window) => window,
        Err(semester_id) => return Ok(semester_not_found(semester_id)),
    };

    let Some(range) = window else {
        debug!(cell_id, "No usable reporting window");
        return Ok(HttpResponse::Ok().json(build_report(
            Some(cell_id),
            &[],
            &[],
            None,
            today,
            &HashMap::new(),
        )));
    };

    let members = fetch_cell_members(pool.get_ref(), cell_id).await.map_err(db_error)?;
    let attendances = fetch_cell_attendance(pool.get_ref(), cell_id, range)
        .await
        .map_err(db_error)?;
    let names = display_names(pool.get_ref(), &members).await.map_err(db_error)?;

    let report = build_report(Some(cell_id), &members, &attendances, window, today, &names);
    debug!(
        cell_id,
        incomplete_weeks = report.incomplete_weeks,
        weeks = report.weeks.len(),
        "Completeness report built"
    );

    Ok(HttpResponse::Ok().json(report))
}

#[derive(Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct OverviewQuery {
    #[schema(example = "2025-03-01")]
    pub start_date: Option<String>,
    #[schema(example = "2025-06-30")]
    pub end_date: Option<String>,
    #[schema(example = 4)]
    pub semester_id: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CellCompleteness {
    #[schema(example = 3)]
    pub cell_id: u64,
    #[schema(example = "Joshua")]
    pub cell_name: String,
    #[schema(example = 12)]
    pub members: usize,
    #[schema(example = 2)]
    pub incomplete_weeks: usize,
}

/// Incomplete-week count of every cell, busiest gaps first.
pub fn cells_overview(
    cells: &[Cell],
    members: &[Member],
    attendances: &[AttendanceRecord],
    window: Option<ReportWindow>,
    today: NaiveDate,
) -> Vec<CellCompleteness> {
    let mut by_cell: HashMap<u64, Vec<Member>> = HashMap::new();
    for member in members {
        if let Some(cell_id) = member.cell_id {
            by_cell.entry(cell_id).or_default().push(member.clone());
        }
    }

    let mut overview: Vec<CellCompleteness> = cells
        .iter()
        .map(|cell| {
            let roster = by_cell.remove(&cell.id).unwrap_or_default();
            CellCompleteness {
                cell_id: cell.id,
                cell_name: cell.name.clone(),
                members: roster.len(),
                incomplete_weeks: count_incomplete_weeks(&roster, attendances, window, today),
            }
        })
        .collect();

    overview.sort_by(|a, b| {
        b.incomplete_weeks
            .cmp(&a.incomplete_weeks)
            .then_with(|| a.cell_name.cmp(&b.cell_name))
    });
    overview
}

#[utoipa::path(
    get,
    path = "/api/reports/cells",
    params(OverviewQuery),
    responses(
        (status = 200, description = "Incomplete weeks per cell", body = [CellCompleteness]),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Semester not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Report"
)]
pub async fn cells_completeness(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<SemesterCache>,
    query: web::Query<OverviewQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let today = Local::now().date_naive();
    let db_error = |e: sqlx::Error| {
        error!(error = %e, "Failed to build cell overview");
        ErrorInternalServerError("Database error")
    };

    let semesters = load_semesters(pool.get_ref(), cache.get_ref()).await?;
    let window = match resolve_report_window(
        query.start_date.as_deref(),
        query.end_date.as_deref(),
        query.semester_id,
        &semesters,
        today,
    ) {
        Ok(window) => window,
        Err(semester_id) => return Ok(semester_not_found(semester_id)),
    };

    let cells = sqlx::query_as::<_, Cell>("SELECT id, name, leader_member_id FROM cells ORDER BY name")
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_error)?;

    let (members, attendances) = match window {
        Some(range) => (
            fetch_assigned_members(pool.get_ref()).await.map_err(db_error)?,
            fetch_assigned_attendance(pool.get_ref(), range).await.map_err(db_error)?,
        ),
        None => (Vec::new(), Vec::new()),
    };

    Ok(HttpResponse::Ok().json(cells_overview(&cells, &members, &attendances, window, today)))
}

#[derive(Deserialize, ToSchema)]
pub struct RosterEntry {
    #[schema(example = 7)]
    pub id: u64,
    #[schema(example = "Grace Kim")]
    pub name: Option<String>,
    #[schema(example = "2025-03-10")]
    pub cell_assignment_date: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct RawAttendance {
    #[schema(example = 7)]
    pub member_id: u64,
    /// Date or date-time; only the calendar day is used
    #[schema(example = "2025-03-02T00:00:00+09:00")]
    pub date: String,
    #[schema(example = "present")]
    pub status: String,
}

/// Snapshot supplied by the caller instead of read from the database.
#[derive(Deserialize, ToSchema)]
pub struct EvaluateCompleteness {
    pub members: Vec<RosterEntry>,
    #[serde(default)]
    pub attendances: Vec<RawAttendance>,
    #[schema(example = "2025-03-01")]
    pub start_date: Option<String>,
    #[schema(example = "2025-06-30")]
    pub end_date: Option<String>,
    /// Overrides the server's date; mostly useful for replays
    #[schema(example = "2025-05-14")]
    pub today: Option<String>,
}

impl EvaluateCompleteness {
    /// Members whose assignment date cannot be read never count as active.
    fn roster(&self) -> Vec<Member> {
        self.members
            .iter()
            .filter_map(|entry| {
                let cell_assignment_date = match entry.cell_assignment_date.as_deref() {
                    None => None,
                    Some(raw) if raw.trim().is_empty() => None,
                    Some(raw) => Some(parse_local_date(raw)?),
                };
                Some(Member {
                    id: entry.id,
                    name: entry.name.clone().unwrap_or_else(|| format!("#{}", entry.id)),
                    phone: None,
                    birth_date: None,
                    cell_id: None,
                    cell_assignment_date,
                })
            })
            .collect()
    }

    /// Records with an unreadable date cannot match any Sunday and are dropped.
    fn records(&self) -> Vec<AttendanceRecord> {
        self.attendances
            .iter()
            .filter_map(|raw| {
                Some(AttendanceRecord {
                    member_id: raw.member_id,
                    date: parse_local_date(&raw.date)?,
                    status: AttendanceStatus::from(raw.status.clone()),
                })
            })
            .collect()
    }
}

#[utoipa::path(
    post,
    path = "/api/reports/completeness/evaluate",
    request_body = EvaluateCompleteness,
    responses(
        (status = 200, description = "Missing check-ins per Sunday", body = CompletenessReport)
    ),
    security(("bearer_auth" = [])),
    tag = "Report"
)]
pub async fn evaluate_completeness(
    payload: web::Json<EvaluateCompleteness>,
) -> actix_web::Result<impl Responder> {
    let today = payload
        .today
        .as_deref()
        .and_then(parse_local_date)
        .unwrap_or_else(|| Local::now().date_naive());

    let window = ReportWindow::from_raw(payload.start_date.as_deref(), payload.end_date.as_deref());

    let roster = payload.roster();
    let names = disambiguate_names(&roster, &HashMap::new());
    let report = build_report(None, &roster, &payload.records(), window, today, &names);

    Ok(HttpResponse::Ok().json(report))
}
