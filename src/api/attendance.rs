use crate::{
    api::cell::{fetch_cell, fetch_cell_members},
    auth::auth::AuthUser,
    model::attendance::{AttendanceRecord, AttendanceRow, AttendanceStatus},
    report::window::ReportWindow,
};
use actix_web::{HttpResponse, Responder, error::ErrorInternalServerError, web};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use std::collections::HashSet;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct AttendanceQuery {
    #[schema(example = 3)]
    pub cell_id: u64,
    /// Inclusive, `YYYY-MM-DD`
    #[schema(example = "2025-03-01")]
    pub start_date: String,
    /// Inclusive, `YYYY-MM-DD`
    #[schema(example = "2025-03-31")]
    pub end_date: String,
}

#[derive(Deserialize, ToSchema)]
pub struct RollEntry {
    #[schema(example = 7)]
    pub member_id: u64,
    #[schema(example = "present", value_type = String)]
    pub status: AttendanceStatus,
}

/// One Sunday's roll for a cell.
#[derive(Deserialize, ToSchema)]
pub struct SaveRoll {
    #[schema(example = 3)]
    pub cell_id: u64,
    #[schema(example = "2025-03-02", format = "date", value_type = String)]
    pub date: NaiveDate,
    pub entries: Vec<RollEntry>,
}

/// Why a roll was refused, before anything touches the database.
#[derive(Debug, PartialEq, Eq)]
pub enum RollRejection {
    NotSunday,
    Empty,
    DuplicateMember(u64),
    NotInCell(u64),
}

impl RollRejection {
    fn message(&self) -> String {
        match self {
            RollRejection::NotSunday => "Attendance is taken for Sundays only".to_string(),
            RollRejection::Empty => "No attendance entries supplied".to_string(),
            RollRejection::DuplicateMember(id) => format!("Member {id} appears more than once"),
            RollRejection::NotInCell(id) => format!("Member {id} is not in this cell"),
        }
    }
}

pub fn validate_roll(roll: &SaveRoll, cell_member_ids: &HashSet<u64>) -> Result<(), RollRejection> {
    if roll.date.weekday() != Weekday::Sun {
        return Err(RollRejection::NotSunday);
    }
    if roll.entries.is_empty() {
        return Err(RollRejection::Empty);
    }

    let mut seen = HashSet::with_capacity(roll.entries.len());
    for entry in &roll.entries {
        if !seen.insert(entry.member_id) {
            return Err(RollRejection::DuplicateMember(entry.member_id));
        }
        if !cell_member_ids.contains(&entry.member_id) {
            return Err(RollRejection::NotInCell(entry.member_id));
        }
    }
    Ok(())
}

pub async fn fetch_cell_attendance(
    pool: &MySqlPool,
    cell_id: u64,
    window: ReportWindow,
) -> Result<Vec<AttendanceRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AttendanceRow>(
        r#"
        SELECT a.member_id, a.date, a.status
        FROM attendance a
        JOIN members m ON m.id = a.member_id
        WHERE m.cell_id = ?
        AND a.date BETWEEN ? AND ?
        ORDER BY a.date, a.member_id
        "#,
    )
    .bind(cell_id)
    .bind(window.start_date)
    .bind(window.end_date)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(AttendanceRecord::from).collect())
}

/// Attendance in `window` of every member currently placed in a cell.
pub async fn fetch_assigned_attendance(
    pool: &MySqlPool,
    window: ReportWindow,
) -> Result<Vec<AttendanceRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AttendanceRow>(
        r#"
        SELECT a.member_id, a.date, a.status
        FROM attendance a
        JOIN members m ON m.id = a.member_id
        WHERE m.cell_id IS NOT NULL
        AND a.date BETWEEN ? AND ?
        "#,
    )
    .bind(window.start_date)
    .bind(window.end_date)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(AttendanceRecord::from).collect())
}

#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Attendance of the cell in the range", body = [AttendanceRecord]),
        (status = 400, description = "Malformed dates"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceQuery>,
) -> actix_web::Result<impl Responder> {
    let Some(window) = ReportWindow::from_raw(Some(&query.start_date), Some(&query.end_date)) else {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "start_date and end_date must be YYYY-MM-DD"
        })));
    };

    let records = fetch_cell_attendance(pool.get_ref(), query.cell_id, window)
        .await
        .map_err(|e| {
            error!(error = %e, cell_id = query.cell_id, "Failed to list attendance");
            ErrorInternalServerError("Database error")
        })?;

    Ok(HttpResponse::Ok().json(records))
}

#[utoipa::path(
    put,
    path = "/api/attendance",
    request_body = SaveRoll,
    responses(
        (status = 200, description = "Roll saved", body = Object, example = json!({
            "message": "Attendance saved", "saved": 8
        })),
        (status = 400, description = "Not a Sunday, duplicate or foreign member", body = Object, example = json!({
            "message": "Attendance is taken for Sundays only"
        })),
        (status = 403, description = "Not the leader of this cell"),
        (status = 404, description = "Cell not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn save_roll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<SaveRoll>,
) -> actix_web::Result<impl Responder> {
    auth.require_leader_or_admin()?;

    let cell_id = payload.cell_id;
    let db_error = |e: sqlx::Error| {
        error!(error = %e, cell_id, "Failed to save attendance");
        ErrorInternalServerError("Internal Server Error")
    };

    let Some(cell) = fetch_cell(pool.get_ref(), cell_id).await.map_err(db_error)? else {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Cell not found"
        })));
    };

    if !auth.can_manage_cell(cell.leader_member_id) {
        return Err(actix_web::error::ErrorForbidden("Not your cell"));
    }

    let member_ids: HashSet<u64> = fetch_cell_members(pool.get_ref(), cell_id)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(|m| m.id)
        .collect();

    if let Err(rejection) = validate_roll(&payload, &member_ids) {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": rejection.message()
        })));
    }

    let mut tx = pool.begin().await.map_err(db_error)?;
    for entry in &payload.entries {
        sqlx::query(
            r#"
            INSERT INTO attendance (member_id, date, status)
            VALUES (?, ?, ?)
            ON DUPLICATE KEY UPDATE status = VALUES(status)
            "#,
        )
        .bind(entry.member_id)
        .bind(payload.date)
        .bind(entry.status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
    }
    tx.commit().await.map_err(db_error)?;

    info!(cell_id, date = %payload.date, saved = payload.entries.len(), user_id = auth.user_id, "Attendance saved");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Attendance saved",
        "saved": payload.entries.len()
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roll(date: NaiveDate, entries: &[(u64, &str)]) -> SaveRoll {
        SaveRoll {
            cell_id: 1,
            date,
            entries: entries
                .iter()
                .map(|(member_id, status)| RollEntry {
                    member_id: *member_id,
                    status: status.to_string().into(),
                })
                .collect(),
        }
    }

    fn sunday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 2).unwrap()
    }

    #[test]
    fn accepts_a_full_sunday_roll() {
        let members = HashSet::from([1, 2, 3]);
        let roll = roll(sunday(), &[(1, "present"), (2, "absent"), (3, "unset")]);
        assert_eq!(validate_roll(&roll, &members), Ok(()));
    }

    #[test]
    fn rejects_weekdays() {
        let members = HashSet::from([1]);
        let monday = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        assert_eq!(
            validate_roll(&roll(monday, &[(1, "present")]), &members),
            Err(RollRejection::NotSunday)
        );
    }

    #[test]
    fn rejects_empty_duplicate_and_foreign_entries() {
        let members = HashSet::from([1, 2]);
        assert_eq!(validate_roll(&roll(sunday(), &[]), &members), Err(RollRejection::Empty));
        assert_eq!(
            validate_roll(&roll(sunday(), &[(1, "present"), (1, "absent")]), &members),
            Err(RollRejection::DuplicateMember(1))
        );
        assert_eq!(
            validate_roll(&roll(sunday(), &[(9, "present")]), &members),
            Err(RollRejection::NotInCell(9))
        );
        assert_eq!(
            RollRejection::NotInCell(9).message(),
            "Member 9 is not in this cell"
        );
    }

    #[test]
    fn roll_payload_deserializes() {
        let roll: SaveRoll = serde_json::from_value(json!({
            "cell_id": 3,
            "date": "2025-03-02",
            "entries": [{"member_id": 7, "status": "present"}]
        }))
        .unwrap();
        assert_eq!(roll.entries[0].status, AttendanceStatus::Present);
    }
}
