use crate::{
    api::cell::{fetch_cell, fetch_cell_names},
    auth::auth::AuthUser,
    model::member::Member,
    report::display_name::disambiguate_names,
    utils::db_utils::{ColumnKind, build_update_sql, execute_update},
};
use actix_web::{HttpResponse, Responder, error::ErrorInternalServerError, web};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, error, info};
use utoipa::{IntoParams, ToSchema};

/// Columns a partial member update may touch. Cell moves go through
/// `assign_cell` so the assignment date stays consistent.
const UPDATABLE_COLUMNS: &[(&str, ColumnKind)] = &[
    ("name", ColumnKind::RequiredText),
    ("phone", ColumnKind::Text),
    ("birth_date", ColumnKind::Date),
];

#[derive(Serialize, ToSchema)]
pub struct MemberView {
    #[serde(flatten)]
    pub member: Member,
    /// Name with a suffix when another member shares it
    #[schema(example = "Grace Kim (Joshua)")]
    pub display_name: String,
}

impl MemberView {
    pub fn new(names: &mut HashMap<u64, String>, member: Member) -> Self {
        let display_name = names
            .remove(&member.id)
            .unwrap_or_else(|| member.name.trim().to_string());
        MemberView {
            member,
            display_name,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateMember {
    #[schema(example = "Grace Kim")]
    pub name: String,
    #[schema(example = "+82-10-1234-5678")]
    pub phone: Option<String>,
    #[schema(example = "1992-05-17", format = "date", value_type = Option<String>)]
    pub birth_date: Option<NaiveDate>,
    #[schema(example = 3)]
    pub cell_id: Option<u64>,
    /// Defaults to today when `cell_id` is given
    #[schema(example = "2025-03-02", format = "date", value_type = Option<String>)]
    pub cell_assignment_date: Option<NaiveDate>,
}

/// Documents the accepted keys; the handler reads the raw JSON object so
/// `null` can clear a column.
#[derive(Deserialize, ToSchema)]
pub struct UpdateMember {
    pub name: Option<String>,
    pub phone: Option<String>,
    #[schema(example = "1992-05-17", format = "date", value_type = Option<String>)]
    pub birth_date: Option<NaiveDate>,
}

#[derive(Deserialize, ToSchema)]
pub struct AssignCell {
    /// `null` removes the member from their cell
    #[schema(example = 3)]
    pub cell_id: Option<u64>,
    #[schema(example = "2025-03-02", format = "date", value_type = Option<String>)]
    pub assignment_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct MemberQuery {
    /// Page number, starting at 1
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub cell_id: Option<u64>,
    /// Substring of the name or phone number
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct MemberListResponse {
    pub data: Vec<MemberView>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 57)]
    pub total: i64,
}

enum FilterValue {
    U64(u64),
    Str(String),
}

const MEMBER_COLUMNS: &str = "id, name, phone, birth_date, cell_id, cell_assignment_date";

pub async fn fetch_member(pool: &MySqlPool, member_id: u64) -> Result<Option<Member>, sqlx::Error> {
    sqlx::query_as::<_, Member>(&format!("SELECT {MEMBER_COLUMNS} FROM members WHERE id = ?"))
        .bind(member_id)
        .fetch_optional(pool)
        .await
}

/// Every member currently placed in a cell.
pub async fn fetch_assigned_members(pool: &MySqlPool) -> Result<Vec<Member>, sqlx::Error> {
    sqlx::query_as::<_, Member>(&format!(
        "SELECT {MEMBER_COLUMNS} FROM members WHERE cell_id IS NOT NULL"
    ))
    .fetch_all(pool)
    .await
}

/// Row offset of a 1-based page; `page` is never 0 here.
fn page_offset(page: u32, per_page: u32) -> u64 {
    u64::from(page.saturating_sub(1)) * u64::from(per_page)
}

/// Every member sharing a trimmed name with someone in `members`, whatever
/// their cell or page.
pub async fn fetch_namesakes(
    pool: &MySqlPool,
    members: &[Member],
) -> Result<Vec<Member>, sqlx::Error> {
    let names: BTreeSet<&str> = members.iter().map(|m| m.name.trim()).collect();
    if names.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; names.len()].join(", ");
    let sql = format!("SELECT {MEMBER_COLUMNS} FROM members WHERE TRIM(name) IN ({placeholders})");

    let mut query = sqlx::query_as::<_, Member>(&sql);
    for name in names {
        query = query.bind(name);
    }
    query.fetch_all(pool).await
}

/// Display names for `members`, numbered against all of their namesakes so
/// a label does not depend on the page or filter it was listed under.
pub fn labels_for(
    members: &[Member],
    namesakes: &[Member],
    cell_names: &HashMap<u64, String>,
) -> HashMap<u64, String> {
    let everyone: Vec<Member> = namesakes.iter().chain(members).cloned().collect();
    let mut names = disambiguate_names(&everyone, cell_names);
    names.retain(|id, _| members.iter().any(|m| m.id == *id));
    names
}

pub async fn display_names(
    pool: &MySqlPool,
    members: &[Member],
) -> Result<HashMap<u64, String>, sqlx::Error> {
    let namesakes = fetch_namesakes(pool, members).await?;
    let cell_names = fetch_cell_names(pool).await?;
    Ok(labels_for(members, &namesakes, &cell_names))
}

#[utoipa::path(
    get,
    path = "/api/members",
    params(MemberQuery),
    responses(
        (status = 200, description = "Paginated member list", body = MemberListResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Member"
)]
pub async fn list_members(
    pool: web::Data<MySqlPool>,
    query: web::Query<MemberQuery>,
) -> actix_web::Result<impl Responder> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = page_offset(page, per_page);

    let mut conditions = Vec::new();
    let mut bindings = Vec::new();

    if let Some(cell_id) = query.cell_id {
        conditions.push("cell_id = ?");
        bindings.push(FilterValue::U64(cell_id));
    }

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        conditions.push("(name LIKE ? OR phone LIKE ?)");
        let like = format!("%{}%", search);
        bindings.push(FilterValue::Str(like.clone()));
        bindings.push(FilterValue::Str(like));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM members {}", where_clause);
    debug!(sql = %count_sql, "Counting members");

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = match b {
            FilterValue::U64(v) => count_query.bind(*v),
            FilterValue::Str(v) => count_query.bind(v.as_str()),
        };
    }

    let total = count_query.fetch_one(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, sql = %count_sql, "Failed to count members");
        ErrorInternalServerError("Database error")
    })?;

    let data_sql = format!(
        "SELECT {MEMBER_COLUMNS} FROM members {} ORDER BY name, id LIMIT ? OFFSET ?",
        where_clause
    );
    debug!(sql = %data_sql, page, per_page, offset, "Fetching members");

    let mut data_query = sqlx::query_as::<_, Member>(&data_sql);
    for b in &bindings {
        data_query = match b {
            FilterValue::U64(v) => data_query.bind(*v),
            FilterValue::Str(v) => data_query.bind(v.as_str()),
        };
    }
    data_query = data_query.bind(per_page).bind(offset);

    let members = data_query.fetch_all(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, sql = %data_sql, "Failed to fetch members");
        ErrorInternalServerError("Database error")
    })?;

    let mut names = display_names(pool.get_ref(), &members).await.map_err(|e| {
        error!(error = %e, "Failed to label members");
        ErrorInternalServerError("Database error")
    })?;

    Ok(HttpResponse::Ok().json(MemberListResponse {
        data: members
            .into_iter()
            .map(|member| MemberView::new(&mut names, member))
            .collect(),
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/members/{member_id}",
    params(
        ("member_id" = u64, Path, description = "Member ID")
    ),
    responses(
        (status = 200, description = "Member found", body = Member),
        (status = 404, description = "Member not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Member"
)]
pub async fn get_member(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let member_id = path.into_inner();

    let member = fetch_member(pool.get_ref(), member_id).await.map_err(|e| {
        error!(error = %e, member_id, "Failed to fetch member");
        ErrorInternalServerError("Internal Server Error")
    })?;

    match member {
        Some(member) => Ok(HttpResponse::Ok().json(member)),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "Member not found"
        }))),
    }
}

#[utoipa::path(
    post,
    path = "/api/members",
    request_body = CreateMember,
    responses(
        (status = 201, description = "Member created", body = Object, example = json!({
            "message": "Member created", "id": 42
        })),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Member"
)]
pub async fn create_member(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateMember>,
) -> actix_web::Result<impl Responder> {
    auth.require_leader_or_admin()?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Name must not be empty"
        })));
    }

    let assignment_date = match payload.cell_id {
        Some(cell_id) => {
            let cell = fetch_cell(pool.get_ref(), cell_id).await.map_err(|e| {
                error!(error = %e, cell_id, "Failed to fetch cell");
                ErrorInternalServerError("Internal Server Error")
            })?;
            match cell {
                Some(cell) if auth.can_manage_cell(cell.leader_member_id) => {}
                Some(_) => return Err(actix_web::error::ErrorForbidden("Not your cell")),
                None => {
                    return Ok(HttpResponse::BadRequest().json(json!({
                        "message": "Unknown cell"
                    })));
                }
            }
            Some(
                payload
                    .cell_assignment_date
                    .unwrap_or_else(|| Local::now().date_naive()),
            )
        }
        None => None,
    };

    let result = sqlx::query(
        r#"
        INSERT INTO members (name, phone, birth_date, cell_id, cell_assignment_date)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(name)
    .bind(payload.phone.as_deref().map(str::trim))
    .bind(payload.birth_date)
    .bind(payload.cell_id)
    .bind(assignment_date)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to create member");
        ErrorInternalServerError("Internal Server Error")
    })?;

    info!(member_id = result.last_insert_id(), cell_id = ?payload.cell_id, "Member created");

    Ok(HttpResponse::Created().json(json!({
        "message": "Member created",
        "id": result.last_insert_id()
    })))
}

#[utoipa::path(
    put,
    path = "/api/members/{member_id}",
    params(
        ("member_id" = u64, Path, description = "Member ID")
    ),
    request_body = UpdateMember,
    responses(
        (status = 200, description = "Member updated"),
        (status = 400, description = "Field not updatable or invalid value"),
        (status = 404, description = "Member not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Member"
)]
pub async fn update_member(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let member_id = path.into_inner();
    let update = build_update_sql("members", UPDATABLE_COLUMNS, &body, "id", member_id)?;

    let affected = execute_update(pool.get_ref(), update).await.map_err(|e| {
        error!(error = %e, member_id, "Failed to update member");
        ErrorInternalServerError("Internal Server Error")
    })?;

    if affected == 0 {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Member not found"
        })));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Member updated successfully"
    })))
}

#[utoipa::path(
    put,
    path = "/api/members/{member_id}/cell",
    params(
        ("member_id" = u64, Path, description = "Member ID")
    ),
    request_body = AssignCell,
    responses(
        (status = 200, description = "Cell assignment changed"),
        (status = 400, description = "Unknown cell"),
        (status = 404, description = "Member not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Member"
)]
pub async fn assign_cell(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<AssignCell>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let member_id = path.into_inner();

    let assignment_date = match payload.cell_id {
        Some(cell_id) => {
            let exists = fetch_cell(pool.get_ref(), cell_id)
                .await
                .map_err(|e| {
                    error!(error = %e, cell_id, "Failed to fetch cell");
                    ErrorInternalServerError("Internal Server Error")
                })?
                .is_some();
            if !exists {
                return Ok(HttpResponse::BadRequest().json(json!({
                    "message": "Unknown cell"
                })));
            }
            Some(
                payload
                    .assignment_date
                    .unwrap_or_else(|| Local::now().date_naive()),
            )
        }
        None => None,
    };

    let result = sqlx::query("UPDATE members SET cell_id = ?, cell_assignment_date = ? WHERE id = ?")
        .bind(payload.cell_id)
        .bind(assignment_date)
        .bind(member_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, member_id, "Failed to assign cell");
            ErrorInternalServerError("Internal Server Error")
        })?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Member not found"
        })));
    }

    info!(member_id, cell_id = ?payload.cell_id, "Cell assignment changed");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Cell assignment updated",
        "cell_assignment_date": assignment_date
    })))
}

#[utoipa::path(
    delete,
    path = "/api/members/{member_id}",
    params(
        ("member_id" = u64, Path, description = "Member ID")
    ),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 404, description = "Member not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Member"
)]
pub async fn delete_member(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let member_id = path.into_inner();

    let result = sqlx::query("DELETE FROM members WHERE id = ?")
        .bind(member_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, member_id, "Failed to delete member");
            ErrorInternalServerError("Internal Server Error")
        })?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Member not found"
        })));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Successfully deleted"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_flattens_member_and_uses_display_name() {
        let member = Member {
            id: 4,
            name: "Grace Kim".into(),
            phone: None,
            birth_date: None,
            cell_id: Some(1),
            cell_assignment_date: NaiveDate::from_ymd_opt(2025, 3, 2),
        };
        let mut names = HashMap::from([(4, "Grace Kim (1)".to_string())]);

        let view = serde_json::to_value(MemberView::new(&mut names, member)).unwrap();
        assert_eq!(view["id"], 4);
        assert_eq!(view["display_name"], "Grace Kim (1)");
        assert_eq!(view["cell_assignment_date"], "2025-03-02");
    }

    #[test]
    fn view_falls_back_to_trimmed_name() {
        let member = Member {
            id: 5,
            name: " Ruth ".into(),
            phone: None,
            birth_date: None,
            cell_id: None,
            cell_assignment_date: None,
        };
        let view = MemberView::new(&mut HashMap::new(), member);
        assert_eq!(view.display_name, "Ruth");
    }

    fn grace(id: u64, cell_id: Option<u64>) -> Member {
        Member {
            id,
            name: "Grace Kim".into(),
            phone: None,
            birth_date: None,
            cell_id,
            cell_assignment_date: None,
        }
    }

    #[test]
    fn offset_of_last_possible_page_does_not_overflow() {
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(3, 20), 40);
        assert_eq!(page_offset(u32::MAX, 100), (u64::from(u32::MAX) - 1) * 100);
    }

    #[test]
    fn labels_count_namesakes_on_other_pages() {
        let namesakes = vec![grace(4, Some(1)), grace(9, Some(1))];

        // page 1 holds member 4, page 2 holds member 9
        let first = labels_for(&[grace(4, Some(1))], &namesakes, &HashMap::new());
        let second = labels_for(&[grace(9, Some(1))], &namesakes, &HashMap::new());

        assert_eq!(first, HashMap::from([(4, "Grace Kim (1)".to_string())]));
        assert_eq!(second, HashMap::from([(9, "Grace Kim (2)".to_string())]));
    }

    #[test]
    fn labels_count_namesakes_hidden_by_a_filter() {
        let cells = HashMap::from([(1, "Joshua".to_string()), (2, "Caleb".to_string())]);
        let namesakes = vec![grace(4, Some(1)), grace(9, Some(2))];

        let labels = labels_for(&[grace(9, Some(2))], &namesakes, &cells);
        assert_eq!(labels[&9], "Grace Kim (Caleb)");
        assert_eq!(labels.len(), 1);
    }
}
