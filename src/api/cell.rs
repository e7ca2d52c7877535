use crate::{
    auth::auth::AuthUser,
    db::{is_duplicate_key, is_missing_reference},
    model::{cell::Cell, member::Member},
};
use actix_web::{HttpResponse, Responder, error::ErrorInternalServerError, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use std::collections::HashMap;
use tracing::error;
use utoipa::ToSchema;

use super::member::{MemberView, display_names};

#[derive(Deserialize, ToSchema)]
pub struct CreateCell {
    #[schema(example = "Joshua")]
    pub name: String,
    #[schema(example = 12, nullable = true)]
    pub leader_member_id: Option<u64>,
}

pub async fn fetch_cell(pool: &MySqlPool, cell_id: u64) -> Result<Option<Cell>, sqlx::Error> {
    sqlx::query_as::<_, Cell>("SELECT id, name, leader_member_id FROM cells WHERE id = ?")
        .bind(cell_id)
        .fetch_optional(pool)
        .await
}

pub async fn fetch_cell_names(pool: &MySqlPool) -> Result<HashMap<u64, String>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (u64, String)>("SELECT id, name FROM cells")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().collect())
}

pub async fn fetch_cell_members(pool: &MySqlPool, cell_id: u64) -> Result<Vec<Member>, sqlx::Error> {
    sqlx::query_as::<_, Member>(
        r#"
        SELECT id, name, phone, birth_date, cell_id, cell_assignment_date
        FROM members
        WHERE cell_id = ?
        ORDER BY name, id
        "#,
    )
    .bind(cell_id)
    .fetch_all(pool)
    .await
}

#[utoipa::path(
    get,
    path = "/api/cells",
    responses(
        (status = 200, description = "All cells", body = [Cell]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Cell"
)]
pub async fn list_cells(pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let cells = sqlx::query_as::<_, Cell>("SELECT id, name, leader_member_id FROM cells ORDER BY name")
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to list cells");
            ErrorInternalServerError("Database error")
        })?;

    Ok(HttpResponse::Ok().json(cells))
}

#[utoipa::path(
    post,
    path = "/api/cells",
    request_body = CreateCell,
    responses(
        (status = 201, description = "Cell created", body = Object, example = json!({
            "message": "Cell created", "id": 3
        })),
        (status = 400, description = "Name missing or already used, or unknown leader"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Cell"
)]
pub async fn create_cell(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateCell>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Cell name must not be empty"
        })));
    }

    let result = sqlx::query("INSERT INTO cells (name, leader_member_id) VALUES (?, ?)")
        .bind(name)
        .bind(payload.leader_member_id)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(res) => Ok(HttpResponse::Created().json(json!({
            "message": "Cell created",
            "id": res.last_insert_id()
        }))),
        Err(e) if is_duplicate_key(&e) => Ok(HttpResponse::BadRequest().json(json!({
            "message": "A cell with this name already exists"
        }))),
        Err(e) if is_missing_reference(&e) => Ok(HttpResponse::BadRequest().json(json!({
            "message": format!("Unknown leader_member_id {}", payload.leader_member_id.unwrap_or_default())
        }))),
        Err(e) => {
            error!(error = %e, "Failed to create cell");
            Err(ErrorInternalServerError("Internal Server Error"))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/cells/{cell_id}/members",
    params(
        ("cell_id" = u64, Path, description = "Cell ID")
    ),
    responses(
        (status = 200, description = "Roster of the cell", body = [MemberView]),
        (status = 404, description = "Cell not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Cell"
)]
pub async fn cell_members(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let cell_id = path.into_inner();

    let db_error = |e: sqlx::Error| {
        error!(error = %e, cell_id, "Failed to load cell roster");
        ErrorInternalServerError("Database error")
    };

    if fetch_cell(pool.get_ref(), cell_id).await.map_err(db_error)?.is_none() {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Cell not found"
        })));
    }

    let members = fetch_cell_members(pool.get_ref(), cell_id).await.map_err(db_error)?;
    let mut names = display_names(pool.get_ref(), &members).await.map_err(db_error)?;

    let roster: Vec<MemberView> = members
        .into_iter()
        .map(|member| MemberView::new(&mut names, member))
        .collect();

    Ok(HttpResponse::Ok().json(roster))
}
