use crate::{
    auth::auth::AuthUser,
    model::semester::{Semester, current_semester},
    utils::semester_cache::SemesterCache,
};
use actix_web::{HttpResponse, Responder, error::ErrorInternalServerError, web};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateSemester {
    #[schema(example = "2025 Spring")]
    pub name: String,
    #[schema(example = "2025-03-02", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2025-06-29", format = "date", value_type = String)]
    pub end_date: NaiveDate,
}

pub async fn load_semesters(
    pool: &MySqlPool,
    cache: &SemesterCache,
) -> actix_web::Result<Arc<Vec<Semester>>> {
    cache.get_or_load(pool).await.map_err(|e| {
        error!(error = %e, "Failed to load semesters");
        ErrorInternalServerError("Database error")
    })
}

#[utoipa::path(
    get,
    path = "/api/semesters",
    responses(
        (status = 200, description = "All semesters by start date", body = [Semester])
    ),
    security(("bearer_auth" = [])),
    tag = "Semester"
)]
pub async fn list_semesters(
    pool: web::Data<MySqlPool>,
    cache: web::Data<SemesterCache>,
) -> actix_web::Result<impl Responder> {
    let semesters = load_semesters(pool.get_ref(), cache.get_ref()).await?;
    Ok(HttpResponse::Ok().json(semesters.as_slice()))
}

#[utoipa::path(
    get,
    path = "/api/semesters/current",
    responses(
        (status = 200, description = "Semester containing today", body = Semester),
        (status = 404, description = "Today is outside every semester")
    ),
    security(("bearer_auth" = [])),
    tag = "Semester"
)]
pub async fn get_current_semester(
    pool: web::Data<MySqlPool>,
    cache: web::Data<SemesterCache>,
) -> actix_web::Result<impl Responder> {
    let semesters = load_semesters(pool.get_ref(), cache.get_ref()).await?;

    match current_semester(&semesters, Local::now().date_naive()) {
        Some(semester) => Ok(HttpResponse::Ok().json(semester)),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "No semester covers today"
        }))),
    }
}

#[utoipa::path(
    post,
    path = "/api/semesters",
    request_body = CreateSemester,
    responses(
        (status = 201, description = "Semester created", body = Object, example = json!({
            "message": "Semester created", "id": 5
        })),
        (status = 400, description = "start_date after end_date"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Semester"
)]
pub async fn create_semester(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<SemesterCache>,
    payload: web::Json<CreateSemester>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Semester name must not be empty"
        })));
    }

    if payload.start_date > payload.end_date {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "start_date cannot be after end_date"
        })));
    }

    let result = sqlx::query("INSERT INTO semesters (name, start_date, end_date) VALUES (?, ?, ?)")
        .bind(name)
        .bind(payload.start_date)
        .bind(payload.end_date)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create semester");
            ErrorInternalServerError("Internal Server Error")
        })?;

    cache.invalidate().await;
    info!(semester_id = result.last_insert_id(), name, "Semester created");

    Ok(HttpResponse::Created().json(json!({
        "message": "Semester created",
        "id": result.last_insert_id()
    })))
}
