use axum::{
    Json, Router,
    extract::{Path as AxumPath, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::web::{
    AppState,
    auth::require_admin,
    errors::{ApiError, ApiResult},
    responses::{json_ok, json_success},
};

#[derive(Clone, Serialize, FromRow)]
pub struct ServiceRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub display_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct ServiceForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub display_order: Option<i32>,
    pub is_active: Option<bool>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/services", get(list_services))
        .route("/services/create", post(create_service))
        .route("/services/update/:id", post(update_service))
        .route("/services/delete/:id", delete(delete_service))
}

const SERVICE_COLUMNS: &str =
    "id, title, description, icon, display_order, is_active, created_at, updated_at";

async fn list_services(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let services = sqlx::query_as::<_, ServiceRow>(&format!(
        "SELECT {SERVICE_COLUMNS} FROM services ORDER BY display_order, id"
    ))
    .fetch_all(state.pool_ref())
    .await?;
    Ok(json_success(services))
}

async fn create_service(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(form): Json<ServiceForm>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, &headers)?;

    let title = form
        .title
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::Validation("Title is required".into()))?;

    let service = sqlx::query_as::<_, ServiceRow>(&format!(
        "INSERT INTO services (title, description, icon, display_order, is_active) \
         VALUES ($1, $2, $3, $4, $5) RETURNING {SERVICE_COLUMNS}"
    ))
    .bind(title)
    .bind(&form.description)
    .bind(&form.icon)
    .bind(form.display_order.unwrap_or(0))
    .bind(form.is_active.unwrap_or(true))
    .fetch_one(state.pool_ref())
    .await?;

    Ok((StatusCode::CREATED, json_success(service)))
}

async fn update_service(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<i64>,
    Json(form): Json<ServiceForm>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, &headers)?;

    let title = form
        .title
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let service = sqlx::query_as::<_, ServiceRow>(&format!(
        "UPDATE services SET \
         title = COALESCE($2, title), \
         description = COALESCE($3, description), \
         icon = COALESCE($4, icon), \
         display_order = COALESCE($5, display_order), \
         is_active = COALESCE($6, is_active), \
         updated_at = NOW() \
         WHERE id = $1 RETURNING {SERVICE_COLUMNS}"
    ))
    .bind(id)
    .bind(title)
    .bind(&form.description)
    .bind(&form.icon)
    .bind(form.display_order)
    .bind(form.is_active)
    .fetch_optional(state.pool_ref())
    .await?
    .ok_or_else(|| ApiError::NotFound("Service not found".into()))?;

    Ok(json_success(service))
}

async fn delete_service(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<i64>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, &headers)?;

    let result = sqlx::query("DELETE FROM services WHERE id = $1")
        .bind(id)
        .execute(state.pool_ref())
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Service not found".into()));
    }

    Ok(json_ok())
}
