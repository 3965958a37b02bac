use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::web::{
    AppState, auth::require_admin, errors::ApiResult, responses::json_success,
};

#[derive(Clone, Serialize, FromRow)]
pub struct ContactRow {
    pub id: i64,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub opening_hours: Option<String>,
    pub facebook_url: Option<String>,
    pub instagram_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct ContactForm {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub opening_hours: Option<String>,
    pub facebook_url: Option<String>,
    pub instagram_url: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/contact", get(get_contact))
        .route("/contact/update", post(update_contact))
}

const CONTACT_COLUMNS: &str =
    "id, phone, email, address, opening_hours, facebook_url, instagram_url, updated_at";

async fn get_contact(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let contact = sqlx::query_as::<_, ContactRow>(&format!(
        "SELECT {CONTACT_COLUMNS} FROM contact_info ORDER BY id LIMIT 1"
    ))
    .fetch_optional(state.pool_ref())
    .await?;
    Ok(json_success(contact))
}

async fn update_contact(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(form): Json<ContactForm>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, &headers)?;

    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM contact_info ORDER BY id LIMIT 1")
        .fetch_optional(state.pool_ref())
        .await?;

    let contact = match existing {
        Some(id) => {
            sqlx::query_as::<_, ContactRow>(&format!(
                "UPDATE contact_info SET \
                 phone = COALESCE($2, phone), \
                 email = COALESCE($3, email), \
                 address = COALESCE($4, address), \
                 opening_hours = COALESCE($5, opening_hours), \
                 facebook_url = COALESCE($6, facebook_url), \
                 instagram_url = COALESCE($7, instagram_url), \
                 updated_at = NOW() \
                 WHERE id = $1 RETURNING {CONTACT_COLUMNS}"
            ))
            .bind(id)
            .bind(&form.phone)
            .bind(&form.email)
            .bind(&form.address)
            .bind(&form.opening_hours)
            .bind(&form.facebook_url)
            .bind(&form.instagram_url)
            .fetch_one(state.pool_ref())
            .await?
        }
        None => {
            sqlx::query_as::<_, ContactRow>(&format!(
                "INSERT INTO contact_info \
                 (phone, email, address, opening_hours, facebook_url, instagram_url) \
                 VALUES ($1, $2, $3, $4, $5, $6) RETURNING {CONTACT_COLUMNS}"
            ))
            .bind(&form.phone)
            .bind(&form.email)
            .bind(&form.address)
            .bind(&form.opening_hours)
            .bind(&form.facebook_url)
            .bind(&form.instagram_url)
            .fetch_one(state.pool_ref())
            .await?
        }
    };

    Ok(json_success(contact))
}
