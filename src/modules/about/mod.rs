use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::web::{
    AppState,
    auth::require_admin,
    errors::{ApiError, ApiResult},
    responses::json_success,
    uploads::{FileFieldConfig, HERO_IMAGE_RULES, collect_upload_form},
};

const MAX_BODY_BYTES: usize = 6 * 1024 * 1024;

#[derive(Clone, Serialize, FromRow)]
pub struct AboutRow {
    pub id: i64,
    pub heading: String,
    pub body: String,
    pub image_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/about", get(get_about))
        .route("/about/update", post(update_about))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

const ABOUT_COLUMNS: &str = "id, heading, body, image_url, updated_at";

async fn get_about(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let about = sqlx::query_as::<_, AboutRow>(&format!(
        "SELECT {ABOUT_COLUMNS} FROM about_content ORDER BY id LIMIT 1"
    ))
    .fetch_optional(state.pool_ref())
    .await?;
    Ok(json_success(about))
}

/// Upsert the single about row. A fresh site has no row yet; the first
/// update creates it.
async fn update_about(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, &headers)?;

    let file_config = FileFieldConfig::new("image", HERO_IMAGE_RULES, 1);
    let upload = collect_upload_form(multipart, &[file_config])
        .await
        .map_err(|err| ApiError::Validation(err.message().to_string()))?;

    let heading = upload.trimmed_text("heading").map(str::to_string);
    let body = upload.trimmed_text("body").map(str::to_string);

    let previous: Option<(i64, Option<String>)> =
        sqlx::query_as("SELECT id, image_url FROM about_content ORDER BY id LIMIT 1")
            .fetch_optional(state.pool_ref())
            .await?;

    let mut replacement_url: Option<String> = None;
    if let Some(file) = upload.files.into_iter().next() {
        replacement_url = Some(state.blob().upload(file.bytes, &file.original_name).await?);
    }

    let saved = match previous {
        Some((id, old_url)) => {
            let result = sqlx::query_as::<_, AboutRow>(&format!(
                "UPDATE about_content SET \
                 heading = COALESCE($2, heading), \
                 body = COALESCE($3, body), \
                 image_url = COALESCE($4, image_url), \
                 updated_at = NOW() \
                 WHERE id = $1 RETURNING {ABOUT_COLUMNS}"
            ))
            .bind(id)
            .bind(&heading)
            .bind(&body)
            .bind(&replacement_url)
            .fetch_one(state.pool_ref())
            .await;

            match result {
                Ok(row) => {
                    if replacement_url.is_some() {
                        if let Some(old) = old_url {
                            state.cleanup().enqueue(old);
                        }
                    }
                    row
                }
                Err(err) => {
                    if let Some(orphan) = replacement_url {
                        state.cleanup().enqueue(orphan);
                    }
                    return Err(err.into());
                }
            }
        }
        None => {
            let heading = heading
                .ok_or_else(|| ApiError::Validation("Heading is required".into()))?;
            let body = body.ok_or_else(|| ApiError::Validation("Body is required".into()))?;

            let result = sqlx::query_as::<_, AboutRow>(&format!(
                "INSERT INTO about_content (heading, body, image_url) \
                 VALUES ($1, $2, $3) RETURNING {ABOUT_COLUMNS}"
            ))
            .bind(&heading)
            .bind(&body)
            .bind(&replacement_url)
            .fetch_one(state.pool_ref())
            .await;

            match result {
                Ok(row) => row,
                Err(err) => {
                    if let Some(orphan) = replacement_url {
                        state.cleanup().enqueue(orphan);
                    }
                    return Err(err.into());
                }
            }
        }
    };

    Ok(json_success(saved))
}
