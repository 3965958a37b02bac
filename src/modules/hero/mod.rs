use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path as AxumPath, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::web::{
    AppState,
    auth::require_admin,
    errors::{ApiError, ApiResult},
    responses::{json_ok, json_success},
    uploads::{FileFieldConfig, HERO_IMAGE_RULES, UploadOutcome, collect_upload_form},
};

// One slide image at the 5 MiB cap plus form-field slack.
const MAX_BODY_BYTES: usize = 6 * 1024 * 1024;

#[derive(Clone, Serialize, FromRow)]
pub struct HeroSlideRow {
    pub id: i64,
    pub title: String,
    pub subtitle: Option<String>,
    pub image_url: String,
    pub link_url: Option<String>,
    pub display_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/hero", get(list_slides))
        .route("/hero/create", post(create_slide))
        .route("/hero/update/:id", post(update_slide))
        .route("/hero/delete/:id", delete(delete_slide))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

const SLIDE_COLUMNS: &str =
    "id, title, subtitle, image_url, link_url, display_order, is_active, created_at, updated_at";

async fn list_slides(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let slides = sqlx::query_as::<_, HeroSlideRow>(&format!(
        "SELECT {SLIDE_COLUMNS} FROM hero_slides ORDER BY display_order, id"
    ))
    .fetch_all(state.pool_ref())
    .await?;
    Ok(json_success(slides))
}

async fn create_slide(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, &headers)?;

    let file_config = FileFieldConfig::new("image", HERO_IMAGE_RULES, 1).with_min_files(1);
    let upload = collect_upload_form(multipart, &[file_config])
        .await
        .map_err(|err| ApiError::Validation(err.message().to_string()))?;

    let fields = SlideFields::from_form(&upload);
    let Some(title) = fields.title.clone() else {
        return Err(ApiError::Validation("Title is required".into()));
    };

    let file = upload
        .files
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Validation("Slide image is required".into()))?;
    let image_url = state.blob().upload(file.bytes, &file.original_name).await?;

    let inserted = sqlx::query_as::<_, HeroSlideRow>(&format!(
        "INSERT INTO hero_slides (title, subtitle, image_url, link_url, display_order, is_active) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING {SLIDE_COLUMNS}"
    ))
    .bind(&title)
    .bind(&fields.subtitle)
    .bind(&image_url)
    .bind(&fields.link_url)
    .bind(fields.display_order.unwrap_or(0))
    .bind(fields.is_active.unwrap_or(true))
    .fetch_one(state.pool_ref())
    .await;

    match inserted {
        Ok(slide) => Ok((StatusCode::CREATED, json_success(slide))),
        Err(err) => {
            // The uploaded object has no row pointing at it.
            state.cleanup().enqueue(image_url);
            Err(err.into())
        }
    }
}

async fn update_slide(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<i64>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, &headers)?;

    let file_config = FileFieldConfig::new("image", HERO_IMAGE_RULES, 1);
    let upload = collect_upload_form(multipart, &[file_config])
        .await
        .map_err(|err| ApiError::Validation(err.message().to_string()))?;

    let fields = SlideFields::from_form(&upload);

    let previous_url: Option<String> =
        sqlx::query_scalar("SELECT image_url FROM hero_slides WHERE id = $1")
            .bind(id)
            .fetch_optional(state.pool_ref())
            .await?;
    if previous_url.is_none() {
        return Err(ApiError::NotFound("Hero slide not found".into()));
    }

    let mut replacement_url: Option<String> = None;
    if let Some(file) = upload.files.into_iter().next() {
        replacement_url = Some(state.blob().upload(file.bytes, &file.original_name).await?);
    }

    let updated = sqlx::query_as::<_, HeroSlideRow>(&format!(
        "UPDATE hero_slides SET \
         title = COALESCE($2, title), \
         subtitle = COALESCE($3, subtitle), \
         image_url = COALESCE($4, image_url), \
         link_url = COALESCE($5, link_url), \
         display_order = COALESCE($6, display_order), \
         is_active = COALESCE($7, is_active), \
         updated_at = NOW() \
         WHERE id = $1 RETURNING {SLIDE_COLUMNS}"
    ))
    .bind(id)
    .bind(&fields.title)
    .bind(&fields.subtitle)
    .bind(&replacement_url)
    .bind(&fields.link_url)
    .bind(fields.display_order)
    .bind(fields.is_active)
    .fetch_one(state.pool_ref())
    .await;

    match updated {
        Ok(slide) => {
            if replacement_url.is_some() {
                if let Some(old) = previous_url {
                    state.cleanup().enqueue(old);
                }
            }
            Ok(json_success(slide))
        }
        Err(err) => {
            if let Some(orphan) = replacement_url {
                state.cleanup().enqueue(orphan);
            }
            Err(err.into())
        }
    }
}

async fn delete_slide(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<i64>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, &headers)?;

    let image_url: Option<String> =
        sqlx::query_scalar("DELETE FROM hero_slides WHERE id = $1 RETURNING image_url")
            .bind(id)
            .fetch_optional(state.pool_ref())
            .await?;

    match image_url {
        Some(url) => {
            state.cleanup().enqueue(url);
            Ok(json_ok())
        }
        None => Err(ApiError::NotFound("Hero slide not found".into())),
    }
}

/// Sparse text fields for the slide forms; blank values never overwrite.
struct SlideFields {
    title: Option<String>,
    subtitle: Option<String>,
    link_url: Option<String>,
    display_order: Option<i32>,
    is_active: Option<bool>,
}

impl SlideFields {
    fn from_form(upload: &UploadOutcome) -> Self {
        Self {
            title: upload.trimmed_text("title").map(str::to_string),
            subtitle: upload.trimmed_text("subtitle").map(str::to_string),
            link_url: upload.trimmed_text("link_url").map(str::to_string),
            display_order: upload
                .trimmed_text("display_order")
                .and_then(|value| value.parse().ok()),
            is_active: upload
                .trimmed_text("is_active")
                .and_then(|value| value.parse().ok()),
        }
    }
}
