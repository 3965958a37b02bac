use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path as AxumPath, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
};
use chrono::NaiveDate;
use sqlx::{Postgres, Transaction};
use tracing::warn;

use crate::web::{
    AppState,
    auth::require_admin,
    errors::{ApiError, ApiResult},
    responses::{json_ok, json_success},
    uploads::{FileFieldConfig, GALLERY_IMAGE_RULES, UploadOutcome, collect_upload_form},
};

mod data;

use data::ProjectView;

const MAX_IMAGES_PER_REQUEST: usize = 10;

// 10 files at the 10 MiB cap plus form-field slack.
const MAX_BODY_BYTES: usize = 105 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/gallery", get(list_projects))
        .route("/gallery/:id", get(get_project))
        .route("/gallery/create", post(create_project))
        .route("/gallery/update/:id", post(update_project))
        .route("/gallery/delete/:id", delete(delete_project))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

async fn list_projects(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let projects = data::fetch_projects(state.pool_ref()).await?;
    let images = data::fetch_all_images(state.pool_ref()).await?;
    Ok(json_success(data::group_images(projects, images)))
}

async fn get_project(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<i64>,
) -> ApiResult<impl IntoResponse> {
    Ok(json_success(load_project_view(&state, id).await?))
}

/// Create a project with its attached images, atomically: either every
/// uploaded file ends up as an image row pointing at a live blob, or the
/// transaction rolls back and the already-uploaded blobs are enqueued for
/// deletion.
async fn create_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, &headers)?;

    let file_config = FileFieldConfig::new("images", GALLERY_IMAGE_RULES, MAX_IMAGES_PER_REQUEST);
    let upload = collect_upload_form(multipart, &[file_config])
        .await
        .map_err(|err| ApiError::Validation(err.message().to_string()))?;

    let fields = ProjectFields::from_form(&upload);
    let Some(title) = fields.title.clone() else {
        return Err(ApiError::Validation("Title is required".into()));
    };

    let mut tx = state.pool_ref().begin().await?;

    let project_id: i64 = sqlx::query_scalar(
        "INSERT INTO gallery_projects \
         (title, subtitle, description, vehicle_type, service_type, duration, \
          completed_date, display_order, is_active) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING id",
    )
    .bind(&title)
    .bind(&fields.subtitle)
    .bind(&fields.description)
    .bind(&fields.vehicle_type)
    .bind(&fields.service_type)
    .bind(&fields.duration)
    .bind(fields.completed_date)
    .bind(fields.display_order.unwrap_or(0))
    .bind(fields.is_active.unwrap_or(true))
    .fetch_one(&mut *tx)
    .await?;

    let mut uploaded: Vec<String> = Vec::new();
    for (index, file) in upload.files.into_iter().enumerate() {
        let url = match state.blob().upload(file.bytes, &file.original_name).await {
            Ok(url) => url,
            Err(err) => {
                abort_with_compensation(&state, tx, uploaded).await;
                return Err(err.into());
            }
        };
        uploaded.push(url.clone());

        let inserted = sqlx::query(
            "INSERT INTO gallery_images (project_id, image_url, image_order, is_primary) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(project_id)
        .bind(&url)
        .bind(index as i32)
        .bind(index == 0)
        .execute(&mut *tx)
        .await;

        if let Err(err) = inserted {
            abort_with_compensation(&state, tx, uploaded).await;
            return Err(err.into());
        }
    }

    if let Err(err) = tx.commit().await {
        state.cleanup().enqueue_all(uploaded);
        return Err(err.into());
    }

    let view = load_project_view(&state, project_id).await?;
    Ok((StatusCode::CREATED, json_success(view)))
}

/// Partial update: only present, non-empty fields overwrite stored values.
/// Image removals and additions share the create path's atomicity — any
/// upload failure aborts the whole request.
async fn update_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<i64>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, &headers)?;

    let file_config =
        FileFieldConfig::new("newImages", GALLERY_IMAGE_RULES, MAX_IMAGES_PER_REQUEST);
    let upload = collect_upload_form(multipart, &[file_config])
        .await
        .map_err(|err| ApiError::Validation(err.message().to_string()))?;

    let fields = ProjectFields::from_form(&upload);
    let deleted_ids = parse_deleted_images(upload.first_text("deleted_images"));

    let mut tx = state.pool_ref().begin().await?;

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM gallery_projects WHERE id = $1)")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
    if !exists {
        return Err(ApiError::NotFound("Project not found".into()));
    }

    sqlx::query(
        "UPDATE gallery_projects SET \
         title = COALESCE($2, title), \
         subtitle = COALESCE($3, subtitle), \
         description = COALESCE($4, description), \
         vehicle_type = COALESCE($5, vehicle_type), \
         service_type = COALESCE($6, service_type), \
         duration = COALESCE($7, duration), \
         completed_date = COALESCE($8, completed_date), \
         display_order = COALESCE($9, display_order), \
         is_active = COALESCE($10, is_active), \
         updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(&fields.title)
    .bind(&fields.subtitle)
    .bind(&fields.description)
    .bind(&fields.vehicle_type)
    .bind(&fields.service_type)
    .bind(&fields.duration)
    .bind(fields.completed_date)
    .bind(fields.display_order)
    .bind(fields.is_active)
    .execute(&mut *tx)
    .await?;

    // Row deletes are scoped to the owning project so a stray id cannot
    // remove another project's image.
    let mut removed_urls: Vec<String> = Vec::new();
    if !deleted_ids.is_empty() {
        removed_urls = sqlx::query_scalar(
            "SELECT image_url FROM gallery_images WHERE project_id = $1 AND id = ANY($2)",
        )
        .bind(id)
        .bind(&deleted_ids)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM gallery_images WHERE project_id = $1 AND id = ANY($2)")
            .bind(id)
            .bind(&deleted_ids)
            .execute(&mut *tx)
            .await?;
    }

    let next_order: i32 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(image_order) + 1, 0) FROM gallery_images WHERE project_id = $1",
    )
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    let mut uploaded: Vec<String> = Vec::new();
    for (offset, file) in upload.files.into_iter().enumerate() {
        let url = match state.blob().upload(file.bytes, &file.original_name).await {
            Ok(url) => url,
            Err(err) => {
                abort_with_compensation(&state, tx, uploaded).await;
                return Err(err.into());
            }
        };
        uploaded.push(url.clone());

        let inserted = sqlx::query(
            "INSERT INTO gallery_images (project_id, image_url, image_order, is_primary) \
             VALUES ($1, $2, $3, FALSE)",
        )
        .bind(id)
        .bind(&url)
        .bind(next_order + offset as i32)
        .execute(&mut *tx)
        .await;

        if let Err(err) = inserted {
            abort_with_compensation(&state, tx, uploaded).await;
            return Err(err.into());
        }
    }

    if let Err(err) = tx.commit().await {
        state.cleanup().enqueue_all(uploaded);
        return Err(err.into());
    }

    // Blob objects for removed rows go away only after the row deletes are
    // durable.
    state.cleanup().enqueue_all(removed_urls);

    Ok(json_success(load_project_view(&state, id).await?))
}

async fn delete_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<i64>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, &headers)?;

    let mut tx = state.pool_ref().begin().await?;

    // Deleting the rows and capturing their URLs in one statement keeps
    // the enqueued set identical to the rows actually removed.
    let urls: Vec<String> = sqlx::query_scalar(
        "DELETE FROM gallery_images WHERE project_id = $1 RETURNING image_url",
    )
    .bind(id)
    .fetch_all(&mut *tx)
    .await?;

    let result = sqlx::query("DELETE FROM gallery_projects WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Project not found".into()));
    }

    tx.commit().await?;

    // Blobs go away only after the row deletes are durable.
    state.cleanup().enqueue_all(urls);

    Ok(json_ok())
}

async fn load_project_view(state: &AppState, id: i64) -> ApiResult<ProjectView> {
    let project = data::fetch_project(state.pool_ref(), id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".into()))?;
    let images = data::fetch_images(state.pool_ref(), id).await?;
    Ok(ProjectView { project, images })
}

/// Roll the transaction back and hand every blob uploaded so far to the
/// cleanup queue. Relational state is discarded; the objects would
/// otherwise be orphaned.
async fn abort_with_compensation(
    state: &AppState,
    tx: Transaction<'_, Postgres>,
    uploaded: Vec<String>,
) {
    if let Err(err) = tx.rollback().await {
        warn!(?err, "transaction rollback failed");
    }
    state.cleanup().enqueue_all(uploaded);
}

/// Sparse text fields shared by the create and update forms. `None` means
/// the field was absent or blank and must not overwrite a stored value.
struct ProjectFields {
    title: Option<String>,
    subtitle: Option<String>,
    description: Option<String>,
    vehicle_type: Option<String>,
    service_type: Option<String>,
    duration: Option<String>,
    completed_date: Option<NaiveDate>,
    display_order: Option<i32>,
    is_active: Option<bool>,
}

impl ProjectFields {
    fn from_form(upload: &UploadOutcome) -> Self {
        Self {
            title: upload.trimmed_text("title").map(str::to_string),
            subtitle: upload.trimmed_text("subtitle").map(str::to_string),
            description: upload.trimmed_text("description").map(str::to_string),
            vehicle_type: upload.trimmed_text("vehicle_type").map(str::to_string),
            service_type: upload.trimmed_text("service_type").map(str::to_string),
            duration: upload.trimmed_text("duration").map(str::to_string),
            completed_date: upload
                .trimmed_text("completed_date")
                .and_then(|value| NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()),
            display_order: upload
                .trimmed_text("display_order")
                .and_then(|value| value.parse().ok()),
            is_active: upload
                .trimmed_text("is_active")
                .and_then(|value| value.parse().ok()),
        }
    }
}

/// Parse the `deleted_images` JSON array tolerantly: entries that are not
/// integers (or integer strings) are dropped, never failing the request.
fn parse_deleted_images(raw: Option<&str>) -> Vec<i64> {
    let Some(raw) = raw else {
        return Vec::new();
    };

    let Ok(values) = serde_json::from_str::<Vec<serde_json::Value>>(raw) else {
        return Vec::new();
    };

    values
        .into_iter()
        .filter_map(|value| match value {
            serde_json::Value::Number(num) => num.as_i64(),
            serde_json::Value::String(text) => text.trim().parse().ok(),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn form(entries: &[(&str, &str)]) -> UploadOutcome {
        let mut text_fields: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in entries {
            text_fields
                .entry(name.to_string())
                .or_default()
                .push(value.to_string());
        }
        UploadOutcome {
            files: Vec::new(),
            text_fields,
        }
    }

    #[test]
    fn deleted_images_accepts_numbers_and_numeric_strings() {
        let ids = parse_deleted_images(Some(r#"[1, "2", 3]"#));
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn deleted_images_drops_junk_entries() {
        let ids = parse_deleted_images(Some(r#"[7, "abc", null, {"id": 9}, "8"]"#));
        assert_eq!(ids, vec![7, 8]);
    }

    #[test]
    fn deleted_images_tolerates_malformed_payloads() {
        assert!(parse_deleted_images(None).is_empty());
        assert!(parse_deleted_images(Some("not json")).is_empty());
        assert!(parse_deleted_images(Some(r#"{"id": 1}"#)).is_empty());
    }

    #[test]
    fn fields_treat_blank_values_as_absent() {
        let fields = ProjectFields::from_form(&form(&[
            ("title", "  Ceramic coating  "),
            ("subtitle", "   "),
            ("display_order", "3"),
        ]));
        assert_eq!(fields.title.as_deref(), Some("Ceramic coating"));
        assert!(fields.subtitle.is_none());
        assert_eq!(fields.display_order, Some(3));
    }

    #[test]
    fn display_order_parses_safely() {
        let fields = ProjectFields::from_form(&form(&[("display_order", "not-a-number")]));
        assert!(fields.display_order.is_none());
        assert_eq!(fields.display_order.unwrap_or(0), 0);
    }

    #[test]
    fn completed_date_parses_iso_format() {
        let fields = ProjectFields::from_form(&form(&[("completed_date", "2025-03-14")]));
        assert_eq!(
            fields.completed_date,
            NaiveDate::from_ymd_opt(2025, 3, 14)
        );

        let bad = ProjectFields::from_form(&form(&[("completed_date", "14/03/2025")]));
        assert!(bad.completed_date.is_none());
    }
}
