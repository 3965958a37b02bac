use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};

#[derive(Clone, Serialize, FromRow)]
pub struct GalleryProjectRow {
    pub id: i64,
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub vehicle_type: Option<String>,
    pub service_type: Option<String>,
    pub duration: Option<String>,
    pub completed_date: Option<NaiveDate>,
    pub display_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Serialize, FromRow)]
pub struct GalleryImageRow {
    pub id: i64,
    pub project_id: i64,
    pub image_url: String,
    pub image_order: i32,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

/// Consolidated read model returned by every gallery endpoint.
#[derive(Clone, Serialize)]
pub struct ProjectView {
    #[serde(flatten)]
    pub project: GalleryProjectRow,
    pub images: Vec<GalleryImageRow>,
}

const PROJECT_COLUMNS: &str = "id, title, subtitle, description, vehicle_type, service_type, \
     duration, completed_date, display_order, is_active, created_at, updated_at";

pub async fn fetch_projects(pool: &PgPool) -> sqlx::Result<Vec<GalleryProjectRow>> {
    sqlx::query_as::<_, GalleryProjectRow>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM gallery_projects ORDER BY display_order, id"
    ))
    .fetch_all(pool)
    .await
}

pub async fn fetch_project(pool: &PgPool, id: i64) -> sqlx::Result<Option<GalleryProjectRow>> {
    sqlx::query_as::<_, GalleryProjectRow>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM gallery_projects WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Images for one project, always in `image_order` ascending.
pub async fn fetch_images(pool: &PgPool, project_id: i64) -> sqlx::Result<Vec<GalleryImageRow>> {
    sqlx::query_as::<_, GalleryImageRow>(
        "SELECT id, project_id, image_url, image_order, is_primary, created_at \
         FROM gallery_images WHERE project_id = $1 ORDER BY image_order, id",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await
}

pub async fn fetch_all_images(pool: &PgPool) -> sqlx::Result<Vec<GalleryImageRow>> {
    sqlx::query_as::<_, GalleryImageRow>(
        "SELECT id, project_id, image_url, image_order, is_primary, created_at \
         FROM gallery_images ORDER BY project_id, image_order, id",
    )
    .fetch_all(pool)
    .await
}

/// Join projects with their images in memory, preserving project order and
/// per-project image order.
pub fn group_images(
    projects: Vec<GalleryProjectRow>,
    images: Vec<GalleryImageRow>,
) -> Vec<ProjectView> {
    let mut by_project: std::collections::HashMap<i64, Vec<GalleryImageRow>> =
        std::collections::HashMap::new();
    for image in images {
        by_project.entry(image.project_id).or_default().push(image);
    }

    projects
        .into_iter()
        .map(|project| {
            let images = by_project.remove(&project.id).unwrap_or_default();
            ProjectView { project, images }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(id: i64) -> GalleryProjectRow {
        GalleryProjectRow {
            id,
            title: format!("Project {id}"),
            subtitle: None,
            description: None,
            vehicle_type: None,
            service_type: None,
            duration: None,
            completed_date: None,
            display_order: 0,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn image(id: i64, project_id: i64, order: i32) -> GalleryImageRow {
        GalleryImageRow {
            id,
            project_id,
            image_url: format!("https://blob.example.test/{id}.jpg"),
            image_order: order,
            is_primary: order == 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn grouping_preserves_orders() {
        let projects = vec![project(2), project(1)];
        let images = vec![image(10, 1, 0), image(11, 2, 0), image(12, 2, 1)];

        let views = group_images(projects, images);
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].project.id, 2);
        assert_eq!(views[0].images.len(), 2);
        assert!(views[0].images.windows(2).all(|w| w[0].image_order <= w[1].image_order));
        assert_eq!(views[1].images.len(), 1);
    }

    #[test]
    fn project_without_images_gets_empty_list() {
        let views = group_images(vec![project(5)], Vec::new());
        assert!(views[0].images.is_empty());
    }

    // Deleting the primary image never promotes another one; a project
    // whose remaining images are all non-primary is a valid state and is
    // served as-is.
    #[test]
    fn project_with_no_primary_image_is_served_unchanged() {
        let images = vec![
            GalleryImageRow {
                is_primary: false,
                ..image(20, 3, 1)
            },
            GalleryImageRow {
                is_primary: false,
                ..image(21, 3, 2)
            },
        ];

        let views = group_images(vec![project(3)], images);
        assert_eq!(views[0].images.len(), 2);
        assert!(views[0].images.iter().all(|img| !img.is_primary));
        assert!(views[0].images.windows(2).all(|w| w[0].image_order <= w[1].image_order));
    }
}
