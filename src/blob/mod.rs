use std::path::Path;

use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use uuid::Uuid;

use crate::config::AppConfig;

/// Errors surfaced by the blob storage adapter.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("blob storage credential is not configured")]
    MissingCredential,

    #[error("refusing to upload an empty payload")]
    EmptyPayload,

    #[error("blob upload failed: {0}")]
    UploadFailed(String),

    #[error("blob delete failed: {0}")]
    DeleteFailed(String),

    #[error("blob storage request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Deserialize)]
struct PutBlobResponse {
    url: String,
}

/// HTTP client for the external blob store. Uploads return the public URL
/// of the stored object; deletes address objects by that URL.
#[derive(Clone)]
pub struct BlobStore {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl BlobStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: Client::new(),
            base_url: config.blob_store_url.trim_end_matches('/').to_string(),
            token: config.blob_token.clone(),
        }
    }

    /// Store a byte buffer under a collision-resistant name derived from
    /// `original_name`, returning the public URL of the object.
    pub async fn upload(&self, bytes: Vec<u8>, original_name: &str) -> Result<String, BlobError> {
        let Some(token) = self.token.as_deref() else {
            return Err(BlobError::MissingCredential);
        };
        if bytes.is_empty() {
            return Err(BlobError::EmptyPayload);
        }

        let object_name = build_object_name(original_name);
        let response = self
            .http
            .put(format!("{}/{}", self.base_url, object_name))
            .bearer_auth(token)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BlobError::UploadFailed(format!(
                "store returned {status}: {body}"
            )));
        }

        let payload: PutBlobResponse = response
            .json()
            .await
            .map_err(|err| BlobError::UploadFailed(format!("unreadable store response: {err}")))?;

        Ok(payload.url)
    }

    /// Remove the object behind a public URL. Callers treat failures as
    /// best-effort; the error carries enough context to log.
    pub async fn delete(&self, url: &str) -> Result<(), BlobError> {
        let Some(token) = self.token.as_deref() else {
            return Err(BlobError::MissingCredential);
        };

        let response = self
            .http
            .delete(format!("{}/delete", self.base_url))
            .bearer_auth(token)
            .json(&serde_json::json!({ "urls": [url] }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BlobError::DeleteFailed(format!(
                "store returned {status}: {body}"
            )));
        }

        Ok(())
    }
}

/// `{unix-millis}-{random}.{ext}`, keeping only the sanitized extension of
/// the uploaded filename.
fn build_object_name(original_name: &str) -> String {
    let extension = Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| sanitize_filename::sanitize(ext.to_ascii_lowercase()))
        .filter(|ext| !ext.is_empty());

    let stamp = Utc::now().timestamp_millis();
    let suffix = Uuid::new_v4().simple();

    match extension {
        Some(ext) => format!("{stamp}-{suffix}.{ext}"),
        None => format!("{stamp}-{suffix}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_without_credential() -> BlobStore {
        BlobStore {
            http: Client::new(),
            base_url: "https://blob.example.test".to_string(),
            token: None,
        }
    }

    fn store_with_credential() -> BlobStore {
        BlobStore {
            token: Some("test-token".to_string()),
            ..store_without_credential()
        }
    }

    #[test]
    fn object_name_keeps_extension() {
        let name = build_object_name("Before & After.JPG");
        assert!(name.ends_with(".jpg"), "got {name}");
        assert!(!name.contains(' '));
    }

    #[test]
    fn object_name_without_extension() {
        let name = build_object_name("upload");
        assert!(!name.contains('.'));
        assert!(!name.is_empty());
    }

    #[test]
    fn object_names_are_unique() {
        let first = build_object_name("photo.png");
        let second = build_object_name("photo.png");
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn upload_requires_credential() {
        let store = store_without_credential();
        let result = store.upload(vec![1, 2, 3], "photo.png").await;
        assert!(matches!(result, Err(BlobError::MissingCredential)));
    }

    #[tokio::test]
    async fn upload_rejects_empty_payload() {
        let store = store_with_credential();
        let result = store.upload(Vec::new(), "photo.png").await;
        assert!(matches!(result, Err(BlobError::EmptyPayload)));
    }

    #[tokio::test]
    async fn delete_requires_credential() {
        let store = store_without_credential();
        let result = store.delete("https://blob.example.test/x.png").await;
        assert!(matches!(result, Err(BlobError::MissingCredential)));
    }
}
