use std::{collections::HashMap, path::Path};

use axum::extract::Multipart;
use mime::Mime;

/// Result type used by the shared upload helpers.
pub type UploadResult<T> = Result<T, UploadError>;

/// Error returned when parsing or validating uploaded files.
#[derive(Debug)]
pub struct UploadError {
    message: String,
}

impl UploadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for UploadError {}

/// Acceptance policy for one category of image upload. A file passes only
/// when its filename extension and its declared content type both match.
#[derive(Debug, Clone, Copy)]
pub struct FileRules {
    pub allowed_extensions: &'static [&'static str],
    pub allowed_types: &'static [&'static str],
    pub max_bytes: usize,
}

pub const GALLERY_IMAGE_RULES: FileRules = FileRules {
    allowed_extensions: &["jpeg", "jpg", "png", "webp"],
    allowed_types: &["image/jpeg", "image/png", "image/webp"],
    max_bytes: 10 * 1024 * 1024,
};

pub const HERO_IMAGE_RULES: FileRules = FileRules {
    allowed_extensions: &["jpeg", "jpg", "png", "webp", "gif"],
    allowed_types: &["image/jpeg", "image/png", "image/webp", "image/gif"],
    max_bytes: 5 * 1024 * 1024,
};

/// Expectations for a single multipart file field.
#[derive(Debug, Clone, Copy)]
pub struct FileFieldConfig<'a> {
    pub field_name: &'a str,
    pub rules: FileRules,
    pub max_files: usize,
    pub min_files: usize,
}

impl<'a> FileFieldConfig<'a> {
    pub fn new(field_name: &'a str, rules: FileRules, max_files: usize) -> Self {
        Self {
            field_name,
            rules,
            max_files,
            min_files: 0,
        }
    }

    pub fn with_min_files(mut self, min_files: usize) -> Self {
        self.min_files = min_files;
        self
    }
}

/// One accepted file, buffered in memory for the blob store.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub bytes: Vec<u8>,
}

/// Aggregated output of the shared multipart collector.
#[derive(Debug, Default)]
pub struct UploadOutcome {
    pub files: Vec<UploadedFile>,
    pub text_fields: HashMap<String, Vec<String>>,
}

impl UploadOutcome {
    pub fn text_values(&self, field_name: &str) -> Option<&[String]> {
        self.text_fields
            .get(field_name)
            .map(|values| values.as_slice())
    }

    pub fn first_text(&self, field_name: &str) -> Option<&str> {
        self.text_values(field_name)
            .and_then(|values| values.first().map(|s| s.as_str()))
    }

    /// First non-empty value for a sparse text field, trimmed.
    pub fn trimmed_text(&self, field_name: &str) -> Option<&str> {
        self.first_text(field_name)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// Parse multipart form data, buffering files that satisfy the field
/// configuration and collecting loose text fields. Validation failures
/// reject the whole form before any storage side effect happens.
pub async fn collect_upload_form(
    mut multipart: Multipart,
    field_configs: &[FileFieldConfig<'_>],
) -> UploadResult<UploadOutcome> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut text_fields: HashMap<String, Vec<String>> = HashMap::new();
    let mut files: Vec<UploadedFile> = Vec::new();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|err| UploadError::new(format!("Failed to parse upload form: {err}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        if field.file_name().is_none() {
            let value = field.text().await.map_err(|err| {
                UploadError::new(format!("Failed to read field `{field_name}`: {err}"))
            })?;
            text_fields
                .entry(field_name.clone())
                .or_default()
                .push(value);
            continue;
        }

        let Some(config) = field_configs
            .iter()
            .find(|config| config.field_name == field_name)
        else {
            return Err(UploadError::new(format!(
                "Unexpected file field: `{field_name}`"
            )));
        };

        let count = counts.entry(config.field_name).or_insert(0);
        if *count >= config.max_files {
            return Err(UploadError::new(format!(
                "Too many files in `{}` (limit {})",
                config.field_name, config.max_files
            )));
        }

        let original_name = field.file_name().unwrap_or("upload.bin").to_string();
        let content_type = field.content_type().unwrap_or("").to_string();
        check_media_type(&original_name, &content_type, &config.rules)?;

        let mut bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|err| UploadError::new(format!("Failed to read upload data: {err}")))?
        {
            if bytes.len() + chunk.len() > config.rules.max_bytes {
                return Err(UploadError::new(format!(
                    "File `{}` exceeds the {} MiB size limit",
                    original_name,
                    config.rules.max_bytes / (1024 * 1024)
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        files.push(UploadedFile {
            original_name,
            bytes,
        });

        *count += 1;
    }

    for config in field_configs {
        let seen = counts.get(config.field_name).copied().unwrap_or(0);
        if seen < config.min_files {
            return Err(UploadError::new(format!(
                "Field `{}` requires at least {} file(s)",
                config.field_name, config.min_files
            )));
        }
    }

    Ok(UploadOutcome {
        files,
        text_fields,
    })
}

/// Enforce the allow-list on both the filename extension and the declared
/// content type.
fn check_media_type(original_name: &str, content_type: &str, rules: &FileRules) -> UploadResult<()> {
    let extension = Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if !rules.allowed_extensions.contains(&extension.as_str()) {
        return Err(UploadError::new(format!(
            "Unsupported file type `.{extension}` for `{original_name}`"
        )));
    }

    let essence = content_type
        .parse::<Mime>()
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_default();

    if !rules.allowed_types.contains(&essence.as_str()) {
        return Err(UploadError::new(format!(
            "Unsupported content type `{content_type}` for `{original_name}`"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gallery_rules_accept_jpeg() {
        assert!(check_media_type("car.jpg", "image/jpeg", &GALLERY_IMAGE_RULES).is_ok());
        assert!(check_media_type("car.JPEG", "image/jpeg; charset=binary", &GALLERY_IMAGE_RULES).is_ok());
    }

    #[test]
    fn gallery_rules_reject_gif() {
        let err = check_media_type("anim.gif", "image/gif", &GALLERY_IMAGE_RULES)
            .expect_err("gif must be rejected for gallery uploads");
        assert!(err.message().contains(".gif"));
    }

    #[test]
    fn hero_rules_accept_gif() {
        assert!(check_media_type("banner.gif", "image/gif", &HERO_IMAGE_RULES).is_ok());
    }

    #[test]
    fn extension_and_content_type_must_both_match() {
        // Right extension, wrong declared type.
        let err = check_media_type("photo.png", "application/octet-stream", &GALLERY_IMAGE_RULES)
            .expect_err("mismatched content type must be rejected");
        assert!(err.message().contains("content type"));

        // Right type, wrong extension.
        assert!(check_media_type("photo.exe", "image/png", &GALLERY_IMAGE_RULES).is_err());
    }

    #[test]
    fn missing_extension_is_rejected() {
        assert!(check_media_type("photo", "image/png", &GALLERY_IMAGE_RULES).is_err());
    }
}
