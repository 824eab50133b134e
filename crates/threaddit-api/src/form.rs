use std::collections::HashMap;

use axum::extract::Multipart;
use bytes::Bytes;
use tracing::warn;

use crate::error::ApiError;

/// Name of the multipart part carrying an uploaded image.
const MEDIA_FIELD: &str = "media";

/// A file part lifted out of a multipart form.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub content_type: String,
    pub file_name: Option<String>,
    pub bytes: Bytes,
}

/// Text fields of a create/update form plus the optional `media` file.
#[derive(Debug, Default)]
pub struct SubpostForm {
    fields: HashMap<String, String>,
    pub media: Option<MediaUpload>,
}

impl SubpostForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = SubpostForm::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            warn!("Malformed multipart body: {}", e);
            ApiError::BadRequest("Invalid form data")
        })? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            if name == MEDIA_FIELD {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_owned();
                let file_name = field.file_name().map(str::to_owned);
                let bytes = field.bytes().await.map_err(|e| {
                    warn!("Failed to read media part: {}", e);
                    ApiError::BadRequest("Invalid media")
                })?;

                // Browsers send an empty part when no file was picked
                if !bytes.is_empty() {
                    form.media = Some(MediaUpload {
                        content_type,
                        file_name,
                        bytes,
                    });
                }
            } else {
                let value = field.text().await.map_err(|e| {
                    warn!("Failed to read form field {}: {}", name, e);
                    ApiError::BadRequest("Invalid form data")
                })?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// Trimmed value of a text field; blank values count as absent.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Untrimmed value of a text field; blank values still count as absent.
    pub fn raw_field(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn owned_field(&self, key: &str) -> Option<String> {
        self.field(key).map(str::to_owned)
    }

    #[cfg(test)]
    pub(crate) fn with_fields(pairs: &[(&str, &str)]) -> Self {
        Self {
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            media: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fields_are_absent() {
        let form = SubpostForm::with_fields(&[("name", "  rust "), ("description", "   ")]);
        assert_eq!(form.field("name"), Some("rust"));
        assert_eq!(form.field("description"), None);
        assert_eq!(form.field("content_url"), None);
    }

    #[test]
    fn raw_fields_keep_surrounding_whitespace() {
        let form = SubpostForm::with_fields(&[("name", " rust "), ("description", "  ")]);
        assert_eq!(form.raw_field("name"), Some(" rust "));
        assert_eq!(form.raw_field("description"), None);
    }
}
