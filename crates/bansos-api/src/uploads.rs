use std::collections::HashMap;

use axum::extract::Multipart;
use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;
use crate::storage::ObjectStore;

/// 500 KiB per photo.
pub const MAX_PHOTO_BYTES: usize = 500 * 1024;

/// `image/jpg` is not registered but older clients still send it.
const JPEG_TYPES: [&str; 2] = ["image/jpeg", "image/jpg"];

pub fn is_jpeg(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    JPEG_TYPES.iter().any(|t| t.eq_ignore_ascii_case(essence))
}

#[derive(Debug)]
pub struct UploadedFile {
    pub content_type: String,
    pub bytes: Bytes,
}

/// A fully buffered multipart form: text fields and file parts by name.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::validation(format!("Form tidak valid: {}", e.body_text())))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let is_file = field.file_name().is_some();
            let content_type = field.content_type().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::validation(format!("Form tidak valid: {}", e.body_text())))?;

            if is_file {
                // Browsers send an empty part for an untouched file input.
                if !bytes.is_empty() {
                    form.files.insert(name, UploadedFile { content_type, bytes });
                }
            } else {
                form.fields.insert(name, String::from_utf8_lossy(&bytes).into_owned());
            }
        }
        Ok(form)
    }

    /// A text field, trimmed; blank counts as missing.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|s| s.trim()).filter(|s| !s.is_empty())
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }
}

fn check_photo(size: u64, content_type: &str, label: &str) -> Result<(), ApiError> {
    if size > MAX_PHOTO_BYTES as u64 {
        return Err(ApiError::validation(format!("Ukuran file {} maksimal 500 KB", label)));
    }
    if !is_jpeg(content_type) {
        return Err(ApiError::validation(format!("Format file {} harus JPG atau JPEG", label)));
    }
    Ok(())
}

/// Size and type checks for a photo; `label` names it in the message.
pub fn validate_photo(file: &UploadedFile, label: &str) -> Result<(), ApiError> {
    check_photo(file.bytes.len() as u64, &file.content_type, label)
}

/// The same checks for a photo the client put in storage itself, going by
/// what storage reports for `path`.
pub async fn validate_stored_photo(
    storage: &dyn ObjectStore,
    path: &str,
    label: &str,
) -> Result<(), ApiError> {
    let info = storage
        .describe(path)
        .await?
        .ok_or_else(|| ApiError::validation(format!("File {} tidak ditemukan", label)))?;
    check_photo(info.size, &info.content_type, label)
}

/// Objects written while handling one request. If the request fails later,
/// `discard` removes them again.
pub struct StoredFiles<'a> {
    storage: &'a dyn ObjectStore,
    paths: Vec<String>,
}

impl<'a> StoredFiles<'a> {
    pub fn new(storage: &'a dyn ObjectStore) -> Self {
        Self { storage, paths: Vec::new() }
    }

    /// Store under `{user_id}/{field}-{uuid}.jpg` and return the reference.
    pub async fn store(&mut self, user_id: i64, field: &str, file: UploadedFile) -> Result<String, ApiError> {
        let path = format!("{}/{}-{}.jpg", user_id, field, Uuid::new_v4());
        let reference = self.storage.put(&path, file.bytes, "image/jpeg").await?;
        self.paths.push(reference.clone());
        Ok(reference)
    }

    /// Best effort; failures are only logged.
    pub async fn discard(self) {
        for path in &self.paths {
            if let Err(e) = self.storage.delete(path).await {
                warn!("Failed to remove orphaned upload {}: {}", path, e);
            }
        }
    }
}
