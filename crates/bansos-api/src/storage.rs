//! Object storage for uploaded photos: a local directory served under
//! `/uploads`, or a hosted storage bucket.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use axum::{
    Extension, Json,
    extract::{Path as UrlPath, State},
    response::Redirect,
};
use bansos_types::api::{Claims, SignedUrlRequest, SignedUrlResponse};
use bytes::Bytes;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;
use tokio::fs;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::state::AppState;
use crate::uploads;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage returned {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("invalid object path '{0}'")]
    InvalidPath(String),

    /// The operation exists only on another backend.
    #[error("{0}")]
    Unsupported(&'static str),
}

/// What storage knows about an object it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub size: u64,
    pub content_type: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` at `path`, returning the reference to persist.
    async fn put(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<String, StorageError>;

    /// Size and type of an object, `None` if there is no such object.
    async fn describe(&self, path: &str) -> Result<Option<ObjectInfo>, StorageError>;

    /// Remove an object. A missing object is not an error.
    async fn delete(&self, path: &str) -> Result<(), StorageError>;

    /// A URL the client can upload to directly.
    async fn signed_upload_url(&self, path: &str) -> Result<SignedUrlResponse, StorageError>;

    /// A short-lived URL for reading an object.
    async fn download_url(&self, path: &str) -> Result<String, StorageError>;

    fn public_url(&self, path: &str) -> String;

    /// Directory served directly under `/uploads`, for the local backend.
    fn local_root(&self) -> Option<&Path> {
        None
    }
}

/// Relative path made only of normal components ("12/fotoKK-ab.jpg").
pub fn validate_object_path(path: &str) -> Result<(), StorageError> {
    let p = Path::new(path);
    let normal = !path.is_empty()
        && !path.contains('\\')
        && !path.ends_with('/')
        && p.components().all(|c| matches!(c, Component::Normal(_)));
    if normal {
        Ok(())
    } else {
        Err(StorageError::InvalidPath(path.to_string()))
    }
}

// -- Local directory --

pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub async fn new(dir: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(&dir).await?;
        info!("Upload directory: {}", dir.display());
        Ok(Self { dir })
    }

    fn file_path(&self, path: &str) -> Result<PathBuf, StorageError> {
        validate_object_path(path)?;
        Ok(self.dir.join(path))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, path: &str, bytes: Bytes, _content_type: &str) -> Result<String, StorageError> {
        let file = self.file_path(path)?;
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&file, &bytes).await?;
        Ok(path.to_string())
    }

    async fn describe(&self, path: &str) -> Result<Option<ObjectInfo>, StorageError> {
        let file = self.file_path(path)?;
        let meta = match fs::metadata(&file).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        // Files carry no type on disk; go by extension.
        let jpeg = file
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"));
        let content_type = if jpeg { "image/jpeg" } else { "application/octet-stream" };
        Ok(Some(ObjectInfo { size: meta.len(), content_type: content_type.to_string() }))
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let file = self.file_path(path)?;
        match fs::remove_file(&file).await {
            Ok(()) => {
                info!("Deleted upload {}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Upload {} already gone", path);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn signed_upload_url(&self, _path: &str) -> Result<SignedUrlResponse, StorageError> {
        Err(StorageError::Unsupported(
            "Penyimpanan bucket tidak aktif, gunakan unggahan langsung (multipart)",
        ))
    }

    async fn download_url(&self, path: &str) -> Result<String, StorageError> {
        validate_object_path(path)?;
        Ok(self.public_url(path))
    }

    fn public_url(&self, path: &str) -> String {
        format!("/uploads/{}", path)
    }

    fn local_root(&self) -> Option<&Path> {
        Some(&self.dir)
    }
}

// -- Hosted bucket --

pub struct BucketStore {
    client: Client,
    base_url: String,
    service_key: String,
    bucket: String,
    download_expiry_secs: u64,
}

#[derive(Deserialize)]
struct SignedUpload {
    url: String,
}

#[derive(Deserialize)]
struct SignedDownload {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

impl BucketStore {
    pub fn new(
        client: Client,
        supabase_url: &str,
        service_key: &str,
        bucket: &str,
        download_expiry_secs: u64,
    ) -> Self {
        Self {
            client,
            base_url: format!("{}/storage/v1", supabase_url.trim_end_matches('/')),
            service_key: service_key.to_string(),
            bucket: bucket.to_string(),
            download_expiry_secs,
        }
    }

    fn object_url(&self, kind: &str, path: &str) -> String {
        format!("{}/{}/{}/{}", self.base_url, kind, self.bucket, path)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.service_key).bearer_auth(&self.service_key)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StorageError::Remote { status: status.as_u16(), body })
    }
}

/// The `token` query parameter of a signed upload URL.
fn upload_token(signed_url: &str) -> Option<String> {
    let url = Url::parse(signed_url).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "token")
        .map(|(_, v)| v.into_owned())
}

#[async_trait]
impl ObjectStore for BucketStore {
    async fn put(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<String, StorageError> {
        validate_object_path(path)?;
        let req = self
            .client
            .post(self.object_url("object", path))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes);
        Self::check(self.authed(req).send().await?).await?;
        Ok(path.to_string())
    }

    async fn describe(&self, path: &str) -> Result<Option<ObjectInfo>, StorageError> {
        validate_object_path(path)?;
        let req = self.client.head(self.object_url("object/authenticated", path));
        let response = match Self::check(self.authed(req).send().await?).await {
            Ok(response) => response,
            // The storage API reports a missing object as 400 as well as 404.
            Err(StorageError::Remote { status: 400 | 404, .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let headers = response.headers();
        let size = headers
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| StorageError::Remote {
                status: response.status().as_u16(),
                body: format!("no Content-Length for {}", path),
            })?;
        let content_type = headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        Ok(Some(ObjectInfo { size, content_type }))
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        validate_object_path(path)?;
        let req = self.client.delete(self.object_url("object", path));
        match Self::check(self.authed(req).send().await?).await {
            Ok(_) => Ok(()),
            Err(StorageError::Remote { status: 404, .. }) => {
                warn!("Object {} already gone from bucket {}", path, self.bucket);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn signed_upload_url(&self, path: &str) -> Result<SignedUrlResponse, StorageError> {
        validate_object_path(path)?;
        let req = self.client.post(self.object_url("object/upload/sign", path));
        let signed: SignedUpload = Self::check(self.authed(req).send().await?).await?.json().await?;

        let signed_url = format!("{}{}", self.base_url, signed.url);
        let token = upload_token(&signed_url).unwrap_or_default();
        Ok(SignedUrlResponse { signed_url, token, path: path.to_string() })
    }

    async fn download_url(&self, path: &str) -> Result<String, StorageError> {
        validate_object_path(path)?;
        let req = self
            .client
            .post(self.object_url("object/sign", path))
            .json(&json!({ "expiresIn": self.download_expiry_secs }));
        let signed: SignedDownload = Self::check(self.authed(req).send().await?).await?.json().await?;
        Ok(format!("{}{}", self.base_url, signed.signed_url))
    }

    fn public_url(&self, path: &str) -> String {
        self.object_url("object/public", path)
    }
}

// -- Handlers --

/// POST /api/storage/signed-url
///
/// The object is always placed under the caller's own prefix.
pub async fn signed_url(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SignedUrlRequest>,
) -> Result<Json<SignedUrlResponse>, ApiError> {
    if let Some(ct) = req.content_type.as_deref() {
        if !uploads::is_jpeg(ct) {
            return Err(ApiError::validation("Format file harus JPG atau JPEG"));
        }
    }
    let name = req.path.trim().trim_start_matches('/');
    let path = format!("{}/{}", claims.sub, name);
    validate_object_path(&path)?;

    Ok(Json(state.storage.signed_upload_url(&path).await?))
}

/// GET /uploads/{*path} when objects live in a bucket.
pub async fn redirect_upload(
    State(state): State<AppState>,
    UrlPath(path): UrlPath<String>,
) -> Result<Redirect, ApiError> {
    let url = state.storage.download_url(&path).await?;
    Ok(Redirect::temporary(&url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("12/fotoKK-1.jpg", true)]
    #[case("bukti.jpg", true)]
    #[case("", false)]
    #[case("12/", false)]
    #[case("/etc/passwd", false)]
    #[case("12/../../secret", false)]
    #[case("./12/a.jpg", false)]
    #[case("12\\..\\a.jpg", false)]
    fn object_paths(#[case] path: &str, #[case] ok: bool) {
        assert_eq!(validate_object_path(path).is_ok(), ok);
    }

    #[tokio::test]
    async fn local_put_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("uploads")).await.unwrap();

        let reference = store
            .put("7/fotoKK-a.jpg", Bytes::from_static(b"\xff\xd8jpeg"), "image/jpeg")
            .await
            .unwrap();
        assert_eq!(reference, "7/fotoKK-a.jpg");
        assert!(dir.path().join("uploads/7/fotoKK-a.jpg").exists());
        assert_eq!(store.public_url(&reference), "/uploads/7/fotoKK-a.jpg");

        store.delete(&reference).await.unwrap();
        assert!(!dir.path().join("uploads/7/fotoKK-a.jpg").exists());
        // Second delete is a no-op.
        store.delete(&reference).await.unwrap();
    }

    #[tokio::test]
    async fn local_describe_reports_size_and_type() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().to_path_buf()).await.unwrap();
        store.put("3/a.jpg", Bytes::from(vec![0u8; 2048]), "image/jpeg").await.unwrap();
        store.put("3/a.png", Bytes::from_static(b"png"), "image/png").await.unwrap();

        let info = store.describe("3/a.jpg").await.unwrap().unwrap();
        assert_eq!(info, ObjectInfo { size: 2048, content_type: "image/jpeg".into() });
        assert_eq!(store.describe("3/a.png").await.unwrap().unwrap().content_type, "application/octet-stream");
        assert_eq!(store.describe("3/missing.jpg").await.unwrap(), None);
        assert_eq!(store.describe("3").await.unwrap(), None);
    }

    #[tokio::test]
    async fn bucket_describe_reads_object_headers() {
        use axum::http::{StatusCode, header};
        use axum::routing::head;

        let router = axum::Router::new()
            .route(
                "/storage/v1/object/authenticated/b/1/a.jpg",
                head(|| async { [(header::CONTENT_LENGTH, "2048"), (header::CONTENT_TYPE, "image/jpeg")] }),
            )
            .route(
                "/storage/v1/object/authenticated/b/1/gone.jpg",
                head(|| async { StatusCode::BAD_REQUEST }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let store = BucketStore::new(Client::new(), &url, "key", "b", 60);
        let info = store.describe("1/a.jpg").await.unwrap().unwrap();
        assert_eq!(info, ObjectInfo { size: 2048, content_type: "image/jpeg".into() });
        assert_eq!(store.describe("1/gone.jpg").await.unwrap(), None);
    }

    #[tokio::test]
    async fn local_store_refuses_traversal_and_signing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().to_path_buf()).await.unwrap();

        let err = store.put("../escape.jpg", Bytes::new(), "image/jpeg").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath(_)));

        let err = store.signed_upload_url("1/a.jpg").await.unwrap_err();
        assert!(matches!(err, StorageError::Unsupported(_)));
    }

    #[test]
    fn bucket_urls() {
        let store = BucketStore::new(Client::new(), "https://x.supabase.co/", "key", "bansos-uploads", 3600);
        assert_eq!(
            store.public_url("1/a.jpg"),
            "https://x.supabase.co/storage/v1/object/public/bansos-uploads/1/a.jpg"
        );
        assert_eq!(
            store.object_url("object/upload/sign", "1/a.jpg"),
            "https://x.supabase.co/storage/v1/object/upload/sign/bansos-uploads/1/a.jpg"
        );
    }

    #[test]
    fn token_is_read_from_the_signed_url() {
        let url = "https://x.supabase.co/storage/v1/object/upload/sign/b/1/a.jpg?token=abc.def";
        assert_eq!(upload_token(url).as_deref(), Some("abc.def"));
        assert_eq!(upload_token("not a url"), None);
    }
}
