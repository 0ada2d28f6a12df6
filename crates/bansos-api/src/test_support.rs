//! In-process app over in-memory SQLite and a temporary upload directory.

use std::sync::{Arc, OnceLock};

use axum::{
    Router,
    body::Body,
    http::{Request, header},
    response::Response,
};
use bansos_db::models::NewResident;
use bansos_db::sqlite::SqliteStore;
use bansos_db::{Database, Store};
use bansos_types::models::{Role, User};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::auth::{self, ADMIN_USERNAME};
use crate::routes;
use crate::state::{AppState, AppStateInner};
use crate::storage::LocalStore;

const BOUNDARY: &str = "bansos-test-boundary";

/// Hashing is slow in debug builds; every test shares one admin hash.
fn admin_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| auth::hash_password("admin123").unwrap())
}

pub struct TestApp {
    pub state: AppState,
    pub uploads: TempDir,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        let uploads = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open_in_memory().unwrap());
        let store = Store::new(SqliteStore::new(db));
        store.users.ensure_admin(ADMIN_USERNAME, "Administrator", admin_hash()).await.unwrap();

        let storage = LocalStore::new(uploads.path().to_path_buf()).await.unwrap();
        let state: AppState = Arc::new(AppStateInner {
            store,
            storage: Arc::new(storage),
            jwt_secret: "test-secret".into(),
        });
        let router = routes::router(state.clone());
        Self { state, uploads, router }
    }

    /// A resident with a dummy password hash.
    pub async fn resident(&self, nik: &str, verified: bool) -> User {
        let users = &self.state.store.users;
        let id = users
            .create_resident(&NewResident {
                nik: nik.into(),
                kk: "3201019999999999".into(),
                nama: format!("Warga {}", &nik[nik.len() - 2..]),
                email: format!("{}@warga.test", nik),
                phone: None,
                rt: Some("001".into()),
                rw: Some("002".into()),
                alamat: None,
                password: "not-a-real-hash".into(),
            })
            .await
            .unwrap();
        if verified {
            users.verify_resident(id).await.unwrap();
        }
        users.find_by_nik(nik).await.unwrap().unwrap()
    }

    pub fn token_for(&self, user: &User) -> String {
        auth::create_token(&self.state.jwt_secret, user.id, user.role).unwrap()
    }

    pub async fn admin_token(&self) -> String {
        let admin = self
            .state
            .store
            .users
            .find_admin_by_username(ADMIN_USERNAME)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.user.role, Role::Admin);
        self.token_for(&admin.user)
    }

    pub async fn send(&self, req: Request<Body>) -> Response {
        self.router.clone().oneshot(req).await.unwrap()
    }

    fn builder(method: &str, uri: &str, token: Option<&str>) -> axum::http::request::Builder {
        let builder = Request::builder().method(method).uri(uri);
        match token {
            Some(t) => builder.header(header::AUTHORIZATION, format!("Bearer {}", t)),
            None => builder,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Response {
        self.send(Self::builder("GET", uri, token).body(Body::empty()).unwrap()).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> Response {
        self.send(Self::builder("DELETE", uri, token).body(Body::empty()).unwrap()).await
    }

    pub async fn json(&self, method: &str, uri: &str, token: Option<&str>, body: Value) -> Response {
        let req = Self::builder(method, uri, token)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    pub async fn post_json(&self, uri: &str, token: Option<&str>, body: Value) -> Response {
        self.json("POST", uri, token, body).await
    }

    pub async fn put_json(&self, uri: &str, token: Option<&str>, body: Value) -> Response {
        self.json("PUT", uri, token, body).await
    }

    /// `files` are (field, content type, bytes).
    pub async fn post_multipart(
        &self,
        uri: &str,
        token: Option<&str>,
        fields: &[(&str, &str)],
        files: &[(&str, &str, Vec<u8>)],
    ) -> Response {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        for (name, content_type, bytes) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{name}.jpg\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let req = Self::builder("POST", uri, token)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap();
        self.send(req).await
    }

    /// Number of files under the upload directory.
    /// Place an object in storage the way a direct client upload would.
    pub fn upload(&self, path: &str, bytes: &[u8]) {
        let file = self.uploads.path().join(path);
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(file, bytes).unwrap();
    }

    pub fn stored_files(&self) -> usize {
        fn count(dir: &std::path::Path) -> usize {
            std::fs::read_dir(dir)
                .map(|entries| {
                    entries
                        .flatten()
                        .map(|e| if e.path().is_dir() { count(&e.path()) } else { 1 })
                        .sum()
                })
                .unwrap_or(0)
        }
        count(self.uploads.path())
    }
}

pub async fn body_json(resp: Response) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Fake JPEG payload of `len` bytes.
pub fn jpeg(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len.max(2)];
    bytes[0] = 0xff;
    bytes[1] = 0xd8;
    bytes.truncate(len);
    bytes
}
