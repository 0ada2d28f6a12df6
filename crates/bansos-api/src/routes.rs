use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
};
use serde_json::{Value, json};
use tower_http::services::ServeDir;

use crate::middleware::{require_admin, require_auth};
use crate::state::AppState;
use crate::{applications, auth, disputes, notifications, stats, storage, users};

/// Four photos at 500 KiB each plus form fields.
pub const MAX_REQUEST_BYTES: usize = 4 * 1024 * 1024;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// The whole HTTP API. CORS and request tracing are layered on by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/admin/login", post(auth::admin_login))
        .route("/api/warga/register", post(auth::register))
        .route("/api/warga/check-nik", post(auth::check_nik))
        .route("/api/warga/login", post(auth::warga_login))
        .route("/health", get(health));

    let resident_routes = Router::new()
        .route("/api/bantuan", post(applications::create_application).get(applications::list_own))
        .route("/api/bantuan/json", post(applications::create_application_json))
        .route("/api/sanggahan", post(disputes::create_dispute).get(disputes::list_own))
        .route("/api/sanggahan/json", post(disputes::create_dispute_json))
        .route("/api/storage/signed-url", post(storage::signed_url))
        .route("/api/warga/status", get(notifications::status))
        .route("/api/warga/notifications", post(notifications::notifications))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let admin_routes = Router::new()
        .route("/api/admin/users", get(users::list_users))
        .route("/api/admin/users/{id}/verify", put(users::verify_user))
        .route("/api/admin/users/{id}", delete(users::delete_user))
        .route("/api/admin/users/{id}/reset-password", put(users::reset_password))
        .route("/api/admin/bantuan", get(applications::list_all))
        .route("/api/admin/bantuan/{id}/status", put(applications::update_status))
        .route("/api/admin/sanggahan", get(disputes::list_all))
        .route("/api/admin/sanggahan/{id}/status", put(disputes::update_status))
        .route("/api/admin/sanggahan/{id}", delete(disputes::delete_dispute))
        .route("/api/admin/stats", get(stats::get_stats))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let upload_routes = match state.storage.local_root() {
        Some(dir) => Router::new().nest_service("/uploads", ServeDir::new(dir)),
        None => Router::new().route("/uploads/{*path}", get(storage::redirect_upload)),
    };

    Router::new()
        .merge(public_routes)
        .merge(resident_routes)
        .merge(admin_routes)
        .merge(upload_routes)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .with_state(state)
}
