use axum::{
    Json,
    extract::{Path, State},
};
use bansos_types::api::MessageResponse;
use bansos_types::models::User;
use tracing::{info, warn};

use crate::auth::{DEFAULT_RESET_PASSWORD, hash_password};
use crate::error::ApiError;
use crate::state::AppState;

fn user_not_found() -> ApiError {
    ApiError::not_found("User tidak ditemukan")
}

/// GET /api/admin/users: residents, newest first.
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.store.users.list_residents().await?))
}

/// PUT /api/admin/users/{id}/verify
pub async fn verify_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !state.store.users.verify_resident(id).await? {
        return Err(user_not_found());
    }
    info!("Resident {} verified", id);
    Ok(Json(MessageResponse::new("User berhasil diverifikasi")))
}

/// Stored photos and evidence that go away with resident `id`.
async fn owned_files(state: &AppState, id: i64) -> Result<Vec<String>, ApiError> {
    let applications = state.store.applications.list_applications_for_user(id).await?;
    let disputes = state.store.disputes.list_disputes().await?;

    let photos = applications.into_iter().flat_map(|a| {
        [a.foto_kk, a.foto_rumah_depan, a.foto_rumah_dalam, a.foto_selfie_ktp]
    });
    let evidence = disputes
        .into_iter()
        .filter(|d| d.pelapor_user_id == id || d.target_user_id == Some(id))
        .map(|d| d.bukti_file);
    Ok(photos.chain(evidence).flatten().collect())
}

/// DELETE /api/admin/users/{id}: rejects a registration. Applications and
/// disputes filed by or against the resident go with it, files included.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    let files = owned_files(&state, id).await?;
    if !state.store.users.delete_resident(id).await? {
        return Err(user_not_found());
    }

    for path in &files {
        if let Err(e) = state.storage.delete(path).await {
            warn!("Resident {} deleted but file {} was not: {}", id, path, e);
        }
    }
    info!("Resident {} deleted ({} files removed)", id, files.len());
    Ok(Json(MessageResponse::new("User berhasil ditolak")))
}

/// PUT /api/admin/users/{id}/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    let hash = hash_password(DEFAULT_RESET_PASSWORD)?;
    if !state.store.users.set_resident_password(id, &hash).await? {
        return Err(user_not_found());
    }
    info!("Password of resident {} reset to default", id);
    Ok(Json(MessageResponse::new("Password berhasil direset ke default")))
}

#[cfg(test)]
mod tests {
    use crate::applications::PHOTO_FIELDS;
    use crate::test_support::{TestApp, body_json, jpeg};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn admin_verifies_and_lists_residents() {
        let app = TestApp::new().await;
        let admin = app.admin_token().await;
        let warga = app.resident("3201010000000001", false).await;

        let resp = app.put_json(&format!("/api/admin/users/{}/verify", warga.id), Some(&admin), json!({})).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let list = body_json(app.get("/api/admin/users", Some(&admin)).await).await;
        let list = list.as_array().unwrap();
        assert_eq!(list.len(), 1, "admin account is not listed");
        assert_eq!(list[0]["verified"], true);
        assert!(list[0].get("password").is_none());
    }

    #[tokio::test]
    async fn unknown_or_admin_ids_are_not_found() {
        let app = TestApp::new().await;
        let admin = app.admin_token().await;

        let resp = app.put_json("/api/admin/users/999/verify", Some(&admin), json!({})).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let admin_id = app.state.store.users.find_admin_by_username("admin").await.unwrap().unwrap().user.id;
        let resp = app.delete(&format!("/api/admin/users/{}", admin_id), Some(&admin)).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn reset_password_allows_login_with_default() {
        let app = TestApp::new().await;
        let admin = app.admin_token().await;
        let warga = app.resident("3201010000000001", true).await;

        let resp = app
            .put_json(&format!("/api/admin/users/{}/reset-password", warga.id), Some(&admin), json!({}))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .post_json("/api/warga/login", None, json!({ "nik": "3201010000000001", "password": "123456" }))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn delete_rejects_registration() {
        let app = TestApp::new().await;
        let admin = app.admin_token().await;
        let warga = app.resident("3201010000000001", false).await;

        let resp = app.delete(&format!("/api/admin/users/{}", warga.id), Some(&admin)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(app.state.store.users.find_by_nik("3201010000000001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_stored_photos_and_evidence() {
        let app = TestApp::new().await;
        let admin = app.admin_token().await;
        let warga = app.resident("3201010000000001", true).await;
        let token = app.token_for(&warga);

        let text = [
            ("jenis_bantuan", "PKH"),
            ("alasan_pengajuan", "Tidak mampu"),
            ("gps_latitude", "-6.9"),
            ("gps_longitude", "107.6"),
        ];
        let files: Vec<_> = PHOTO_FIELDS.into_iter().map(|f| (f, "image/jpeg", jpeg(64))).collect();
        let resp = app.post_multipart("/api/bantuan", Some(&token), &text, &files).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let text = [("jenis_sanggahan", "diri_sendiri"), ("alasan_sanggahan", "Sudah mampu")];
        let resp = app
            .post_multipart("/api/sanggahan", Some(&token), &text, &[("bukti_sanggahan", "image/jpeg", jpeg(32))])
            .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(app.stored_files(), 5);

        let resp = app.delete(&format!("/api/admin/users/{}", warga.id), Some(&admin)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(app.stored_files(), 0);
    }
}
