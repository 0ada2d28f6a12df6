use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use bansos_db::models::NewApplication;
use bansos_types::api::{
    Claims, CreateApplicationRequest, CreateApplicationResponse, MessageResponse,
    UpdateApplicationStatusRequest,
};
use bansos_types::models::AidApplication;
use bansos_types::rules::{ApplicationDecision, is_valid_coordinate_pair};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::validate_object_path;
use crate::uploads::{MultipartForm, StoredFiles, validate_photo, validate_stored_photo};

/// Multipart photo fields, in the order they are checked.
pub const PHOTO_FIELDS: [&str; 4] = ["fotoKK", "fotoRumahDepan", "fotoRumahDalam", "fotoSelfieKTP"];

struct Details {
    jenis_bantuan: String,
    alasan_pengajuan: String,
    gps_latitude: f64,
    gps_longitude: f64,
}

fn required_text(jenis: Option<&str>, alasan: Option<&str>) -> Result<(String, String), ApiError> {
    let jenis = jenis.map(str::trim).filter(|s| !s.is_empty());
    let alasan = alasan.map(str::trim).filter(|s| !s.is_empty());
    match (jenis, alasan) {
        (Some(j), Some(a)) => Ok((j.to_string(), a.to_string())),
        _ => Err(ApiError::validation("Jenis bantuan dan alasan pengajuan wajib diisi")),
    }
}

fn coordinates(latitude: Option<f64>, longitude: Option<f64>) -> Result<(f64, f64), ApiError> {
    let (Some(lat), Some(lng)) = (latitude, longitude) else {
        return Err(ApiError::validation("GPS lokasi rumah wajib diaktifkan"));
    };
    if !is_valid_coordinate_pair(lat, lng) {
        return Err(ApiError::validation("Koordinat GPS tidak valid"));
    }
    Ok((lat, lng))
}

/// Coordinates from form text; unparsable counts as invalid, not missing.
fn parse_coordinate(raw: Option<&str>) -> Result<Option<f64>, ApiError> {
    raw.map(|v| v.parse::<f64>().map_err(|_| ApiError::validation("Koordinat GPS tidak valid")))
        .transpose()
}

async fn insert(
    state: &AppState,
    user_id: i64,
    details: Details,
    photos: [String; 4],
) -> Result<i64, ApiError> {
    let [foto_kk, foto_rumah_depan, foto_rumah_dalam, foto_selfie_ktp] = photos;
    let id = state
        .store
        .applications
        .create_application(&NewApplication {
            user_id,
            jenis_bantuan: details.jenis_bantuan,
            alasan_pengajuan: details.alasan_pengajuan,
            foto_kk,
            foto_rumah_depan,
            foto_rumah_dalam,
            foto_selfie_ktp,
            gps_latitude: details.gps_latitude,
            gps_longitude: details.gps_longitude,
        })
        .await?;
    info!("Bantuan {} submitted by user {}", id, user_id);
    Ok(id)
}

fn created(id: i64) -> impl IntoResponse {
    (
        StatusCode::CREATED,
        Json(CreateApplicationResponse {
            message: "Ajuan bantuan sosial berhasil dikirim".into(),
            bantuan_id: id,
        }),
    )
}

/// POST /api/bantuan (multipart with four photos)
pub async fn create_application(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut form = MultipartForm::read(multipart).await?;

    let (jenis_bantuan, alasan_pengajuan) =
        required_text(form.text("jenis_bantuan"), form.text("alasan_pengajuan"))?;

    let mut files = Vec::with_capacity(PHOTO_FIELDS.len());
    for field in PHOTO_FIELDS {
        let file = form
            .take_file(field)
            .ok_or_else(|| ApiError::validation(format!("File {} wajib diupload", field)))?;
        files.push((field, file));
    }

    let (gps_latitude, gps_longitude) = coordinates(
        parse_coordinate(form.text("gps_latitude"))?,
        parse_coordinate(form.text("gps_longitude"))?,
    )?;

    for (field, file) in &files {
        validate_photo(file, field)?;
    }

    // Nothing is written until every check above has passed.
    let mut stored = StoredFiles::new(state.storage.as_ref());
    let mut references = Vec::with_capacity(files.len());
    for (field, file) in files {
        match stored.store(claims.sub, field, file).await {
            Ok(reference) => references.push(reference),
            Err(e) => {
                stored.discard().await;
                return Err(e);
            }
        }
    }
    let photos: [String; 4] = match references.try_into() {
        Ok(photos) => photos,
        Err(_) => {
            stored.discard().await;
            return Err(ApiError::internal("bantuan upload", "photo count mismatch"));
        }
    };

    let details = Details { jenis_bantuan, alasan_pengajuan, gps_latitude, gps_longitude };
    match insert(&state, claims.sub, details, photos).await {
        Ok(id) => Ok(created(id)),
        Err(e) => {
            stored.discard().await;
            Err(e)
        }
    }
}

/// POST /api/bantuan/json: photos already uploaded through signed URLs.
pub async fn create_application_json(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateApplicationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (jenis_bantuan, alasan_pengajuan) =
        required_text(Some(&req.jenis_bantuan), Some(&req.alasan_pengajuan))?;

    let own_prefix = format!("{}/", claims.sub);
    let photo = |name: &str, value: Option<String>| -> Result<String, ApiError> {
        let path = value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::validation(format!("File {} wajib diupload", name)))?;
        validate_object_path(&path)?;
        if !path.starts_with(&own_prefix) {
            return Err(ApiError::validation("Path file tidak valid"));
        }
        Ok(path)
    };
    let photos = [
        photo("foto_kk", req.foto_kk)?,
        photo("foto_rumah_depan", req.foto_rumah_depan)?,
        photo("foto_rumah_dalam", req.foto_rumah_dalam)?,
        photo("foto_selfie_ktp", req.foto_selfie_ktp)?,
    ];
    let labels = ["foto_kk", "foto_rumah_depan", "foto_rumah_dalam", "foto_selfie_ktp"];
    for (label, path) in labels.into_iter().zip(&photos) {
        validate_stored_photo(state.storage.as_ref(), path, label).await?;
    }

    let (gps_latitude, gps_longitude) = coordinates(req.gps_latitude, req.gps_longitude)?;

    let details = Details { jenis_bantuan, alasan_pengajuan, gps_latitude, gps_longitude };
    let id = insert(&state, claims.sub, details, photos).await?;
    Ok(created(id))
}

/// GET /api/bantuan: the caller's own applications.
pub async fn list_own(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<AidApplication>>, ApiError> {
    Ok(Json(state.store.applications.list_applications_for_user(claims.sub).await?))
}

/// GET /api/admin/bantuan
pub async fn list_all(State(state): State<AppState>) -> Result<Json<Vec<AidApplication>>, ApiError> {
    Ok(Json(state.store.applications.list_applications().await?))
}

/// PUT /api/admin/bantuan/{id}/status
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateApplicationStatusRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let decision = ApplicationDecision::new(&req.status, req.reason.as_deref())?;
    if !state.store.applications.set_application_status(id, &decision).await? {
        return Err(ApiError::not_found("Bantuan tidak ditemukan"));
    }
    info!("Bantuan {} set to {}", id, decision.status);
    Ok(Json(MessageResponse::new("Status bantuan berhasil diupdate")))
}
