use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use bansos_db::models::NewDispute;
use bansos_types::api::{
    Claims, CreateDisputeRequest, CreateDisputeResponse, DisputeDecisionResponse, MessageResponse,
    UpdateDisputeStatusRequest,
};
use bansos_types::models::{Dispute, DisputeKind};
use bansos_types::rules::{is_identity_number, parse_dispute_decision};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::validate_object_path;
use crate::uploads::{MultipartForm, StoredFiles, validate_photo, validate_stored_photo};

/// A dispute that passed validation, with its target resolved.
struct Filing {
    tipe: DisputeKind,
    alasan: String,
    target_user_id: Option<i64>,
}

async fn validate_filing(
    state: &AppState,
    jenis: Option<&str>,
    alasan: Option<&str>,
    nik_warga_lain: Option<&str>,
) -> Result<Filing, ApiError> {
    let jenis = jenis.map(str::trim).filter(|s| !s.is_empty());
    let alasan = alasan.map(str::trim).filter(|s| !s.is_empty());
    let (Some(jenis), Some(alasan)) = (jenis, alasan) else {
        return Err(ApiError::validation("Jenis sanggahan dan alasan wajib diisi"));
    };
    let tipe: DisputeKind = jenis
        .parse()
        .map_err(|_| ApiError::validation("Jenis sanggahan tidak valid"))?;

    let target_user_id = match tipe {
        DisputeKind::DiriSendiri => None,
        DisputeKind::WargaLain => {
            let nik = nik_warga_lain
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ApiError::validation("NIK warga yang disanggah wajib diisi"))?;
            if !is_identity_number(nik) {
                return Err(ApiError::validation("Format NIK harus 16 digit"));
            }
            let target = state
                .store
                .users
                .find_resident_by_nik(nik)
                .await?
                .ok_or_else(|| ApiError::not_found("Warga yang disanggah tidak ditemukan"))?;
            Some(target.user.id)
        }
    };

    Ok(Filing { tipe, alasan: alasan.to_string(), target_user_id })
}

async fn insert(
    state: &AppState,
    user_id: i64,
    filing: Filing,
    bukti_file: Option<String>,
) -> Result<i64, ApiError> {
    let id = state
        .store
        .disputes
        .create_dispute(&NewDispute {
            pelapor_user_id: user_id,
            target_user_id: filing.target_user_id,
            tipe: filing.tipe.as_str().to_string(),
            alasan: filing.alasan,
            bukti_file,
        })
        .await?;
    info!("Sanggahan {} ({}) filed by user {}", id, filing.tipe.as_str(), user_id);
    Ok(id)
}

fn created(id: i64) -> impl IntoResponse {
    (
        StatusCode::CREATED,
        Json(CreateDisputeResponse { message: "Sanggahan berhasil dikirim".into(), sanggahan_id: id }),
    )
}

/// POST /api/sanggahan (multipart, optional `bukti_sanggahan` photo)
pub async fn create_dispute(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut form = MultipartForm::read(multipart).await?;
    let filing = validate_filing(
        &state,
        form.text("jenis_sanggahan"),
        form.text("alasan_sanggahan"),
        form.text("nik_warga_lain"),
    )
    .await?;

    let bukti = form.take_file("bukti_sanggahan");
    if let Some(file) = &bukti {
        validate_photo(file, "bukti")?;
    }

    let mut stored = StoredFiles::new(state.storage.as_ref());
    let reference = match bukti {
        Some(file) => Some(stored.store(claims.sub, "bukti", file).await?),
        None => None,
    };

    match insert(&state, claims.sub, filing, reference).await {
        Ok(id) => Ok(created(id)),
        Err(e) => {
            stored.discard().await;
            Err(e)
        }
    }
}

/// POST /api/sanggahan/json
pub async fn create_dispute_json(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateDisputeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let filing = validate_filing(
        &state,
        Some(&req.jenis_sanggahan),
        Some(&req.alasan_sanggahan),
        req.nik_warga_lain.as_deref(),
    )
    .await?;

    let bukti = req.bukti_file.map(|p| p.trim().to_string()).filter(|p| !p.is_empty());
    if let Some(path) = &bukti {
        validate_object_path(path)?;
        if !path.starts_with(&format!("{}/", claims.sub)) {
            return Err(ApiError::validation("Path file tidak valid"));
        }
        validate_stored_photo(state.storage.as_ref(), path, "bukti").await?;
    }

    let id = insert(&state, claims.sub, filing, bukti).await?;
    Ok(created(id))
}

/// GET /api/sanggahan: disputes the caller filed.
pub async fn list_own(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Dispute>>, ApiError> {
    Ok(Json(state.store.disputes.list_disputes_by_filer(claims.sub).await?))
}

/// GET /api/admin/sanggahan
pub async fn list_all(State(state): State<AppState>) -> Result<Json<Vec<Dispute>>, ApiError> {
    Ok(Json(state.store.disputes.list_disputes().await?))
}

/// PUT /api/admin/sanggahan/{id}/status
///
/// Accepting a dispute rejects the affected resident's outstanding
/// applications; the response reports how many.
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateDisputeStatusRequest>,
) -> Result<Json<DisputeDecisionResponse>, ApiError> {
    let decision = parse_dispute_decision(&req.status)?;
    let resolution = state
        .store
        .disputes
        .resolve_dispute(id, decision)
        .await?
        .ok_or_else(|| ApiError::not_found("Sanggahan tidak ditemukan"))?;

    Ok(Json(DisputeDecisionResponse {
        message: "Status sanggahan berhasil diperbarui".into(),
        sanggahan: resolution.dispute,
        cascaded: resolution.cascaded,
    }))
}

/// DELETE /api/admin/sanggahan/{id}
pub async fn delete_dispute(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    let not_found = || ApiError::not_found("Sanggahan tidak ditemukan");
    let dispute = state.store.disputes.find_dispute(id).await?.ok_or_else(not_found)?;
    if !state.store.disputes.delete_dispute(id).await? {
        return Err(not_found());
    }

    if let Some(bukti) = dispute.bukti_file.as_deref() {
        if let Err(e) = state.storage.delete(bukti).await {
            warn!("Sanggahan {} deleted but evidence {} was not: {}", id, bukti, e);
        }
    }
    info!("Sanggahan {} deleted", id);
    Ok(Json(MessageResponse::new("Sanggahan berhasil dihapus")))
}
