use serde::{Deserialize, Serialize};

use crate::events::{ChangeEvent, StatusSnapshot};
use crate::models::{Dispute, Role, User};

// -- JWT Claims --

/// Claims carried by every bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub role: Role,
    pub exp: usize,
}

// -- Generic --

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Message plus a machine-readable code, as returned by the NIK check.
#[derive(Debug, Serialize, Deserialize)]
pub struct CodeResponse {
    pub message: String,
    pub code: String,
}

// -- Auth --

#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct WargaLoginRequest {
    #[serde(default)]
    pub nik: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub user: User,
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub nik: String,
    #[serde(default)]
    pub kk: String,
    #[serde(default)]
    pub nama: String,
    #[serde(default)]
    pub email: String,
    pub phone: Option<String>,
    pub rt: Option<String>,
    pub rw: Option<String>,
    pub alamat: Option<String>,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    #[serde(rename = "userId")]
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CheckNikRequest {
    #[serde(default)]
    pub nik: String,
}

// -- Aid applications --

/// Application submitted with photos already uploaded through a signed URL.
#[derive(Debug, Default, Deserialize)]
pub struct CreateApplicationRequest {
    #[serde(default)]
    pub jenis_bantuan: String,
    #[serde(default)]
    pub alasan_pengajuan: String,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
    pub foto_kk: Option<String>,
    pub foto_rumah_depan: Option<String>,
    pub foto_rumah_dalam: Option<String>,
    pub foto_selfie_ktp: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateApplicationResponse {
    pub message: String,
    #[serde(rename = "bantuanId")]
    pub bantuan_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateApplicationStatusRequest {
    #[serde(default)]
    pub status: String,
    pub reason: Option<String>,
}

// -- Disputes --

/// Dispute submitted with evidence already uploaded through a signed URL.
#[derive(Debug, Default, Deserialize)]
pub struct CreateDisputeRequest {
    #[serde(default)]
    pub jenis_sanggahan: String,
    #[serde(default)]
    pub alasan_sanggahan: String,
    pub nik_warga_lain: Option<String>,
    pub bukti_file: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateDisputeResponse {
    pub message: String,
    #[serde(rename = "sanggahanId")]
    pub sanggahan_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDisputeStatusRequest {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DisputeDecisionResponse {
    pub message: String,
    pub sanggahan: Dispute,
    /// Applications rejected as a consequence of this decision.
    pub cascaded: usize,
}

// -- Storage --

#[derive(Debug, Deserialize)]
pub struct SignedUrlRequest {
    pub path: String,
    #[serde(rename = "contentType")]
    pub content_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignedUrlResponse {
    #[serde(rename = "signedUrl")]
    pub signed_url: String,
    pub token: String,
    pub path: String,
}

// -- Notifications --

#[derive(Debug, Default, Deserialize)]
pub struct NotificationRequest {
    #[serde(default)]
    pub previous: StatusSnapshot,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationResponse {
    pub snapshot: StatusSnapshot,
    pub events: Vec<ChangeEvent>,
}
