//! Row types as stored by both backends, plus insert payloads.
//! Kept apart from the bansos-types models so the storage layer owns its
//! column shapes; `into_*` converts and validates labels and timestamps.

use bansos_types::models::{AidApplication, Dispute, User, parse_timestamp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{StoreError, StoreResult};

#[derive(Debug, Clone, Deserialize)]
pub struct UserRow {
    pub id: i64,
    pub nik: Option<String>,
    pub kk: Option<String>,
    pub username: Option<String>,
    pub nama: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub rt: Option<String>,
    pub rw: Option<String>,
    pub alamat: Option<String>,
    pub password: String,
    pub role: String,
    pub verified: bool,
    pub created_at: String,
    pub verified_at: Option<String>,
}

/// A user together with their password hash, for credential checks only.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user: User,
    pub password_hash: String,
}

impl UserRow {
    pub fn into_record(self) -> StoreResult<UserRecord> {
        let user = User {
            id: self.id,
            nik: self.nik,
            kk: self.kk,
            username: self.username,
            nama: self.nama,
            email: self.email,
            phone: self.phone,
            rt: self.rt,
            rw: self.rw,
            alamat: self.alamat,
            role: self.role.parse()?,
            verified: self.verified,
            created_at: timestamp(&self.created_at)?,
            verified_at: self.verified_at.as_deref().map(timestamp).transpose()?,
        };
        Ok(UserRecord { user, password_hash: self.password })
    }

    pub fn into_user(self) -> StoreResult<User> {
        self.into_record().map(|r| r.user)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationRow {
    pub id: i64,
    pub user_id: i64,
    pub jenis_bantuan: String,
    pub alasan_pengajuan: String,
    pub status: String,
    pub foto_kk: Option<String>,
    pub foto_rumah_depan: Option<String>,
    pub foto_rumah_dalam: Option<String>,
    pub foto_selfie_ktp: Option<String>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
    pub rejection_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub nama: Option<String>,
    #[serde(default)]
    pub nik: Option<String>,
}

impl ApplicationRow {
    pub fn into_application(self) -> StoreResult<AidApplication> {
        Ok(AidApplication {
            id: self.id,
            user_id: self.user_id,
            jenis_bantuan: self.jenis_bantuan,
            alasan_pengajuan: self.alasan_pengajuan,
            status: self.status.parse()?,
            foto_kk: self.foto_kk,
            foto_rumah_depan: self.foto_rumah_depan,
            foto_rumah_dalam: self.foto_rumah_dalam,
            foto_selfie_ktp: self.foto_selfie_ktp,
            gps_latitude: self.gps_latitude,
            gps_longitude: self.gps_longitude,
            rejection_reason: self.rejection_reason,
            created_at: timestamp(&self.created_at)?,
            updated_at: timestamp(&self.updated_at)?,
            nama: self.nama,
            nik: self.nik,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisputeRow {
    pub id: i64,
    pub pelapor_user_id: i64,
    pub target_user_id: Option<i64>,
    pub tipe: String,
    pub alasan: String,
    pub bukti_file: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub pelapor_nama: Option<String>,
    #[serde(default)]
    pub pelapor_nik: Option<String>,
    #[serde(default)]
    pub target_nama: Option<String>,
    #[serde(default)]
    pub target_nik: Option<String>,
}

impl DisputeRow {
    pub fn into_dispute(self) -> StoreResult<Dispute> {
        Ok(Dispute {
            id: self.id,
            pelapor_user_id: self.pelapor_user_id,
            target_user_id: self.target_user_id,
            tipe: self.tipe.parse()?,
            alasan: self.alasan,
            bukti_file: self.bukti_file,
            status: self.status.parse()?,
            created_at: timestamp(&self.created_at)?,
            updated_at: timestamp(&self.updated_at)?,
            pelapor_nama: self.pelapor_nama,
            pelapor_nik: self.pelapor_nik,
            target_nama: self.target_nama,
            target_nik: self.target_nik,
        })
    }
}

fn timestamp(raw: &str) -> StoreResult<DateTime<Utc>> {
    parse_timestamp(raw).ok_or_else(|| StoreError::Corrupt(format!("bad timestamp '{}'", raw)))
}

// -- Insert payloads --

#[derive(Debug, Clone, Serialize)]
pub struct NewResident {
    pub nik: String,
    pub kk: String,
    pub nama: String,
    pub email: String,
    pub phone: Option<String>,
    pub rt: Option<String>,
    pub rw: Option<String>,
    pub alamat: Option<String>,
    /// Already hashed.
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewApplication {
    pub user_id: i64,
    pub jenis_bantuan: String,
    pub alasan_pengajuan: String,
    pub foto_kk: String,
    pub foto_rumah_depan: String,
    pub foto_rumah_dalam: String,
    pub foto_selfie_ktp: String,
    pub gps_latitude: f64,
    pub gps_longitude: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewDispute {
    pub pelapor_user_id: i64,
    pub target_user_id: Option<i64>,
    pub tipe: String,
    pub alasan: String,
    pub bukti_file: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bansos_types::models::Role;

    fn user_row() -> UserRow {
        UserRow {
            id: 1,
            nik: Some("3201012345678901".into()),
            kk: Some("3201019876543210".into()),
            username: None,
            nama: "Siti".into(),
            email: Some("siti@example.com".into()),
            phone: None,
            rt: Some("001".into()),
            rw: Some("002".into()),
            alamat: None,
            password: "$argon2id$hash".into(),
            role: "warga".into(),
            verified: false,
            created_at: "2024-03-01 08:30:00".into(),
            verified_at: None,
        }
    }

    #[test]
    fn user_row_keeps_hash_out_of_the_user() {
        let record = user_row().into_record().unwrap();
        assert_eq!(record.password_hash, "$argon2id$hash");
        assert_eq!(record.user.role, Role::Warga);
        let json = serde_json::to_string(&record.user).unwrap();
        assert!(!json.contains("argon2"));
    }

    #[test]
    fn unknown_role_is_corrupt() {
        let row = UserRow { role: "root".into(), ..user_row() };
        assert!(matches!(row.into_user(), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn hosted_rows_deserialize_from_json() {
        let row: DisputeRow = serde_json::from_value(serde_json::json!({
            "id": 4,
            "pelapor_user_id": 1,
            "target_user_id": null,
            "tipe": "diri_sendiri",
            "alasan": "sudah mampu",
            "bukti_file": null,
            "status": "pending",
            "created_at": "2024-03-01T08:30:00+00:00",
            "updated_at": "2024-03-01T08:30:00+00:00"
        }))
        .unwrap();
        let dispute = row.into_dispute().unwrap();
        assert_eq!(dispute.id, 4);
        assert_eq!(dispute.pelapor_nama, None);
    }
}
