use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored label that does not belong to its vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {vocabulary} '{value}'")]
pub struct UnknownLabel {
    pub vocabulary: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Warga,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Warga => "warga",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "warga" => Ok(Self::Warga),
            other => Err(UnknownLabel { vocabulary: "role", value: other.to_string() }),
        }
    }
}

/// Status of an aid application (bantuan sosial).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl FromStr for ApplicationStatus {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(UnknownLabel { vocabulary: "application status", value: other.to_string() }),
        }
    }
}

/// Status of a dispute (sanggahan).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisputeStatus {
    Pending,
    Accepted,
    Rejected,
}

impl DisputeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl FromStr for DisputeStatus {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(UnknownLabel { vocabulary: "dispute status", value: other.to_string() }),
        }
    }
}

/// Who a dispute is filed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeKind {
    /// The filer contests their own eligibility.
    DiriSendiri,
    /// The filer contests another resident's eligibility.
    WargaLain,
}

impl DisputeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DiriSendiri => "diri_sendiri",
            Self::WargaLain => "warga_lain",
        }
    }
}

impl FromStr for DisputeKind {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "diri_sendiri" => Ok(Self::DiriSendiri),
            "warga_lain" => Ok(Self::WargaLain),
            other => Err(UnknownLabel { vocabulary: "dispute type", value: other.to_string() }),
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aid programmes counted separately on the dashboard. Every other label
/// counts as non-bansos.
pub const NAMED_PROGRAMMES: [&str; 2] = ["PKH", "BNPT"];

/// A portal account as exposed to clients. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
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
    pub role: Role,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
}

/// One resident's request for assistance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AidApplication {
    pub id: i64,
    pub user_id: i64,
    pub jenis_bantuan: String,
    pub alasan_pengajuan: String,
    pub status: ApplicationStatus,
    pub foto_kk: Option<String>,
    pub foto_rumah_depan: Option<String>,
    pub foto_rumah_dalam: Option<String>,
    pub foto_selfie_ktp: Option<String>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Owner name, present on admin listings.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub nama: Option<String>,
    /// Owner NIK, present on admin listings.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub nik: Option<String>,
}

/// A claim that a resident (the filer or someone else) is ineligible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispute {
    pub id: i64,
    pub pelapor_user_id: i64,
    pub target_user_id: Option<i64>,
    pub tipe: DisputeKind,
    pub alasan: String,
    pub bukti_file: Option<String>,
    pub status: DisputeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub pelapor_nama: Option<String>,
    pub pelapor_nik: Option<String>,
    pub target_nama: Option<String>,
    pub target_nik: Option<String>,
}

/// Dashboard counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_users: u64,
    pub verified_users: u64,
    pub pending_users: u64,
    pub total_bantuan: u64,
    pub pkh: u64,
    pub bnpt: u64,
    pub non_bansos: u64,
    pub approved_bantuan: u64,
    pub rejected_bantuan: u64,
    pub pending_bantuan: u64,
    pub total_sanggahan: u64,
    pub sanggahan_diri_sendiri: u64,
    pub sanggahan_warga_lain: u64,
}

/// Parse a timestamp as written by either backend.
///
/// SQLite's `datetime('now')` has no timezone ("YYYY-MM-DD HH:MM:SS") and is
/// read as UTC; the hosted backend returns RFC 3339.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|ndt| ndt.and_utc())
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|ndt| ndt.and_utc())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_through_from_str() {
        for status in [ApplicationStatus::Pending, ApplicationStatus::Approved, ApplicationStatus::Rejected] {
            assert_eq!(status.as_str().parse::<ApplicationStatus>().unwrap(), status);
        }
        for kind in [DisputeKind::DiriSendiri, DisputeKind::WargaLain] {
            assert_eq!(kind.as_str().parse::<DisputeKind>().unwrap(), kind);
        }
        assert!("approved".parse::<DisputeStatus>().is_err());
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn serde_uses_wire_labels() {
        assert_eq!(serde_json::to_string(&DisputeKind::WargaLain).unwrap(), "\"warga_lain\"");
        assert_eq!(serde_json::to_string(&DisputeStatus::Accepted).unwrap(), "\"accepted\"");
        assert_eq!(serde_json::to_string(&Role::Warga).unwrap(), "\"warga\"");
    }

    #[test]
    fn stats_serialize_in_camel_case() {
        let stats = Stats { rejected_bantuan: 2, sanggahan_warga_lain: 1, ..Stats::default() };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["rejectedBantuan"], 2);
        assert_eq!(json["sanggahanWargaLain"], 1);
        assert_eq!(json["nonBansos"], 0);
    }

    #[test]
    fn parses_both_timestamp_shapes() {
        let sqlite = parse_timestamp("2024-03-01 08:30:00").unwrap();
        let hosted = parse_timestamp("2024-03-01T08:30:00+00:00").unwrap();
        let bare = parse_timestamp("2024-03-01T08:30:00.123456").unwrap();
        assert_eq!(sqlite, hosted);
        assert_eq!(bare.timestamp(), sqlite.timestamp());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
