//! Business rules shared by every storage backend: the dispute cascade, the
//! application status gate and identity-number formats.

use crate::models::{ApplicationStatus, Dispute, DisputeKind, DisputeStatus};

/// Rejection reason written onto applications rejected by an accepted dispute.
pub const CASCADE_REJECTION_REASON: &str = "Ditolak berdasarkan sanggahan yang diterima";

/// Application statuses that an accepted dispute overrides.
pub const CASCADE_SCOPE: [ApplicationStatus; 2] = [ApplicationStatus::Pending, ApplicationStatus::Approved];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("Status tidak valid")]
    InvalidStatus(String),
    #[error("Alasan penolakan wajib diisi")]
    MissingRejectionReason,
    #[error("sanggahan {dispute_id} has type warga_lain but no target user")]
    MissingTarget { dispute_id: i64 },
}

/// The side effect an admin decision has on aid applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cascade {
    /// Resident whose outstanding applications are rejected.
    pub user_id: i64,
    pub reason: &'static str,
}

impl Cascade {
    /// Whether an application in `status` is overridden by this cascade.
    pub fn applies_to(&self, status: ApplicationStatus) -> bool {
        CASCADE_SCOPE.contains(&status)
    }
}

pub fn parse_dispute_decision(raw: &str) -> Result<DisputeStatus, RuleError> {
    raw.parse().map_err(|_| RuleError::InvalidStatus(raw.to_string()))
}

/// Work out which resident, if any, an admin decision on `dispute` cascades onto.
///
/// Only `accepted` cascades. A self-dispute affects the filer; an
/// other-resident dispute affects its target and never the filer.
pub fn cascade_for(dispute: &Dispute, decision: DisputeStatus) -> Result<Option<Cascade>, RuleError> {
    if decision != DisputeStatus::Accepted {
        return Ok(None);
    }

    let user_id = match dispute.tipe {
        DisputeKind::DiriSendiri => dispute.pelapor_user_id,
        DisputeKind::WargaLain => dispute
            .target_user_id
            .ok_or(RuleError::MissingTarget { dispute_id: dispute.id })?,
    };

    Ok(Some(Cascade { user_id, reason: CASCADE_REJECTION_REASON }))
}

/// A validated admin decision on an aid application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationDecision {
    pub status: ApplicationStatus,
    /// Always `Some` for `rejected`, always `None` otherwise.
    pub reason: Option<String>,
}

impl ApplicationDecision {
    /// Reason is mandatory for a rejection and dropped for any other status.
    pub fn new(status: &str, reason: Option<&str>) -> Result<Self, RuleError> {
        let status: ApplicationStatus = status
            .parse()
            .map_err(|_| RuleError::InvalidStatus(status.to_string()))?;

        let reason = reason.map(str::trim).filter(|r| !r.is_empty());

        match status {
            ApplicationStatus::Rejected => {
                let reason = reason.ok_or(RuleError::MissingRejectionReason)?;
                Ok(Self { status, reason: Some(reason.to_string()) })
            }
            _ => Ok(Self { status, reason: None }),
        }
    }
}

/// NIK and KK numbers are exactly 16 ASCII digits.
pub fn is_identity_number(raw: &str) -> bool {
    raw.len() == 16 && raw.bytes().all(|b| b.is_ascii_digit())
}

/// RT/RW codes are "00" followed by one or two digits ("001", "0012").
pub fn is_rt_rw(raw: &str) -> bool {
    raw.len() >= 3
        && raw.len() <= 4
        && raw.starts_with("00")
        && raw.bytes().all(|b| b.is_ascii_digit())
}

pub fn is_valid_coordinate_pair(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}
