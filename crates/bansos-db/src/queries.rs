use bansos_types::models::{AidApplication, Dispute, DisputeStatus, Role, Stats, User};
use bansos_types::rules::{self, ApplicationDecision, Cascade, CASCADE_SCOPE};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use tracing::info;

use crate::Database;
use crate::models::{
    ApplicationRow, DisputeRow, NewApplication, NewDispute, NewResident, UserRecord, UserRow,
};
use crate::repository::Resolution;
use crate::{StoreError, StoreResult};

const USER_COLUMNS: &str = "id, nik, kk, username, nama, email, phone, rt, rw, alamat, password, role, verified, created_at, verified_at";

// Owner name/NIK come along for the admin listing.
const APPLICATION_SELECT: &str = "
    SELECT b.id, b.user_id, b.jenis_bantuan, b.alasan_pengajuan, b.status,
           b.foto_kk, b.foto_rumah_depan, b.foto_rumah_dalam, b.foto_selfie_ktp,
           b.gps_latitude, b.gps_longitude, b.rejection_reason, b.created_at, b.updated_at,
           u.nama, u.nik
    FROM bantuan_sosial b
    LEFT JOIN users u ON b.user_id = u.id";

const DISPUTE_SELECT: &str = "
    SELECT s.id, s.pelapor_user_id, s.target_user_id, s.tipe, s.alasan, s.bukti_file,
           s.status, s.created_at, s.updated_at,
           p.nama, p.nik, t.nama, t.nik
    FROM sanggahan s
    LEFT JOIN users p ON s.pelapor_user_id = p.id
    LEFT JOIN users t ON s.target_user_id = t.id";

impl Database {
    // -- Users --

    pub fn get_user_by_username(&self, username: &str, role: Role) -> StoreResult<Option<UserRecord>> {
        self.with_conn(|conn| {
            query_user(conn, "username = ?1 AND role = ?2", params![username, role.as_str()])
        })
    }

    /// Look up by NIK; `role` narrows the match when given.
    pub fn get_user_by_nik(&self, nik: &str, role: Option<Role>) -> StoreResult<Option<UserRecord>> {
        self.with_conn(|conn| match role {
            Some(role) => query_user(conn, "nik = ?1 AND role = ?2", params![nik, role.as_str()]),
            None => query_user(conn, "nik = ?1", params![nik]),
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", params![email]))
    }

    pub fn create_resident(&self, new: &NewResident) -> StoreResult<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (nik, kk, nama, email, phone, rt, rw, alamat, password, role)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'warga')",
                params![
                    new.nik, new.kk, new.nama, new.email, new.phone, new.rt, new.rw, new.alamat,
                    new.password
                ],
            )
            .map_err(map_unique_violation)?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Seed an admin account. Returns `true` if one was created.
    pub fn create_admin_if_missing(&self, username: &str, nama: &str, password_hash: &str) -> StoreResult<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO users (username, nama, password, role, verified)
                 VALUES (?1, ?2, ?3, 'admin', 1)",
                params![username, nama, password_hash],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn list_residents(&self) -> StoreResult<Vec<User>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM users WHERE role = 'warga' ORDER BY created_at DESC, id DESC",
                USER_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_user_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(UserRow::into_user).collect()
        })
    }

    pub fn verify_resident(&self, id: i64) -> StoreResult<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET verified = 1, verified_at = datetime('now')
                 WHERE id = ?1 AND role = 'warga'",
                [id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Removes the resident together with their applications and disputes.
    pub fn delete_resident(&self, id: i64) -> StoreResult<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM users WHERE id = ?1 AND role = 'warga'", [id])?;
            Ok(changed > 0)
        })
    }

    pub fn set_resident_password(&self, id: i64, password_hash: &str) -> StoreResult<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET password = ?1 WHERE id = ?2 AND role = 'warga'",
                params![password_hash, id],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Aid applications --

    pub fn insert_application(&self, new: &NewApplication) -> StoreResult<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO bantuan_sosial (
                    user_id, jenis_bantuan, alasan_pengajuan,
                    foto_kk, foto_rumah_depan, foto_rumah_dalam, foto_selfie_ktp,
                    gps_latitude, gps_longitude
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    new.user_id,
                    new.jenis_bantuan,
                    new.alasan_pengajuan,
                    new.foto_kk,
                    new.foto_rumah_depan,
                    new.foto_rumah_dalam,
                    new.foto_selfie_ktp,
                    new.gps_latitude,
                    new.gps_longitude,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn list_applications_for_user(&self, user_id: i64) -> StoreResult<Vec<AidApplication>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE b.user_id = ?1 ORDER BY b.created_at DESC, b.id DESC",
                APPLICATION_SELECT
            );
            query_applications(conn, &sql, params![user_id])
        })
    }

    pub fn list_applications(&self) -> StoreResult<Vec<AidApplication>> {
        self.with_conn(|conn| {
            let sql = format!("{} ORDER BY b.created_at DESC, b.id DESC", APPLICATION_SELECT);
            query_applications(conn, &sql, params![])
        })
    }

    /// Apply an admin decision. The reason column always mirrors the decision,
    /// so leaving `rejected` clears it.
    pub fn set_application_status(&self, id: i64, decision: &ApplicationDecision) -> StoreResult<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE bantuan_sosial
                 SET status = ?1, rejection_reason = ?2, updated_at = datetime('now')
                 WHERE id = ?3",
                params![decision.status.as_str(), decision.reason, id],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Disputes --

    pub fn insert_dispute(&self, new: &NewDispute) -> StoreResult<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sanggahan (pelapor_user_id, target_user_id, tipe, alasan, bukti_file)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![new.pelapor_user_id, new.target_user_id, new.tipe, new.alasan, new.bukti_file],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_dispute(&self, id: i64) -> StoreResult<Option<Dispute>> {
        self.with_conn(|conn| query_dispute(conn, id))
    }

    pub fn list_disputes_by_filer(&self, user_id: i64) -> StoreResult<Vec<Dispute>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE s.pelapor_user_id = ?1 ORDER BY s.created_at DESC, s.id DESC",
                DISPUTE_SELECT
            );
            query_disputes(conn, &sql, params![user_id])
        })
    }

    pub fn list_disputes(&self) -> StoreResult<Vec<Dispute>> {
        self.with_conn(|conn| {
            let sql = format!("{} ORDER BY s.created_at DESC, s.id DESC", DISPUTE_SELECT);
            query_disputes(conn, &sql, params![])
        })
    }

    /// Record an admin decision on a dispute and apply its cascade in the
    /// same transaction. `None` if the dispute does not exist.
    pub fn resolve_dispute(&self, id: i64, decision: DisputeStatus) -> StoreResult<Option<Resolution>> {
        self.with_tx(|tx| {
            let Some(dispute) = query_dispute(tx, id)? else {
                return Ok(None);
            };
            let cascade = rules::cascade_for(&dispute, decision)?;

            tx.execute(
                "UPDATE sanggahan SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![decision.as_str(), id],
            )?;

            let cascaded = match cascade {
                Some(cascade) => apply_cascade(tx, &cascade)?,
                None => 0,
            };

            let dispute = query_dispute(tx, id)?
                .ok_or_else(|| StoreError::Corrupt(format!("sanggahan {} vanished mid-update", id)))?;

            info!(
                "Sanggahan {} set to {} ({} bantuan rejected)",
                id, decision, cascaded
            );
            Ok(Some(Resolution { dispute, cascaded }))
        })
    }

    pub fn delete_dispute(&self, id: i64) -> StoreResult<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM sanggahan WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    // -- Statistics --

    pub fn stats(&self) -> StoreResult<Stats> {
        self.with_conn(|conn| {
            let stats = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM users WHERE role = 'warga'),
                    (SELECT COUNT(*) FROM users WHERE role = 'warga' AND verified = 1),
                    (SELECT COUNT(*) FROM bantuan_sosial),
                    (SELECT COUNT(*) FROM bantuan_sosial WHERE jenis_bantuan = 'PKH'),
                    (SELECT COUNT(*) FROM bantuan_sosial WHERE jenis_bantuan = 'BNPT'),
                    (SELECT COUNT(*) FROM bantuan_sosial WHERE jenis_bantuan NOT IN ('PKH', 'BNPT')),
                    (SELECT COUNT(*) FROM bantuan_sosial WHERE status = 'approved'),
                    (SELECT COUNT(*) FROM bantuan_sosial WHERE status = 'rejected'),
                    (SELECT COUNT(*) FROM bantuan_sosial WHERE status = 'pending'),
                    (SELECT COUNT(*) FROM sanggahan),
                    (SELECT COUNT(*) FROM sanggahan WHERE tipe = 'diri_sendiri'),
                    (SELECT COUNT(*) FROM sanggahan WHERE tipe = 'warga_lain')",
                [],
                |row| {
                    let count = |i: usize| row.get::<_, i64>(i).map(|n| n.max(0) as u64);
                    let total_users = count(0)?;
                    let verified_users = count(1)?;
                    Ok(Stats {
                        total_users,
                        verified_users,
                        pending_users: total_users.saturating_sub(verified_users),
                        total_bantuan: count(2)?,
                        pkh: count(3)?,
                        bnpt: count(4)?,
                        non_bansos: count(5)?,
                        approved_bantuan: count(6)?,
                        rejected_bantuan: count(7)?,
                        pending_bantuan: count(8)?,
                        total_sanggahan: count(9)?,
                        sanggahan_diri_sendiri: count(10)?,
                        sanggahan_warga_lain: count(11)?,
                    })
                },
            )?;
            Ok(stats)
        })
    }
}

fn apply_cascade(conn: &Connection, cascade: &Cascade) -> StoreResult<usize> {
    let scope = CASCADE_SCOPE
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE bantuan_sosial
         SET status = 'rejected', rejection_reason = ?1, updated_at = datetime('now')
         WHERE user_id = ?2 AND status IN ({})",
        scope
    );
    Ok(conn.execute(&sql, params![cascade.reason, cascade.user_id])?)
}

fn query_user(
    conn: &Connection,
    filter: &str,
    params: &[&dyn rusqlite::ToSql],
) -> StoreResult<Option<UserRecord>> {
    let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, filter);
    conn.query_row(&sql, params, map_user_row)
        .optional()?
        .map(UserRow::into_record)
        .transpose()
}

fn query_applications(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> StoreResult<Vec<AidApplication>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, map_application_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(ApplicationRow::into_application).collect()
}

fn query_dispute(conn: &Connection, id: i64) -> StoreResult<Option<Dispute>> {
    let sql = format!("{} WHERE s.id = ?1", DISPUTE_SELECT);
    conn.query_row(&sql, [id], map_dispute_row)
        .optional()?
        .map(DisputeRow::into_dispute)
        .transpose()
}

fn query_disputes(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> StoreResult<Vec<Dispute>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, map_dispute_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(DisputeRow::into_dispute).collect()
}

fn map_user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        nik: row.get(1)?,
        kk: row.get(2)?,
        username: row.get(3)?,
        nama: row.get(4)?,
        email: row.get(5)?,
        phone: row.get(6)?,
        rt: row.get(7)?,
        rw: row.get(8)?,
        alamat: row.get(9)?,
        password: row.get(10)?,
        role: row.get(11)?,
        verified: row.get(12)?,
        created_at: row.get(13)?,
        verified_at: row.get(14)?,
    })
}

fn map_application_row(row: &Row<'_>) -> rusqlite::Result<ApplicationRow> {
    Ok(ApplicationRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        jenis_bantuan: row.get(2)?,
        alasan_pengajuan: row.get(3)?,
        status: row.get(4)?,
        foto_kk: row.get(5)?,
        foto_rumah_depan: row.get(6)?,
        foto_rumah_dalam: row.get(7)?,
        foto_selfie_ktp: row.get(8)?,
        gps_latitude: row.get(9)?,
        gps_longitude: row.get(10)?,
        rejection_reason: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
        nama: row.get(14)?,
        nik: row.get(15)?,
    })
}

fn map_dispute_row(row: &Row<'_>) -> rusqlite::Result<DisputeRow> {
    Ok(DisputeRow {
        id: row.get(0)?,
        pelapor_user_id: row.get(1)?,
        target_user_id: row.get(2)?,
        tipe: row.get(3)?,
        alasan: row.get(4)?,
        bukti_file: row.get(5)?,
        status: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        pelapor_nama: row.get(9)?,
        pelapor_nik: row.get(10)?,
        target_nama: row.get(11)?,
        target_nik: row.get(12)?,
    })
}

fn map_unique_violation(e: rusqlite::Error) -> StoreError {
    let column = match &e {
        rusqlite::Error::SqliteFailure(err, Some(msg)) if err.code == ErrorCode::ConstraintViolation => {
            ["nik", "email"]
                .into_iter()
                .find(|col| msg.contains(&format!("users.{}", col)))
        }
        _ => None,
    };
    match column {
        Some(col) => StoreError::Duplicate(col),
        None => e.into(),
    }
}
