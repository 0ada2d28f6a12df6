use rusqlite::Connection;
use tracing::info;

use crate::StoreResult;

pub fn run(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                nik         TEXT UNIQUE,
                kk          TEXT,
                username    TEXT UNIQUE,
                nama        TEXT NOT NULL,
                email       TEXT UNIQUE,
                phone       TEXT,
                rt          TEXT,
                rw          TEXT,
                alamat      TEXT,
                password    TEXT NOT NULL,
                role        TEXT NOT NULL DEFAULT 'warga' CHECK (role IN ('admin', 'warga')),
                verified    INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                verified_at TEXT
            );

            CREATE TABLE IF NOT EXISTS bantuan_sosial (
                id                INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id           INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                jenis_bantuan     TEXT NOT NULL,
                alasan_pengajuan  TEXT NOT NULL,
                status            TEXT NOT NULL DEFAULT 'pending'
                                  CHECK (status IN ('pending', 'approved', 'rejected')),
                foto_kk           TEXT,
                foto_rumah_depan  TEXT,
                foto_rumah_dalam  TEXT,
                foto_selfie_ktp   TEXT,
                gps_latitude      REAL,
                gps_longitude     REAL,
                rejection_reason  TEXT,
                created_at        TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at        TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_bantuan_user_status
                ON bantuan_sosial(user_id, status);

            CREATE TABLE IF NOT EXISTS sanggahan (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                pelapor_user_id  INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                target_user_id   INTEGER REFERENCES users(id) ON DELETE CASCADE,
                tipe             TEXT NOT NULL CHECK (tipe IN ('diri_sendiri', 'warga_lain')),
                alasan           TEXT NOT NULL,
                bukti_file       TEXT,
                status           TEXT NOT NULL DEFAULT 'pending'
                                 CHECK (status IN ('pending', 'accepted', 'rejected')),
                created_at       TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at       TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_sanggahan_pelapor
                ON sanggahan(pelapor_user_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
