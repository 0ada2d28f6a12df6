use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use bansos_db::Store;
use bansos_db::models::NewResident;
use bansos_types::api::{
    AdminLoginRequest, CheckNikRequest, Claims, CodeResponse, LoginResponse, RegisterRequest,
    RegisterResponse, WargaLoginRequest,
};
use bansos_types::models::{Role, User};
use bansos_types::rules::{is_identity_number, is_rt_rw};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::info;

use crate::error::{
    ApiError, CODE_EMAIL_EXISTS, CODE_INVALID_NIK_FORMAT, CODE_NIK_AVAILABLE,
    CODE_NIK_PENDING_VERIFICATION, CODE_NIK_VERIFIED_EXISTS,
};
use crate::state::AppState;

pub const TOKEN_TTL_HOURS: i64 = 24;

/// Password a resident gets after an admin reset.
pub const DEFAULT_RESET_PASSWORD: &str = "123456";

pub const ADMIN_USERNAME: &str = "admin";

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ApiError::internal("password hashing", e))
}

fn verify_password(password: &str, hash: &str) -> Result<bool, ApiError> {
    let parsed = PasswordHash::new(hash).map_err(|e| ApiError::internal("stored password hash", e))?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

pub fn create_token(secret: &str, user_id: i64, role: Role) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: user_id,
        role,
        exp: (chrono::Utc::now() + chrono::Duration::hours(TOKEN_TTL_HOURS)).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
}

pub fn decode_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
}

/// Create the `admin` account if it does not exist yet.
pub async fn seed_admin(store: &Store, password: &str) -> Result<bool, ApiError> {
    let hash = hash_password(password)?;
    let created = store.users.ensure_admin(ADMIN_USERNAME, "Administrator", &hash).await?;
    if created {
        info!("Seeded admin account '{}'", ADMIN_USERNAME);
    }
    Ok(created)
}

fn login_response(state: &AppState, user: User) -> Result<Json<LoginResponse>, ApiError> {
    let token = create_token(&state.jwt_secret, user.id, user.role)
        .map_err(|e| ApiError::internal("token signing", e))?;
    Ok(Json(LoginResponse { message: "Login berhasil".into(), token, user }))
}

/// POST /api/admin/login
pub async fn admin_login(
    State(state): State<AppState>,
    Json(req): Json<AdminLoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let wrong = || ApiError::Unauthorized("Username atau password salah".into());

    let record = state
        .store
        .users
        .find_admin_by_username(req.username.trim())
        .await?
        .ok_or_else(wrong)?;
    if !verify_password(&req.password, &record.password_hash)? {
        return Err(wrong());
    }

    info!("Admin {} logged in", record.user.id);
    login_response(&state, record.user)
}

/// POST /api/warga/login
pub async fn warga_login(
    State(state): State<AppState>,
    Json(req): Json<WargaLoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let wrong = || ApiError::Unauthorized("NIK atau password salah".into());

    let record = state
        .store
        .users
        .find_resident_by_nik(req.nik.trim())
        .await?
        .ok_or_else(wrong)?;
    if !verify_password(&req.password, &record.password_hash)? {
        return Err(wrong());
    }
    if !record.user.verified {
        return Err(ApiError::Unauthorized("Akun Anda belum diverifikasi oleh admin".into()));
    }

    login_response(&state, record.user)
}

/// Conflict for a NIK that already has an account.
fn nik_taken(user: &User) -> ApiError {
    if user.verified {
        ApiError::Conflict {
            message: "NIK sudah terdaftar dan diverifikasi oleh admin kelurahan. Hubungi admin kelurahan untuk bantuan.".into(),
            code: CODE_NIK_VERIFIED_EXISTS,
        }
    } else {
        ApiError::Conflict {
            message: "NIK sudah terdaftar tetapi belum diverifikasi. Tunggu verifikasi admin atau hubungi admin kelurahan.".into(),
            code: CODE_NIK_PENDING_VERIFICATION,
        }
    }
}

fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn validate_registration(req: &RegisterRequest) -> Result<(), ApiError> {
    let required = [&req.nik, &req.kk, &req.nama, &req.email, &req.password];
    if required.iter().any(|v| v.trim().is_empty()) {
        return Err(ApiError::validation("Semua field wajib diisi"));
    }
    if !is_identity_number(req.nik.trim()) {
        return Err(ApiError::validation("Format NIK harus 16 digit"));
    }
    if !is_identity_number(req.kk.trim()) {
        return Err(ApiError::validation("Format No. KK harus 16 digit"));
    }
    if let Some(rt) = req.rt.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        if !is_rt_rw(rt) {
            return Err(ApiError::validation("Format RT harus diawali 00 (3-4 digit)"));
        }
    }
    if let Some(rw) = req.rw.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        if !is_rt_rw(rw) {
            return Err(ApiError::validation("Format RW harus diawali 00 (3-4 digit)"));
        }
    }
    Ok(())
}

/// POST /api/warga/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_registration(&req)?;
    let nik = req.nik.trim().to_string();
    let email = req.email.trim().to_string();

    if let Some(existing) = state.store.users.find_by_nik(&nik).await? {
        return Err(nik_taken(&existing));
    }
    if state.store.users.find_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict {
            message: "Email sudah terdaftar".into(),
            code: CODE_EMAIL_EXISTS,
        });
    }

    let new = NewResident {
        nik,
        kk: req.kk.trim().to_string(),
        nama: req.nama.trim().to_string(),
        email,
        phone: optional(req.phone),
        rt: optional(req.rt),
        rw: optional(req.rw),
        alamat: optional(req.alamat),
        password: hash_password(&req.password)?,
    };
    let user_id = state.store.users.create_resident(&new).await?;
    info!("Resident {} registered, awaiting verification", user_id);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Pendaftaran berhasil. Akun Anda akan diverifikasi oleh admin.".into(),
            user_id,
        }),
    ))
}

/// POST /api/warga/check-nik
pub async fn check_nik(
    State(state): State<AppState>,
    Json(req): Json<CheckNikRequest>,
) -> Result<Json<CodeResponse>, ApiError> {
    let nik = req.nik.trim();
    if nik.is_empty() {
        return Err(ApiError::validation("NIK wajib diisi"));
    }
    if !is_identity_number(nik) {
        return Err(ApiError::Conflict {
            message: "Format NIK harus 16 digit".into(),
            code: CODE_INVALID_NIK_FORMAT,
        });
    }
    if let Some(existing) = state.store.users.find_by_nik(nik).await? {
        return Err(nik_taken(&existing));
    }

    Ok(Json(CodeResponse {
        message: "NIK tersedia untuk pendaftaran".into(),
        code: CODE_NIK_AVAILABLE.into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TestApp, body_json};
    use axum::http::StatusCode;
    use serde_json::json;

    #[test]
    fn tokens_round_trip_with_role() {
        let token = create_token("secret", 42, Role::Warga).unwrap();
        let claims = decode_token("secret", &token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, Role::Warga);
        assert!(decode_token("other-secret", &token).is_err());
    }

    #[test]
    fn password_hashes_verify() {
        let hash = hash_password("rahasia").unwrap();
        assert!(verify_password("rahasia", &hash).unwrap());
        assert!(!verify_password("salah", &hash).unwrap());
    }

    #[tokio::test]
    async fn seeding_admin_is_idempotent() {
        let app = TestApp::new().await;
        // TestApp already seeded once.
        assert!(!seed_admin(&app.state.store, "admin123").await.unwrap());
    }

    #[tokio::test]
    async fn admin_login_checks_password() {
        let app = TestApp::new().await;

        let resp = app
            .post_json("/api/admin/login", None, json!({ "username": "admin", "password": "admin123" }))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        let claims = decode_token(&app.state.jwt_secret, body["token"].as_str().unwrap()).unwrap();
        assert_eq!(claims.role, Role::Admin);

        let resp = app
            .post_json("/api/admin/login", None, json!({ "username": "admin", "password": "nope" }))
            .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_then_login_requires_verification() {
        let app = TestApp::new().await;
        let form = json!({
            "nik": "3201010000000009",
            "kk": "3201019999999999",
            "nama": "Ahmad",
            "email": "ahmad@example.com",
            "password": "rahasia",
            "rt": "001",
            "rw": "002"
        });

        let resp = app.post_json("/api/warga/register", None, form).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let user_id = body_json(resp).await["userId"].as_i64().unwrap();

        let login = json!({ "nik": "3201010000000009", "password": "rahasia" });
        let resp = app.post_json("/api/warga/login", None, login.clone()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(resp).await["message"], "Akun Anda belum diverifikasi oleh admin");

        app.state.store.users.verify_resident(user_id).await.unwrap();
        let resp = app.post_json("/api/warga/login", None, login).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["user"]["nama"], "Ahmad");
    }

    #[tokio::test]
    async fn register_reports_nik_conflicts() {
        let app = TestApp::new().await;
        let verified = app.resident("3201010000000001", true).await;
        app.resident("3201010000000002", false).await;

        let form = |nik: &str, email: &str| {
            json!({ "nik": nik, "kk": "3201019999999999", "nama": "X", "email": email, "password": "p" })
        };

        let resp = app.post_json("/api/warga/register", None, form("3201010000000001", "a@x.id")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["code"], CODE_NIK_VERIFIED_EXISTS);

        let resp = app.post_json("/api/warga/register", None, form("3201010000000002", "b@x.id")).await;
        assert_eq!(body_json(resp).await["code"], CODE_NIK_PENDING_VERIFICATION);

        let taken_email = verified.email.clone().unwrap();
        let resp = app.post_json("/api/warga/register", None, form("3201010000000003", &taken_email)).await;
        assert_eq!(body_json(resp).await["code"], CODE_EMAIL_EXISTS);

        let resp = app.post_json("/api/warga/register", None, form("3201010000000004", "c@x.id")).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn register_validates_formats() {
        let app = TestApp::new().await;
        let base = json!({ "nik": "123", "kk": "3201019999999999", "nama": "X", "email": "e@x.id", "password": "p" });

        let resp = app.post_json("/api/warga/register", None, base).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["message"], "Format NIK harus 16 digit");

        let bad_rt = json!({
            "nik": "3201010000000005", "kk": "3201019999999999", "nama": "X",
            "email": "e@x.id", "password": "p", "rt": "101"
        });
        let resp = app.post_json("/api/warga/register", None, bad_rt).await;
        assert_eq!(body_json(resp).await["message"], "Format RT harus diawali 00 (3-4 digit)");
    }

    #[tokio::test]
    async fn check_nik_codes() {
        let app = TestApp::new().await;
        app.resident("3201010000000001", true).await;

        let check = |nik: &'static str| app.post_json("/api/warga/check-nik", None, json!({ "nik": nik }));

        let body = body_json(check("12345").await).await;
        assert_eq!(body["code"], CODE_INVALID_NIK_FORMAT);
        let body = body_json(check("3201010000000001").await).await;
        assert_eq!(body["code"], CODE_NIK_VERIFIED_EXISTS);

        let resp = check("3201010000000099").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["code"], CODE_NIK_AVAILABLE);
    }
}
