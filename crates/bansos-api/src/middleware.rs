use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
    typed_header::TypedHeaderRejection,
};
use bansos_types::api::Claims;
use bansos_types::models::Role;

use crate::auth::decode_token;
use crate::error::ApiError;
use crate::state::AppState;

/// Validate the bearer token and put its `Claims` into request extensions.
/// No token is 401; a bad or expired one is 403.
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) =
        bearer.map_err(|_| ApiError::Unauthorized("Token tidak ditemukan".into()))?;

    let claims = decode_token(&state.jwt_secret, bearer.token())
        .map_err(|_| ApiError::Forbidden("Token tidak valid".into()))?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Must run after `require_auth`.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    match req.extensions().get::<Claims>() {
        Some(claims) if claims.role == Role::Admin => Ok(next.run(req).await),
        _ => Err(ApiError::Forbidden("Akses ditolak".into())),
    }
}
