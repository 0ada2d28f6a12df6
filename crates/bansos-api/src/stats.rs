use axum::{Json, extract::State};
use bansos_types::models::Stats;

use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/admin/stats
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<Stats>, ApiError> {
    Ok(Json(state.store.stats.stats().await?))
}
