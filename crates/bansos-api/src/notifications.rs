//! Status-change notifications. The client keeps the last snapshot it saw
//! and sends it back; the server answers with what changed since.

use axum::{Extension, Json, extract::State};
use bansos_types::api::{Claims, NotificationRequest, NotificationResponse};
use bansos_types::events::{StatusSnapshot, diff};

use crate::error::ApiError;
use crate::state::AppState;

async fn current_snapshot(state: &AppState, user_id: i64) -> Result<StatusSnapshot, ApiError> {
    let applications = state.store.applications.list_applications_for_user(user_id).await?;
    let disputes = state.store.disputes.list_disputes_by_filer(user_id).await?;
    Ok(StatusSnapshot::from_records(&applications, &disputes))
}

/// GET /api/warga/status
pub async fn status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<StatusSnapshot>, ApiError> {
    Ok(Json(current_snapshot(&state, claims.sub).await?))
}

/// POST /api/warga/notifications
pub async fn notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NotificationRequest>,
) -> Result<Json<NotificationResponse>, ApiError> {
    let snapshot = current_snapshot(&state, claims.sub).await?;
    let events = diff(&req.previous, &snapshot);
    Ok(Json(NotificationResponse { snapshot, events }))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{TestApp, body_json};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn reports_only_what_changed() {
        let app = TestApp::new().await;
        let admin = app.admin_token().await;
        let siti = app.resident("3201010000000001", true).await;
        let token = app.token_for(&siti);

        let resp = app
            .post_json(
                "/api/sanggahan/json",
                Some(&token),
                json!({ "jenis_sanggahan": "diri_sendiri", "alasan_sanggahan": "Sudah mampu" }),
            )
            .await;
        let id = body_json(resp).await["sanggahanId"].as_i64().unwrap();

        let seen = body_json(app.get("/api/warga/status", Some(&token)).await).await;
        assert_eq!(seen["disputes"][id.to_string()], "pending");

        let resp = app.post_json("/api/warga/notifications", Some(&token), json!({ "previous": seen })).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_json(resp).await["events"].as_array().unwrap().is_empty());

        app.put_json(&format!("/api/admin/sanggahan/{}/status", id), Some(&admin), json!({ "status": "rejected" }))
            .await;

        let body = body_json(
            app.post_json("/api/warga/notifications", Some(&token), json!({ "previous": seen })).await,
        )
        .await;
        let events = body["events"].as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["type"], "DisputeStatusChanged");
        assert_eq!(events[0]["data"]["from"], "pending");
        assert_eq!(events[0]["data"]["to"], "rejected");
        assert_eq!(body["snapshot"]["disputes"][id.to_string()], "rejected");
    }

    #[tokio::test]
    async fn empty_previous_reports_everything_as_new() {
        let app = TestApp::new().await;
        let siti = app.resident("3201010000000001", true).await;
        let token = app.token_for(&siti);
        app.post_json(
            "/api/sanggahan/json",
            Some(&token),
            json!({ "jenis_sanggahan": "diri_sendiri", "alasan_sanggahan": "x" }),
        )
        .await;

        let body = body_json(app.post_json("/api/warga/notifications", Some(&token), json!({})).await).await;
        assert_eq!(body["events"][0]["data"]["from"], serde_json::Value::Null);
    }
}
