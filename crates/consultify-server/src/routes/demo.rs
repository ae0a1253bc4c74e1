use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use consultify_core::demo::DemoSession;
use consultify_core::seed::seed_demo;
use consultify_core::user::User;
use serde::Deserialize;

use crate::auth::issue_token;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StartBody {
    #[serde(default)]
    pub label: Option<String>,
}

/// POST /api/demo/start: seed a fresh demo tenant and open a tour session.
pub async fn start_demo(
    State(app): State<AppState>,
    body: Option<Json<StartBody>>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let label = body
        .and_then(|Json(b)| b.label)
        .unwrap_or_else(|| "Demo".to_string());
    let config = app.config.clone();
    let (demo, user) = app
        .db(move |conn| {
            let demo = seed_demo(conn, &config, &label)?;
            let user = User::get(conn, &demo.organization_id, &demo.user_id)?;
            Ok((demo, user))
        })
        .await?;
    let session = app
        .demo
        .start(&demo.organization_id, &demo.user_id, chrono::Utc::now());
    let token = issue_token(&app.config.auth, &user)?;
    tracing::info!(
        session_id = %session.id,
        organization_id = %demo.organization_id,
        "demo started"
    );
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "session": session,
            "token": token,
            "demo": demo,
        })),
    ))
}

/// GET /api/demo/session/:id: also refreshes the session's expiry.
pub async fn get_session(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DemoSession>, AppError> {
    app.demo
        .touch(&id, chrono::Utc::now())
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("demo session not found: {id}")))
}

/// POST /api/demo/session/:id/advance: complete the current tour step.
pub async fn advance_session(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DemoSession>, AppError> {
    app.demo
        .advance_tour(&id, chrono::Utc::now())
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("demo session not found: {id}")))
}
