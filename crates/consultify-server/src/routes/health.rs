use axum::extract::State;
use axum::Json;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/health: liveness plus schema version.
pub async fn health(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let schema_version = app
        .db(consultify_core::db::migrations::current_version)
        .await?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "schema_version": schema_version,
    })))
}
