use axum::extract::{Path, State};
use axum::{Extension, Json};
use consultify_core::analytics::{self, Dashboard, ProjectProgress};
use consultify_core::rbac::Permission;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/analytics/dashboard
pub async fn dashboard(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Dashboard>, AppError> {
    auth.require(Permission::ViewAnalytics)?;
    let today = chrono::Utc::now().date_naive();
    let dashboard = app
        .db(move |conn| analytics::dashboard(conn, &auth.organization_id, today))
        .await?;
    Ok(Json(dashboard))
}

/// GET /api/projects/:id/progress
pub async fn project_progress(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<ProjectProgress>, AppError> {
    auth.require(Permission::ViewAnalytics)?;
    let progress = app
        .db(move |conn| analytics::project_progress(conn, &auth.organization_id, &id))
        .await?;
    Ok(Json(progress))
}
