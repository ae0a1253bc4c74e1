use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use consultify_core::integration::{IntegrationConfig, IntegrationInput, IntegrationView};
use consultify_core::rbac::Permission;
use consultify_core::types::Provider;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/integrations: keys are masked.
pub async fn list_integrations(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<IntegrationView>>, AppError> {
    auth.require(Permission::ManageIntegrations)?;
    let configs = app
        .db(move |conn| IntegrationConfig::list(conn, &auth.organization_id))
        .await?;
    Ok(Json(configs.iter().map(IntegrationConfig::view).collect()))
}

/// PUT /api/integrations: insert or update by provider.
pub async fn upsert_integration(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<IntegrationInput>,
) -> Result<Json<IntegrationView>, AppError> {
    auth.require(Permission::ManageIntegrations)?;
    let config = app
        .db(move |conn| {
            IntegrationConfig::upsert(conn, &auth.organization_id, Some(&auth.user_id), &body)
        })
        .await?;
    Ok(Json(config.view()))
}

/// DELETE /api/integrations/:provider
pub async fn delete_integration(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(provider): Path<String>,
) -> Result<StatusCode, AppError> {
    auth.require(Permission::ManageIntegrations)?;
    let provider: Provider = provider.parse()?;
    app.db(move |conn| {
        IntegrationConfig::delete(conn, &auth.organization_id, Some(&auth.user_id), provider)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
