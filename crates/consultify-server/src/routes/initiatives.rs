use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use consultify_core::db::with_transaction;
use consultify_core::initiative::{Initiative, InitiativeFilter, InitiativePatch, NewInitiative};
use consultify_core::project::Project;
use consultify_core::rbac::Permission;
use consultify_core::types::InitiativeStatus;
use serde::Deserialize;

use super::record;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct InitiativeQuery {
    pub status: Option<InitiativeStatus>,
}

/// GET /api/projects/:id/initiatives
pub async fn list_initiatives(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(project_id): Path<String>,
    Query(query): Query<InitiativeQuery>,
) -> Result<Json<Vec<Initiative>>, AppError> {
    auth.require(Permission::ViewProjects)?;
    let initiatives = app
        .db(move |conn| {
            Project::get(conn, &auth.organization_id, &project_id)?;
            Initiative::list(
                conn,
                &auth.organization_id,
                &InitiativeFilter {
                    project_id: Some(project_id),
                    status: query.status,
                },
            )
        })
        .await?;
    Ok(Json(initiatives))
}

/// POST /api/projects/:id/initiatives
pub async fn create_initiative(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(project_id): Path<String>,
    Json(body): Json<NewInitiative>,
) -> Result<(StatusCode, Json<Initiative>), AppError> {
    auth.require(Permission::ManageInitiatives)?;
    let initiative = app
        .db(move |conn| {
            with_transaction(conn, |tx| {
                let initiative =
                    Initiative::create(tx, &auth.organization_id, &project_id, &body)?;
                record(tx, &auth, "initiative.create", "initiative", &initiative.id)?;
                Ok(initiative)
            })
        })
        .await?;
    Ok((StatusCode::CREATED, Json(initiative)))
}

/// PATCH /api/initiatives/:id
pub async fn update_initiative(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(patch): Json<InitiativePatch>,
) -> Result<Json<Initiative>, AppError> {
    auth.require(Permission::ManageInitiatives)?;
    let initiative = app
        .db(move |conn| {
            with_transaction(conn, |tx| {
                let initiative = Initiative::update(tx, &auth.organization_id, &id, &patch)?;
                record(tx, &auth, "initiative.update", "initiative", &initiative.id)?;
                Ok(initiative)
            })
        })
        .await?;
    Ok(Json(initiative))
}

/// DELETE /api/initiatives/:id: linked tasks are kept and unlinked.
pub async fn delete_initiative(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    auth.require(Permission::ManageInitiatives)?;
    app.db(move |conn| {
        with_transaction(conn, |tx| {
            Initiative::soft_delete(tx, &auth.organization_id, &id)?;
            record(tx, &auth, "initiative.delete", "initiative", &id)
        })
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
