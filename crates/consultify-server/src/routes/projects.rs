use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use consultify_core::db::with_transaction;
use consultify_core::project::{NewProject, Project, ProjectPatch};
use consultify_core::rbac::Permission;

use super::record;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/projects
pub async fn list_projects(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<Project>>, AppError> {
    auth.require(Permission::ViewProjects)?;
    let projects = app
        .db(move |conn| Project::list(conn, &auth.organization_id))
        .await?;
    Ok(Json(projects))
}

/// POST /api/projects
pub async fn create_project(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<NewProject>,
) -> Result<(StatusCode, Json<Project>), AppError> {
    auth.require(Permission::ManageProjects)?;
    let project = app
        .db(move |conn| {
            with_transaction(conn, |tx| {
                let project = Project::create(tx, &auth.organization_id, &body)?;
                record(tx, &auth, "project.create", "project", &project.id)?;
                Ok(project)
            })
        })
        .await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /api/projects/:id
pub async fn get_project(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Project>, AppError> {
    auth.require(Permission::ViewProjects)?;
    let project = app
        .db(move |conn| Project::get(conn, &auth.organization_id, &id))
        .await?;
    Ok(Json(project))
}

/// PATCH /api/projects/:id
pub async fn update_project(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(patch): Json<ProjectPatch>,
) -> Result<Json<Project>, AppError> {
    auth.require(Permission::ManageProjects)?;
    let project = app
        .db(move |conn| {
            Project::update(conn, &auth.organization_id, &id, &patch, Some(&auth.user_id))
        })
        .await?;
    Ok(Json(project))
}

/// DELETE /api/projects/:id: soft delete, cascading to tasks and initiatives.
pub async fn delete_project(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    auth.require(Permission::ManageProjects)?;
    app.db(move |conn| {
        with_transaction(conn, |tx| {
            Project::soft_delete(tx, &auth.organization_id, &id)?;
            record(tx, &auth, "project.delete", "project", &id)
        })
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
