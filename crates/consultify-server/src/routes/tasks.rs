use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use consultify_core::db::with_transaction;
use consultify_core::project::Project;
use consultify_core::rbac::Permission;
use consultify_core::task::{NewTask, Task, TaskFilter, TaskPatch};
use consultify_core::types::TaskStatus;
use serde::Deserialize;

use super::record;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
    pub assignee_id: Option<String>,
    pub initiative_id: Option<String>,
}

/// GET /api/projects/:id/tasks
pub async fn list_tasks(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(project_id): Path<String>,
    Query(query): Query<TaskQuery>,
) -> Result<Json<Vec<Task>>, AppError> {
    auth.require(Permission::ViewTasks)?;
    let tasks = app
        .db(move |conn| {
            Project::get(conn, &auth.organization_id, &project_id)?;
            Task::list(
                conn,
                &auth.organization_id,
                &TaskFilter {
                    project_id: Some(project_id),
                    status: query.status,
                    assignee_id: query.assignee_id,
                    initiative_id: query.initiative_id,
                },
            )
        })
        .await?;
    Ok(Json(tasks))
}

/// POST /api/projects/:id/tasks
pub async fn create_task(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(project_id): Path<String>,
    Json(body): Json<NewTask>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    auth.require(Permission::ManageTasks)?;
    let task = app
        .db(move |conn| {
            with_transaction(conn, |tx| {
                let task = Task::create(tx, &auth.organization_id, &project_id, &body)?;
                record(tx, &auth, "task.create", "task", &task.id)?;
                Ok(task)
            })
        })
        .await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// PATCH /api/tasks/:id
pub async fn update_task(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(patch): Json<TaskPatch>,
) -> Result<Json<Task>, AppError> {
    auth.require(Permission::ManageTasks)?;
    let task = app
        .db(move |conn| {
            with_transaction(conn, |tx| {
                let task = Task::update(tx, &auth.organization_id, &id, &patch)?;
                record(tx, &auth, "task.update", "task", &task.id)?;
                Ok(task)
            })
        })
        .await?;
    Ok(Json(task))
}

/// DELETE /api/tasks/:id
pub async fn delete_task(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    auth.require(Permission::ManageTasks)?;
    app.db(move |conn| {
        with_transaction(conn, |tx| {
            Task::soft_delete(tx, &auth.organization_id, &id)?;
            record(tx, &auth, "task.delete", "task", &id)
        })
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
