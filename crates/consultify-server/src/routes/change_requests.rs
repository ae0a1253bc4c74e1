use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use consultify_core::governance::{Actor, ChangeRequest, ChangeRequestFilter, NewChangeRequest};
use consultify_core::rbac::Permission;
use consultify_core::types::ChangeStatus;
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

fn require_any(auth: &AuthUser) -> Result<(), AppError> {
    if auth.role.allows(Permission::SubmitChangeRequests)
        || auth.role.allows(Permission::DecideChangeRequests)
    {
        Ok(())
    } else {
        auth.require(Permission::SubmitChangeRequests)
    }
}

/// GET /api/change-requests?project_id=&status=&kind=
pub async fn list_change_requests(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(filter): Query<ChangeRequestFilter>,
) -> Result<Json<Vec<ChangeRequest>>, AppError> {
    require_any(&auth)?;
    let list = app
        .db(move |conn| ChangeRequest::list(conn, &auth.organization_id, &filter))
        .await?;
    Ok(Json(list))
}

/// POST /api/change-requests
pub async fn create_change_request(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<NewChangeRequest>,
) -> Result<(StatusCode, Json<ChangeRequest>), AppError> {
    auth.require(Permission::SubmitChangeRequests)?;
    let request = app
        .db(move |conn| ChangeRequest::create(conn, &auth.organization_id, &auth.user_id, &body))
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /api/change-requests/:id
pub async fn get_change_request(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<ChangeRequest>, AppError> {
    require_any(&auth)?;
    let request = app
        .db(move |conn| ChangeRequest::get(conn, &auth.organization_id, &id))
        .await?;
    Ok(Json(request))
}

#[derive(Deserialize)]
pub struct TransitionBody {
    pub to: ChangeStatus,
    #[serde(default)]
    pub note: Option<String>,
}

/// POST /api/change-requests/:id/transition: who may make which move is
/// decided by the workflow itself.
pub async fn transition_change_request(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<TransitionBody>,
) -> Result<Json<ChangeRequest>, AppError> {
    require_any(&auth)?;
    let request = app
        .db(move |conn| {
            ChangeRequest::transition(
                conn,
                &auth.organization_id,
                &id,
                Actor {
                    user_id: &auth.user_id,
                    role: auth.role,
                },
                body.to,
                body.note.as_deref(),
            )
        })
        .await?;
    Ok(Json(request))
}
