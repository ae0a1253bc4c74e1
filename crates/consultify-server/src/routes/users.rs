use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use consultify_core::audit::{self, AuditEntry};
use consultify_core::rbac::Permission;
use consultify_core::user::{NewUser, User, UserPatch};
use consultify_core::ConsultifyError;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/users
pub async fn list_users(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<User>>, AppError> {
    auth.require(Permission::ManageUsers)?;
    let users = app
        .db(move |conn| User::list(conn, &auth.organization_id))
        .await?;
    Ok(Json(users))
}

/// POST /api/users: callers may only grant roles at or below their own.
pub async fn create_user(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), AppError> {
    auth.require(Permission::ManageUsers)?;
    if !auth.role.can_assign(body.role) {
        return Err(AppError::forbidden(format!(
            "role {} cannot assign role {}",
            auth.role, body.role
        )));
    }
    let min_len = app.config.auth.password_min_length;
    let user = app
        .db(move |conn| {
            let user = User::create(conn, &auth.organization_id, &body, min_len)?;
            audit::record(
                conn,
                AuditEntry::new(&auth.organization_id, "user.create", "user")
                    .by(&auth.user_id)
                    .entity(&user.id)
                    .details(serde_json::json!({ "role": user.role })),
            )?;
            Ok(user)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// PATCH /api/users/:id
pub async fn update_user(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(patch): Json<UserPatch>,
) -> Result<Json<User>, AppError> {
    auth.require(Permission::ManageUsers)?;
    let user = app
        .db(move |conn| {
            let current = User::get(conn, &auth.organization_id, &id)?;
            let touches_role = patch.role.is_some_and(|r| r != current.role);
            if touches_role
                && !(auth.role.can_assign(current.role)
                    && patch.role.is_some_and(|r| auth.role.can_assign(r)))
            {
                return Err(ConsultifyError::Forbidden(format!(
                    "role {} cannot change this user's role",
                    auth.role
                )));
            }
            let user = User::update(conn, &auth.organization_id, &id, &patch)?;
            audit::record(
                conn,
                AuditEntry::new(&auth.organization_id, "user.update", "user")
                    .by(&auth.user_id)
                    .entity(&user.id)
                    .details(serde_json::json!({ "role": user.role, "status": user.status })),
            )?;
            Ok(user)
        })
        .await?;
    Ok(Json(user))
}
