use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use consultify_core::auth::{authenticate, register_organization, Registration};
use consultify_core::organization::Organization;
use consultify_core::user::User;
use serde::Deserialize;

use crate::auth::{issue_token, AuthUser};
use crate::error::AppError;
use crate::state::AppState;

/// POST /api/auth/register: create an organization and its first admin.
pub async fn register(
    State(app): State<AppState>,
    Json(body): Json<Registration>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let config = app.config.clone();
    let (org, user) = app
        .db(move |conn| register_organization(conn, &config, &body))
        .await?;
    let token = issue_token(&app.config.auth, &user)?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "token": token,
            "user": user,
            "organization": org,
        })),
    ))
}

#[derive(Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

/// POST /api/auth/login: exchange credentials for a bearer token.
pub async fn login(
    State(app): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = app
        .db(move |conn| authenticate(conn, &body.email, &body.password))
        .await?;
    tracing::info!(user_id = %user.id, "login");
    let token = issue_token(&app.config.auth, &user)?;
    Ok(Json(serde_json::json!({ "token": token, "user": user })))
}

/// GET /api/auth/me: the caller, its organization and effective permissions.
pub async fn me(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (org_id, user_id) = (auth.organization_id.clone(), auth.user_id.clone());
    let (user, org) = app
        .db(move |conn| {
            let user = User::get(conn, &org_id, &user_id)?;
            let org = Organization::get(conn, &org_id)?;
            Ok((user, org))
        })
        .await?;
    Ok(Json(serde_json::json!({
        "user": user,
        "organization": org,
        "permissions": auth.role.permissions(),
    })))
}
