//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs signed with `auth.jwt_secret`. The middleware
//! verifies the token, confirms the user and its organization are still
//! active, and inserts an [`AuthUser`] into the request extensions for
//! handlers to extract.

use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use consultify_core::config::AuthConfig;
use consultify_core::organization::Organization;
use consultify_core::rbac::{self, Permission};
use consultify_core::types::{Role, UserStatus};
use consultify_core::user::User;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    /// Organization id.
    pub org: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub organization_id: String,
    pub role: Role,
}

impl AuthUser {
    pub fn require(&self, permission: Permission) -> Result<(), AppError> {
        rbac::require(self.role, permission)?;
        Ok(())
    }
}

pub fn issue_token(config: &AuthConfig, user: &User) -> Result<String, AppError> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user.id.clone(),
        org: user.organization_id.clone(),
        role: user.role,
        iat: now,
        exp: now + config.token_ttl_hours * 3600,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;
    Ok(token)
}

pub fn verify_token(config: &AuthConfig, token: &str) -> Result<Claims, AppError> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::unauthorized(format!("invalid token: {e}")))
}

fn bearer(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Axum middleware for the protected part of the router.
pub async fn require_auth(State(app): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = bearer(&req).map(str::to_string);
    match authenticate(&app, token).await {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}

async fn authenticate(app: &AppState, token: Option<String>) -> Result<AuthUser, AppError> {
    let token = token.ok_or_else(|| AppError::unauthorized("missing bearer token"))?;
    let claims = verify_token(&app.config.auth, &token)?;

    let (user_id, org_id) = (claims.sub.clone(), claims.org.clone());
    let (user, org) = app
        .db(move |conn| {
            let user = User::get(conn, &org_id, &user_id)?;
            let org = Organization::get(conn, &org_id)?;
            Ok((user, org))
        })
        .await
        .map_err(|_| AppError::unauthorized("token subject no longer exists"))?;
    if !org.is_active {
        return Err(AppError::unauthorized("organization is deactivated"));
    }
    if user.status != UserStatus::Active {
        return Err(AppError::unauthorized(format!("account is {}", user.status)));
    }

    // The stored role wins so demotions take effect before the token expires.
    Ok(AuthUser {
        user_id: user.id,
        organization_id: user.organization_id,
        role: user.role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        let now = chrono::Utc::now();
        User {
            id: "u1".into(),
            organization_id: "o1".into(),
            email: "a@b.co".into(),
            password_hash: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            role: Role::Manager,
            status: UserStatus::Active,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn token_round_trip() {
        let config = AuthConfig::default();
        let token = issue_token(&config, &user()).unwrap();
        let claims = verify_token(&config, &token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.org, "o1");
        assert_eq!(claims.role, Role::Manager);
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let config = AuthConfig::default();
        let token = issue_token(&config, &user()).unwrap();
        let other = AuthConfig {
            jwt_secret: "another-secret-of-sufficient-length".into(),
            ..AuthConfig::default()
        };
        assert!(verify_token(&other, &token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = AuthConfig {
            token_ttl_hours: -1,
            ..AuthConfig::default()
        };
        let token = issue_token(&config, &user()).unwrap();
        assert!(verify_token(&AuthConfig::default(), &token).is_err());
    }

    #[test]
    fn permission_check() {
        let viewer = AuthUser {
            user_id: "u".into(),
            organization_id: "o".into(),
            role: Role::Viewer,
        };
        assert!(viewer.require(Permission::ViewProjects).is_ok());
        assert!(viewer.require(Permission::ManageProjects).is_err());
    }
}
