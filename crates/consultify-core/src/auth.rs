//! Tenant registration and credential checks.

use crate::audit::{self, AuditEntry};
use crate::billing;
use crate::config::AppConfig;
use crate::db::with_transaction;
use crate::error::{ConsultifyError, Result};
use crate::organization::Organization;
use crate::password;
use crate::types::{Plan, Role, UserStatus};
use crate::user::{NewUser, User};
use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub organization_name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Create an organization, its first ADMIN user, and the signup token grant.
pub fn register_organization(
    conn: &Connection,
    config: &AppConfig,
    registration: &Registration,
) -> Result<(Organization, User)> {
    with_transaction(conn, |tx| {
        let org = Organization::create(tx, &registration.organization_name, Plan::Free)?;
        let user = User::create(
            tx,
            &org.id,
            &NewUser {
                email: registration.email.clone(),
                password: registration.password.clone(),
                first_name: registration.first_name.clone(),
                last_name: registration.last_name.clone(),
                role: Role::Admin,
            },
            config.auth.password_min_length,
        )?;
        if config.billing.signup_grant > 0 {
            billing::credit(
                tx,
                &org.id,
                Some(&user.id),
                config.billing.signup_grant,
                "signup grant",
            )?;
        }
        audit::record(
            tx,
            AuditEntry::new(&org.id, "organization.register", "organization")
                .by(&user.id)
                .entity(&org.id),
        )?;
        let org = Organization::get(tx, &org.id)?;
        tracing::info!(organization_id = %org.id, slug = %org.slug, "organization registered");
        Ok((org, user))
    })
}

/// Verify credentials and stamp `last_login_at`.
///
/// Unknown email and wrong password produce the same error.
pub fn authenticate(conn: &Connection, email: &str, password_plain: &str) -> Result<User> {
    let invalid = || ConsultifyError::Unauthorized("invalid email or password".to_string());

    let email = email.trim().to_lowercase();
    let mut user = User::find_by_email(conn, &email)?.ok_or_else(invalid)?;
    if !password::verify_password(password_plain, &user.password_hash) {
        return Err(invalid());
    }
    if user.status != UserStatus::Active {
        return Err(ConsultifyError::Unauthorized(format!(
            "account is {}",
            user.status
        )));
    }
    let org = Organization::get(conn, &user.organization_id)?;
    if !org.is_active {
        return Err(ConsultifyError::Unauthorized(
            "organization is deactivated".to_string(),
        ));
    }
    user.last_login_at = Some(User::record_login(conn, &user.id)?);
    Ok(user)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
