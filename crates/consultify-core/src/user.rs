use crate::db::{self, optional};
use crate::error::{ConsultifyError, Result};
use crate::password;
use crate::types::{Role, UserStatus};
use chrono::{DateTime, Utc};
use regex::Regex;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

const SELECT_SQL: &str = "SELECT id, organization_id, email, password_hash, first_name, last_name,
    role, status, last_login_at, created_at, updated_at
FROM users";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub organization_id: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub status: UserStatus,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
}

impl User {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            organization_id: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            first_name: row.get(4)?,
            last_name: row.get(5)?,
            role: row.get(6)?,
            status: row.get(7)?,
            last_login_at: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.email.clone()
        } else {
            full.to_string()
        }
    }

    pub fn create(
        conn: &Connection,
        organization_id: &str,
        new: &NewUser,
        password_min_length: usize,
    ) -> Result<User> {
        let email = normalize_email(&new.email)?;
        if new.password.chars().count() < password_min_length {
            return Err(ConsultifyError::validation(format!(
                "password must be at least {password_min_length} characters"
            )));
        }
        if Self::find_by_email(conn, &email)?.is_some() {
            return Err(ConsultifyError::EmailTaken(email));
        }

        let now = db::now();
        let user = User {
            id: db::new_id(),
            organization_id: organization_id.to_string(),
            email,
            password_hash: password::hash_password(&new.password)?,
            first_name: new.first_name.trim().to_string(),
            last_name: new.last_name.trim().to_string(),
            role: new.role,
            status: UserStatus::Active,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        conn.execute(
            "INSERT INTO users (id, organization_id, email, password_hash, first_name, last_name,
                role, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                user.id,
                user.organization_id,
                user.email,
                user.password_hash,
                user.first_name,
                user.last_name,
                user.role,
                user.status,
                user.created_at,
                user.updated_at
            ],
        )?;
        Ok(user)
    }

    /// Fetch a user inside `organization_id`. Users of other tenants are not found.
    pub fn get(conn: &Connection, organization_id: &str, id: &str) -> Result<User> {
        let sql = format!("{SELECT_SQL} WHERE id = ?1 AND organization_id = ?2");
        optional(conn.query_row(&sql, params![id, organization_id], Self::from_row))?
            .ok_or_else(|| ConsultifyError::UserNotFound(id.to_string()))
    }

    /// Tenant-agnostic lookup, used by authentication only.
    pub fn get_any(conn: &Connection, id: &str) -> Result<User> {
        let sql = format!("{SELECT_SQL} WHERE id = ?1");
        optional(conn.query_row(&sql, params![id], Self::from_row))?
            .ok_or_else(|| ConsultifyError::UserNotFound(id.to_string()))
    }

    pub fn find_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
        let sql = format!("{SELECT_SQL} WHERE email = ?1");
        optional(conn.query_row(&sql, params![email.trim()], Self::from_row))
    }

    pub fn list(conn: &Connection, organization_id: &str) -> Result<Vec<User>> {
        let sql = format!("{SELECT_SQL} WHERE organization_id = ?1 ORDER BY email");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![organization_id], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn update(
        conn: &Connection,
        organization_id: &str,
        id: &str,
        patch: &UserPatch,
    ) -> Result<User> {
        let mut user = Self::get(conn, organization_id, id)?;
        if let Some(first) = &patch.first_name {
            user.first_name = first.trim().to_string();
        }
        if let Some(last) = &patch.last_name {
            user.last_name = last.trim().to_string();
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        if let Some(status) = patch.status {
            user.status = status;
        }
        user.updated_at = db::now();
        conn.execute(
            "UPDATE users SET first_name = ?2, last_name = ?3, role = ?4, status = ?5,
                updated_at = ?6
             WHERE id = ?1",
            params![
                user.id,
                user.first_name,
                user.last_name,
                user.role,
                user.status,
                user.updated_at
            ],
        )?;
        Ok(user)
    }

    pub fn set_password(
        conn: &Connection,
        organization_id: &str,
        id: &str,
        new_password: &str,
        password_min_length: usize,
    ) -> Result<()> {
        if new_password.chars().count() < password_min_length {
            return Err(ConsultifyError::validation(format!(
                "password must be at least {password_min_length} characters"
            )));
        }
        let user = Self::get(conn, organization_id, id)?;
        conn.execute(
            "UPDATE users SET password_hash = ?2, updated_at = ?3 WHERE id = ?1",
            params![user.id, password::hash_password(new_password)?, db::now()],
        )?;
        Ok(())
    }

    pub fn record_login(conn: &Connection, id: &str) -> Result<DateTime<Utc>> {
        let now = db::now();
        conn.execute(
            "UPDATE users SET last_login_at = ?2 WHERE id = ?1",
            params![id, now],
        )?;
        Ok(now)
    }
}

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_re() -> &'static Regex {
    EMAIL_RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap())
}

/// Trim and lowercase `email`, rejecting anything not shaped like `local@domain.tld`.
pub fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    if email_re().is_match(&email) {
        Ok(email)
    } else {
        Err(ConsultifyError::invalid("email", email))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::organization::Organization;
    use crate::types::Plan;

    fn new_user(email: &str, role: Role) -> NewUser {
        NewUser {
            email: email.to_string(),
            password: "s3cret-pass".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            role,
        }
    }

    #[test]
    fn normalize_email_lowercases_and_validates() {
        assert_eq!(normalize_email("  Ada@Example.COM ").unwrap(), "ada@example.com");
        assert!(normalize_email("not-an-email").is_err());
        assert!(normalize_email("a@b").is_err());
    }

    #[test]
    fn create_hashes_password_and_hides_it() {
        let conn = db::open_in_memory().unwrap();
        let org = Organization::create(&conn, "Acme", Plan::Free).unwrap();
        let user = User::create(&conn, &org.id, &new_user("ada@acme.io", Role::Admin), 8).unwrap();
        assert!(password::verify_password("s3cret-pass", &user.password_hash));

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "ADMIN");
    }

    #[test]
    fn duplicate_email_is_rejected_case_insensitively() {
        let conn = db::open_in_memory().unwrap();
        let org = Organization::create(&conn, "Acme", Plan::Free).unwrap();
        User::create(&conn, &org.id, &new_user("ada@acme.io", Role::User), 8).unwrap();
        let err =
            User::create(&conn, &org.id, &new_user("ADA@acme.io", Role::User), 8).unwrap_err();
        assert!(matches!(err, ConsultifyError::EmailTaken(_)));
    }

    #[test]
    fn short_password_rejected() {
        let conn = db::open_in_memory().unwrap();
        let org = Organization::create(&conn, "Acme", Plan::Free).unwrap();
        let mut nu = new_user("bob@acme.io", Role::User);
        nu.password = "short".to_string();
        assert!(matches!(
            User::create(&conn, &org.id, &nu, 8),
            Err(ConsultifyError::Validation(_))
        ));
    }

    #[test]
    fn get_is_tenant_scoped() {
        let conn = db::open_in_memory().unwrap();
        let acme = Organization::create(&conn, "Acme", Plan::Free).unwrap();
        let globex = Organization::create(&conn, "Globex", Plan::Free).unwrap();
        let user = User::create(&conn, &acme.id, &new_user("ada@acme.io", Role::User), 8).unwrap();

        assert!(User::get(&conn, &acme.id, &user.id).is_ok());
        assert!(matches!(
            User::get(&conn, &globex.id, &user.id),
            Err(ConsultifyError::UserNotFound(_))
        ));
    }

    #[test]
    fn update_role_and_status() {
        let conn = db::open_in_memory().unwrap();
        let org = Organization::create(&conn, "Acme", Plan::Free).unwrap();
        let user = User::create(&conn, &org.id, &new_user("ada@acme.io", Role::User), 8).unwrap();
        let patch = UserPatch {
            role: Some(Role::Manager),
            status: Some(UserStatus::Disabled),
            ..Default::default()
        };
        let updated = User::update(&conn, &org.id, &user.id, &patch).unwrap();
        assert_eq!(updated.role, Role::Manager);
        assert_eq!(updated.status, UserStatus::Disabled);
        assert_eq!(updated.display_name(), "Ada Lovelace");
    }
}
