use crate::db::{self, optional};
use crate::error::{ConsultifyError, Result};
use crate::types::Plan;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

const SELECT_SQL: &str = "SELECT id, name, slug, plan, token_balance, is_active, created_at,
    updated_at
FROM organizations";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub plan: Plan,
    pub token_balance: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrganizationPatch {
    pub name: Option<String>,
    pub plan: Option<Plan>,
    pub is_active: Option<bool>,
}

impl Organization {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            slug: row.get(2)?,
            plan: row.get(3)?,
            token_balance: row.get(4)?,
            is_active: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    /// Create an organization with a slug derived from `name`.
    ///
    /// Slug collisions get a numeric suffix (`acme`, `acme-2`, `acme-3`, ...).
    /// The balance starts at zero; grants go through the billing ledger.
    pub fn create(conn: &Connection, name: &str, plan: Plan) -> Result<Organization> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ConsultifyError::validation("organization name is required"));
        }
        let slug = unique_slug(conn, &slugify(name))?;
        let now = db::now();
        let org = Organization {
            id: db::new_id(),
            name: name.to_string(),
            slug,
            plan,
            token_balance: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        conn.execute(
            "INSERT INTO organizations (id, name, slug, plan, token_balance, is_active, created_at,
                updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                org.id,
                org.name,
                org.slug,
                org.plan,
                org.token_balance,
                org.is_active,
                org.created_at,
                org.updated_at
            ],
        )?;
        Ok(org)
    }

    pub fn get(conn: &Connection, id: &str) -> Result<Organization> {
        let sql = format!("{SELECT_SQL} WHERE id = ?1");
        optional(conn.query_row(&sql, params![id], Self::from_row))?
            .ok_or_else(|| ConsultifyError::OrganizationNotFound(id.to_string()))
    }

    pub fn find_by_slug(conn: &Connection, slug: &str) -> Result<Option<Organization>> {
        let sql = format!("{SELECT_SQL} WHERE slug = ?1");
        optional(conn.query_row(&sql, params![slug], Self::from_row))
    }

    pub fn list(conn: &Connection) -> Result<Vec<Organization>> {
        let sql = format!("{SELECT_SQL} ORDER BY created_at, name");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn update(conn: &Connection, id: &str, patch: &OrganizationPatch) -> Result<Organization> {
        let mut org = Self::get(conn, id)?;
        if let Some(name) = &patch.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(ConsultifyError::validation("organization name is required"));
            }
            org.name = name.to_string();
        }
        if let Some(plan) = patch.plan {
            org.plan = plan;
        }
        if let Some(active) = patch.is_active {
            org.is_active = active;
        }
        org.updated_at = db::now();
        conn.execute(
            "UPDATE organizations SET name = ?2, plan = ?3, is_active = ?4, updated_at = ?5
             WHERE id = ?1",
            params![org.id, org.name, org.plan, org.is_active, org.updated_at],
        )?;
        Ok(org)
    }
}

/// Lowercase, hyphen-separated slug. Never empty.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        "org".to_string()
    } else {
        slug
    }
}

fn unique_slug(conn: &Connection, base: &str) -> Result<String> {
    let mut candidate = base.to_string();
    let mut n = 1;
    while Organization::find_by_slug(conn, &candidate)?.is_some() {
        n += 1;
        candidate = format!("{base}-{n}");
    }
    Ok(candidate)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
