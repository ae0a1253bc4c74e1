use crate::audit::{self, AuditEntry};
use crate::db::{self, optional};
use crate::error::{ConsultifyError, Result};
use crate::types::Provider;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

const SELECT_SQL: &str = "SELECT id, organization_id, provider, api_key, model, base_url, is_active,
    created_at, updated_at
FROM integration_configs";

/// Tenant-owned credentials for a third-party provider.
#[derive(Debug, Clone)]
pub struct IntegrationConfig {
    pub id: String,
    pub organization_id: String,
    pub provider: Provider,
    pub api_key: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What the API shows: the key is never returned in full.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrationView {
    pub provider: Provider,
    pub api_key: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntegrationInput {
    pub provider: Provider,
    /// Omit to keep the stored key when updating other fields.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// `sk-proj-abcdefgh1234` → `sk-…1234`. Short keys are fully hidden.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}

impl IntegrationConfig {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            organization_id: row.get(1)?,
            provider: row.get(2)?,
            api_key: row.get(3)?,
            model: row.get(4)?,
            base_url: row.get(5)?,
            is_active: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    pub fn view(&self) -> IntegrationView {
        IntegrationView {
            provider: self.provider,
            api_key: mask_key(&self.api_key),
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            is_active: self.is_active,
            updated_at: self.updated_at,
        }
    }

    pub fn get(
        conn: &Connection,
        organization_id: &str,
        provider: Provider,
    ) -> Result<Option<Self>> {
        let sql = format!("{SELECT_SQL} WHERE organization_id = ?1 AND provider = ?2");
        optional(conn.query_row(&sql, params![organization_id, provider], Self::from_row))
    }

    /// The provider's config only when it is switched on.
    pub fn active(
        conn: &Connection,
        organization_id: &str,
        provider: Provider,
    ) -> Result<Option<Self>> {
        Ok(Self::get(conn, organization_id, provider)?.filter(|c| c.is_active))
    }

    pub fn list(conn: &Connection, organization_id: &str) -> Result<Vec<Self>> {
        let sql = format!("{SELECT_SQL} WHERE organization_id = ?1 ORDER BY provider");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![organization_id], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Insert or update the config for `input.provider`. A new config needs a key.
    pub fn upsert(
        conn: &Connection,
        organization_id: &str,
        actor: Option<&str>,
        input: &IntegrationInput,
    ) -> Result<Self> {
        let api_key = input
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty());
        let now = db::now();
        let config = match Self::get(conn, organization_id, input.provider)? {
            Some(mut existing) => {
                if let Some(key) = api_key {
                    existing.api_key = key.to_string();
                }
                if input.model.is_some() {
                    existing.model = input.model.clone();
                }
                if input.base_url.is_some() {
                    existing.base_url = input.base_url.clone();
                }
                if let Some(active) = input.is_active {
                    existing.is_active = active;
                }
                existing.updated_at = now;
                conn.execute(
                    "UPDATE integration_configs SET api_key = ?2, model = ?3, base_url = ?4,
                        is_active = ?5, updated_at = ?6
                     WHERE id = ?1",
                    params![
                        existing.id,
                        existing.api_key,
                        existing.model,
                        existing.base_url,
                        existing.is_active,
                        existing.updated_at
                    ],
                )?;
                existing
            }
            None => {
                let key = api_key.ok_or_else(|| {
                    ConsultifyError::validation(format!(
                        "api_key is required for {}",
                        input.provider
                    ))
                })?;
                let config = IntegrationConfig {
                    id: db::new_id(),
                    organization_id: organization_id.to_string(),
                    provider: input.provider,
                    api_key: key.to_string(),
                    model: input.model.clone(),
                    base_url: input.base_url.clone(),
                    is_active: input.is_active.unwrap_or(true),
                    created_at: now,
                    updated_at: now,
                };
                conn.execute(
                    "INSERT INTO integration_configs (id, organization_id, provider, api_key, model,
                        base_url, is_active, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        config.id,
                        config.organization_id,
                        config.provider,
                        config.api_key,
                        config.model,
                        config.base_url,
                        config.is_active,
                        config.created_at,
                        config.updated_at
                    ],
                )?;
                config
            }
        };

        let mut entry = AuditEntry::new(organization_id, "integration.upsert", "integration")
            .entity(&config.id)
            .details(serde_json::json!({
                "provider": config.provider,
                "is_active": config.is_active,
                "key_changed": api_key.is_some(),
            }));
        entry.user_id = actor;
        audit::record(conn, entry)?;
        Ok(config)
    }

    pub fn delete(
        conn: &Connection,
        organization_id: &str,
        actor: Option<&str>,
        provider: Provider,
    ) -> Result<()> {
        let config = Self::get(conn, organization_id, provider)?
            .ok_or_else(|| ConsultifyError::IntegrationNotFound(provider.to_string()))?;
        conn.execute("DELETE FROM integration_configs WHERE id = ?1", params![config.id])?;
        let mut entry = AuditEntry::new(organization_id, "integration.delete", "integration")
            .entity(&config.id)
            .details(serde_json::json!({ "provider": provider }));
        entry.user_id = actor;
        audit::record(conn, entry)?;
        Ok(())
    }
}
