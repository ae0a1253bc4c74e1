pub mod ai;
pub mod analytics;
pub mod assessments;
pub mod audit;
pub mod auth;
pub mod billing;
pub mod change_requests;
pub mod demo;
pub mod health;
pub mod initiatives;
pub mod integrations;
pub mod organizations;
pub mod projects;
pub mod reports;
pub mod roadmap;
pub mod tasks;
pub mod users;

use serde::Deserialize;

/// `?limit=&offset=` for list endpoints.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Page {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    50
}

impl Page {
    /// Clamp to 1..=500.
    pub fn limit(&self) -> u32 {
        self.limit.clamp(1, 500)
    }
}

/// Audit a plain entity mutation by the caller.
pub(crate) fn record(
    conn: &rusqlite::Connection,
    auth: &crate::auth::AuthUser,
    action: &str,
    entity_type: &str,
    entity_id: &str,
) -> consultify_core::Result<()> {
    consultify_core::audit::record(
        conn,
        consultify_core::audit::AuditEntry::new(&auth.organization_id, action, entity_type)
            .by(&auth.user_id)
            .entity(entity_id),
    )?;
    Ok(())
}
