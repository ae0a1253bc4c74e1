use crate::audit::{self, AuditEntry};
use crate::db::{self, optional, with_transaction};
use crate::error::{ConsultifyError, Result};
use crate::types::{AiRole, ProjectStatus};
use crate::user::User;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

const SELECT_SQL: &str = "SELECT id, organization_id, name, description, status, owner_id, ai_role,
    regulatory_mode, created_at, updated_at
FROM projects";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub description: String,
    pub status: ProjectStatus,
    pub owner_id: Option<String>,
    pub ai_role: AiRole,
    pub regulatory_mode: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub ai_role: Option<AiRole>,
    #[serde(default)]
    pub regulatory_mode: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub owner_id: Option<String>,
    pub ai_role: Option<AiRole>,
    pub regulatory_mode: Option<bool>,
}

impl Project {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            organization_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            status: row.get(4)?,
            owner_id: row.get(5)?,
            ai_role: row.get(6)?,
            regulatory_mode: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    pub fn create(conn: &Connection, organization_id: &str, new: &NewProject) -> Result<Project> {
        let name = required_name(&new.name)?;
        if let Some(owner) = &new.owner_id {
            User::get(conn, organization_id, owner)?;
        }
        let now = db::now();
        let project = Project {
            id: db::new_id(),
            organization_id: organization_id.to_string(),
            name,
            description: new.description.trim().to_string(),
            status: ProjectStatus::Active,
            owner_id: new.owner_id.clone(),
            ai_role: new.ai_role.unwrap_or(AiRole::Advisor),
            regulatory_mode: new.regulatory_mode,
            created_at: now,
            updated_at: now,
        };
        conn.execute(
            "INSERT INTO projects (id, organization_id, name, description, status, owner_id,
                ai_role, regulatory_mode, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                project.id,
                project.organization_id,
                project.name,
                project.description,
                project.status,
                project.owner_id,
                project.ai_role,
                project.regulatory_mode,
                project.created_at,
                project.updated_at
            ],
        )?;
        Ok(project)
    }

    /// Soft-deleted projects and projects of other tenants are not found.
    pub fn get(conn: &Connection, organization_id: &str, id: &str) -> Result<Project> {
        let sql = format!("{SELECT_SQL} WHERE id = ?1 AND organization_id = ?2 AND is_deleted = 0");
        optional(conn.query_row(&sql, params![id, organization_id], Self::from_row))?
            .ok_or_else(|| ConsultifyError::ProjectNotFound(id.to_string()))
    }

    pub fn list(conn: &Connection, organization_id: &str) -> Result<Vec<Project>> {
        let sql = format!(
            "{SELECT_SQL} WHERE organization_id = ?1 AND is_deleted = 0 ORDER BY created_at, name"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![organization_id], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Apply `patch`. Changes to the AI role or regulatory mode are audited
    /// because they widen or narrow what the assistant may do.
    pub fn update(
        conn: &Connection,
        organization_id: &str,
        id: &str,
        patch: &ProjectPatch,
        actor: Option<&str>,
    ) -> Result<Project> {
        let mut project = Self::get(conn, organization_id, id)?;
        let before_role = project.ai_role;
        let before_regulatory = project.regulatory_mode;

        if let Some(name) = &patch.name {
            project.name = required_name(name)?;
        }
        if let Some(description) = &patch.description {
            project.description = description.trim().to_string();
        }
        if let Some(status) = patch.status {
            project.status = status;
        }
        match patch.owner_id.as_deref() {
            None => {}
            Some("") => project.owner_id = None,
            Some(owner) => {
                User::get(conn, organization_id, owner)?;
                project.owner_id = Some(owner.to_string());
            }
        }
        if let Some(role) = patch.ai_role {
            project.ai_role = role;
        }
        if let Some(regulatory) = patch.regulatory_mode {
            project.regulatory_mode = regulatory;
        }
        project.updated_at = db::now();

        conn.execute(
            "UPDATE projects SET name = ?2, description = ?3, status = ?4, owner_id = ?5,
                ai_role = ?6, regulatory_mode = ?7, updated_at = ?8
             WHERE id = ?1",
            params![
                project.id,
                project.name,
                project.description,
                project.status,
                project.owner_id,
                project.ai_role,
                project.regulatory_mode,
                project.updated_at
            ],
        )?;

        if before_role != project.ai_role || before_regulatory != project.regulatory_mode {
            let mut entry = AuditEntry::new(organization_id, "project.ai_policy", "project")
                .entity(&project.id)
                .details(serde_json::json!({
                    "ai_role": { "from": before_role, "to": project.ai_role },
                    "regulatory_mode": { "from": before_regulatory, "to": project.regulatory_mode },
                }));
            entry.user_id = actor;
            audit::record(conn, entry)?;
        }
        Ok(project)
    }

    pub fn soft_delete(conn: &Connection, organization_id: &str, id: &str) -> Result<()> {
        let project = Self::get(conn, organization_id, id)?;
        let now = db::now();
        with_transaction(conn, |tx| {
            tx.execute(
                "UPDATE projects SET is_deleted = 1, updated_at = ?2 WHERE id = ?1",
                params![project.id, now],
            )?;
            tx.execute(
                "UPDATE tasks SET is_deleted = 1, updated_at = ?2 WHERE project_id = ?1",
                params![project.id, now],
            )?;
            tx.execute(
                "UPDATE initiatives SET is_deleted = 1, updated_at = ?2 WHERE project_id = ?1",
                params![project.id, now],
            )?;
            Ok(())
        })
    }
}

fn required_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ConsultifyError::validation("project name is required"));
    }
    Ok(name.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditFilter;
    use crate::organization::Organization;
    use crate::types::Plan;

    fn setup() -> (Connection, String) {
        let conn = db::open_in_memory().unwrap();
        let org = Organization::create(&conn, "Acme", Plan::Free).unwrap();
        (conn, org.id)
    }

    #[test]
    fn create_defaults_to_advisor() {
        let (conn, org) = setup();
        let project = Project::create(
            &conn,
            &org,
            &NewProject {
                name: "  Digital Pilot ".into(),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(project.name, "Digital Pilot");
        assert_eq!(project.ai_role, AiRole::Advisor);
        assert!(!project.regulatory_mode);
        assert_eq!(Project::list(&conn, &org).unwrap().len(), 1);
    }

    #[test]
    fn unknown_owner_rejected() {
        let (conn, org) = setup();
        let err = Project::create(
            &conn,
            &org,
            &NewProject {
                name: "P".into(),
                owner_id: Some("ghost".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, ConsultifyError::UserNotFound(_)));
    }

    #[test]
    fn ai_policy_changes_are_audited() {
        let (conn, org) = setup();
        let project = Project::create(
            &conn,
            &org,
            &NewProject {
                name: "P".into(),
                ..Default::default()
            },
        )
        .unwrap();

        Project::update(
            &conn,
            &org,
            &project.id,
            &ProjectPatch {
                description: Some("new".into()),
                ..Default::default()
            },
            None,
        )
        .unwrap();
        let updated = Project::update(
            &conn,
            &org,
            &project.id,
            &ProjectPatch {
                ai_role: Some(AiRole::Operator),
                regulatory_mode: Some(true),
                ..Default::default()
            },
            None,
        )
        .unwrap();
        assert_eq!(updated.ai_role, AiRole::Operator);
        assert!(updated.regulatory_mode);

        let log = audit::list(&conn, &org, &AuditFilter::default()).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action, "project.ai_policy");
        assert_eq!(log[0].details.as_ref().unwrap()["ai_role"]["to"], "OPERATOR");
    }

    #[test]
    fn soft_deleted_project_disappears() {
        let (conn, org) = setup();
        let project = Project::create(
            &conn,
            &org,
            &NewProject {
                name: "P".into(),
                ..Default::default()
            },
        )
        .unwrap();
        Project::soft_delete(&conn, &org, &project.id).unwrap();
        assert!(matches!(
            Project::get(&conn, &org, &project.id),
            Err(ConsultifyError::ProjectNotFound(_))
        ));
        assert!(Project::list(&conn, &org).unwrap().is_empty());
    }

    #[test]
    fn other_tenant_cannot_see_project() {
        let (conn, org) = setup();
        let other = Organization::create(&conn, "Other", Plan::Free).unwrap();
        let project = Project::create(
            &conn,
            &org,
            &NewProject {
                name: "P".into(),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(Project::get(&conn, &other.id, &project.id).is_err());
    }

    #[test]
    fn empty_owner_clears_it() {
        let (conn, org) = setup();
        let owner = User::create(
            &conn,
            &org,
            &crate::user::NewUser {
                email: "owner@acme.io".into(),
                password: "password123".into(),
                first_name: String::new(),
                last_name: String::new(),
                role: crate::types::Role::Manager,
            },
            8,
        )
        .unwrap();
        let project = Project::create(
            &conn,
            &org,
            &NewProject {
                name: "P".into(),
                owner_id: Some(owner.id.clone()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(project.owner_id.as_deref(), Some(owner.id.as_str()));

        let cleared = Project::update(
            &conn,
            &org,
            &project.id,
            &ProjectPatch {
                owner_id: Some(String::new()),
                ..Default::default()
            },
            None,
        )
        .unwrap();
        assert_eq!(cleared.owner_id, None);
    }
}
