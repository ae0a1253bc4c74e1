use crate::db::{self, optional, with_transaction};
use crate::error::{ConsultifyError, Result};
use crate::project::Project;
use crate::types::InitiativeStatus;
use crate::user::User;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::{Deserialize, Serialize};

const SELECT_SQL: &str = "SELECT id, organization_id, project_id, name, summary, axis, status,
    owner_id, start_date, end_date, budget, expected_roi, created_at, updated_at
FROM initiatives";

/// A transformation initiative, optionally tied to one of the seven DRD axes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Initiative {
    pub id: String,
    pub organization_id: String,
    pub project_id: String,
    pub name: String,
    pub summary: String,
    pub axis: Option<u8>,
    pub status: InitiativeStatus,
    pub owner_id: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<f64>,
    pub expected_roi: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewInitiative {
    pub name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub axis: Option<u8>,
    #[serde(default)]
    pub status: Option<InitiativeStatus>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub expected_roi: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitiativePatch {
    pub name: Option<String>,
    pub summary: Option<String>,
    pub axis: Option<u8>,
    pub status: Option<InitiativeStatus>,
    pub owner_id: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<f64>,
    pub expected_roi: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitiativeFilter {
    pub project_id: Option<String>,
    pub status: Option<InitiativeStatus>,
}

impl Initiative {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            organization_id: row.get(1)?,
            project_id: row.get(2)?,
            name: row.get(3)?,
            summary: row.get(4)?,
            axis: row.get(5)?,
            status: row.get(6)?,
            owner_id: row.get(7)?,
            start_date: row.get(8)?,
            end_date: row.get(9)?,
            budget: row.get(10)?,
            expected_roi: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }

    pub fn create(
        conn: &Connection,
        organization_id: &str,
        project_id: &str,
        new: &NewInitiative,
    ) -> Result<Initiative> {
        let project = Project::get(conn, organization_id, project_id)?;
        if let Some(owner) = &new.owner_id {
            User::get(conn, organization_id, owner)?;
        }
        let now = db::now();
        let initiative = Initiative {
            id: db::new_id(),
            organization_id: organization_id.to_string(),
            project_id: project.id,
            name: new.name.trim().to_string(),
            summary: new.summary.trim().to_string(),
            axis: new.axis,
            status: new.status.unwrap_or(InitiativeStatus::Draft),
            owner_id: new.owner_id.clone(),
            start_date: new.start_date,
            end_date: new.end_date,
            budget: new.budget,
            expected_roi: new.expected_roi,
            created_at: now,
            updated_at: now,
        };
        initiative.validate()?;
        conn.execute(
            "INSERT INTO initiatives (id, organization_id, project_id, name, summary, axis, status,
                owner_id, start_date, end_date, budget, expected_roi, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                initiative.id,
                initiative.organization_id,
                initiative.project_id,
                initiative.name,
                initiative.summary,
                initiative.axis,
                initiative.status,
                initiative.owner_id,
                initiative.start_date,
                initiative.end_date,
                initiative.budget,
                initiative.expected_roi,
                initiative.created_at,
                initiative.updated_at
            ],
        )?;
        Ok(initiative)
    }

    pub fn get(conn: &Connection, organization_id: &str, id: &str) -> Result<Initiative> {
        let sql = format!("{SELECT_SQL} WHERE id = ?1 AND organization_id = ?2 AND is_deleted = 0");
        optional(conn.query_row(&sql, params![id, organization_id], Self::from_row))?
            .ok_or_else(|| ConsultifyError::InitiativeNotFound(id.to_string()))
    }

    pub fn list(
        conn: &Connection,
        organization_id: &str,
        filter: &InitiativeFilter,
    ) -> Result<Vec<Initiative>> {
        let mut sql = format!("{SELECT_SQL} WHERE organization_id = ? AND is_deleted = 0");
        let mut args: Vec<Value> = vec![Value::Text(organization_id.to_string())];
        if let Some(project) = &filter.project_id {
            sql.push_str(" AND project_id = ?");
            args.push(Value::Text(project.clone()));
        }
        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            args.push(Value::Text(status.as_str().to_string()));
        }
        sql.push_str(" ORDER BY start_date IS NULL, start_date, name");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(args), Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn update(
        conn: &Connection,
        organization_id: &str,
        id: &str,
        patch: &InitiativePatch,
    ) -> Result<Initiative> {
        let mut initiative = Self::get(conn, organization_id, id)?;
        if let Some(name) = &patch.name {
            initiative.name = name.trim().to_string();
        }
        if let Some(summary) = &patch.summary {
            initiative.summary = summary.trim().to_string();
        }
        if patch.axis.is_some() {
            initiative.axis = patch.axis;
        }
        if let Some(status) = patch.status {
            initiative.status = status;
        }
        match patch.owner_id.as_deref() {
            None => {}
            Some("") => initiative.owner_id = None,
            Some(owner) => {
                User::get(conn, organization_id, owner)?;
                initiative.owner_id = Some(owner.to_string());
            }
        }
        if patch.start_date.is_some() {
            initiative.start_date = patch.start_date;
        }
        if patch.end_date.is_some() {
            initiative.end_date = patch.end_date;
        }
        if patch.budget.is_some() {
            initiative.budget = patch.budget;
        }
        if patch.expected_roi.is_some() {
            initiative.expected_roi = patch.expected_roi;
        }
        initiative.validate()?;
        initiative.updated_at = db::now();

        conn.execute(
            "UPDATE initiatives SET name = ?2, summary = ?3, axis = ?4, status = ?5, owner_id = ?6,
                start_date = ?7, end_date = ?8, budget = ?9, expected_roi = ?10, updated_at = ?11
             WHERE id = ?1",
            params![
                initiative.id,
                initiative.name,
                initiative.summary,
                initiative.axis,
                initiative.status,
                initiative.owner_id,
                initiative.start_date,
                initiative.end_date,
                initiative.budget,
                initiative.expected_roi,
                initiative.updated_at
            ],
        )?;
        Ok(initiative)
    }

    /// Soft delete. Tasks linked to the initiative keep existing but lose the link.
    pub fn soft_delete(conn: &Connection, organization_id: &str, id: &str) -> Result<()> {
        let initiative = Self::get(conn, organization_id, id)?;
        let now = db::now();
        with_transaction(conn, |tx| {
            tx.execute(
                "UPDATE initiatives SET is_deleted = 1, updated_at = ?2 WHERE id = ?1",
                params![initiative.id, now],
            )?;
            tx.execute(
                "UPDATE tasks SET initiative_id = NULL, updated_at = ?2 WHERE initiative_id = ?1",
                params![initiative.id, now],
            )?;
            Ok(())
        })
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ConsultifyError::validation("initiative name is required"));
        }
        if let Some(axis) = self.axis {
            if !(1..=7).contains(&axis) {
                return Err(ConsultifyError::invalid("axis", axis.to_string()));
            }
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(ConsultifyError::validation(
                    "initiative end_date precedes start_date",
                ));
            }
        }
        if self.budget.is_some_and(|b| b < 0.0 || !b.is_finite()) {
            return Err(ConsultifyError::validation("budget must be a non-negative number"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::organization::Organization;
    use crate::project::NewProject;
    use crate::types::Plan;

    fn setup() -> (Connection, String, String) {
        let conn = db::open_in_memory().unwrap();
        let org = Organization::create(&conn, "Acme", Plan::Free).unwrap();
        let project = Project::create(
            &conn,
            &org.id,
            &NewProject {
                name: "Pilot".into(),
                ..Default::default()
            },
        )
        .unwrap();
        (conn, org.id, project.id)
    }

    fn named(name: &str) -> NewInitiative {
        NewInitiative {
            name: name.into(),
            ..Default::default()
        }
    }

    #[test]
    fn create_and_filter_by_status() {
        let (conn, org, project) = setup();
        Initiative::create(&conn, &org, &project, &named("ERP rollout")).unwrap();
        Initiative::create(
            &conn,
            &org,
            &project,
            &NewInitiative {
                status: Some(InitiativeStatus::Planned),
                axis: Some(4),
                ..named("Data lake")
            },
        )
        .unwrap();

        let planned = Initiative::list(
            &conn,
            &org,
            &InitiativeFilter {
                status: Some(InitiativeStatus::Planned),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].axis, Some(4));
    }

    #[test]
    fn axis_out_of_range_rejected() {
        let (conn, org, project) = setup();
        let err = Initiative::create(
            &conn,
            &org,
            &project,
            &NewInitiative {
                axis: Some(8),
                ..named("X")
            },
        )
        .unwrap_err();
        assert!(matches!(err, ConsultifyError::InvalidValue { field: "axis", .. }));
    }

    #[test]
    fn end_before_start_rejected() {
        let (conn, org, project) = setup();
        let err = Initiative::create(
            &conn,
            &org,
            &project,
            &NewInitiative {
                start_date: NaiveDate::from_ymd_opt(2026, 6, 1),
                end_date: NaiveDate::from_ymd_opt(2026, 1, 1),
                ..named("X")
            },
        )
        .unwrap_err();
        assert!(matches!(err, ConsultifyError::Validation(_)));
    }

    #[test]
    fn update_and_soft_delete() {
        let (conn, org, project) = setup();
        let created = Initiative::create(&conn, &org, &project, &named("X")).unwrap();
        let updated = Initiative::update(
            &conn,
            &org,
            &created.id,
            &InitiativePatch {
                status: Some(InitiativeStatus::InProgress),
                budget: Some(25_000.0),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.status, InitiativeStatus::InProgress);
        assert_eq!(updated.budget, Some(25_000.0));

        Initiative::soft_delete(&conn, &org, &created.id).unwrap();
        assert!(Initiative::get(&conn, &org, &created.id).is_err());
    }

    #[test]
    fn empty_owner_is_a_clear_not_a_lookup() {
        let (conn, org, project) = setup();
        let created = Initiative::create(&conn, &org, &project, &named("X")).unwrap();
        let updated = Initiative::update(
            &conn,
            &org,
            &created.id,
            &InitiativePatch {
                owner_id: Some(String::new()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.owner_id, None);
    }
}
