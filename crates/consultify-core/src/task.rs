use crate::db::{self, optional};
use crate::error::{ConsultifyError, Result};
use crate::initiative::Initiative;
use crate::project::Project;
use crate::types::{TaskPriority, TaskStatus};
use crate::user::User;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const SELECT_SQL: &str = "SELECT id, organization_id, project_id, initiative_id, title, description,
    status, priority, assignee_id, due_date, created_at, updated_at
FROM tasks";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub organization_id: String,
    pub project_id: String,
    pub initiative_id: Option<String>,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assignee_id: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub initiative_id: Option<String>,
    #[serde(default)]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

/// Partial update. For `initiative_id` and `assignee_id` an empty string
/// clears the link.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub initiative_id: Option<String>,
    pub assignee_id: Option<String>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskFilter {
    pub project_id: Option<String>,
    pub status: Option<TaskStatus>,
    pub assignee_id: Option<String>,
    pub initiative_id: Option<String>,
}

impl Task {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            organization_id: row.get(1)?,
            project_id: row.get(2)?,
            initiative_id: row.get(3)?,
            title: row.get(4)?,
            description: row.get(5)?,
            status: row.get(6)?,
            priority: row.get(7)?,
            assignee_id: row.get(8)?,
            due_date: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status != TaskStatus::Done && self.due_date.is_some_and(|due| due < today)
    }

    pub fn create(
        conn: &Connection,
        organization_id: &str,
        project_id: &str,
        new: &NewTask,
    ) -> Result<Task> {
        let project = Project::get(conn, organization_id, project_id)?;
        let title = required_title(&new.title)?;
        if let Some(initiative) = &new.initiative_id {
            check_initiative(conn, organization_id, &project.id, initiative)?;
        }
        if let Some(assignee) = &new.assignee_id {
            User::get(conn, organization_id, assignee)?;
        }

        let now = db::now();
        let task = Task {
            id: db::new_id(),
            organization_id: organization_id.to_string(),
            project_id: project.id,
            initiative_id: new.initiative_id.clone(),
            title,
            description: new.description.trim().to_string(),
            status: new.status.unwrap_or(TaskStatus::Todo),
            priority: new.priority.unwrap_or(TaskPriority::Medium),
            assignee_id: new.assignee_id.clone(),
            due_date: new.due_date,
            created_at: now,
            updated_at: now,
        };
        conn.execute(
            "INSERT INTO tasks (id, organization_id, project_id, initiative_id, title, description,
                status, priority, assignee_id, due_date, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                task.id,
                task.organization_id,
                task.project_id,
                task.initiative_id,
                task.title,
                task.description,
                task.status,
                task.priority,
                task.assignee_id,
                task.due_date,
                task.created_at,
                task.updated_at
            ],
        )?;
        Ok(task)
    }

    pub fn get(conn: &Connection, organization_id: &str, id: &str) -> Result<Task> {
        let sql = format!("{SELECT_SQL} WHERE id = ?1 AND organization_id = ?2 AND is_deleted = 0");
        optional(conn.query_row(&sql, params![id, organization_id], Self::from_row))?
            .ok_or_else(|| ConsultifyError::TaskNotFound(id.to_string()))
    }

    pub fn list(
        conn: &Connection,
        organization_id: &str,
        filter: &TaskFilter,
    ) -> Result<Vec<Task>> {
        let mut sql = format!("{SELECT_SQL} WHERE organization_id = ? AND is_deleted = 0");
        let mut args: Vec<Value> = vec![Value::Text(organization_id.to_string())];
        for (column, value) in [
            ("project_id", filter.project_id.clone()),
            ("status", filter.status.map(|s| s.as_str().to_string())),
            ("assignee_id", filter.assignee_id.clone()),
            ("initiative_id", filter.initiative_id.clone()),
        ] {
            if let Some(v) = value {
                sql.push_str(&format!(" AND {column} = ?"));
                args.push(Value::Text(v));
            }
        }
        sql.push_str(" ORDER BY due_date IS NULL, due_date, created_at");

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
        patch: &TaskPatch,
    ) -> Result<Task> {
        let mut task = Self::get(conn, organization_id, id)?;
        if let Some(title) = &patch.title {
            task.title = required_title(title)?;
        }
        if let Some(description) = &patch.description {
            task.description = description.trim().to_string();
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        match patch.initiative_id.as_deref() {
            None => {}
            Some("") => task.initiative_id = None,
            Some(initiative) => {
                check_initiative(conn, organization_id, &task.project_id, initiative)?;
                task.initiative_id = Some(initiative.to_string());
            }
        }
        match patch.assignee_id.as_deref() {
            None => {}
            Some("") => task.assignee_id = None,
            Some(assignee) => {
                User::get(conn, organization_id, assignee)?;
                task.assignee_id = Some(assignee.to_string());
            }
        }
        if patch.due_date.is_some() {
            task.due_date = patch.due_date;
        }
        task.updated_at = db::now();

        conn.execute(
            "UPDATE tasks SET initiative_id = ?2, title = ?3, description = ?4, status = ?5,
                priority = ?6, assignee_id = ?7, due_date = ?8, updated_at = ?9
             WHERE id = ?1",
            params![
                task.id,
                task.initiative_id,
                task.title,
                task.description,
                task.status,
                task.priority,
                task.assignee_id,
                task.due_date,
                task.updated_at
            ],
        )?;
        Ok(task)
    }

    pub fn soft_delete(conn: &Connection, organization_id: &str, id: &str) -> Result<()> {
        let task = Self::get(conn, organization_id, id)?;
        conn.execute(
            "UPDATE tasks SET is_deleted = 1, updated_at = ?2 WHERE id = ?1",
            params![task.id, db::now()],
        )?;
        Ok(())
    }
}

/// Task counts keyed by status, every status present.
pub fn count_by_status(tasks: &[Task]) -> BTreeMap<TaskStatus, usize> {
    let mut counts: BTreeMap<TaskStatus, usize> =
        TaskStatus::all().iter().map(|s| (*s, 0)).collect();
    for task in tasks {
        *counts.entry(task.status).or_default() += 1;
    }
    counts
}

/// Share of `tasks` that are done, 0..=100. An empty list is 0%.
pub fn completion_pct(tasks: &[Task]) -> f64 {
    if tasks.is_empty() {
        return 0.0;
    }
    let done = tasks.iter().filter(|t| t.status == TaskStatus::Done).count();
    (done as f64 * 100.0 / tasks.len() as f64 * 10.0).round() / 10.0
}

fn check_initiative(
    conn: &Connection,
    organization_id: &str,
    project_id: &str,
    initiative_id: &str,
) -> Result<()> {
    let initiative = Initiative::get(conn, organization_id, initiative_id)?;
    if initiative.project_id != project_id {
        return Err(ConsultifyError::validation(format!(
            "initiative {initiative_id} belongs to a different project"
        )));
    }
    Ok(())
}

fn required_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ConsultifyError::validation("task title is required"));
    }
    Ok(title.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
