use crate::db;
use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub organization_id: String,
    pub user_id: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// What happened, to which entity, and who did it.
#[derive(Debug, Clone)]
pub struct AuditEntry<'a> {
    pub organization_id: &'a str,
    pub user_id: Option<&'a str>,
    pub action: &'a str,
    pub entity_type: &'a str,
    pub entity_id: Option<&'a str>,
    pub details: Option<serde_json::Value>,
}

impl<'a> AuditEntry<'a> {
    pub fn new(organization_id: &'a str, action: &'a str, entity_type: &'a str) -> Self {
        Self {
            organization_id,
            user_id: None,
            action,
            entity_type,
            entity_id: None,
            details: None,
        }
    }

    pub fn by(mut self, user_id: &'a str) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn entity(mut self, entity_id: &'a str) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditFilter {
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub user_id: Option<String>,
    pub action: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl AuditRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            organization_id: row.get(1)?,
            user_id: row.get(2)?,
            action: row.get(3)?,
            entity_type: row.get(4)?,
            entity_id: row.get(5)?,
            details: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

pub fn record(conn: &Connection, entry: AuditEntry<'_>) -> Result<i64> {
    conn.execute(
        "INSERT INTO audit_log (organization_id, user_id, action, entity_type, entity_id, details,
             created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entry.organization_id,
            entry.user_id,
            entry.action,
            entry.entity_type,
            entry.entity_id,
            entry.details,
            db::now()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Audit rows for one organization, newest first.
pub fn list(
    conn: &Connection,
    organization_id: &str,
    filter: &AuditFilter,
) -> Result<Vec<AuditRecord>> {
    let mut sql = String::from(
        "SELECT id, organization_id, user_id, action, entity_type, entity_id, details, created_at
         FROM audit_log WHERE organization_id = ?",
    );
    let mut args: Vec<Value> = vec![Value::Text(organization_id.to_string())];

    for (column, value) in [
        ("entity_type", &filter.entity_type),
        ("entity_id", &filter.entity_id),
        ("user_id", &filter.user_id),
        ("action", &filter.action),
    ] {
        if let Some(v) = value {
            sql.push_str(&format!(" AND {column} = ?"));
            args.push(Value::Text(v.clone()));
        }
    }
    sql.push_str(" ORDER BY id DESC LIMIT ? OFFSET ?");
    args.push(Value::Integer(i64::from(filter.limit.unwrap_or(100).min(1000))));
    args.push(Value::Integer(i64::from(filter.offset.unwrap_or(0))));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(args), AuditRecord::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::organization::Organization;
    use crate::types::Plan;

    #[test]
    fn record_and_filter() {
        let conn = db::open_in_memory().unwrap();
        let org = Organization::create(&conn, "Acme", Plan::Free).unwrap();

        record(
            &conn,
            AuditEntry::new(&org.id, "project.create", "project")
                .entity("p1")
                .details(serde_json::json!({ "name": "Pilot" })),
        )
        .unwrap();
        record(&conn, AuditEntry::new(&org.id, "task.create", "task").entity("t1")).unwrap();
        record(&conn, AuditEntry::new(&org.id, "project.update", "project").entity("p1")).unwrap();

        let all = list(&conn, &org.id, &AuditFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].action, "project.update");

        let projects = list(
            &conn,
            &org.id,
            &AuditFilter {
                entity_type: Some("project".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[1].details.as_ref().unwrap()["name"], "Pilot");
    }

    #[test]
    fn other_tenants_are_invisible() {
        let conn = db::open_in_memory().unwrap();
        let a = Organization::create(&conn, "A", Plan::Free).unwrap();
        let b = Organization::create(&conn, "B", Plan::Free).unwrap();
        record(&conn, AuditEntry::new(&a.id, "x", "y")).unwrap();
        assert!(list(&conn, &b.id, &AuditFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn audit_log_is_append_only() {
        let conn = db::open_in_memory().unwrap();
        let org = Organization::create(&conn, "A", Plan::Free).unwrap();
        record(&conn, AuditEntry::new(&org.id, "x", "y")).unwrap();
        assert!(conn.execute("DELETE FROM audit_log", []).is_err());
    }
}
