//! Change requests and their approval workflow.
//!
//! ```text
//! draft ──► submitted ──► approved ──► implemented
//!   │           │    └──► rejected
//!   └───────────┴──► withdrawn
//! ```

use crate::audit::{self, AuditEntry};
use crate::db::{self, optional, with_transaction};
use crate::error::{ConsultifyError, Result};
use crate::initiative::{Initiative, NewInitiative};
use crate::project::Project;
use crate::rbac::{self, Permission};
use crate::task::{NewTask, Task};
use crate::types::{ChangeKind, ChangeStatus, Role};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::{Deserialize, Serialize};

const SELECT_SQL: &str = "SELECT id, organization_id, project_id, title, description, kind, status,
    payload, requested_by, decided_by, decision_note, decided_at, created_at, updated_at
FROM change_requests";

/// Longest task title or initiative name derived from a chat message.
const DERIVED_TITLE_MAX: usize = 120;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub id: String,
    pub organization_id: String,
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub kind: ChangeKind,
    pub status: ChangeStatus,
    pub payload: Option<serde_json::Value>,
    pub requested_by: String,
    pub decided_by: Option<String>,
    pub decision_note: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewChangeRequest {
    pub project_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub kind: ChangeKind,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
    /// File straight into `submitted` instead of `draft`.
    #[serde(default)]
    pub submit: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeRequestFilter {
    pub project_id: Option<String>,
    pub status: Option<ChangeStatus>,
    pub kind: Option<ChangeKind>,
}

/// The user performing a transition.
#[derive(Debug, Clone, Copy)]
pub struct Actor<'a> {
    pub user_id: &'a str,
    pub role: Role,
}

pub fn is_allowed(from: ChangeStatus, to: ChangeStatus) -> bool {
    use ChangeStatus::*;
    matches!(
        (from, to),
        (Draft, Submitted)
            | (Submitted, Approved)
            | (Submitted, Rejected)
            | (Approved, Implemented)
            | (Draft, Withdrawn)
            | (Submitted, Withdrawn)
    )
}

impl ChangeRequest {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            organization_id: row.get(1)?,
            project_id: row.get(2)?,
            title: row.get(3)?,
            description: row.get(4)?,
            kind: row.get(5)?,
            status: row.get(6)?,
            payload: row.get(7)?,
            requested_by: row.get(8)?,
            decided_by: row.get(9)?,
            decision_note: row.get(10)?,
            decided_at: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }

    pub fn create(
        conn: &Connection,
        organization_id: &str,
        requested_by: &str,
        new: &NewChangeRequest,
    ) -> Result<ChangeRequest> {
        let project = Project::get(conn, organization_id, &new.project_id)?;
        let title = new.title.trim();
        if title.is_empty() {
            return Err(ConsultifyError::validation("change request title is required"));
        }
        let now = db::now();
        let request = ChangeRequest {
            id: db::new_id(),
            organization_id: organization_id.to_string(),
            project_id: project.id,
            title: title.to_string(),
            description: new.description.trim().to_string(),
            kind: new.kind,
            status: if new.submit {
                ChangeStatus::Submitted
            } else {
                ChangeStatus::Draft
            },
            payload: new.payload.clone(),
            requested_by: requested_by.to_string(),
            decided_by: None,
            decision_note: None,
            decided_at: None,
            created_at: now,
            updated_at: now,
        };
        with_transaction(conn, |tx| {
            tx.execute(
                "INSERT INTO change_requests (id, organization_id, project_id, title, description,
                    kind, status, payload, requested_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    request.id,
                    request.organization_id,
                    request.project_id,
                    request.title,
                    request.description,
                    request.kind,
                    request.status,
                    request.payload,
                    request.requested_by,
                    request.created_at,
                    request.updated_at
                ],
            )?;
            audit::record(
                tx,
                AuditEntry::new(organization_id, "change_request.create", "change_request")
                    .by(requested_by)
                    .entity(&request.id)
                    .details(serde_json::json!({
                        "kind": request.kind,
                        "status": request.status,
                    })),
            )?;
            Ok(())
        })?;
        Ok(request)
    }

    pub fn get(conn: &Connection, organization_id: &str, id: &str) -> Result<ChangeRequest> {
        let sql = format!("{SELECT_SQL} WHERE id = ?1 AND organization_id = ?2");
        optional(conn.query_row(&sql, params![id, organization_id], Self::from_row))?
            .ok_or_else(|| ConsultifyError::ChangeRequestNotFound(id.to_string()))
    }

    pub fn list(
        conn: &Connection,
        organization_id: &str,
        filter: &ChangeRequestFilter,
    ) -> Result<Vec<ChangeRequest>> {
        let mut sql = format!("{SELECT_SQL} WHERE organization_id = ?");
        let mut args: Vec<Value> = vec![Value::Text(organization_id.to_string())];
        for (column, value) in [
            ("project_id", filter.project_id.clone()),
            ("status", filter.status.map(|s| s.as_str().to_string())),
            ("kind", filter.kind.map(|k| k.as_str().to_string())),
        ] {
            if let Some(v) = value {
                sql.push_str(&format!(" AND {column} = ?"));
                args.push(Value::Text(v));
            }
        }
        sql.push_str(" ORDER BY created_at DESC");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(args), Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Move the request to `to`, enforcing the state machine and who may
    /// make each move. Implementing an approved `ai_action` request applies
    /// its payload in the same transaction.
    pub fn transition(
        conn: &Connection,
        organization_id: &str,
        id: &str,
        actor: Actor<'_>,
        to: ChangeStatus,
        note: Option<&str>,
    ) -> Result<ChangeRequest> {
        let mut request = Self::get(conn, organization_id, id)?;
        let from = request.status;
        if !is_allowed(from, to) {
            return Err(ConsultifyError::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
                reason: "not a permitted change request transition".to_string(),
            });
        }
        authorize(&request, actor, to)?;

        with_transaction(conn, |tx| {
            let now = db::now();
            if matches!(to, ChangeStatus::Approved | ChangeStatus::Rejected) {
                request.decided_by = Some(actor.user_id.to_string());
                request.decided_at = Some(now);
                request.decision_note = note.map(|n| n.trim().to_string());
            }
            if to == ChangeStatus::Implemented && request.kind == ChangeKind::AiAction {
                let applied = match &request.payload {
                    Some(payload) => apply_payload(
                        tx,
                        organization_id,
                        &request.project_id,
                        payload,
                        &request.title,
                    )?,
                    None => None,
                };
                if let Some(result) = applied {
                    let mut payload =
                        request.payload.clone().unwrap_or_else(|| serde_json::json!({}));
                    if let Some(obj) = payload.as_object_mut() {
                        obj.insert("result".to_string(), result);
                    }
                    request.payload = Some(payload);
                }
            }
            request.status = to;
            request.updated_at = now;
            tx.execute(
                "UPDATE change_requests SET status = ?2, payload = ?3, decided_by = ?4,
                    decision_note = ?5, decided_at = ?6, updated_at = ?7
                 WHERE id = ?1",
                params![
                    request.id,
                    request.status,
                    request.payload,
                    request.decided_by,
                    request.decision_note,
                    request.decided_at,
                    request.updated_at
                ],
            )?;
            let action = format!("change_request.{to}");
            audit::record(
                tx,
                AuditEntry::new(organization_id, &action, "change_request")
                    .by(actor.user_id)
                    .entity(&request.id)
                    .details(serde_json::json!({ "from": from, "to": to, "note": note })),
            )?;
            Ok(())
        })?;
        Ok(request)
    }
}

fn authorize(request: &ChangeRequest, actor: Actor<'_>, to: ChangeStatus) -> Result<()> {
    let is_admin = actor.role.rank() >= Role::Admin.rank();
    match to {
        ChangeStatus::Approved | ChangeStatus::Rejected => {
            rbac::require(actor.role, Permission::DecideChangeRequests)?;
            if actor.user_id == request.requested_by && !is_admin {
                return Err(ConsultifyError::Forbidden(
                    "requesters cannot decide their own change requests".to_string(),
                ));
            }
        }
        ChangeStatus::Implemented => rbac::require(actor.role, Permission::DecideChangeRequests)?,
        ChangeStatus::Submitted | ChangeStatus::Withdrawn => {
            if actor.user_id != request.requested_by && !is_admin {
                return Err(ConsultifyError::Forbidden(
                    "only the requester may submit or withdraw a change request".to_string(),
                ));
            }
        }
        ChangeStatus::Draft => {}
    }
    Ok(())
}

/// Run an AI action the project's guard allowed outright, without a change
/// request. Same payload shape as an `ai_action` change request.
pub fn execute_ai_action(
    conn: &Connection,
    organization_id: &str,
    project_id: &str,
    user_id: &str,
    payload: &serde_json::Value,
) -> Result<Option<serde_json::Value>> {
    with_transaction(conn, |tx| {
        let result = apply_payload(tx, organization_id, project_id, payload, "AI action")?;
        if let Some(result) = &result {
            audit::record(
                tx,
                AuditEntry::new(organization_id, "ai.action", "project")
                    .by(user_id)
                    .entity(project_id)
                    .details(serde_json::json!({
                        "action": payload.get("action"),
                        "result": result,
                    })),
            )?;
        }
        Ok(result)
    })
}

/// Create the entity an `ai_action` payload describes.
///
/// The payload carries `action` plus either an explicit `task` /
/// `initiative` object or the originating chat `message`, from which a
/// title is derived. Returns the created ids, or `None` for actions that
/// create nothing.
fn apply_payload(
    conn: &Connection,
    organization_id: &str,
    project_id: &str,
    payload: &serde_json::Value,
    fallback_title: &str,
) -> Result<Option<serde_json::Value>> {
    let message = payload
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or_default();

    match payload.get("action").and_then(|a| a.as_str()) {
        Some("create_task") => {
            let new = match payload.get("task") {
                Some(body) => serde_json::from_value::<NewTask>(body.clone())?,
                None => NewTask {
                    title: derive_title(message, fallback_title),
                    description: message.to_string(),
                    ..Default::default()
                },
            };
            let task = Task::create(conn, organization_id, project_id, &new)?;
            Ok(Some(serde_json::json!({ "task_id": task.id })))
        }
        Some("create_initiative") => {
            let new = match payload.get("initiative") {
                Some(body) => serde_json::from_value::<NewInitiative>(body.clone())?,
                None => NewInitiative {
                    name: derive_title(message, fallback_title),
                    summary: message.to_string(),
                    ..Default::default()
                },
            };
            let initiative = Initiative::create(conn, organization_id, project_id, &new)?;
            Ok(Some(serde_json::json!({ "initiative_id": initiative.id })))
        }
        _ => Ok(None),
    }
}

fn derive_title(message: &str, fallback: &str) -> String {
    let first_line = message.lines().map(str::trim).find(|l| !l.is_empty());
    match first_line {
        Some(line) => line.chars().take(DERIVED_TITLE_MAX).collect(),
        None => fallback.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditFilter;
    use crate::organization::Organization;
    use crate::project::NewProject;
    use crate::task::TaskFilter;
    use crate::types::Plan;
    use crate::user::{NewUser, User};

    struct Fixture {
        conn: Connection,
        org: String,
        project: String,
        requester: User,
        manager: User,
        admin: User,
    }

    fn user(conn: &Connection, org: &str, email: &str, role: Role) -> User {
        User::create(
            conn,
            org,
            &NewUser {
                email: email.into(),
                password: "password123".into(),
                first_name: String::new(),
                last_name: String::new(),
                role,
            },
            8,
        )
        .unwrap()
    }

    fn setup() -> Fixture {
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
        let requester = user(&conn, &org.id, "user@acme.io", Role::User);
        let manager = user(&conn, &org.id, "manager@acme.io", Role::Manager);
        let admin = user(&conn, &org.id, "admin@acme.io", Role::Admin);
        Fixture {
            conn,
            org: org.id,
            project: project.id,
            requester,
            manager,
            admin,
        }
    }

    fn actor(user: &User) -> Actor<'_> {
        Actor {
            user_id: &user.id,
            role: user.role,
        }
    }

    fn step(f: &Fixture, id: &str, by: &User, to: ChangeStatus) -> Result<ChangeRequest> {
        ChangeRequest::transition(&f.conn, &f.org, id, actor(by), to, None)
    }

    fn file(
        f: &Fixture,
        by: &User,
        kind: ChangeKind,
        payload: Option<serde_json::Value>,
    ) -> ChangeRequest {
        ChangeRequest::create(
            &f.conn,
            &f.org,
            &by.id,
            &NewChangeRequest {
                project_id: f.project.clone(),
                title: "Extend scope".into(),
                description: String::new(),
                kind,
                payload,
                submit: false,
            },
        )
        .unwrap()
    }

    #[test]
    fn transition_table() {
        use ChangeStatus::*;
        assert!(is_allowed(Draft, Submitted));
        assert!(is_allowed(Submitted, Approved));
        assert!(is_allowed(Approved, Implemented));
        assert!(is_allowed(Submitted, Withdrawn));
        assert!(!is_allowed(Draft, Approved));
        assert!(!is_allowed(Rejected, Approved));
        assert!(!is_allowed(Implemented, Withdrawn));
        assert!(!is_allowed(Approved, Withdrawn));
    }

    #[test]
    fn happy_path_is_audited() {
        let f = setup();
        let cr = file(&f, &f.requester, ChangeKind::Scope, None);
        assert_eq!(cr.status, ChangeStatus::Draft);

        step(&f, &cr.id, &f.requester, ChangeStatus::Submitted).unwrap();
        let approved = ChangeRequest::transition(
            &f.conn,
            &f.org,
            &cr.id,
            actor(&f.manager),
            ChangeStatus::Approved,
            Some(" fits budget "),
        )
        .unwrap();
        assert_eq!(approved.decided_by.as_deref(), Some(f.manager.id.as_str()));
        assert_eq!(approved.decision_note.as_deref(), Some("fits budget"));

        let log = audit::list(
            &f.conn,
            &f.org,
            &AuditFilter {
                entity_id: Some(cr.id.clone()),
                ..Default::default()
            },
        )
        .unwrap();
        let actions: Vec<_> = log.iter().map(|r| r.action.as_str()).collect();
        assert_eq!(
            actions,
            ["change_request.approved", "change_request.submitted", "change_request.create"]
        );
    }

    #[test]
    fn illegal_transition_rejected() {
        let f = setup();
        let cr = file(&f, &f.requester, ChangeKind::Budget, None);
        let err = step(&f, &cr.id, &f.admin, ChangeStatus::Approved).unwrap_err();
        assert!(matches!(err, ConsultifyError::InvalidTransition { .. }));
    }

    #[test]
    fn user_cannot_decide_and_self_approval_needs_admin() {
        let f = setup();
        let mine = file(&f, &f.manager, ChangeKind::Schedule, None);
        step(&f, &mine.id, &f.manager, ChangeStatus::Submitted).unwrap();

        let err = step(&f, &mine.id, &f.requester, ChangeStatus::Rejected).unwrap_err();
        assert!(matches!(err, ConsultifyError::Forbidden(_)));

        let err = step(&f, &mine.id, &f.manager, ChangeStatus::Approved).unwrap_err();
        assert!(err.to_string().contains("own change requests"));

        let own_admin = file(&f, &f.admin, ChangeKind::Schedule, None);
        step(&f, &own_admin.id, &f.admin, ChangeStatus::Submitted).unwrap();
        step(&f, &own_admin.id, &f.admin, ChangeStatus::Approved).unwrap();
    }

    #[test]
    fn only_requester_withdraws() {
        let f = setup();
        let cr = file(&f, &f.requester, ChangeKind::Scope, None);
        assert!(step(&f, &cr.id, &f.manager, ChangeStatus::Withdrawn).is_err());
        let withdrawn = step(&f, &cr.id, &f.requester, ChangeStatus::Withdrawn).unwrap();
        assert_eq!(withdrawn.status, ChangeStatus::Withdrawn);
    }

    #[test]
    fn implementing_ai_action_creates_task() {
        let f = setup();
        let cr = file(
            &f,
            &f.requester,
            ChangeKind::AiAction,
            Some(serde_json::json!({
                "action": "create_task",
                "message": "Run a value stream mapping workshop\nwith the plant team",
            })),
        );
        for (who, to) in [
            (&f.requester, ChangeStatus::Submitted),
            (&f.manager, ChangeStatus::Approved),
            (&f.manager, ChangeStatus::Implemented),
        ] {
            step(&f, &cr.id, who, to).unwrap();
        }

        let tasks = Task::list(&f.conn, &f.org, &TaskFilter::default()).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Run a value stream mapping workshop");

        let done = ChangeRequest::get(&f.conn, &f.org, &cr.id).unwrap();
        assert_eq!(done.status, ChangeStatus::Implemented);
        assert_eq!(done.payload.unwrap()["result"]["task_id"], tasks[0].id.as_str());
    }

    #[test]
    fn implementing_explicit_initiative_payload() {
        let f = setup();
        let cr = file(
            &f,
            &f.requester,
            ChangeKind::AiAction,
            Some(serde_json::json!({
                "action": "create_initiative",
                "initiative": { "name": "Data platform", "axis": 4 },
            })),
        );
        for (who, to) in [
            (&f.requester, ChangeStatus::Submitted),
            (&f.admin, ChangeStatus::Approved),
            (&f.admin, ChangeStatus::Implemented),
        ] {
            step(&f, &cr.id, who, to).unwrap();
        }
        let list = Initiative::list(&f.conn, &f.org, &Default::default()).unwrap();
        assert_eq!(list[0].name, "Data platform");
        assert_eq!(list[0].axis, Some(4));
    }

    #[test]
    fn filter_by_status() {
        let f = setup();
        file(&f, &f.requester, ChangeKind::Scope, None);
        let cr = file(&f, &f.requester, ChangeKind::Scope, None);
        step(&f, &cr.id, &f.requester, ChangeStatus::Submitted).unwrap();
        let pending = ChangeRequest::list(
            &f.conn,
            &f.org,
            &ChangeRequestFilter {
                status: Some(ChangeStatus::Submitted),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn direct_execution_creates_and_audits() {
        let f = setup();
        let payload = serde_json::json!({
            "action": "create_task",
            "message": "Schedule a kaizen event\nwith the night shift",
        });
        let result =
            execute_ai_action(&f.conn, &f.org, &f.project, &f.admin.id, &payload).unwrap().unwrap();
        let task = Task::get(&f.conn, &f.org, result["task_id"].as_str().unwrap()).unwrap();
        assert_eq!(task.title, "Schedule a kaizen event");

        let audit = audit::list(
            &f.conn,
            &f.org,
            &AuditFilter {
                action: Some("ai.action".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(audit.len(), 1);

        let none = serde_json::json!({ "action": "update_status" });
        assert!(execute_ai_action(&f.conn, &f.org, &f.project, &f.admin.id, &none)
            .unwrap()
            .is_none());
    }
}
