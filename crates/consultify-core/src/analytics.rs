use crate::assessment::Assessment;
use crate::billing;
use crate::error::Result;
use crate::governance::{ChangeRequest, ChangeRequestFilter};
use crate::initiative::{Initiative, InitiativeFilter};
use crate::project::Project;
use crate::task::{self, Task, TaskFilter};
use crate::types::{ChangeStatus, Framework, InitiativeStatus, TaskStatus};
use chrono::{Duration, NaiveDate, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub projects: usize,
    pub tasks_by_status: BTreeMap<TaskStatus, usize>,
    pub overdue_tasks: usize,
    pub initiatives_by_status: BTreeMap<InitiativeStatus, usize>,
    /// Mean weighted score of completed DRD assessments.
    pub average_drd_maturity: Option<f64>,
    pub pending_change_requests: usize,
    pub tokens_used_30d: i64,
    pub token_balance: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitiativeProgress {
    pub initiative_id: String,
    pub name: String,
    pub status: InitiativeStatus,
    pub task_total: usize,
    pub task_done: usize,
    pub progress_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectProgress {
    pub project_id: String,
    pub task_total: usize,
    pub task_done: usize,
    pub completion_pct: f64,
    pub tasks_by_status: BTreeMap<TaskStatus, usize>,
    pub initiatives: Vec<InitiativeProgress>,
}

pub fn dashboard(conn: &Connection, organization_id: &str, today: NaiveDate) -> Result<Dashboard> {
    let projects = Project::list(conn, organization_id)?;
    let tasks = Task::list(conn, organization_id, &TaskFilter::default())?;
    let initiatives = Initiative::list(conn, organization_id, &InitiativeFilter::default())?;

    let mut initiatives_by_status: BTreeMap<InitiativeStatus, usize> =
        InitiativeStatus::all().iter().map(|s| (*s, 0)).collect();
    for initiative in &initiatives {
        *initiatives_by_status.entry(initiative.status).or_default() += 1;
    }

    let mut maturity = Vec::new();
    for assessment in Assessment::list_completed(conn, organization_id, Framework::Drd)? {
        let summary = Assessment::summary(conn, organization_id, &assessment.id)?;
        if let Some(avg) = summary.weighted_actual {
            maturity.push(avg);
        }
    }
    let average_drd_maturity = (!maturity.is_empty())
        .then(|| round2(maturity.iter().sum::<f64>() / maturity.len() as f64));

    let pending = ChangeRequest::list(
        conn,
        organization_id,
        &ChangeRequestFilter {
            status: Some(ChangeStatus::Submitted),
            ..Default::default()
        },
    )?;
    let usage = billing::usage(conn, organization_id, Utc::now() - Duration::days(30))?;

    Ok(Dashboard {
        projects: projects.len(),
        tasks_by_status: task::count_by_status(&tasks),
        overdue_tasks: tasks.iter().filter(|t| t.is_overdue(today)).count(),
        initiatives_by_status,
        average_drd_maturity,
        pending_change_requests: pending.len(),
        tokens_used_30d: usage.total_debited,
        token_balance: billing::balance(conn, organization_id)?,
    })
}

/// Task progress of each initiative, computed from `tasks`.
pub fn initiative_progress(initiative: &Initiative, tasks: &[Task]) -> InitiativeProgress {
    let linked: Vec<Task> = tasks
        .iter()
        .filter(|t| t.initiative_id.as_deref() == Some(initiative.id.as_str()))
        .cloned()
        .collect();
    InitiativeProgress {
        initiative_id: initiative.id.clone(),
        name: initiative.name.clone(),
        status: initiative.status,
        task_total: linked.len(),
        task_done: linked.iter().filter(|t| t.status == TaskStatus::Done).count(),
        progress_pct: task::completion_pct(&linked),
    }
}

pub fn project_progress(
    conn: &Connection,
    organization_id: &str,
    project_id: &str,
) -> Result<ProjectProgress> {
    let project = Project::get(conn, organization_id, project_id)?;
    let tasks = Task::list(
        conn,
        organization_id,
        &TaskFilter {
            project_id: Some(project.id.clone()),
            ..Default::default()
        },
    )?;
    let initiatives = Initiative::list(
        conn,
        organization_id,
        &InitiativeFilter {
            project_id: Some(project.id.clone()),
            ..Default::default()
        },
    )?;

    Ok(ProjectProgress {
        project_id: project.id,
        task_total: tasks.len(),
        task_done: tasks.iter().filter(|t| t.status == TaskStatus::Done).count(),
        completion_pct: task::completion_pct(&tasks),
        tasks_by_status: task::count_by_status(&tasks),
        initiatives: initiatives
            .iter()
            .map(|i| initiative_progress(i, &tasks))
            .collect(),
    })
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::{NewAssessment, ScoreInput};
    use crate::assessment::framework;
    use crate::db;
    use crate::initiative::NewInitiative;
    use crate::organization::Organization;
    use crate::project::NewProject;
    use crate::task::NewTask;
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

    #[test]
    fn project_progress_per_initiative() {
        let (conn, org, project) = setup();
        let erp = Initiative::create(
            &conn,
            &org,
            &project,
            &NewInitiative {
                name: "ERP".into(),
                ..Default::default()
            },
        )
        .unwrap();
        for (title, status, linked) in [
            ("a", TaskStatus::Done, true),
            ("b", TaskStatus::Todo, true),
            ("c", TaskStatus::Done, false),
            ("d", TaskStatus::Blocked, false),
        ] {
            Task::create(
                &conn,
                &org,
                &project,
                &NewTask {
                    title: title.into(),
                    status: Some(status),
                    initiative_id: linked.then(|| erp.id.clone()),
                    ..Default::default()
                },
            )
            .unwrap();
        }

        let progress = project_progress(&conn, &org, &project).unwrap();
        assert_eq!(progress.task_total, 4);
        assert_eq!(progress.completion_pct, 50.0);
        assert_eq!(progress.initiatives.len(), 1);
        assert_eq!(progress.initiatives[0].task_total, 2);
        assert_eq!(progress.initiatives[0].progress_pct, 50.0);
    }

    #[test]
    fn dashboard_counts() {
        let (conn, org, project) = setup();
        let today = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        Task::create(
            &conn,
            &org,
            &project,
            &NewTask {
                title: "late".into(),
                due_date: NaiveDate::from_ymd_opt(2026, 4, 1),
                ..Default::default()
            },
        )
        .unwrap();

        let drd = Assessment::create(
            &conn,
            &org,
            &project,
            None,
            &NewAssessment {
                framework: Framework::Drd,
                name: None,
            },
        )
        .unwrap();
        for dim in framework::definition(Framework::Drd).dimensions {
            Assessment::set_score(
                &conn,
                &org,
                &drd.id,
                dim.key,
                &ScoreInput {
                    actual: 3.0,
                    target: 5.0,
                    weight: 1.0,
                    justification: String::new(),
                },
            )
            .unwrap();
        }
        Assessment::complete(&conn, &org, &drd.id, None).unwrap();

        let dash = dashboard(&conn, &org, today).unwrap();
        assert_eq!(dash.projects, 1);
        assert_eq!(dash.overdue_tasks, 1);
        assert_eq!(dash.tasks_by_status[&TaskStatus::Todo], 1);
        assert_eq!(dash.average_drd_maturity, Some(3.0));
        assert_eq!(dash.pending_change_requests, 0);
        assert_eq!(dash.tokens_used_30d, 0);
    }
}
