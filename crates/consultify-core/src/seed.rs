//! Demo tenant seeding.

use crate::assessment::{Assessment, NewAssessment, ScoreInput};
use crate::auth::{register_organization, Registration};
use crate::config::AppConfig;
use crate::db::with_transaction;
use crate::error::Result;
use crate::initiative::{Initiative, NewInitiative};
use crate::project::{NewProject, Project};
use crate::task::{NewTask, Task};
use crate::types::{AiRole, Framework, InitiativeStatus, TaskPriority, TaskStatus};
use chrono::{Datelike, Months, NaiveDate, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct SeededDemo {
    pub organization_id: String,
    pub user_id: String,
    pub email: String,
    /// Generated login password for the demo admin.
    pub password: String,
    pub project_id: String,
    pub initiative_ids: Vec<String>,
    pub assessment_id: String,
}

/// DRD scores for the demo: (axis key, actual, target, justification).
const DRD_SCORES: [(&str, f64, f64, &str); 7] = [
    ("digital_processes", 3.0, 5.0, "Core processes run in an ERP, shop floor still on paper."),
    ("digital_products", 2.0, 4.0, "No connected product offering yet."),
    ("digital_business_models", 2.0, 3.0, "Revenue is purely transactional."),
    ("data_management", 2.0, 5.0, "Data lives in departmental silos."),
    ("digital_culture", 4.0, 5.0, "Leadership sponsors the transformation."),
    ("cybersecurity", 3.0, 5.0, "Basic policies exist, no incident drills."),
    ("artificial_intelligence", 1.0, 3.0, "No AI use cases in production."),
];

fn first_day_of_quarter(today: NaiveDate) -> NaiveDate {
    let month = today.month0() / 3 * 3 + 1;
    NaiveDate::from_ymd_opt(today.year(), month, 1).unwrap_or(today)
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Create a complete demo tenant: organization, ADMIN user, a MANAGER-role
/// project, three initiatives over consecutive quarters with tasks, and a
/// completed DRD assessment.
pub fn seed_demo(conn: &Connection, config: &AppConfig, label: &str) -> Result<SeededDemo> {
    let label = match label.trim() {
        "" => "Demo",
        l => l,
    };
    let suffix = random_token(8).to_lowercase();
    let email = format!("demo+{suffix}@consultify.demo");
    let password = random_token(16);

    with_transaction(conn, |tx| {
        let (org, user) = register_organization(
            tx,
            config,
            &Registration {
                organization_name: format!("{label} Manufacturing"),
                email: email.clone(),
                password: password.clone(),
                first_name: "Demo".to_string(),
                last_name: "User".to_string(),
            },
        )?;

        let project = Project::create(
            tx,
            &org.id,
            &NewProject {
                name: "Digital Transformation 2026".to_string(),
                description: "Plant-wide digitization programme driven by the DRD diagnosis."
                    .to_string(),
                owner_id: Some(user.id.clone()),
                ai_role: Some(AiRole::Manager),
                regulatory_mode: false,
            },
        )?;

        let quarter = first_day_of_quarter(Utc::now().date_naive());
        let plan = [
            ("Shop-floor data capture", 1, InitiativeStatus::InProgress, 0u32, 120_000.0),
            ("Unified data platform", 4, InitiativeStatus::Planned, 3, 250_000.0),
            ("Predictive maintenance pilot", 7, InitiativeStatus::Draft, 6, 80_000.0),
        ];
        let mut initiative_ids = Vec::new();
        for (name, axis, status, offset, budget) in plan {
            let start = quarter.checked_add_months(Months::new(offset));
            let end = start.and_then(|s| s.checked_add_months(Months::new(3)));
            let initiative = Initiative::create(
                tx,
                &org.id,
                &project.id,
                &NewInitiative {
                    name: name.to_string(),
                    summary: format!("Raise DRD axis {axis} maturity."),
                    axis: Some(axis),
                    status: Some(status),
                    owner_id: Some(user.id.clone()),
                    start_date: start,
                    end_date: end.and_then(|e| e.pred_opt()),
                    budget: Some(budget),
                    expected_roi: Some(1.8),
                },
            )?;

            let task_states: &[(&str, TaskStatus)] = match status {
                InitiativeStatus::InProgress => &[
                    ("Map current data flows", TaskStatus::Done),
                    ("Select IoT gateway vendor", TaskStatus::InProgress),
                    ("Train line supervisors", TaskStatus::Todo),
                ],
                _ => &[
                    ("Write business case", TaskStatus::Todo),
                    ("Identify stakeholders", TaskStatus::Todo),
                ],
            };
            for (title, task_status) in task_states {
                Task::create(
                    tx,
                    &org.id,
                    &project.id,
                    &NewTask {
                        title: (*title).to_string(),
                        status: Some(*task_status),
                        priority: Some(TaskPriority::High),
                        initiative_id: Some(initiative.id.clone()),
                        assignee_id: Some(user.id.clone()),
                        due_date: start.and_then(|s| s.checked_add_months(Months::new(2))),
                        ..Default::default()
                    },
                )?;
            }
            initiative_ids.push(initiative.id);
        }

        let assessment = Assessment::create(
            tx,
            &org.id,
            &project.id,
            Some(&user.id),
            &NewAssessment {
                framework: Framework::Drd,
                name: Some("DRD baseline".to_string()),
            },
        )?;
        for (dimension, actual, target, justification) in DRD_SCORES {
            Assessment::set_score(
                tx,
                &org.id,
                &assessment.id,
                dimension,
                &ScoreInput {
                    actual,
                    target,
                    weight: 1.0,
                    justification: justification.to_string(),
                },
            )?;
        }
        Assessment::complete(tx, &org.id, &assessment.id, Some(&user.id))?;

        tracing::info!(organization_id = %org.id, label, "demo tenant seeded");
        Ok(SeededDemo {
            organization_id: org.id,
            user_id: user.id,
            email: email.clone(),
            password: password.clone(),
            project_id: project.id,
            initiative_ids,
            assessment_id: assessment.id,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::authenticate;
    use crate::db;
    use crate::roadmap;
    use crate::types::AssessmentStatus;

    #[test]
    fn seeds_complete_tenant() {
        let conn = db::open_in_memory().unwrap();
        let config = AppConfig::default();
        let demo = seed_demo(&conn, &config, "Acme").unwrap();

        let project = Project::get(&conn, &demo.organization_id, &demo.project_id).unwrap();
        assert_eq!(project.ai_role, AiRole::Manager);
        assert_eq!(demo.initiative_ids.len(), 3);

        let assessment =
            Assessment::get(&conn, &demo.organization_id, &demo.assessment_id).unwrap();
        assert_eq!(assessment.status, AssessmentStatus::Completed);

        let buckets = roadmap::roadmap(&conn, &demo.organization_id, None).unwrap();
        assert_eq!(buckets.len(), 3);

        let user = authenticate(&conn, &demo.email, &demo.password).unwrap();
        assert_eq!(user.id, demo.user_id);
    }

    #[test]
    fn seeding_twice_creates_distinct_tenants() {
        let conn = db::open_in_memory().unwrap();
        let config = AppConfig::default();
        let a = seed_demo(&conn, &config, "").unwrap();
        let b = seed_demo(&conn, &config, "").unwrap();
        assert_ne!(a.organization_id, b.organization_id);
    }

    #[test]
    fn quarter_start() {
        let d = NaiveDate::from_ymd_opt(2026, 8, 17).unwrap();
        assert_eq!(first_day_of_quarter(d), NaiveDate::from_ymd_opt(2026, 7, 1).unwrap());
    }
}
