//! Maturity assessments: creation, per-dimension scoring and aggregation.

pub mod drd;
pub mod framework;

use crate::audit::{self, AuditEntry};
use crate::db::{self, optional, with_transaction};
use crate::error::{ConsultifyError, Result};
use crate::project::Project;
use crate::types::{AssessmentStatus, Framework};
use chrono::{DateTime, Utc};
use framework::FrameworkDef;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

const SELECT_SQL: &str = "SELECT id, organization_id, project_id, framework, name, status,
    created_by, completed_at, created_at, updated_at
FROM assessments";

/// ADKAR elements scoring at or below this value block the elements after them.
pub const ADKAR_BARRIER_THRESHOLD: f64 = 3.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub id: String,
    pub organization_id: String,
    pub project_id: String,
    pub framework: Framework,
    pub name: String,
    pub status: AssessmentStatus,
    pub created_by: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAssessment {
    pub framework: Framework,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub dimension: String,
    pub actual: f64,
    pub target: f64,
    pub weight: f64,
    pub justification: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoreInput {
    pub actual: f64,
    pub target: f64,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub justification: String,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize)]
pub struct DimensionGap {
    pub dimension: String,
    pub label: String,
    pub actual: f64,
    pub target: f64,
    pub weight: f64,
    /// `target - actual`, never negative.
    pub gap: f64,
    pub weighted_gap: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssessmentSummary {
    pub framework: Framework,
    pub scale_max: f64,
    pub scored: usize,
    pub total_dimensions: usize,
    pub completion_pct: f64,
    pub weighted_actual: Option<f64>,
    pub weighted_target: Option<f64>,
    pub maturity_level: Option<u32>,
    /// Scored dimensions, largest weighted gap first.
    pub gaps: Vec<DimensionGap>,
    /// ADKAR only: first element in model order scoring at or below 3.
    pub barrier_point: Option<String>,
}

impl AssessmentSummary {
    pub fn top_gaps(&self, n: usize) -> &[DimensionGap] {
        &self.gaps[..self.gaps.len().min(n)]
    }
}

impl Assessment {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            organization_id: row.get(1)?,
            project_id: row.get(2)?,
            framework: row.get(3)?,
            name: row.get(4)?,
            status: row.get(5)?,
            created_by: row.get(6)?,
            completed_at: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    pub fn definition(&self) -> &'static FrameworkDef {
        framework::definition(self.framework)
    }

    pub fn create(
        conn: &Connection,
        organization_id: &str,
        project_id: &str,
        created_by: Option<&str>,
        new: &NewAssessment,
    ) -> Result<Assessment> {
        let project = Project::get(conn, organization_id, project_id)?;
        let def = framework::definition(new.framework);
        let name = match new.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{} assessment", def.name),
        };
        let now = db::now();
        let assessment = Assessment {
            id: db::new_id(),
            organization_id: organization_id.to_string(),
            project_id: project.id,
            framework: new.framework,
            name,
            status: AssessmentStatus::Draft,
            created_by: created_by.map(str::to_string),
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        conn.execute(
            "INSERT INTO assessments (id, organization_id, project_id, framework, name, status,
                created_by, completed_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                assessment.id,
                assessment.organization_id,
                assessment.project_id,
                assessment.framework,
                assessment.name,
                assessment.status,
                assessment.created_by,
                assessment.completed_at,
                assessment.created_at,
                assessment.updated_at
            ],
        )?;
        Ok(assessment)
    }

    pub fn get(conn: &Connection, organization_id: &str, id: &str) -> Result<Assessment> {
        let sql = format!("{SELECT_SQL} WHERE id = ?1 AND organization_id = ?2");
        optional(conn.query_row(&sql, params![id, organization_id], Self::from_row))?
            .ok_or_else(|| ConsultifyError::AssessmentNotFound(id.to_string()))
    }

    pub fn list(
        conn: &Connection,
        organization_id: &str,
        project_id: &str,
    ) -> Result<Vec<Assessment>> {
        let sql = format!(
            "{SELECT_SQL} WHERE organization_id = ?1 AND project_id = ?2 ORDER BY created_at DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![organization_id, project_id], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Completed assessments of one framework across the organization.
    pub fn list_completed(
        conn: &Connection,
        organization_id: &str,
        framework: Framework,
    ) -> Result<Vec<Assessment>> {
        let sql = format!(
            "{SELECT_SQL} WHERE organization_id = ?1 AND framework = ?2 AND status = 'completed'
             ORDER BY completed_at DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![organization_id, framework], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Most recently touched assessment of a project, if any.
    pub fn latest_for_project(
        conn: &Connection,
        organization_id: &str,
        project_id: &str,
    ) -> Result<Option<Assessment>> {
        let sql = format!(
            "{SELECT_SQL} WHERE organization_id = ?1 AND project_id = ?2
             ORDER BY updated_at DESC LIMIT 1"
        );
        optional(conn.query_row(&sql, params![organization_id, project_id], Self::from_row))
    }

    pub fn scores(conn: &Connection, assessment_id: &str) -> Result<Vec<Score>> {
        let mut stmt = conn.prepare(
            "SELECT dimension, actual, target, weight, justification, updated_at
             FROM assessment_scores WHERE assessment_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![assessment_id], |row| {
                Ok(Score {
                    dimension: row.get(0)?,
                    actual: row.get(1)?,
                    target: row.get(2)?,
                    weight: row.get(3)?,
                    justification: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Record or replace the score of one dimension.
    ///
    /// The first score moves a draft assessment to `in_progress`. Completed
    /// assessments are frozen.
    pub fn set_score(
        conn: &Connection,
        organization_id: &str,
        id: &str,
        dimension: &str,
        input: &ScoreInput,
    ) -> Result<Score> {
        let assessment = Self::get(conn, organization_id, id)?;
        if assessment.status == AssessmentStatus::Completed {
            return Err(ConsultifyError::InvalidTransition {
                from: assessment.status.to_string(),
                to: AssessmentStatus::Completed.to_string(),
                reason: "completed assessments cannot be re-scored".to_string(),
            });
        }
        let def = assessment.definition();
        if def.dimension(dimension).is_none() {
            return Err(ConsultifyError::invalid("dimension", dimension));
        }
        for (field, value) in [("actual", input.actual), ("target", input.target)] {
            if !def.in_scale(value) {
                return Err(ConsultifyError::validation(format!(
                    "{field} {value} outside {} scale {}..={}",
                    def.framework, def.scale_min, def.scale_max
                )));
            }
        }
        if !(input.weight.is_finite() && input.weight > 0.0) {
            return Err(ConsultifyError::validation("weight must be greater than 0"));
        }

        let score = Score {
            dimension: dimension.to_string(),
            actual: input.actual,
            target: input.target,
            weight: input.weight,
            justification: input.justification.trim().to_string(),
            updated_at: db::now(),
        };
        with_transaction(conn, |tx| {
            tx.execute(
                "INSERT INTO assessment_scores (assessment_id, dimension, actual, target, weight,
                    justification, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (assessment_id, dimension) DO UPDATE SET
                    actual = excluded.actual, target = excluded.target, weight = excluded.weight,
                    justification = excluded.justification, updated_at = excluded.updated_at",
                params![
                    assessment.id,
                    score.dimension,
                    score.actual,
                    score.target,
                    score.weight,
                    score.justification,
                    score.updated_at
                ],
            )?;
            tx.execute(
                "UPDATE assessments SET status = ?2, updated_at = ?3 WHERE id = ?1",
                params![assessment.id, AssessmentStatus::InProgress, score.updated_at],
            )?;
            Ok(())
        })?;
        Ok(score)
    }

    /// Mark the assessment completed. Every dimension must be scored.
    pub fn complete(
        conn: &Connection,
        organization_id: &str,
        id: &str,
        actor: Option<&str>,
    ) -> Result<Assessment> {
        let mut assessment = Self::get(conn, organization_id, id)?;
        if assessment.status == AssessmentStatus::Completed {
            return Err(ConsultifyError::InvalidTransition {
                from: assessment.status.to_string(),
                to: AssessmentStatus::Completed.to_string(),
                reason: "assessment already completed".to_string(),
            });
        }
        let scores = Self::scores(conn, &assessment.id)?;
        let missing: Vec<&str> = assessment
            .definition()
            .dimensions
            .iter()
            .filter(|d| !scores.iter().any(|s| s.dimension == d.key))
            .map(|d| d.key)
            .collect();
        if !missing.is_empty() {
            return Err(ConsultifyError::validation(format!(
                "unscored dimensions: {}",
                missing.join(", ")
            )));
        }

        let now = db::now();
        assessment.status = AssessmentStatus::Completed;
        assessment.completed_at = Some(now);
        assessment.updated_at = now;
        with_transaction(conn, |tx| {
            tx.execute(
                "UPDATE assessments SET status = ?2, completed_at = ?3, updated_at = ?3
                 WHERE id = ?1",
                params![assessment.id, assessment.status, now],
            )?;
            let mut entry = AuditEntry::new(organization_id, "assessment.complete", "assessment")
                .entity(&assessment.id)
                .details(serde_json::json!({ "framework": assessment.framework }));
            entry.user_id = actor;
            audit::record(tx, entry)?;
            Ok(())
        })?;
        Ok(assessment)
    }

    pub fn summary(
        conn: &Connection,
        organization_id: &str,
        id: &str,
    ) -> Result<AssessmentSummary> {
        let assessment = Self::get(conn, organization_id, id)?;
        let scores = Self::scores(conn, &assessment.id)?;
        Ok(summarize(assessment.definition(), &scores))
    }
}

/// Aggregate scores against a framework definition. Scores for dimensions
/// the framework does not define are ignored.
pub fn summarize(def: &FrameworkDef, scores: &[Score]) -> AssessmentSummary {
    let scored: Vec<(&framework::Dimension, &Score)> = def
        .dimensions
        .iter()
        .filter_map(|d| scores.iter().find(|s| s.dimension == d.key).map(|s| (d, s)))
        .collect();

    let total_weight: f64 = scored.iter().map(|(_, s)| s.weight).sum();
    let weighted = |value: fn(&Score) -> f64| {
        (total_weight > 0.0)
            .then(|| scored.iter().map(|(_, s)| s.weight * value(s)).sum::<f64>() / total_weight)
    };
    let weighted_actual = weighted(|s| s.actual);
    let weighted_target = weighted(|s| s.target);

    let mut gaps: Vec<DimensionGap> = scored
        .iter()
        .map(|(d, s)| {
            let gap = (s.target - s.actual).max(0.0);
            DimensionGap {
                dimension: d.key.to_string(),
                label: d.label.to_string(),
                actual: s.actual,
                target: s.target,
                weight: s.weight,
                gap,
                weighted_gap: gap * s.weight,
            }
        })
        .collect();
    // Stable sort keeps framework order among equal gaps.
    gaps.sort_by(|a, b| b.weighted_gap.total_cmp(&a.weighted_gap));

    let barrier_point = (def.framework == Framework::Adkar)
        .then(|| {
            scored
                .iter()
                .find(|(_, s)| s.actual <= ADKAR_BARRIER_THRESHOLD)
                .map(|(d, _)| d.key.to_string())
        })
        .flatten();

    let total = def.dimensions.len();
    AssessmentSummary {
        framework: def.framework,
        scale_max: def.scale_max,
        scored: scored.len(),
        total_dimensions: total,
        completion_pct: if total == 0 {
            0.0
        } else {
            (scored.len() as f64 * 1000.0 / total as f64).round() / 10.0
        },
        weighted_actual,
        weighted_target,
        maturity_level: weighted_actual.map(|avg| avg.floor() as u32),
        gaps,
        barrier_point,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
