use crate::analytics::{initiative_progress, InitiativeProgress};
use crate::error::Result;
use crate::initiative::{Initiative, InitiativeFilter};
use crate::project::Project;
use crate::task::{Task, TaskFilter};
use chrono::{Datelike, NaiveDate};
use rusqlite::Connection;
use serde::Serialize;

pub const UNSCHEDULED: &str = "unscheduled";

#[derive(Debug, Clone, Serialize)]
pub struct RoadmapEntry {
    pub initiative: Initiative,
    pub progress: InitiativeProgress,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoadmapBucket {
    /// `2026-Q3`, or `unscheduled` for initiatives without a start date.
    pub quarter: String,
    pub initiatives: Vec<RoadmapEntry>,
}

pub fn quarter_label(date: NaiveDate) -> String {
    format!("{}-Q{}", date.year(), date.month0() / 3 + 1)
}

/// Group live initiatives into calendar quarters by start date, oldest
/// quarter first and the unscheduled bucket last.
pub fn roadmap(
    conn: &Connection,
    organization_id: &str,
    project_id: Option<&str>,
) -> Result<Vec<RoadmapBucket>> {
    if let Some(id) = project_id {
        Project::get(conn, organization_id, id)?;
    }
    let initiatives = Initiative::list(
        conn,
        organization_id,
        &InitiativeFilter {
            project_id: project_id.map(str::to_string),
            ..Default::default()
        },
    )?;
    let tasks = Task::list(
        conn,
        organization_id,
        &TaskFilter {
            project_id: project_id.map(str::to_string),
            ..Default::default()
        },
    )?;

    // Initiative::list orders by start date with undated ones last, so
    // buckets come out in order when built sequentially.
    let mut buckets: Vec<RoadmapBucket> = Vec::new();
    for initiative in initiatives {
        let quarter = initiative
            .start_date
            .map_or_else(|| UNSCHEDULED.to_string(), quarter_label);
        let entry = RoadmapEntry {
            progress: initiative_progress(&initiative, &tasks),
            initiative,
        };
        match buckets.last_mut() {
            Some(bucket) if bucket.quarter == quarter => bucket.initiatives.push(entry),
            _ => buckets.push(RoadmapBucket {
                quarter,
                initiatives: vec![entry],
            }),
        }
    }
    Ok(buckets)
}
