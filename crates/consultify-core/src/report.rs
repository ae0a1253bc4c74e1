//! PDF exports of assessments and project status.

use crate::analytics;
use crate::assessment::{self, Assessment};
use crate::error::Result;
use crate::governance::{ChangeRequest, ChangeRequestFilter};
use crate::organization::Organization;
use crate::pdf::{self, Document, Font, Page, Rgb};
use crate::project::Project;
use crate::types::ChangeStatus;
use chrono::Utc;
use rusqlite::Connection;

const MARGIN_X: f64 = 56.0;
const TOP_Y: f64 = 786.0;
const BOTTOM_Y: f64 = 72.0;
const CONTENT_WIDTH: f64 = pdf::A4_WIDTH - 2.0 * MARGIN_X;
const BODY_SIZE: f64 = 10.0;
const LINE_HEIGHT: f64 = 14.0;
const BAR_WIDTH: f64 = 160.0;

/// Top-to-bottom writer that starts a new page when content would cross
/// the bottom margin.
struct Layout {
    doc: Document,
    title: String,
    y: f64,
}

impl Layout {
    fn new(title: &str) -> Self {
        let mut doc = Document::new(title);
        doc.add_page();
        Self {
            doc,
            title: title.to_string(),
            y: TOP_Y,
        }
    }

    fn page(&mut self) -> &mut Page {
        let pages = self.doc.pages_mut();
        let last = pages.len() - 1;
        &mut pages[last]
    }

    fn ensure(&mut self, needed: f64) {
        if self.y - needed < BOTTOM_Y {
            self.doc.add_page();
            self.y = TOP_Y;
        }
    }

    fn space(&mut self, h: f64) {
        self.y -= h;
    }

    fn title(&mut self, text: &str) {
        self.ensure(30.0);
        let y = self.y;
        self.page().text(MARGIN_X, y, 20.0, Font::HelveticaBold, text);
        self.y -= 30.0;
    }

    fn heading(&mut self, text: &str) {
        self.ensure(40.0);
        self.space(8.0);
        let y = self.y;
        let page = self.page();
        page.text(MARGIN_X, y, 13.0, Font::HelveticaBold, text);
        page.line(MARGIN_X, y - 4.0, MARGIN_X + CONTENT_WIDTH, y - 4.0, 0.5, Rgb::GREY);
        self.y -= 22.0;
    }

    fn text(&mut self, text: &str) {
        for line in wrap(text, CONTENT_WIDTH, BODY_SIZE, Font::Helvetica) {
            self.ensure(LINE_HEIGHT);
            let y = self.y;
            self.page().text(MARGIN_X, y, BODY_SIZE, Font::Helvetica, &line);
            self.y -= LINE_HEIGHT;
        }
    }

    fn field(&mut self, label: &str, value: &str) {
        self.ensure(LINE_HEIGHT);
        let y = self.y;
        let page = self.page();
        page.text(MARGIN_X, y, BODY_SIZE, Font::HelveticaBold, &format!("{label}:"));
        page.text(MARGIN_X + 110.0, y, BODY_SIZE, Font::Helvetica, value);
        self.y -= LINE_HEIGHT;
    }

    /// Stamp every page with the report title and `Page i of n`.
    fn finish(mut self) -> Vec<u8> {
        let total = self.doc.page_count();
        let title = self.title.clone();
        for (i, page) in self.doc.pages_mut().iter_mut().enumerate() {
            page.line(MARGIN_X, 50.0, MARGIN_X + CONTENT_WIDTH, 50.0, 0.5, Rgb::GREY);
            page.text(MARGIN_X, 38.0, 8.0, Font::Helvetica, &title);
            let label = format!("Page {} of {total}", i + 1);
            let x = MARGIN_X + CONTENT_WIDTH - pdf::text_width(&label, 8.0, Font::Helvetica);
            page.text(x, 38.0, 8.0, Font::Helvetica, &label);
        }
        self.doc.to_bytes()
    }
}

/// Greedy word wrap using estimated glyph widths. Words longer than a line
/// are kept whole.
fn wrap(text: &str, max_width: f64, size: f64, font: Font) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if !current.is_empty() && pdf::text_width(&candidate, size, font) > max_width {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn fmt_score(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

pub fn assessment_report(
    conn: &Connection,
    organization_id: &str,
    assessment_id: &str,
) -> Result<Vec<u8>> {
    let assessment = Assessment::get(conn, organization_id, assessment_id)?;
    let org = Organization::get(conn, organization_id)?;
    let project = Project::get(conn, organization_id, &assessment.project_id)?;
    let def = assessment.definition();
    let scores = Assessment::scores(conn, &assessment.id)?;
    let summary = assessment::summarize(def, &scores);
    let date = assessment.completed_at.unwrap_or_else(Utc::now).format("%Y-%m-%d");

    let mut layout = Layout::new(&format!("{} - {}", def.name, assessment.name));
    layout.title("Assessment Report");
    layout.field("Organization", &org.name);
    layout.field("Project", &project.name);
    layout.field("Framework", def.name);
    layout.field("Assessment", &assessment.name);
    layout.field("Status", assessment.status.as_str());
    layout.field("Date", &date.to_string());

    layout.heading("Summary");
    layout.field("Weighted actual", &fmt_score(summary.weighted_actual));
    layout.field("Weighted target", &fmt_score(summary.weighted_target));
    layout.field(
        "Maturity level",
        &summary
            .maturity_level
            .map_or_else(|| "-".to_string(), |l| format!("{l} of {}", def.scale_max)),
    );
    layout.field(
        "Completion",
        &format!(
            "{:.0}% ({} of {} dimensions)",
            summary.completion_pct, summary.scored, summary.total_dimensions
        ),
    );
    if let Some(barrier) = &summary.barrier_point {
        let label = def.dimension(barrier).map_or(barrier.as_str(), |d| d.label);
        layout.field("Barrier point", label);
    }

    layout.heading("Dimensions");
    let columns = [
        MARGIN_X,
        MARGIN_X + 170.0,
        MARGIN_X + 215.0,
        MARGIN_X + 260.0,
        MARGIN_X + 310.0,
    ];
    layout.ensure(LINE_HEIGHT * 2.0);
    {
        let y = layout.y;
        let page = layout.page();
        let labels = ["Dimension", "Actual", "Target", "Gap", "Actual vs target"];
        for (x, label) in columns.iter().zip(labels) {
            page.text(*x, y, 9.0, Font::HelveticaBold, label);
        }
    }
    layout.space(LINE_HEIGHT + 2.0);

    for dim in def.dimensions {
        layout.ensure(LINE_HEIGHT + 2.0);
        let y = layout.y;
        let score = scores.iter().find(|s| s.dimension == dim.key);
        let page = layout.page();
        page.text(columns[0], y, 9.0, Font::Helvetica, dim.label);
        match score {
            Some(s) => {
                let gap = (s.target - s.actual).max(0.0);
                page.text(columns[1], y, 9.0, Font::Helvetica, &format!("{:.1}", s.actual));
                page.text(columns[2], y, 9.0, Font::Helvetica, &format!("{:.1}", s.target));
                page.text(columns[3], y, 9.0, Font::Helvetica, &format!("{gap:.1}"));
                page.rect(columns[4], y - 1.0, BAR_WIDTH, 8.0, Rgb::LIGHT);
                let actual_width = BAR_WIDTH * s.actual / def.scale_max;
                page.rect(columns[4], y - 1.0, actual_width, 8.0, Rgb::GREY);
                let tx = columns[4] + BAR_WIDTH * s.target / def.scale_max;
                page.line(tx, y - 3.0, tx, y + 9.0, 1.2, Rgb::BLACK);
            }
            None => page.text(columns[1], y, 9.0, Font::Helvetica, "not scored"),
        }
        layout.space(LINE_HEIGHT + 2.0);
    }

    layout.heading("Recommendations");
    let top: Vec<_> = summary.top_gaps(3).iter().filter(|g| g.gap > 0.0).collect();
    if top.is_empty() {
        layout.text("All scored dimensions meet their targets.");
    }
    for (i, gap) in top.iter().enumerate() {
        layout.text(&format!(
            "{}. {}: raise from {:.1} to {:.1} (gap {:.1}, weight {:.1}).",
            i + 1,
            gap.label,
            gap.actual,
            gap.target,
            gap.gap,
            gap.weight
        ));
        if let Some(s) = scores.iter().find(|s| s.dimension == gap.dimension) {
            if !s.justification.is_empty() {
                layout.text(&format!("   Current state: {}", s.justification));
            }
        }
    }

    Ok(layout.finish())
}

pub fn project_report(
    conn: &Connection,
    organization_id: &str,
    project_id: &str,
) -> Result<Vec<u8>> {
    let org = Organization::get(conn, organization_id)?;
    let project = Project::get(conn, organization_id, project_id)?;
    let progress = analytics::project_progress(conn, organization_id, &project.id)?;
    let open_changes: Vec<ChangeRequest> = ChangeRequest::list(
        conn,
        organization_id,
        &ChangeRequestFilter {
            project_id: Some(project.id.clone()),
            ..Default::default()
        },
    )?
    .into_iter()
    .filter(|cr| {
        matches!(
            cr.status,
            ChangeStatus::Draft | ChangeStatus::Submitted | ChangeStatus::Approved
        )
    })
    .collect();

    let mut layout = Layout::new(&format!("{} - status", project.name));
    layout.title("Project Status Report");
    layout.field("Organization", &org.name);
    layout.field("Project", &project.name);
    layout.field("Status", project.status.as_str());
    layout.field("AI role", project.ai_role.as_str());
    layout.field(
        "Regulatory mode",
        if project.regulatory_mode { "on" } else { "off" },
    );
    layout.field("Generated", &Utc::now().format("%Y-%m-%d").to_string());
    if !project.description.is_empty() {
        layout.space(4.0);
        layout.text(&project.description);
    }

    layout.heading("Tasks");
    for (status, count) in &progress.tasks_by_status {
        layout.field(status.as_str(), &count.to_string());
    }
    layout.field(
        "Completion",
        &format!(
            "{:.1}% ({} of {})",
            progress.completion_pct, progress.task_done, progress.task_total
        ),
    );

    layout.heading("Initiatives");
    if progress.initiatives.is_empty() {
        layout.text("No initiatives.");
    }
    for item in &progress.initiatives {
        layout.text(&format!(
            "{} [{}] - {} of {} tasks done ({:.0}%)",
            item.name, item.status, item.task_done, item.task_total, item.progress_pct
        ));
    }

    layout.heading("Open change requests");
    if open_changes.is_empty() {
        layout.text("None.");
    }
    for cr in &open_changes {
        layout.text(&format!("{} [{} / {}]", cr.title, cr.kind, cr.status));
    }

    Ok(layout.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db;
    use crate::initiative::{Initiative, NewInitiative};
    use crate::seed::seed_demo;

    fn as_text(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    #[test]
    fn wrap_respects_width() {
        let text = "one two three four five six seven eight nine ten";
        let lines = wrap(text, 60.0, 10.0, Font::Helvetica);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(pdf::text_width(line, 10.0, Font::Helvetica) <= 60.0 || !line.contains(' '));
        }
        assert_eq!(lines.join(" "), text);
    }

    #[test]
    fn assessment_report_contents() {
        let conn = db::open_in_memory().unwrap();
        let demo = seed_demo(&conn, &AppConfig::default(), "Acme").unwrap();
        let bytes = assessment_report(&conn, &demo.organization_id, &demo.assessment_id).unwrap();
        let text = as_text(&bytes);

        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.contains("(Assessment Report) Tj"));
        assert!(text.contains("(Digital Readiness Diagnosis) Tj"));
        assert!(text.contains("(Cybersecurity) Tj"));
        assert!(text.contains("(Recommendations) Tj"));
        // data_management has the largest gap in the demo scores.
        assert!(text.contains("1. Data Management: raise from 2.0 to 5.0"));
        assert!(text.contains("(Page 1 of 1) Tj"));
    }

    #[test]
    fn long_project_report_spans_pages() {
        let conn = db::open_in_memory().unwrap();
        let demo = seed_demo(&conn, &AppConfig::default(), "Acme").unwrap();
        for i in 0..80 {
            Initiative::create(
                &conn,
                &demo.organization_id,
                &demo.project_id,
                &NewInitiative {
                    name: format!("Initiative {i}"),
                    ..Default::default()
                },
            )
            .unwrap();
        }
        let pdf = project_report(&conn, &demo.organization_id, &demo.project_id).unwrap();
        let text = as_text(&pdf);
        assert!(text.contains("(Project Status Report) Tj"));
        assert!(text.contains("Page 2 of"));
        assert!(!text.contains("/Count 1 "));
    }

    #[test]
    fn missing_assessment_is_not_found() {
        let conn = db::open_in_memory().unwrap();
        let demo = seed_demo(&conn, &AppConfig::default(), "Acme").unwrap();
        assert!(assessment_report(&conn, &demo.organization_id, "nope").is_err());
    }
}
