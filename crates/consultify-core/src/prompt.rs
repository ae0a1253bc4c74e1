//! System prompt assembly for the project assistant.

use crate::assessment::{Assessment, DimensionGap};
use crate::error::Result;
use crate::project::Project;
use crate::task::{self, Task, TaskFilter};
use crate::types::{AiRole, Framework, TaskStatus};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::fmt::Write;

const PERSONA: &str = "You are Consultify, a senior digital transformation consultant. \
You help organizations assess their maturity, plan initiatives and deliver change. \
Be concrete, structured and honest about uncertainty.";

const REGULATORY_BLOCK: &str = "REGULATORY MODE IS ACTIVE.
- You must not execute, create, modify or delete anything. Advise only.
- Cite the source or framework behind every recommendation.
- End every answer with: \"This is advisory guidance and not a decision; a qualified person must review it.\"";

/// Snapshot of the latest assessment, reduced to what the prompt needs.
#[derive(Debug, Clone)]
pub struct AssessmentDigest {
    pub name: String,
    pub framework: Framework,
    pub weighted_actual: Option<f64>,
    pub maturity_level: Option<u32>,
    pub top_gaps: Vec<DimensionGap>,
}

#[derive(Debug, Clone)]
pub struct PromptContext {
    pub project_name: String,
    pub project_description: String,
    pub ai_role: AiRole,
    pub regulatory_mode: bool,
    pub task_counts: BTreeMap<TaskStatus, usize>,
    pub assessment: Option<AssessmentDigest>,
    /// ISO 639-1 code; unknown codes are passed through verbatim.
    pub language: Option<String>,
}

impl PromptContext {
    /// Gather the project, its task counts and latest assessment.
    pub fn load(
        conn: &Connection,
        organization_id: &str,
        project: &Project,
        language: Option<&str>,
    ) -> Result<PromptContext> {
        let tasks = Task::list(
            conn,
            organization_id,
            &TaskFilter {
                project_id: Some(project.id.clone()),
                ..Default::default()
            },
        )?;
        let assessment = match Assessment::latest_for_project(conn, organization_id, &project.id)? {
            Some(latest) => {
                let summary = Assessment::summary(conn, organization_id, &latest.id)?;
                Some(AssessmentDigest {
                    name: latest.name,
                    framework: latest.framework,
                    weighted_actual: summary.weighted_actual,
                    maturity_level: summary.maturity_level,
                    top_gaps: summary.top_gaps(3).to_vec(),
                })
            }
            None => None,
        };
        Ok(PromptContext {
            project_name: project.name.clone(),
            project_description: project.description.clone(),
            ai_role: project.ai_role,
            regulatory_mode: project.regulatory_mode,
            task_counts: task::count_by_status(&tasks),
            assessment,
            language: language.map(str::to_string),
        })
    }
}

fn role_section(role: AiRole) -> &'static str {
    match role {
        AiRole::Advisor => "ROLE: ADVISOR. Explain, analyze and recommend. \
Never claim to have changed project data; describe what a person should do instead.",
        AiRole::Manager => "ROLE: MANAGER. You may propose tasks, initiatives and change requests. \
Every proposal is filed for human approval before anything changes; say so explicitly.",
        AiRole::Operator => "ROLE: OPERATOR. You may create and update tasks and initiatives \
when asked. Confirm exactly what you changed.",
    }
}

pub fn language_name(code: &str) -> &str {
    match code.to_ascii_lowercase().as_str() {
        "en" => "English",
        "pl" => "Polish",
        "de" => "German",
        "ar" => "Arabic",
        "ja" => "Japanese",
        _ => code,
    }
}

/// Concatenate persona, role, regulatory block, project context and the
/// output-language instruction. Deterministic for a given context.
pub fn build_system_prompt(ctx: &PromptContext) -> String {
    let mut out = String::new();
    out.push_str(PERSONA);
    out.push_str("\n\n");
    out.push_str(role_section(ctx.ai_role));
    out.push_str("\n\n");
    if ctx.regulatory_mode {
        out.push_str(REGULATORY_BLOCK);
        out.push_str("\n\n");
    }

    // Writing to a String cannot fail.
    let _ = writeln!(out, "PROJECT: {}", ctx.project_name);
    if !ctx.project_description.is_empty() {
        let _ = writeln!(out, "Description: {}", ctx.project_description);
    }
    let open: usize = ctx
        .task_counts
        .iter()
        .filter(|(status, _)| **status != TaskStatus::Done)
        .map(|(_, n)| n)
        .sum();
    let breakdown: Vec<String> = ctx
        .task_counts
        .iter()
        .map(|(status, n)| format!("{status}={n}"))
        .collect();
    let _ = writeln!(out, "Open tasks: {open} ({})", breakdown.join(", "));

    match &ctx.assessment {
        Some(a) => {
            let _ = write!(out, "Latest assessment: {} [{}]", a.name, a.framework);
            if let (Some(avg), Some(level)) = (a.weighted_actual, a.maturity_level) {
                let _ = write!(out, ", weighted score {avg:.2}, maturity level {level}");
            }
            out.push('\n');
            if !a.top_gaps.is_empty() {
                out.push_str("Largest gaps:\n");
                for gap in &a.top_gaps {
                    let _ = writeln!(
                        out,
                        "- {}: actual {:.1}, target {:.1}, gap {:.1}",
                        gap.label, gap.actual, gap.target, gap.gap
                    );
                }
            }
        }
        None => out.push_str("No assessment has been recorded yet.\n"),
    }

    let language = ctx.language.as_deref().map_or("English", language_name);
    let _ = write!(out, "\nRespond in {language}.");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> PromptContext {
        let mut task_counts: BTreeMap<TaskStatus, usize> =
            TaskStatus::all().iter().map(|s| (*s, 0)).collect();
        task_counts.insert(TaskStatus::Todo, 3);
        task_counts.insert(TaskStatus::Done, 5);
        PromptContext {
            project_name: "Plant 4.0".into(),
            project_description: "Digitize the Gdansk plant".into(),
            ai_role: AiRole::Manager,
            regulatory_mode: false,
            task_counts,
            assessment: Some(AssessmentDigest {
                name: "DRD baseline".into(),
                framework: Framework::Drd,
                weighted_actual: Some(3.25),
                maturity_level: Some(3),
                top_gaps: vec![DimensionGap {
                    dimension: "data_management".into(),
                    label: "Data Management".into(),
                    actual: 2.0,
                    target: 5.0,
                    weight: 1.0,
                    gap: 3.0,
                    weighted_gap: 3.0,
                }],
            }),
            language: Some("pl".into()),
        }
    }

    #[test]
    fn includes_role_context_and_language() {
        let prompt = build_system_prompt(&context());
        assert!(prompt.starts_with("You are Consultify"));
        assert!(prompt.contains("ROLE: MANAGER"));
        assert!(prompt.contains("PROJECT: Plant 4.0"));
        assert!(prompt.contains("Open tasks: 3"));
        assert!(prompt.contains("maturity level 3"));
        assert!(prompt.contains("- Data Management: actual 2.0, target 5.0, gap 3.0"));
        assert!(prompt.ends_with("Respond in Polish."));
        assert!(!prompt.contains("REGULATORY MODE"));
    }

    #[test]
    fn regulatory_block_only_when_enabled() {
        let mut ctx = context();
        ctx.regulatory_mode = true;
        let prompt = build_system_prompt(&ctx);
        assert!(prompt.contains("REGULATORY MODE IS ACTIVE"));
        assert!(prompt.contains("advisory guidance"));
    }

    #[test]
    fn deterministic_and_defaults_to_english() {
        let mut ctx = context();
        ctx.language = None;
        ctx.assessment = None;
        let a = build_system_prompt(&ctx);
        assert_eq!(a, build_system_prompt(&ctx));
        assert!(a.contains("No assessment has been recorded yet."));
        assert!(a.ends_with("Respond in English."));
    }

    #[test]
    fn unknown_language_code_passes_through() {
        assert_eq!(language_name("fr"), "fr");
        assert_eq!(language_name("DE"), "German");
    }
}
