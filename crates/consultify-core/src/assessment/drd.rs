//! Parser for the DRD knowledge base.
//!
//! The source text is a flat dump in which each area starts with a header
//! such as `Area 1A. Process integration` followed by `Level N. <title>`
//! headers, each level's description running until the next header.

use super::framework::DRD_AXES;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrdLevel {
    pub level: u32,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrdArea {
    /// Axis number plus area letter, e.g. `1A`.
    pub id: String,
    pub name: String,
    pub levels: Vec<DrdLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrdAxis {
    pub id: u8,
    pub name: String,
    pub areas: Vec<DrdArea>,
}

fn area_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Area (\d)([A-Z])\.\s*(.*)").unwrap())
}

fn level_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Level\s*(\d+)\s*\.\s*(.*)").unwrap())
}

/// Canonical name of DRD axis `id` (1-based).
pub fn axis_name(id: u8) -> String {
    match DRD_AXES.get(usize::from(id).wrapping_sub(1)) {
        Some(dim) => dim.label.to_string(),
        None => format!("Axis {id}"),
    }
}

/// Parse knowledge-base text into axes → areas → levels.
///
/// Axes appear in order of first mention. Text before the first area header
/// is ignored. Descriptions have all whitespace runs collapsed to one space.
pub fn parse_areas(text: &str) -> Vec<DrdAxis> {
    let headers: Vec<_> = area_re().captures_iter(text).collect();
    let mut axes: Vec<DrdAxis> = Vec::new();

    for (i, caps) in headers.iter().enumerate() {
        let (Some(whole), Some(axis), Some(letter), Some(name)) =
            (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
        else {
            continue;
        };
        let Ok(axis_id) = axis.as_str().parse::<u8>() else {
            continue;
        };
        let body_end = headers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(text.len(), |m| m.start());
        let body = &text[whole.end()..body_end];

        let area = DrdArea {
            id: format!("{axis_id}{}", letter.as_str()),
            name: name.as_str().trim().to_string(),
            levels: parse_levels(body),
        };

        match axes.iter_mut().find(|a| a.id == axis_id) {
            Some(existing) => existing.areas.push(area),
            None => axes.push(DrdAxis {
                id: axis_id,
                name: axis_name(axis_id),
                areas: vec![area],
            }),
        }
    }
    axes
}

fn parse_levels(body: &str) -> Vec<DrdLevel> {
    let headers: Vec<_> = level_re().captures_iter(body).collect();
    headers
        .iter()
        .enumerate()
        .filter_map(|(j, caps)| {
            let whole = caps.get(0)?;
            let level = caps.get(1)?.as_str().parse().ok()?;
            let title = caps.get(2)?.as_str().trim().to_string();
            let end = headers
                .get(j + 1)
                .and_then(|next| next.get(0))
                .map_or(body.len(), |m| m.start());
            Some(DrdLevel {
                level,
                title,
                description: collapse_whitespace(&body[whole.end()..end]),
            })
        })
        .collect()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
