use crate::types::{ChatResponse, ResponseMode};

pub const FALLBACK_PROVIDER: &str = "fallback";
pub const FALLBACK_MODEL: &str = "consultify-guidance";

/// Keyword → canned guidance, first match wins.
const TOPICS: &[(&[&str], &str)] = &[
    (
        &["assessment", "maturity", "drd", "score", "gap"],
        "Start from the latest completed assessment. Focus on the three dimensions \
         with the largest weighted gap between actual and target, and confirm each \
         score has a written justification before planning initiatives.",
    ),
    (
        &["roadmap", "quarter", "timeline", "schedule"],
        "Sequence initiatives so that foundational work (data management, processes) \
         lands in the earliest quarters. Keep no more than two initiatives in progress \
         per quarter and give every initiative a start and end date.",
    ),
    (
        &["initiative", "project", "plan"],
        "Define each initiative with a single owner, a DRD axis it improves, a budget \
         and an expected ROI. Break it into tasks with due dates and review progress \
         against the roadmap every month.",
    ),
    (
        &["risk", "change", "adkar", "resistance", "adoption"],
        "Check the ADKAR barrier point: the first element scoring 3 or lower blocks \
         everything after it. Address awareness and desire with sponsors before \
         investing in training.",
    ),
    (
        &["budget", "cost", "roi", "token"],
        "Compare initiative budgets with their expected ROI and fund the ones closing \
         the largest maturity gaps first. Budget changes go through a change request.",
    ),
];

const GENERAL: &str = "Review open tasks and overdue items, then revisit the largest \
     maturity gaps from your latest assessment to decide the next step.";

/// Deterministic offline answer used when no provider can be reached.
/// The same message always yields the same text.
pub fn fallback_response(message: &str) -> ChatResponse {
    let lower = message.to_lowercase();
    let guidance = TOPICS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map_or(GENERAL, |(_, text)| text);
    ChatResponse {
        text: format!(
            "AI providers are currently unavailable, so here is general guidance. {guidance}"
        ),
        provider: FALLBACK_PROVIDER.to_string(),
        model: FALLBACK_MODEL.to_string(),
        usage: None,
        mode: ResponseMode::Fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_topic_by_keyword() {
        let r = fallback_response("What should our ROADMAP look like?");
        assert_eq!(r.mode, ResponseMode::Fallback);
        assert!(r.text.contains("Sequence initiatives"));
        assert!(r.usage.is_none());
    }

    #[test]
    fn deterministic_and_general_default() {
        let a = fallback_response("hello there");
        let b = fallback_response("hello there");
        assert_eq!(a.text, b.text);
        assert!(a.text.contains("Review open tasks"));
        assert_eq!(a.provider, FALLBACK_PROVIDER);
    }
}
