//! Decides what the project AI assistant may do.
//!
//! Every request to the assistant names an action. The project's [`AiRole`]
//! and regulatory-mode flag decide whether the action runs, needs a human
//! approval (filed as an `ai_action` change request), or is refused.

use crate::types::AiRole;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionClass {
    /// Read-only help: answers, explanations, research.
    Advisory,
    /// Produces a proposal a human may adopt.
    Drafting,
    /// Mutates project data.
    Executing,
    /// Never permitted to the assistant.
    Forbidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiAction {
    Explain,
    Summarize,
    Suggest,
    Analyze,
    Answer,
    Research,
    DraftTask,
    DraftInitiative,
    DraftChangeRequest,
    CreateTask,
    UpdateTask,
    CreateInitiative,
    UpdateInitiative,
    UpdateStatus,
    DeleteProject,
    DeleteTask,
    ManageUsers,
    ManageBilling,
}

impl AiAction {
    pub fn all() -> &'static [AiAction] {
        use AiAction::*;
        &[
            Explain,
            Summarize,
            Suggest,
            Analyze,
            Answer,
            Research,
            DraftTask,
            DraftInitiative,
            DraftChangeRequest,
            CreateTask,
            UpdateTask,
            CreateInitiative,
            UpdateInitiative,
            UpdateStatus,
            DeleteProject,
            DeleteTask,
            ManageUsers,
            ManageBilling,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AiAction::Explain => "explain",
            AiAction::Summarize => "summarize",
            AiAction::Suggest => "suggest",
            AiAction::Analyze => "analyze",
            AiAction::Answer => "answer",
            AiAction::Research => "research",
            AiAction::DraftTask => "draft_task",
            AiAction::DraftInitiative => "draft_initiative",
            AiAction::DraftChangeRequest => "draft_change_request",
            AiAction::CreateTask => "create_task",
            AiAction::UpdateTask => "update_task",
            AiAction::CreateInitiative => "create_initiative",
            AiAction::UpdateInitiative => "update_initiative",
            AiAction::UpdateStatus => "update_status",
            AiAction::DeleteProject => "delete_project",
            AiAction::DeleteTask => "delete_task",
            AiAction::ManageUsers => "manage_users",
            AiAction::ManageBilling => "manage_billing",
        }
    }

    /// `None` for strings that name no known action.
    pub fn parse(s: &str) -> Option<AiAction> {
        Self::all().iter().copied().find(|a| a.as_str() == s)
    }

    pub fn class(self) -> ActionClass {
        use AiAction::*;
        match self {
            Explain | Summarize | Suggest | Analyze | Answer | Research => ActionClass::Advisory,
            DraftTask | DraftInitiative | DraftChangeRequest => ActionClass::Drafting,
            CreateTask | UpdateTask | CreateInitiative | UpdateInitiative | UpdateStatus => {
                ActionClass::Executing
            }
            DeleteProject | DeleteTask | ManageUsers | ManageBilling => ActionClass::Forbidden,
        }
    }
}

impl fmt::Display for AiAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GuardDecision {
    Allowed,
    RequiresApproval,
    Denied { reason: String },
}

impl GuardDecision {
    fn denied(reason: impl Into<String>) -> Self {
        GuardDecision::Denied {
            reason: reason.into(),
        }
    }
}

pub const REGULATORY_DENIAL: &str = "regulatory mode: advisory only";

/// Evaluate a raw action string. Unknown actions are denied.
pub fn evaluate(ai_role: AiRole, regulatory_mode: bool, action: &str) -> GuardDecision {
    let decision = match AiAction::parse(action) {
        Some(action) => decide(ai_role, regulatory_mode, action),
        None => GuardDecision::denied(format!("unknown action '{action}'")),
    };
    if let GuardDecision::Denied { reason } = &decision {
        tracing::warn!(
            event = "guard_denied",
            action,
            ai_role = %ai_role,
            regulatory_mode,
            reason = %reason,
            "ai action denied"
        );
    }
    decision
}

fn decide(ai_role: AiRole, regulatory_mode: bool, action: AiAction) -> GuardDecision {
    let class = action.class();
    if class == ActionClass::Forbidden {
        return GuardDecision::denied(format!(
            "action '{action}' is never permitted to the assistant"
        ));
    }
    if class == ActionClass::Advisory {
        return GuardDecision::Allowed;
    }
    if regulatory_mode {
        return GuardDecision::denied(REGULATORY_DENIAL);
    }
    match ai_role {
        AiRole::Advisor => {
            GuardDecision::denied(format!("ADVISOR role may not perform '{action}'"))
        }
        AiRole::Manager => GuardDecision::RequiresApproval,
        AiRole::Operator => GuardDecision::Allowed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_action() {
        for action in AiAction::all() {
            assert_eq!(AiAction::parse(action.as_str()), Some(*action));
        }
        assert_eq!(AiAction::parse("launch_missiles"), None);
    }

    #[test]
    fn unknown_action_is_denied() {
        assert!(matches!(
            evaluate(AiRole::Operator, false, "launch_missiles"),
            GuardDecision::Denied { .. }
        ));
    }

    #[test]
    fn deny_list_beats_every_role() {
        for role in AiRole::all() {
            for action in ["delete_project", "delete_task", "manage_users", "manage_billing"] {
                assert!(
                    matches!(evaluate(*role, false, action), GuardDecision::Denied { .. }),
                    "{role} allowed {action}"
                );
            }
        }
    }

    #[test]
    fn advisor_only_advises() {
        assert_eq!(evaluate(AiRole::Advisor, false, "explain"), GuardDecision::Allowed);
        assert!(matches!(
            evaluate(AiRole::Advisor, false, "draft_task"),
            GuardDecision::Denied { .. }
        ));
        assert!(matches!(
            evaluate(AiRole::Advisor, false, "create_task"),
            GuardDecision::Denied { .. }
        ));
    }

    #[test]
    fn manager_needs_approval_to_act() {
        assert_eq!(evaluate(AiRole::Manager, false, "summarize"), GuardDecision::Allowed);
        assert_eq!(
            evaluate(AiRole::Manager, false, "draft_initiative"),
            GuardDecision::RequiresApproval
        );
        assert_eq!(
            evaluate(AiRole::Manager, false, "create_task"),
            GuardDecision::RequiresApproval
        );
    }

    #[test]
    fn operator_acts_directly() {
        assert_eq!(evaluate(AiRole::Operator, false, "update_status"), GuardDecision::Allowed);
        assert_eq!(evaluate(AiRole::Operator, false, "draft_task"), GuardDecision::Allowed);
    }

    #[test]
    fn regulatory_mode_restricts_to_advisory() {
        for role in AiRole::all() {
            assert_eq!(evaluate(*role, true, "research"), GuardDecision::Allowed);
            assert_eq!(
                evaluate(*role, true, "create_task"),
                GuardDecision::Denied {
                    reason: REGULATORY_DENIAL.to_string()
                }
            );
            assert_eq!(
                evaluate(*role, true, "draft_task"),
                GuardDecision::Denied {
                    reason: REGULATORY_DENIAL.to_string()
                }
            );
        }
    }
}
