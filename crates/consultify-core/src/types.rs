use crate::error::ConsultifyError;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declares a closed set of string-valued variants that round-trip through
/// serde, `FromStr`/`Display` and SQLite TEXT columns with the same spelling.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub fn all() -> &'static [$name] {
                &[$($name::$variant),+]
            }

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ConsultifyError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(ConsultifyError::invalid($field, s)),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: ConsultifyError| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

text_enum! {
    /// Platform role of a user inside its organization.
    Role, "role" {
        SuperAdmin => "SUPERADMIN",
        Admin => "ADMIN",
        Manager => "MANAGER",
        User => "USER",
        Viewer => "VIEWER",
    }
}

impl Role {
    /// Higher ranks may assign any role at or below their own.
    pub fn rank(self) -> u8 {
        match self {
            Role::SuperAdmin => 4,
            Role::Admin => 3,
            Role::Manager => 2,
            Role::User => 1,
            Role::Viewer => 0,
        }
    }

    pub fn can_assign(self, other: Role) -> bool {
        self.rank() >= other.rank()
    }
}

text_enum! {
    UserStatus, "user status" {
        Active => "active",
        Invited => "invited",
        Disabled => "disabled",
    }
}

text_enum! {
    Plan, "plan" {
        Free => "free",
        Pro => "pro",
        Enterprise => "enterprise",
    }
}

// ---------------------------------------------------------------------------
// Projects, tasks, initiatives
// ---------------------------------------------------------------------------

text_enum! {
    /// Behaviour profile of the AI assistant attached to a project.
    AiRole, "ai role" {
        Advisor => "ADVISOR",
        Manager => "MANAGER",
        Operator => "OPERATOR",
    }
}

text_enum! {
    ProjectStatus, "project status" {
        Active => "active",
        OnHold => "on_hold",
        Completed => "completed",
        Archived => "archived",
    }
}

text_enum! {
    TaskStatus, "task status" {
        Todo => "todo",
        InProgress => "in_progress",
        Blocked => "blocked",
        Done => "done",
    }
}

text_enum! {
    TaskPriority, "task priority" {
        Low => "low",
        Medium => "medium",
        High => "high",
        Urgent => "urgent",
    }
}

text_enum! {
    InitiativeStatus, "initiative status" {
        Draft => "draft",
        Planned => "planned",
        InProgress => "in_progress",
        Completed => "completed",
        OnHold => "on_hold",
    }
}

// ---------------------------------------------------------------------------
// Assessments
// ---------------------------------------------------------------------------

text_enum! {
    Framework, "framework" {
        Drd => "DRD",
        RapidLean => "RAPID_LEAN",
        Adkar => "ADKAR",
        CmmiDmm => "CMMI_DMM",
        TechDebt => "TECH_DEBT",
    }
}

text_enum! {
    AssessmentStatus, "assessment status" {
        Draft => "draft",
        InProgress => "in_progress",
        Completed => "completed",
    }
}

// ---------------------------------------------------------------------------
// Governance, billing, integrations
// ---------------------------------------------------------------------------

text_enum! {
    ChangeKind, "change request kind" {
        Scope => "scope",
        Schedule => "schedule",
        Budget => "budget",
        AiAction => "ai_action",
    }
}

text_enum! {
    ChangeStatus, "change request status" {
        Draft => "draft",
        Submitted => "submitted",
        Approved => "approved",
        Rejected => "rejected",
        Implemented => "implemented",
        Withdrawn => "withdrawn",
    }
}

text_enum! {
    LedgerKind, "ledger kind" {
        Credit => "credit",
        Debit => "debit",
    }
}

text_enum! {
    /// Third-party API a tenant can configure credentials for.
    Provider, "provider" {
        OpenAi => "openai",
        Anthropic => "anthropic",
        Gemini => "gemini",
        Tavily => "tavily",
    }
}

impl Provider {
    /// Chat-capable providers (Tavily is search only).
    pub fn is_chat(self) -> bool {
        !matches!(self, Provider::Tavily)
    }

    pub fn env_key(self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::Tavily => "TAVILY_API_KEY",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
