//! Role → permission allow-lists.

use crate::error::{ConsultifyError, Result};
use crate::types::Role;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewProjects,
    ManageProjects,
    ViewTasks,
    ManageTasks,
    ManageInitiatives,
    ViewAssessments,
    RunAssessments,
    SubmitChangeRequests,
    DecideChangeRequests,
    ManageUsers,
    ManageIntegrations,
    ViewBilling,
    ManageBilling,
    ViewAudit,
    UseAi,
    ExportReports,
    ViewAnalytics,
    ManageOrganizations,
}

impl Permission {
    pub fn all() -> &'static [Permission] {
        use Permission::*;
        &[
            ViewProjects,
            ManageProjects,
            ViewTasks,
            ManageTasks,
            ManageInitiatives,
            ViewAssessments,
            RunAssessments,
            SubmitChangeRequests,
            DecideChangeRequests,
            ManageUsers,
            ManageIntegrations,
            ViewBilling,
            ManageBilling,
            ViewAudit,
            UseAi,
            ExportReports,
            ViewAnalytics,
            ManageOrganizations,
        ]
    }
}

const MANAGER: &[Permission] = &[
    Permission::ViewProjects,
    Permission::ManageProjects,
    Permission::ViewTasks,
    Permission::ManageTasks,
    Permission::ManageInitiatives,
    Permission::ViewAssessments,
    Permission::RunAssessments,
    Permission::SubmitChangeRequests,
    Permission::DecideChangeRequests,
    Permission::ViewBilling,
    Permission::ViewAudit,
    Permission::UseAi,
    Permission::ExportReports,
    Permission::ViewAnalytics,
];

const USER: &[Permission] = &[
    Permission::ViewProjects,
    Permission::ViewTasks,
    Permission::ManageTasks,
    Permission::ViewAssessments,
    Permission::RunAssessments,
    Permission::SubmitChangeRequests,
    Permission::UseAi,
    Permission::ExportReports,
    Permission::ViewAnalytics,
];

const VIEWER: &[Permission] = &[
    Permission::ViewProjects,
    Permission::ViewTasks,
    Permission::ViewAssessments,
    Permission::ExportReports,
    Permission::ViewAnalytics,
];

impl Role {
    pub fn allows(self, permission: Permission) -> bool {
        match self {
            Role::SuperAdmin => true,
            Role::Admin => permission != Permission::ManageOrganizations,
            Role::Manager => MANAGER.contains(&permission),
            Role::User => USER.contains(&permission),
            Role::Viewer => VIEWER.contains(&permission),
        }
    }

    pub fn permissions(self) -> Vec<Permission> {
        Permission::all()
            .iter()
            .copied()
            .filter(|p| self.allows(*p))
            .collect()
    }
}

pub fn require(role: Role, permission: Permission) -> Result<()> {
    if role.allows(permission) {
        Ok(())
    } else {
        Err(ConsultifyError::Forbidden(format!(
            "role {role} lacks permission {permission:?}"
        )))
    }
}
