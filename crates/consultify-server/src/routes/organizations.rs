use axum::extract::{Path, State};
use axum::{Extension, Json};
use consultify_core::audit::{self, AuditEntry};
use consultify_core::organization::{Organization, OrganizationPatch};
use consultify_core::rbac::Permission;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/organizations: every tenant (superadmin only).
pub async fn list_organizations(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<Organization>>, AppError> {
    auth.require(Permission::ManageOrganizations)?;
    let orgs = app.db(Organization::list).await?;
    Ok(Json(orgs))
}

/// PATCH /api/organizations/:id
pub async fn update_organization(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(patch): Json<OrganizationPatch>,
) -> Result<Json<Organization>, AppError> {
    auth.require(Permission::ManageOrganizations)?;
    let org = app
        .db(move |conn| {
            let org = Organization::update(conn, &id, &patch)?;
            audit::record(
                conn,
                AuditEntry::new(&org.id, "organization.update", "organization")
                    .by(&auth.user_id)
                    .entity(&org.id)
                    .details(serde_json::json!({
                        "plan": org.plan,
                        "is_active": org.is_active,
                    })),
            )?;
            Ok(org)
        })
        .await?;
    Ok(Json(org))
}
