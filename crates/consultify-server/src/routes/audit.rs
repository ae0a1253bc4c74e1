use axum::extract::{Query, State};
use axum::{Extension, Json};
use consultify_core::audit::{self, AuditFilter, AuditRecord};
use consultify_core::rbac::Permission;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/audit?entity_type=&entity_id=&user_id=&action=&limit=&offset=
pub async fn list_audit(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(filter): Query<AuditFilter>,
) -> Result<Json<Vec<AuditRecord>>, AppError> {
    auth.require(Permission::ViewAudit)?;
    let rows = app
        .db(move |conn| audit::list(conn, &auth.organization_id, &filter))
        .await?;
    Ok(Json(rows))
}
