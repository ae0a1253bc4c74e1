use axum::extract::{Query, State};
use axum::{Extension, Json};
use consultify_core::rbac::Permission;
use consultify_core::roadmap::{self, RoadmapBucket};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RoadmapQuery {
    pub project_id: Option<String>,
}

/// GET /api/roadmap?project_id=: initiatives grouped by quarter.
pub async fn get_roadmap(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<RoadmapQuery>,
) -> Result<Json<Vec<RoadmapBucket>>, AppError> {
    auth.require(Permission::ViewProjects)?;
    let buckets = app
        .db(move |conn| {
            roadmap::roadmap(conn, &auth.organization_id, query.project_id.as_deref())
        })
        .await?;
    Ok(Json(buckets))
}
