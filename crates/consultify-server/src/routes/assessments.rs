use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use consultify_core::assessment::framework::{self, FrameworkDef};
use consultify_core::assessment::{
    Assessment, AssessmentSummary, NewAssessment, Score, ScoreInput,
};
use consultify_core::rbac::Permission;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/assessments/frameworks: dimension catalogue of every framework.
pub async fn list_frameworks(
    Extension(_auth): Extension<AuthUser>,
) -> Json<&'static [FrameworkDef]> {
    Json(framework::all())
}

/// GET /api/projects/:id/assessments
pub async fn list_assessments(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(project_id): Path<String>,
) -> Result<Json<Vec<Assessment>>, AppError> {
    auth.require(Permission::ViewAssessments)?;
    let list = app
        .db(move |conn| {
            consultify_core::project::Project::get(conn, &auth.organization_id, &project_id)?;
            Assessment::list(conn, &auth.organization_id, &project_id)
        })
        .await?;
    Ok(Json(list))
}

/// POST /api/projects/:id/assessments
pub async fn create_assessment(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(project_id): Path<String>,
    Json(body): Json<NewAssessment>,
) -> Result<(StatusCode, Json<Assessment>), AppError> {
    auth.require(Permission::RunAssessments)?;
    let assessment = app
        .db(move |conn| {
            Assessment::create(
                conn,
                &auth.organization_id,
                &project_id,
                Some(&auth.user_id),
                &body,
            )
        })
        .await?;
    Ok((StatusCode::CREATED, Json(assessment)))
}

/// GET /api/assessments/:id: the assessment with its scores.
pub async fn get_assessment(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    auth.require(Permission::ViewAssessments)?;
    let (assessment, scores) = app
        .db(move |conn| {
            let assessment = Assessment::get(conn, &auth.organization_id, &id)?;
            let scores = Assessment::scores(conn, &assessment.id)?;
            Ok((assessment, scores))
        })
        .await?;
    Ok(Json(serde_json::json!({
        "assessment": assessment,
        "scores": scores,
    })))
}

/// PUT /api/assessments/:id/scores/:dimension
pub async fn set_score(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((id, dimension)): Path<(String, String)>,
    Json(body): Json<ScoreInput>,
) -> Result<Json<Score>, AppError> {
    auth.require(Permission::RunAssessments)?;
    let score = app
        .db(move |conn| {
            Assessment::set_score(conn, &auth.organization_id, &id, &dimension, &body)
        })
        .await?;
    Ok(Json(score))
}

/// POST /api/assessments/:id/complete
pub async fn complete_assessment(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Assessment>, AppError> {
    auth.require(Permission::RunAssessments)?;
    let assessment = app
        .db(move |conn| {
            Assessment::complete(conn, &auth.organization_id, &id, Some(&auth.user_id))
        })
        .await?;
    Ok(Json(assessment))
}

/// GET /api/assessments/:id/summary
pub async fn assessment_summary(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<AssessmentSummary>, AppError> {
    auth.require(Permission::ViewAssessments)?;
    let summary = app
        .db(move |conn| Assessment::summary(conn, &auth.organization_id, &id))
        .await?;
    Ok(Json(summary))
}
