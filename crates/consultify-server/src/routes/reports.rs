use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Extension;
use consultify_core::rbac::Permission;
use consultify_core::report;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

fn pdf_response(bytes: Vec<u8>, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

/// GET /api/assessments/:id/report.pdf
pub async fn assessment_pdf(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    auth.require(Permission::ExportReports)?;
    let filename = format!("assessment-{id}.pdf");
    let bytes = app
        .db(move |conn| report::assessment_report(conn, &auth.organization_id, &id))
        .await?;
    Ok(pdf_response(bytes, &filename))
}

/// GET /api/projects/:id/report.pdf
pub async fn project_pdf(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    auth.require(Permission::ExportReports)?;
    let filename = format!("project-{id}.pdf");
    let bytes = app
        .db(move |conn| report::project_report(conn, &auth.organization_id, &id))
        .await?;
    Ok(pdf_response(bytes, &filename))
}
