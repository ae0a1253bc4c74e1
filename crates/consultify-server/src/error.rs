use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use consultify_core::ConsultifyError;

// ---------------------------------------------------------------------------
// Internal sentinels for statuses the domain error does not carry
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct BadRequestError(String);

impl std::fmt::Display for BadRequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BadRequestError {}

#[derive(Debug)]
struct NotFoundError(String);

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for NotFoundError {}

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// 400 Bad Request.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(BadRequestError(msg.into()).into())
    }

    /// 404 Not Found.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(NotFoundError(msg.into()).into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self(ConsultifyError::Unauthorized(msg.into()).into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self(ConsultifyError::Forbidden(msg.into()).into())
    }

    fn status(&self) -> StatusCode {
        if self.0.downcast_ref::<BadRequestError>().is_some() {
            return StatusCode::BAD_REQUEST;
        }
        if self.0.downcast_ref::<NotFoundError>().is_some() {
            return StatusCode::NOT_FOUND;
        }
        let Some(e) = self.0.downcast_ref::<ConsultifyError>() else {
            return StatusCode::INTERNAL_SERVER_ERROR;
        };
        match e {
            ConsultifyError::OrganizationNotFound(_)
            | ConsultifyError::UserNotFound(_)
            | ConsultifyError::ProjectNotFound(_)
            | ConsultifyError::TaskNotFound(_)
            | ConsultifyError::InitiativeNotFound(_)
            | ConsultifyError::AssessmentNotFound(_)
            | ConsultifyError::ChangeRequestNotFound(_)
            | ConsultifyError::IntegrationNotFound(_) => StatusCode::NOT_FOUND,
            ConsultifyError::EmailTaken(_) | ConsultifyError::SlugTaken(_) => StatusCode::CONFLICT,
            ConsultifyError::InvalidValue { .. } | ConsultifyError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            ConsultifyError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ConsultifyError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ConsultifyError::Forbidden(_) => StatusCode::FORBIDDEN,
            ConsultifyError::InsufficientTokens { .. } => StatusCode::PAYMENT_REQUIRED,
            ConsultifyError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ConsultifyError::UnsupportedSchemaVersion { .. }
            | ConsultifyError::Database(_)
            | ConsultifyError::Io(_)
            | ConsultifyError::Yaml(_)
            | ConsultifyError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %format!("{:#}", self.0), "request failed");
        }
        let retry_after = match self.0.downcast_ref::<ConsultifyError>() {
            Some(ConsultifyError::RateLimited { retry_after_secs }) => Some(*retry_after_secs),
            _ => None,
        };

        let body = serde_json::json!({ "error": self.0.to_string() });
        let mut response = (status, axum::Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(e: ConsultifyError) -> StatusCode {
        AppError(e.into()).into_response().status()
    }

    #[test]
    fn not_found_variants_map_to_404() {
        assert_eq!(status_of(ConsultifyError::ProjectNotFound("p".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(ConsultifyError::TaskNotFound("t".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(ConsultifyError::IntegrationNotFound("openai".into())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn duplicates_map_to_409() {
        assert_eq!(status_of(ConsultifyError::EmailTaken("a@b.co".into())), StatusCode::CONFLICT);
        assert_eq!(status_of(ConsultifyError::SlugTaken("acme".into())), StatusCode::CONFLICT);
    }

    #[test]
    fn validation_maps_to_400() {
        assert_eq!(status_of(ConsultifyError::validation("bad")), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ConsultifyError::invalid("axis", "9")), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn invalid_transition_maps_to_422() {
        let e = ConsultifyError::InvalidTransition {
            from: "draft".into(),
            to: "implemented".into(),
            reason: "skipped approval".into(),
        };
        assert_eq!(status_of(e), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn auth_errors_map_to_401_and_403() {
        assert_eq!(status_of(ConsultifyError::Unauthorized("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(ConsultifyError::Forbidden("x".into())), StatusCode::FORBIDDEN);
    }

    #[test]
    fn insufficient_tokens_maps_to_402() {
        let e = ConsultifyError::InsufficientTokens {
            required: 10,
            available: 1,
        };
        assert_eq!(status_of(e), StatusCode::PAYMENT_REQUIRED);
    }

    #[test]
    fn rate_limited_maps_to_429_with_retry_after() {
        let response =
            AppError(ConsultifyError::RateLimited { retry_after_secs: 7 }.into()).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "7");
    }

    #[test]
    fn io_error_maps_to_500() {
        let e = ConsultifyError::Io(std::io::Error::other("disk full"));
        assert_eq!(status_of(e), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn foreign_error_maps_to_500() {
        let response = AppError(anyhow::anyhow!("something unexpected")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn constructors() {
        assert_eq!(AppError::bad_request("x").into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::not_found("x").into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn body_is_json() {
        let err = ConsultifyError::ProjectNotFound("p1".into());
        let response = AppError(err.into()).into_response();
        let ct = response
            .headers()
            .get(header::CONTENT_TYPE)
            .expect("should have content-type");
        assert!(ct.to_str().unwrap().contains("application/json"));
    }
}
