use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsultifyError {
    #[error("organization not found: {0}")]
    OrganizationNotFound(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("initiative not found: {0}")]
    InitiativeNotFound(String),

    #[error("assessment not found: {0}")]
    AssessmentNotFound(String),

    #[error("change request not found: {0}")]
    ChangeRequestNotFound(String),

    #[error("integration not configured: {0}")]
    IntegrationNotFound(String),

    #[error("email already registered: {0}")]
    EmailTaken(String),

    #[error("organization slug already taken: {0}")]
    SlugTaken(String),

    #[error("invalid {field}: '{value}'")]
    InvalidValue { field: &'static str, value: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("insufficient tokens: {required} required, {available} available")]
    InsufficientTokens { required: i64, available: i64 },

    #[error("rate limit exceeded: retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },

    #[error(transparent)]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ConsultifyError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            value: value.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConsultifyError>;
