use crate::domain::document_types::RegistryError;
use crate::domain::validation::ValidationErrors;
use crate::domain::wizard::WizardError;
use crate::services::backend::BackendError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{}", .0.first_message().unwrap_or("Validation failed"))]
    Validation(ValidationErrors),
    #[error("{0}")]
    PlanLimit(String),
    #[error("{message}")]
    Upstream { status: u16, message: String },
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::PlanLimit(_) => StatusCode::FORBIDDEN,
            ApiError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ApiError::Unavailable(_) => StatusCode::BAD_GATEWAY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn busy() -> Self {
        ApiError::Conflict("Request already in progress".to_string())
    }
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        match err {
            e if e.is_plan_limit() => ApiError::PlanLimit(e.to_string()),
            BackendError::Rejected { status, message } => ApiError::Upstream { status, message },
            BackendError::Transport(msg) | BackendError::Decode(msg) => ApiError::Unavailable(msg),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Invalid(errors) => ApiError::Validation(errors),
            RegistryError::PlanLimit { message } => ApiError::PlanLimit(message),
            RegistryError::NotFound(name) => {
                ApiError::NotFound(format!("Document type '{name}' not found"))
            }
            e @ RegistryError::DefaultProtected(..) => ApiError::BadRequest(e.to_string()),
            RegistryError::Backend(e) => e.into(),
        }
    }
}

impl From<WizardError> for ApiError {
    fn from(err: WizardError) -> Self {
        match err {
            WizardError::Invalid(errors) => ApiError::Validation(errors),
            WizardError::DriverCreation(e) => e.into(),
            e @ WizardError::NothingToRetry => ApiError::BadRequest(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed ({}): {}", status, self);
        }
        let body = match &self {
            ApiError::Validation(fields) => json!({ "error": self.to_string(), "fields": fields }),
            ApiError::PlanLimit(message) => json!({ "error": message, "upgrade": true }),
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
