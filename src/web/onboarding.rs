use crate::domain::onboarding::{self, CompanyOnboarding, ONBOARDING_STEPS};
use crate::domain::validation::ValidationErrors;
use crate::state::SharedState;
use crate::web::error::ApiError;
use axum::{extract::Query, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/validate", post(validate))
        .with_state(state)
}

#[derive(Deserialize)]
struct StepQuery {
    step: Option<u8>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidationReport {
    valid: bool,
    /// The whole record passes, whichever step was asked for.
    complete: bool,
    errors: ValidationErrors,
    first_invalid_step: Option<u8>,
}

/// Validates a company onboarding record, either one step or the whole form.
async fn validate(
    Query(query): Query<StepQuery>,
    Json(record): Json<CompanyOnboarding>,
) -> Result<Json<ValidationReport>, ApiError> {
    let errors = match query.step {
        Some(step) if !(1..=ONBOARDING_STEPS).contains(&step) => {
            return Err(ApiError::BadRequest(format!(
                "step must be between 1 and {ONBOARDING_STEPS}"
            )));
        }
        Some(step) => onboarding::validate_step(&record, step),
        None => onboarding::validate(&record),
    };
    Ok(Json(ValidationReport {
        valid: errors.is_empty(),
        complete: onboarding::is_complete(&record),
        errors,
        first_invalid_step: onboarding::first_invalid_step(&record),
    }))
}
