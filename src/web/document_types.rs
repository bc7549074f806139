use crate::domain::document_types::{self, DocumentTypeDraft, DocumentTypeRegistry};
use crate::domain::models::{DocumentTypeConfig, FieldDef};
use crate::domain::plan::Plan;
use crate::domain::validation::ValidationErrors;
use crate::state::SharedState;
use crate::web::auth::BearerToken;
use crate::web::error::ApiError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/company/:company_id", get(list).post(create))
        .route("/company/:company_id/:name", put(update).delete(remove))
        .route("/company/:company_id/:name/active", post(toggle_active))
        .route("/fields/validate", post(validate_field))
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TogglePayload {
    is_active: bool,
    plan: Plan,
}

#[derive(Deserialize)]
struct FieldCheckPayload {
    #[serde(default)]
    draft: DocumentTypeDraft,
    field: FieldDef,
}

#[derive(Serialize)]
struct FieldCheckResponse {
    valid: bool,
    errors: ValidationErrors,
    /// The draft with the field appended, present when the field is valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    draft: Option<DocumentTypeDraft>,
}

async fn list(
    BearerToken(token): BearerToken,
    State(state): State<SharedState>,
    Path(company_id): Path<String>,
) -> Result<Json<Vec<DocumentTypeConfig>>, ApiError> {
    let registry = DocumentTypeRegistry::new(state.backend.as_ref(), &token, &company_id);
    Ok(Json(registry.list().await?))
}

async fn create(
    BearerToken(token): BearerToken,
    State(state): State<SharedState>,
    Path(company_id): Path<String>,
    Json(draft): Json<DocumentTypeDraft>,
) -> Result<(StatusCode, Json<DocumentTypeConfig>), ApiError> {
    let registry = DocumentTypeRegistry::new(state.backend.as_ref(), &token, &company_id);
    let created = registry.create(draft).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update(
    BearerToken(token): BearerToken,
    State(state): State<SharedState>,
    Path((company_id, name)): Path<(String, String)>,
    Json(draft): Json<DocumentTypeDraft>,
) -> Result<Json<DocumentTypeConfig>, ApiError> {
    let registry = DocumentTypeRegistry::new(state.backend.as_ref(), &token, &company_id);
    Ok(Json(registry.update(&name, draft).await?))
}

async fn remove(
    BearerToken(token): BearerToken,
    State(state): State<SharedState>,
    Path((company_id, name)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let registry = DocumentTypeRegistry::new(state.backend.as_ref(), &token, &company_id);
    registry.delete(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_active(
    BearerToken(token): BearerToken,
    State(state): State<SharedState>,
    Path((company_id, name)): Path<(String, String)>,
    Json(payload): Json<TogglePayload>,
) -> Result<Json<DocumentTypeConfig>, ApiError> {
    // Per company, so two quick toggles cannot both pass the plan check.
    let _permit = state
        .in_flight
        .try_acquire(format!("document-types:{company_id}:toggle"))
        .ok_or_else(ApiError::busy)?;

    let registry = DocumentTypeRegistry::new(state.backend.as_ref(), &token, &company_id);
    let updated = registry
        .toggle_active(&name, payload.is_active, payload.plan)
        .await?;
    tracing::info!(
        "Document type '{}' for company {} is now {}",
        updated.name,
        company_id,
        if updated.is_active { "active" } else { "inactive" }
    );
    Ok(Json(updated))
}

async fn validate_field(Json(payload): Json<FieldCheckPayload>) -> Json<FieldCheckResponse> {
    let mut draft = payload.draft;
    let response = match document_types::add_field(&mut draft, payload.field) {
        Ok(()) => FieldCheckResponse {
            valid: true,
            errors: ValidationErrors::new(),
            draft: Some(draft),
        },
        Err(errors) => FieldCheckResponse {
            valid: false,
            errors,
            draft: None,
        },
    };
    Json(response)
}
