use crate::domain::compliance::{compliance_score, ComplianceBadge};
use crate::domain::models::DocumentStatus;
use crate::state::SharedState;
use crate::web::auth::BearerToken;
use crate::web::error::ApiError;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list))
        .route("/:id/compliance", get(compliance))
        .route("/:id/documents/:doc_id", delete(delete_document))
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompanyQuery {
    company_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DriverSummary {
    id: String,
    full_name: String,
    email: String,
    phone: String,
    location: String,
    employee_id: String,
    compliance_score: u8,
    badge: ComplianceBadge,
    document_count: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ComplianceReport {
    driver_id: String,
    score: u8,
    badge: ComplianceBadge,
    required_types: Vec<String>,
    covered_types: Vec<String>,
    missing_types: Vec<String>,
}

async fn active_type_names(
    state: &SharedState,
    token: &str,
    company_id: &str,
) -> Result<Vec<String>, ApiError> {
    Ok(state
        .backend
        .document_types(token, company_id)
        .await?
        .into_iter()
        .filter(|t| t.is_active)
        .map(|t| t.name)
        .collect())
}

fn require_company(query: &CompanyQuery) -> Result<&str, ApiError> {
    let company_id = query.company_id.trim();
    if company_id.is_empty() {
        return Err(ApiError::BadRequest("companyId is required".to_string()));
    }
    Ok(company_id)
}

async fn list(
    BearerToken(token): BearerToken,
    State(state): State<SharedState>,
    Query(query): Query<CompanyQuery>,
) -> Result<Json<Vec<DriverSummary>>, ApiError> {
    let company_id = require_company(&query)?;
    let required = active_type_names(&state, &token, company_id).await?;
    let drivers = state
        .cache
        .drivers(state.backend.as_ref(), &token, company_id)
        .await?;
    let counts: HashMap<String, u32> = state
        .backend
        .document_counts(&token, company_id)
        .await?
        .into_iter()
        .map(|c| (c.driver_id, c.count))
        .collect();

    let summaries = drivers
        .into_iter()
        .map(|driver| {
            let score = compliance_score(&required, &driver.documents);
            DriverSummary {
                full_name: driver.full_name(),
                document_count: counts
                    .get(&driver.id)
                    .copied()
                    .unwrap_or(driver.documents.len() as u32),
                compliance_score: score,
                badge: ComplianceBadge::for_score(score),
                id: driver.id,
                email: driver.email,
                phone: driver.phone,
                location: driver.location,
                employee_id: driver.employee_id,
            }
        })
        .collect();
    Ok(Json(summaries))
}

async fn compliance(
    BearerToken(token): BearerToken,
    State(state): State<SharedState>,
    Path(driver_id): Path<String>,
    Query(query): Query<CompanyQuery>,
) -> Result<Json<ComplianceReport>, ApiError> {
    let company_id = require_company(&query)?;
    let required = active_type_names(&state, &token, company_id).await?;
    // Confirms the driver exists before reading its documents.
    state
        .cache
        .driver(state.backend.as_ref(), &token, &driver_id)
        .await?;
    let documents = state
        .cache
        .documents(state.backend.as_ref(), &token, &driver_id)
        .await?;

    let score = compliance_score(&required, &documents);
    let active: BTreeSet<&str> = documents
        .iter()
        .filter(|d| d.status == DocumentStatus::Active)
        .map(|d| d.document_type.as_str())
        .collect();
    let required_types: Vec<String> = required
        .iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .cloned()
        .collect();
    let (covered_types, missing_types): (Vec<String>, Vec<String>) = required_types
        .iter()
        .cloned()
        .partition(|t| active.contains(t.as_str()));

    Ok(Json(ComplianceReport {
        driver_id,
        score,
        badge: ComplianceBadge::for_score(score),
        required_types,
        covered_types,
        missing_types,
    }))
}

async fn delete_document(
    BearerToken(token): BearerToken,
    State(state): State<SharedState>,
    Path((driver_id, doc_id)): Path<(String, String)>,
    Query(query): Query<CompanyQuery>,
) -> Result<StatusCode, ApiError> {
    let company_id = require_company(&query)?.to_string();
    let _permit = state
        .in_flight
        .try_acquire(format!("document:{doc_id}:delete"))
        .ok_or_else(ApiError::busy)?;

    state
        .backend
        .delete_document(&token, &driver_id, &doc_id)
        .await?;
    tracing::info!("Deleted document {} of driver {}", doc_id, driver_id);

    state
        .cache
        .refresh_driver(state.backend.clone(), token, &driver_id, &company_id)
        .await;
    Ok(StatusCode::NO_CONTENT)
}
