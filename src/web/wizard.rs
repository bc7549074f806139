use crate::domain::models::{UploadedDocument, WizardFormPatch};
use crate::domain::uploads;
use crate::domain::wizard::{
    step_title, BackOutcome, Submission, TerminalView, Toast, Wizard, FINAL_STEP,
};
use crate::services::backend::token_digest;
use crate::state::{SharedState, WizardSession};
use crate::web::auth::BearerToken;
use crate::web::error::ApiError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", post(start))
        .route("/:id", get(show))
        .route("/:id/form", patch(update_form))
        .route("/:id/next", post(next))
        .route("/:id/back", post(back))
        .route("/:id/retry", post(retry))
        .route("/:id/documents", post(add_document))
        .route("/:id/documents/:doc_id", delete(remove_document).patch(update_document))
        .route("/:id/documents/:doc_id/verify", post(verify_document))
        .route("/:id/reminders/days/:day", post(toggle_reminder_day))
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartPayload {
    company_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WizardResponse {
    id: Uuid,
    step_title: &'static str,
    terminal_view: Option<TerminalView>,
    /// True while a `next` call for this wizard is still running.
    busy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    toast: Option<Toast>,
    #[serde(skip_serializing_if = "Option::is_none")]
    back: Option<BackOutcome>,
    #[serde(flatten)]
    wizard: Wizard,
}

impl WizardResponse {
    fn new(id: Uuid, wizard: Wizard) -> Self {
        Self {
            id,
            step_title: step_title(wizard.current_step),
            terminal_view: wizard.terminal_view(),
            busy: false,
            toast: None,
            back: None,
            wizard,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadPayload {
    id: Option<String>,
    document_type: String,
    file_name: String,
    expiry_date: Option<NaiveDate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetailsPayload {
    expiry_date: Option<NaiveDate>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReminderDaysResponse {
    days: Vec<u32>,
    changed: bool,
}

async fn start(
    BearerToken(token): BearerToken,
    State(state): State<SharedState>,
    Json(payload): Json<StartPayload>,
) -> Result<(StatusCode, Json<WizardResponse>), ApiError> {
    let company_id = payload.company_id.trim();
    if company_id.is_empty() {
        return Err(ApiError::BadRequest("companyId is required".to_string()));
    }

    let required: Vec<String> = state
        .backend
        .document_types(&token, company_id)
        .await?
        .into_iter()
        .filter(|t| t.is_active)
        .map(|t| t.name)
        .collect();

    let id = Uuid::new_v4();
    let wizard = Wizard::new(company_id, required);
    state
        .wizard_sessions
        .write()
        .await
        .insert(id, WizardSession::new(wizard.clone(), token_digest(&token)));
    tracing::info!("Started driver wizard {} for company {}", id, company_id);

    Ok((StatusCode::CREATED, Json(WizardResponse::new(id, wizard))))
}

async fn show(
    BearerToken(token): BearerToken,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WizardResponse>, ApiError> {
    let wizard = snapshot(&state, id, &token).await?;
    let mut response = WizardResponse::new(id, wizard);
    response.busy = state.in_flight.is_busy(&next_key(id));
    Ok(Json(response))
}

async fn update_form(
    BearerToken(token): BearerToken,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<WizardFormPatch>,
) -> Result<Json<WizardResponse>, ApiError> {
    let (_, wizard) = with_session(&state, id, &token, |w| w.form_data.apply(patch)).await?;
    Ok(Json(WizardResponse::new(id, wizard)))
}

async fn next(
    BearerToken(token): BearerToken,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WizardResponse>, ApiError> {
    let _permit = state
        .in_flight
        .try_acquire(next_key(id))
        .ok_or_else(ApiError::busy)?;

    let mut wizard = snapshot(&state, id, &token).await?;
    let result = wizard.advance(state.backend.as_ref(), &token).await;
    store_wizard(&state, id, wizard.clone()).await;

    let transition = result?;
    let finished = transition.from != FINAL_STEP
        && transition.to == FINAL_STEP
        && matches!(wizard.submission, Submission::Succeeded | Submission::Skipped);
    if transition.from == 1 || finished {
        if let Some(driver_id) = wizard.created_driver_id.as_deref() {
            state
                .cache
                .refresh_driver(state.backend.clone(), token, driver_id, &wizard.company_id)
                .await;
        }
    }

    let mut response = WizardResponse::new(id, wizard);
    response.toast = transition.toast;
    Ok(Json(response))
}

async fn back(
    BearerToken(token): BearerToken,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WizardResponse>, ApiError> {
    let (outcome, wizard) = with_session(&state, id, &token, |w| w.back()).await?;
    if outcome == BackOutcome::Exit {
        state.wizard_sessions.write().await.remove(&id);
        tracing::info!("Driver wizard {} exited", id);
    }
    let mut response = WizardResponse::new(id, wizard);
    response.back = Some(outcome);
    Ok(Json(response))
}

async fn retry(
    BearerToken(token): BearerToken,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WizardResponse>, ApiError> {
    let (result, wizard) = with_session(&state, id, &token, |w| w.retry()).await?;
    result?;
    Ok(Json(WizardResponse::new(id, wizard)))
}

async fn add_document(
    BearerToken(token): BearerToken,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UploadPayload>,
) -> Result<Json<WizardResponse>, ApiError> {
    if payload.document_type.trim().is_empty() || payload.file_name.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "documentType and fileName are required".to_string(),
        ));
    }
    let doc = UploadedDocument {
        id: payload.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        document_type: payload.document_type.trim().to_string(),
        file_name: payload.file_name.trim().to_string(),
        uploaded_at: Utc::now(),
        expiry_date: payload.expiry_date,
        verified: false,
    };
    let (_, wizard) = with_session(&state, id, &token, |w| {
        uploads::record_upload(&mut w.form_data, doc)
    })
    .await?;
    Ok(Json(WizardResponse::new(id, wizard)))
}

async fn remove_document(
    BearerToken(token): BearerToken,
    State(state): State<SharedState>,
    Path((id, doc_id)): Path<(Uuid, String)>,
) -> Result<Json<WizardResponse>, ApiError> {
    let (found, wizard) = with_session(&state, id, &token, |w| {
        uploads::remove_upload(&mut w.form_data, &doc_id)
    })
    .await?;
    if !found {
        return Err(ApiError::NotFound(format!("Document {doc_id} not found")));
    }
    Ok(Json(WizardResponse::new(id, wizard)))
}

async fn update_document(
    BearerToken(token): BearerToken,
    State(state): State<SharedState>,
    Path((id, doc_id)): Path<(Uuid, String)>,
    Json(payload): Json<DetailsPayload>,
) -> Result<Json<WizardResponse>, ApiError> {
    let (found, wizard) = with_session(&state, id, &token, |w| {
        uploads::set_details(&mut w.form_data, &doc_id, payload.expiry_date)
    })
    .await?;
    if !found {
        return Err(ApiError::NotFound(format!("Document {doc_id} not found")));
    }
    Ok(Json(WizardResponse::new(id, wizard)))
}

async fn verify_document(
    BearerToken(token): BearerToken,
    State(state): State<SharedState>,
    Path((id, doc_id)): Path<(Uuid, String)>,
) -> Result<Json<WizardResponse>, ApiError> {
    let (found, wizard) = with_session(&state, id, &token, |w| {
        uploads::mark_verified(&mut w.form_data, &doc_id)
    })
    .await?;
    if !found {
        return Err(ApiError::NotFound(format!("Document {doc_id} not found")));
    }
    Ok(Json(WizardResponse::new(id, wizard)))
}

async fn toggle_reminder_day(
    BearerToken(token): BearerToken,
    State(state): State<SharedState>,
    Path((id, day)): Path<(Uuid, u32)>,
) -> Result<Json<ReminderDaysResponse>, ApiError> {
    if !(1..=365).contains(&day) {
        return Err(ApiError::BadRequest(
            "Reminder day must be between 1 and 365".to_string(),
        ));
    }
    let (changed, wizard) =
        with_session(&state, id, &token, |w| w.form_data.reminders.toggle_day(day)).await?;
    Ok(Json(ReminderDaysResponse {
        days: wizard.form_data.reminders.days,
        changed,
    }))
}

fn next_key(id: Uuid) -> String {
    format!("wizard:{id}:next")
}

/// Applies `f` to the caller's wizard under the write lock and returns its
/// result together with a snapshot of the wizard. Refused while a `next` for
/// the same wizard is running, since that call overwrites the session.
async fn with_session<R>(
    state: &SharedState,
    id: Uuid,
    token: &str,
    f: impl FnOnce(&mut Wizard) -> R,
) -> Result<(R, Wizard), ApiError> {
    let mut sessions = state.wizard_sessions.write().await;
    let session = owned_session(&mut sessions, id, token)?;
    if state.in_flight.is_busy(&next_key(id)) {
        return Err(ApiError::busy());
    }
    session.last_seen = Utc::now();
    let result = f(&mut session.wizard);
    Ok((result, session.wizard.clone()))
}

async fn snapshot(state: &SharedState, id: Uuid, token: &str) -> Result<Wizard, ApiError> {
    let mut sessions = state.wizard_sessions.write().await;
    let session = owned_session(&mut sessions, id, token)?;
    session.last_seen = Utc::now();
    Ok(session.wizard.clone())
}

/// Sessions started with another token are reported as missing.
fn owned_session<'a>(
    sessions: &'a mut HashMap<Uuid, WizardSession>,
    id: Uuid,
    token: &str,
) -> Result<&'a mut WizardSession, ApiError> {
    let owner = token_digest(token);
    sessions
        .get_mut(&id)
        .filter(|s| s.owner == owner)
        .ok_or_else(|| ApiError::NotFound(format!("Wizard {id} not found")))
}

async fn store_wizard(state: &SharedState, id: Uuid, wizard: Wizard) {
    let mut sessions = state.wizard_sessions.write().await;
    match sessions.get_mut(&id) {
        Some(session) => {
            session.wizard = wizard;
            session.last_seen = Utc::now();
        }
        None => tracing::warn!("Wizard {} disappeared while a step was running", id),
    }
}
