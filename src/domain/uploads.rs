//! Upload and verification bookkeeping for a driver still in the wizard.
//!
//! The gates here are re-evaluated against the current form state on every
//! attempt, so repeating a check without changes yields the same answer.

use crate::domain::models::{UploadedDocument, WizardFormData};
use chrono::NaiveDate;

/// Adds an upload, replacing any earlier upload with the same id or of the
/// same document type. A replaced upload loses its verification.
pub fn record_upload(form: &mut WizardFormData, doc: UploadedDocument) {
    let replaced: Vec<String> = form
        .uploaded_documents
        .iter()
        .filter(|d| d.id == doc.id || d.document_type == doc.document_type)
        .map(|d| d.id.clone())
        .collect();
    for id in &replaced {
        remove_upload(form, id);
    }
    form.uploaded_documents.push(doc);
    refresh_verified_flag(form);
}

pub fn remove_upload(form: &mut WizardFormData, id: &str) -> bool {
    let before = form.uploaded_documents.len();
    form.uploaded_documents.retain(|d| d.id != id);
    form.verified_documents.retain(|v| v != id);
    refresh_verified_flag(form);
    form.uploaded_documents.len() != before
}

/// Marks an uploaded document verified. Unknown ids are ignored.
pub fn mark_verified(form: &mut WizardFormData, id: &str) -> bool {
    let Some(doc) = form.uploaded_documents.iter_mut().find(|d| d.id == id) else {
        return false;
    };
    doc.verified = true;
    if !form.verified_documents.iter().any(|v| v == id) {
        form.verified_documents.push(id.to_string());
    }
    refresh_verified_flag(form);
    true
}

/// Manual entry of the details the AI would otherwise extract.
pub fn set_details(form: &mut WizardFormData, id: &str, expiry_date: Option<NaiveDate>) -> bool {
    match form.uploaded_documents.iter_mut().find(|d| d.id == id) {
        Some(doc) => {
            doc.expiry_date = expiry_date;
            true
        }
        None => false,
    }
}

pub fn upload_complete(form: &WizardFormData, required_count: usize) -> bool {
    !form.uploaded_documents.is_empty() && form.uploaded_documents.len() >= required_count
}

pub fn remaining_uploads(form: &WizardFormData, required_count: usize) -> usize {
    required_count.saturating_sub(form.uploaded_documents.len())
}

/// Every current upload has been verified.
pub fn verification_complete(form: &WizardFormData) -> bool {
    form.uploaded_documents
        .iter()
        .all(|d| form.verified_documents.iter().any(|v| v == &d.id))
}

/// Uploaded documents still missing an expiry date.
pub fn missing_details(form: &WizardFormData) -> Vec<&UploadedDocument> {
    form.uploaded_documents
        .iter()
        .filter(|d| d.expiry_date.is_none())
        .collect()
}

fn refresh_verified_flag(form: &mut WizardFormData) {
    form.all_documents_verified =
        !form.uploaded_documents.is_empty() && verification_complete(form);
}
