//! Company document type configuration: draft checks run before anything is
//! sent to the backend, plus plan-limit enforcement on activation.

use crate::domain::models::{DocumentTypeConfig, ExtractionMode, FieldDef};
use crate::domain::plan::Plan;
use crate::domain::validation::{is_present, is_valid_field_name, ValidationErrors};
use crate::services::backend::{BackendApi, BackendError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTypeDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ai_enabled: bool,
    #[serde(default)]
    pub extraction_mode: ExtractionMode,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl DocumentTypeDraft {
    pub fn into_config(self, is_active: bool, is_default: bool) -> DocumentTypeConfig {
        DocumentTypeConfig {
            name: self.name.trim().to_string(),
            ai_enabled: self.ai_enabled,
            extraction_mode: self.extraction_mode,
            fields: self.fields,
            is_active,
            is_default,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("{0}")]
    Invalid(ValidationErrors),
    #[error("{message}")]
    PlanLimit { message: String },
    #[error("document type '{0}' not found")]
    NotFound(String),
    #[error("default document type '{0}' cannot be {1}")]
    DefaultProtected(String, &'static str),
    #[error(transparent)]
    Backend(BackendError),
}

impl From<BackendError> for RegistryError {
    fn from(err: BackendError) -> Self {
        if err.is_plan_limit() {
            return RegistryError::PlanLimit {
                message: err.to_string(),
            };
        }
        RegistryError::Backend(err)
    }
}

/// Checks a new field against the draft it is being added to.
pub fn validate_field(draft: &DocumentTypeDraft, field: &FieldDef) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    let name = field.name.trim();
    if name.is_empty() {
        errors.add("name", "Field name is required");
    } else if !is_valid_field_name(name) {
        errors.add(
            "name",
            "Field name must start with a letter and contain only letters, numbers, and underscores",
        );
    } else if draft.fields.iter().any(|f| f.name == name) {
        errors.add("name", format!("A field named '{name}' already exists"));
    }
    if !is_present(&field.label) {
        errors.add("label", "Field label is required");
    }
    errors
}

pub fn add_field(draft: &mut DocumentTypeDraft, mut field: FieldDef) -> Result<(), ValidationErrors> {
    let errors = validate_field(draft, &field);
    if !errors.is_empty() {
        return Err(errors);
    }
    field.name = field.name.trim().to_string();
    field.label = field.label.trim().to_string();
    draft.fields.push(field);
    Ok(())
}

/// Whole-draft checks run on save.
pub fn validate_draft(draft: &DocumentTypeDraft) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if !is_present(&draft.name) {
        errors.add("name", "Document type name is required");
    }
    if draft.extraction_mode == ExtractionMode::Fields && draft.fields.is_empty() {
        errors.add("fields", "Add at least one field or switch to classification-only");
    }
    let mut seen = std::collections::HashSet::new();
    for (idx, field) in draft.fields.iter().enumerate() {
        if !is_valid_field_name(&field.name) {
            errors.add(format!("fields.{idx}.name"), "Invalid field name");
        } else if !seen.insert(field.name.as_str()) {
            errors.add(format!("fields.{idx}.name"), "Duplicate field name");
        }
        if !is_present(&field.label) {
            errors.add(format!("fields.{idx}.label"), "Field label is required");
        }
    }
    errors
}

pub fn plan_limit_message(plan: Plan) -> String {
    match plan.max_active_document_types() {
        Some(limit) => format!(
            "Your {} plan allows only {} active document type{}. Upgrade your plan to activate more.",
            plan.label(),
            limit,
            if limit == 1 { "" } else { "s" }
        ),
        None => String::new(),
    }
}

/// Local pre-check for activation. Deactivation is always allowed.
pub fn check_toggle(
    types: &[DocumentTypeConfig],
    name: &str,
    desired: bool,
    plan: Plan,
) -> Result<(), RegistryError> {
    let target = types
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
    if !desired || target.is_active {
        return Ok(());
    }
    let active = types.iter().filter(|t| t.is_active).count();
    if !plan.can_activate_another(active) {
        return Err(RegistryError::PlanLimit {
            message: plan_limit_message(plan),
        });
    }
    Ok(())
}

/// Document type operations for one company.
pub struct DocumentTypeRegistry<'a> {
    backend: &'a dyn BackendApi,
    token: &'a str,
    company_id: &'a str,
}

impl<'a> DocumentTypeRegistry<'a> {
    pub fn new(backend: &'a dyn BackendApi, token: &'a str, company_id: &'a str) -> Self {
        Self {
            backend,
            token,
            company_id,
        }
    }

    pub async fn list(&self) -> Result<Vec<DocumentTypeConfig>, RegistryError> {
        Ok(self.backend.document_types(self.token, self.company_id).await?)
    }

    pub async fn create(&self, draft: DocumentTypeDraft) -> Result<DocumentTypeConfig, RegistryError> {
        let errors = validate_draft(&draft);
        if !errors.is_empty() {
            return Err(RegistryError::Invalid(errors));
        }
        let config = draft.into_config(false, false);
        let created = self
            .backend
            .create_document_type(self.token, self.company_id, &config)
            .await?;
        tracing::info!("Created document type '{}' for company {}", created.name, self.company_id);
        Ok(created)
    }

    pub async fn update(
        &self,
        name: &str,
        draft: DocumentTypeDraft,
    ) -> Result<DocumentTypeConfig, RegistryError> {
        let errors = validate_draft(&draft);
        if !errors.is_empty() {
            return Err(RegistryError::Invalid(errors));
        }
        let existing = self.find(name).await?;
        if existing.is_default && draft.name.trim() != existing.name {
            return Err(RegistryError::DefaultProtected(existing.name, "renamed"));
        }
        let config = draft.into_config(existing.is_active, existing.is_default);
        let updated = self
            .backend
            .update_document_type(self.token, self.company_id, name, &config)
            .await?;
        Ok(updated)
    }

    pub async fn delete(&self, name: &str) -> Result<(), RegistryError> {
        let existing = self.find(name).await?;
        if existing.is_default {
            return Err(RegistryError::DefaultProtected(existing.name, "deleted"));
        }
        self.backend
            .delete_document_type(self.token, self.company_id, name)
            .await?;
        tracing::info!("Deleted document type '{}' for company {}", name, self.company_id);
        Ok(())
    }

    pub async fn toggle_active(
        &self,
        name: &str,
        desired: bool,
        plan: Plan,
    ) -> Result<DocumentTypeConfig, RegistryError> {
        let types = self.list().await?;
        if let Err(e) = check_toggle(&types, name, desired, plan) {
            tracing::warn!(
                "Activation of '{}' blocked for company {} on {} plan: {}",
                name,
                self.company_id,
                plan.as_str(),
                e
            );
            return Err(e);
        }
        let updated = self
            .backend
            .set_document_type_active(self.token, self.company_id, name, desired)
            .await?;
        Ok(updated)
    }

    async fn find(&self, name: &str) -> Result<DocumentTypeConfig, RegistryError> {
        self.list()
            .await?
            .into_iter()
            .find(|t| t.name == name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }
}
