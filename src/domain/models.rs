use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Pending,
    Active,
    ExpiringSoon,
    Expired,
    Processing,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub driver_id: Option<String>,
    #[serde(rename = "type")]
    pub document_type: String,
    pub status: DocumentStatus,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub file_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub employee_id: String,
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance_score: Option<u8>,
}

impl Driver {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMode {
    #[default]
    Fields,
    ClassificationOnly,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    pub name: String,
    pub label: String,
    #[serde(rename = "type", default = "default_field_type")]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub ai_extractable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

fn default_field_type() -> String {
    "text".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTypeConfig {
    pub name: String,
    #[serde(default)]
    pub ai_enabled: bool,
    #[serde(default)]
    pub extraction_mode: ExtractionMode,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentOption {
    Upload,
    Link,
    Skip,
}

impl DocumentOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentOption::Upload => "upload",
            DocumentOption::Link => "link",
            DocumentOption::Skip => "skip",
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMethod {
    Ai,
    Manual,
}

pub const MAX_REMINDER_DAYS: usize = 3;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Reminders {
    #[serde(default)]
    pub email: bool,
    #[serde(default)]
    pub sms: bool,
    #[serde(default)]
    pub days: Vec<u32>,
}

impl Default for Reminders {
    fn default() -> Self {
        Self {
            email: true,
            sms: false,
            days: vec![30],
        }
    }
}

impl Reminders {
    /// Selects or deselects a lead day. Selecting a 4th day leaves the set unchanged.
    pub fn toggle_day(&mut self, day: u32) -> bool {
        if let Some(pos) = self.days.iter().position(|d| *d == day) {
            self.days.remove(pos);
            return true;
        }
        if self.days.len() >= MAX_REMINDER_DAYS {
            return false;
        }
        self.days.push(day);
        self.days.sort_unstable_by(|a, b| b.cmp(a));
        true
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadedDocument {
    pub id: String,
    pub document_type: String,
    pub file_name: String,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub verified: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct WizardFormData {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub employee_id: String,
    #[serde(default)]
    pub document_option: Option<DocumentOption>,
    #[serde(default)]
    pub uploaded_documents: Vec<UploadedDocument>,
    #[serde(default)]
    pub verified_documents: Vec<String>,
    #[serde(default)]
    pub all_documents_verified: bool,
    #[serde(default)]
    pub processing_method: Option<ProcessingMethod>,
    #[serde(default)]
    pub reminders: Reminders,
}

/// Partial update of the wizard form. Absent keys keep their current value.
#[derive(Clone, Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct WizardFormPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub employee_id: Option<String>,
    pub document_option: Option<DocumentOption>,
    pub processing_method: Option<ProcessingMethod>,
    pub reminder_email: Option<bool>,
    pub reminder_sms: Option<bool>,
}

impl WizardFormData {
    pub fn apply(&mut self, patch: WizardFormPatch) {
        if let Some(v) = patch.first_name {
            self.first_name = v;
        }
        if let Some(v) = patch.last_name {
            self.last_name = v;
        }
        if let Some(v) = patch.email {
            self.email = v;
        }
        if let Some(v) = patch.phone {
            self.phone = v;
        }
        if let Some(v) = patch.location {
            self.location = v;
        }
        if let Some(v) = patch.employee_id {
            self.employee_id = v;
        }
        if patch.document_option.is_some() {
            self.document_option = patch.document_option;
        }
        if patch.processing_method.is_some() {
            self.processing_method = patch.processing_method;
        }
        if let Some(v) = patch.reminder_email {
            self.reminders.email = v;
        }
        if let Some(v) = patch.reminder_sms {
            self.reminders.sms = v;
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDriver {
    pub company_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub employee_id: String,
}

impl NewDriver {
    pub fn from_form(company_id: &str, form: &WizardFormData) -> Self {
        Self {
            company_id: company_id.to_string(),
            first_name: form.first_name.trim().to_string(),
            last_name: form.last_name.trim().to_string(),
            email: form.email.trim().to_lowercase(),
            phone: form.phone.trim().to_string(),
            location: form.location.trim().to_string(),
            employee_id: form.employee_id.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverInvitation {
    pub company_id: String,
    pub driver_id: String,
    pub email: String,
    pub phone: String,
    pub document_types: Vec<String>,
    pub reminders: Reminders,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingCompletion {
    pub processing_method: Option<ProcessingMethod>,
    pub documents: Vec<UploadedDocument>,
    pub reminders: Reminders,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentCount {
    pub driver_id: String,
    pub count: u32,
}
