//! Add-a-driver wizard.
//!
//! Steps: 1 personal info, 2 document option, 3 upload or link, 4 processing
//! method, 5 processing / manual details, 6 verification, 7 review, 8 done.
//!
//! Going forward, `skip` jumps from 2 to 8 and `link` jumps from 3 to 7. Going
//! back always decrements by one and does not retrace those jumps.

use crate::domain::models::{
    DocumentOption, DriverInvitation, NewDriver, OnboardingCompletion, ProcessingMethod,
    WizardFormData,
};
use crate::domain::uploads;
use crate::domain::validation::{is_present, is_valid_email, Rule, RuleSet, ValidationErrors};
use crate::services::backend::{BackendApi, BackendError};
use once_cell::sync::Lazy;
use serde::Serialize;

pub const FIRST_STEP: u8 = 1;
pub const REVIEW_STEP: u8 = 7;
pub const FINAL_STEP: u8 = 8;

const SKIP_MESSAGE: &str = "Driver added successfully. Documents can be collected later.";

static FORM_RULES: Lazy<RuleSet<WizardFormData>> = Lazy::new(|| {
    RuleSet::new(vec![
        Rule::always(
            1,
            "firstName",
            |f: &WizardFormData| is_present(&f.first_name),
            "First name is required",
        ),
        Rule::always(
            1,
            "lastName",
            |f: &WizardFormData| is_present(&f.last_name),
            "Last name is required",
        ),
        Rule::always(
            1,
            "email",
            |f: &WizardFormData| is_present(&f.email),
            "Email is required",
        ),
        Rule::always(
            1,
            "email",
            |f: &WizardFormData| is_valid_email(&f.email),
            "Please enter a valid email address",
        ),
        Rule::always(
            1,
            "phone",
            |f: &WizardFormData| is_present(&f.phone),
            "Phone number is required",
        ),
        Rule::always(
            1,
            "location",
            |f: &WizardFormData| is_present(&f.location),
            "Location is required",
        ),
        Rule::always(
            1,
            "employeeId",
            |f: &WizardFormData| is_present(&f.employee_id),
            "Employee ID is required",
        ),
        Rule::always(
            2,
            "documentOption",
            |f: &WizardFormData| f.document_option.is_some(),
            "Please choose how documents will be collected",
        ),
        Rule::when(
            4,
            "processingMethod",
            |f: &WizardFormData| f.document_option == Some(DocumentOption::Upload),
            |f: &WizardFormData| f.processing_method.is_some(),
            "Please choose a processing method",
        ),
    ])
});

pub fn step_title(step: u8) -> &'static str {
    match step {
        1 => "Personal Information",
        2 => "Document Collection",
        3 => "Documents",
        4 => "Processing Method",
        5 => "Document Details",
        6 => "Verification",
        7 => "Review",
        8 => "Complete",
        _ => "Unknown",
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum Submission {
    Idle,
    InFlight,
    Failed { message: String },
    Succeeded,
    Skipped,
}

/// What step 8 renders.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TerminalView {
    SkipSummary,
    Submitting,
    Error,
    Success,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
}

impl Toast {
    fn success(message: impl Into<String>) -> Self {
        Self {
            kind: ToastKind::Success,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            kind: ToastKind::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    pub from: u8,
    pub to: u8,
    pub toast: Option<Toast>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum BackOutcome {
    /// Back on step 1 leaves the wizard.
    Exit,
    Moved { step: u8 },
}

#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("{}", .0.first_message().unwrap_or("Validation failed"))]
    Invalid(ValidationErrors),
    #[error("failed to create driver: {0}")]
    DriverCreation(#[source] BackendError),
    #[error("nothing to retry")]
    NothingToRetry,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Wizard {
    pub company_id: String,
    pub current_step: u8,
    pub form_data: WizardFormData,
    pub errors: ValidationErrors,
    pub created_driver_id: Option<String>,
    pub submission: Submission,
    /// Names of the company's active document types, loaded at start.
    pub required_document_types: Vec<String>,
}

impl Wizard {
    pub fn new(company_id: impl Into<String>, required_document_types: Vec<String>) -> Self {
        Self {
            company_id: company_id.into(),
            current_step: FIRST_STEP,
            form_data: WizardFormData::default(),
            errors: ValidationErrors::new(),
            created_driver_id: None,
            submission: Submission::Idle,
            required_document_types,
        }
    }

    /// Runs the checks for `step` against the current form. Replaces `errors`.
    pub fn validate_step(&mut self, step: u8) -> bool {
        let mut errors = FORM_RULES.validate_step(&self.form_data, step);
        match step {
            3 => errors.merge(self.upload_gate()),
            5 => errors.merge(self.details_gate()),
            6 => errors.merge(self.verification_gate()),
            _ => {}
        }
        self.errors = errors;
        self.errors.is_empty()
    }

    fn upload_gate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if self.form_data.document_option != Some(DocumentOption::Upload) {
            return errors;
        }
        let required = self.required_document_types.len();
        if self.form_data.uploaded_documents.is_empty() {
            errors.add("documents", "Please upload at least one document");
        } else if !uploads::upload_complete(&self.form_data, required) {
            let remaining = uploads::remaining_uploads(&self.form_data, required);
            errors.add(
                "documents",
                format!("Please upload all required documents ({remaining} remaining)"),
            );
        }
        errors
    }

    fn details_gate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if self.form_data.processing_method != Some(ProcessingMethod::Manual) {
            return errors;
        }
        for doc in uploads::missing_details(&self.form_data) {
            errors.add(
                format!("documents.{}.expiryDate", doc.id),
                format!("Expiry date is required for {}", doc.document_type),
            );
        }
        errors
    }

    fn verification_gate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if self.form_data.processing_method == Some(ProcessingMethod::Ai)
            && !uploads::verification_complete(&self.form_data)
        {
            errors.add("verification", "Please verify all documents before continuing");
        }
        errors
    }

    /// Validates the current step and moves forward, running the side effects
    /// attached to the step boundary.
    pub async fn advance(
        &mut self,
        backend: &dyn BackendApi,
        token: &str,
    ) -> Result<Transition, WizardError> {
        let from = self.current_step;
        if from >= FINAL_STEP {
            return Ok(Transition {
                from,
                to: from,
                toast: None,
            });
        }

        if !self.validate_step(from) {
            tracing::debug!("Wizard step {} blocked: {}", from, self.errors);
            return Err(WizardError::Invalid(self.errors.clone()));
        }

        let (to, toast) = match from {
            1 => {
                self.ensure_driver(backend, token).await?;
                (2, None)
            }
            // Skipping never submits anything, also when coming back via review.
            2 | REVIEW_STEP if self.form_data.document_option == Some(DocumentOption::Skip) => {
                self.submission = Submission::Skipped;
                (FINAL_STEP, Some(Toast::success(SKIP_MESSAGE)))
            }
            3 if self.form_data.document_option == Some(DocumentOption::Link) => (REVIEW_STEP, None),
            REVIEW_STEP => {
                self.current_step = FINAL_STEP;
                let toast = self.submit(backend, token).await;
                (FINAL_STEP, Some(toast))
            }
            step => (step + 1, None),
        };

        self.current_step = to;
        tracing::debug!("Wizard moved from step {} to {}", from, to);
        Ok(Transition { from, to, toast })
    }

    /// Creates the driver record once per wizard.
    async fn ensure_driver(
        &mut self,
        backend: &dyn BackendApi,
        token: &str,
    ) -> Result<(), WizardError> {
        if self.created_driver_id.is_some() {
            return Ok(());
        }
        let new_driver = NewDriver::from_form(&self.company_id, &self.form_data);
        match backend.create_driver(token, &new_driver).await {
            Ok(driver) => {
                tracing::info!("Created driver {} for company {}", driver.id, self.company_id);
                self.created_driver_id = Some(driver.id);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to create driver: {}", e);
                self.errors.add("submit", e.to_string());
                Err(WizardError::DriverCreation(e))
            }
        }
    }

    async fn submit(&mut self, backend: &dyn BackendApi, token: &str) -> Toast {
        self.submission = Submission::InFlight;
        let Some(driver_id) = self.created_driver_id.clone() else {
            let message = "Driver record is missing; restart the wizard".to_string();
            self.submission = Submission::Failed {
                message: message.clone(),
            };
            return Toast::error(message);
        };

        let option = self.form_data.document_option.unwrap_or(DocumentOption::Upload);
        let result = match option {
            DocumentOption::Link => {
                let invitation = DriverInvitation {
                    company_id: self.company_id.clone(),
                    driver_id: driver_id.clone(),
                    email: self.form_data.email.trim().to_lowercase(),
                    phone: self.form_data.phone.trim().to_string(),
                    document_types: self.required_document_types.clone(),
                    reminders: self.form_data.reminders.clone(),
                };
                backend.send_invitation(token, &invitation).await
            }
            _ => {
                let completion = OnboardingCompletion {
                    processing_method: self.form_data.processing_method,
                    documents: self.form_data.uploaded_documents.clone(),
                    reminders: self.form_data.reminders.clone(),
                };
                backend.complete_onboarding(token, &driver_id, &completion).await
            }
        };

        match result {
            Ok(()) => {
                self.submission = Submission::Succeeded;
                tracing::info!("Onboarding submitted for driver {} ({})", driver_id, option.as_str());
                Toast::success(match option {
                    DocumentOption::Link => {
                        format!("Document upload link sent to {}", self.form_data.email.trim())
                    }
                    _ => "Driver onboarding completed successfully".to_string(),
                })
            }
            Err(e) => {
                tracing::error!("Onboarding submission for driver {} failed: {}", driver_id, e);
                let message = e.to_string();
                self.submission = Submission::Failed {
                    message: message.clone(),
                };
                Toast::error(match option {
                    DocumentOption::Link => format!("Failed to send document link: {message}"),
                    _ => format!("Failed to complete onboarding: {message}"),
                })
            }
        }
    }

    pub fn back(&mut self) -> BackOutcome {
        if self.current_step <= FIRST_STEP {
            return BackOutcome::Exit;
        }
        if self.current_step == FINAL_STEP {
            self.submission = Submission::Idle;
        }
        self.current_step -= 1;
        self.errors = ValidationErrors::new();
        BackOutcome::Moved {
            step: self.current_step,
        }
    }

    /// Restarts from step 1 after a failed submission. The form and the
    /// created driver are kept so the driver is not created twice.
    pub fn retry(&mut self) -> Result<(), WizardError> {
        if !matches!(self.submission, Submission::Failed { .. }) {
            return Err(WizardError::NothingToRetry);
        }
        self.current_step = FIRST_STEP;
        self.submission = Submission::Idle;
        self.errors = ValidationErrors::new();
        Ok(())
    }

    pub fn terminal_view(&self) -> Option<TerminalView> {
        if self.current_step != FINAL_STEP {
            return None;
        }
        Some(match self.submission {
            Submission::Skipped => TerminalView::SkipSummary,
            Submission::Failed { .. } => TerminalView::Error,
            Submission::Succeeded => TerminalView::Success,
            Submission::Idle | Submission::InFlight => TerminalView::Submitting,
        })
    }
}
