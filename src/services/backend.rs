use crate::domain::models::{
    ApiEnvelope, Document, DocumentCount, DocumentTypeConfig, Driver, DriverInvitation, NewDriver,
    OnboardingCompletion,
};
use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Message fragment the backend uses when a plan quota blocks a change.
pub const PLAN_LIMIT_MARKER: &str = "plan allows only";

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("backend unreachable: {0}")]
    Transport(String),
    #[error("unexpected backend response: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn is_plan_limit(&self) -> bool {
        matches!(self, BackendError::Rejected { message, .. } if message.contains(PLAN_LIMIT_MARKER))
    }
}

/// Stable, non-reversible identifier for the holder of a bearer token.
/// Lets per-caller state be keyed without keeping the token itself.
pub fn token_digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

/// Company REST backend as seen by this service. Every call carries the
/// caller's bearer token.
#[async_trait]
pub trait BackendApi: Send + Sync {
    async fn document_types(
        &self,
        token: &str,
        company_id: &str,
    ) -> Result<Vec<DocumentTypeConfig>, BackendError>;

    async fn create_document_type(
        &self,
        token: &str,
        company_id: &str,
        config: &DocumentTypeConfig,
    ) -> Result<DocumentTypeConfig, BackendError>;

    async fn update_document_type(
        &self,
        token: &str,
        company_id: &str,
        name: &str,
        config: &DocumentTypeConfig,
    ) -> Result<DocumentTypeConfig, BackendError>;

    async fn delete_document_type(
        &self,
        token: &str,
        company_id: &str,
        name: &str,
    ) -> Result<(), BackendError>;

    async fn set_document_type_active(
        &self,
        token: &str,
        company_id: &str,
        name: &str,
        active: bool,
    ) -> Result<DocumentTypeConfig, BackendError>;

    async fn create_driver(&self, token: &str, driver: &NewDriver) -> Result<Driver, BackendError>;

    async fn driver(&self, token: &str, driver_id: &str) -> Result<Driver, BackendError>;

    async fn drivers(&self, token: &str, company_id: &str) -> Result<Vec<Driver>, BackendError>;

    async fn driver_documents(
        &self,
        token: &str,
        driver_id: &str,
    ) -> Result<Vec<Document>, BackendError>;

    async fn delete_document(
        &self,
        token: &str,
        driver_id: &str,
        document_id: &str,
    ) -> Result<(), BackendError>;

    async fn document_counts(
        &self,
        token: &str,
        company_id: &str,
    ) -> Result<Vec<DocumentCount>, BackendError>;

    async fn complete_onboarding(
        &self,
        token: &str,
        driver_id: &str,
        completion: &OnboardingCompletion,
    ) -> Result<(), BackendError>;

    async fn send_invitation(
        &self,
        token: &str,
        invitation: &DriverInvitation,
    ) -> Result<(), BackendError>;
}

#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let base_url = Url::parse(base_url)
            .map_err(|e| BackendError::Transport(format!("invalid backend URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::Transport(format!(
                "invalid backend URL: {base_url}"
            )));
        }
        Ok(Self { client, base_url })
    }

    /// Appends `segments` to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn call<B, T>(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, &str)],
        token: &str,
        body: Option<&B>,
    ) -> Result<Option<T>, BackendError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let path = url.path().to_string();
        let mut request = self
            .client
            .request(method.clone(), url)
            .query(query)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!("Backend request {} {} failed: {}", method, path, e);
            BackendError::from(e)
        })?;

        let status = response.status();
        let bytes = response.bytes().await?;
        let envelope: Option<ApiEnvelope<T>> = if bytes.is_empty() {
            None
        } else {
            serde_json::from_slice(&bytes).ok()
        };

        if !status.is_success() {
            let message = envelope
                .as_ref()
                .and_then(|e| e.message.clone().or_else(|| e.error.clone()))
                .unwrap_or_else(|| default_message(status));
            tracing::warn!("Backend rejected {} {} ({}): {}", method, path, status, message);
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        match envelope {
            Some(env) if !env.success => Err(BackendError::Rejected {
                status: status.as_u16(),
                message: env
                    .message
                    .or(env.error)
                    .unwrap_or_else(|| "Request failed".to_string()),
            }),
            Some(env) => Ok(env.data),
            None if bytes.is_empty() => Ok(None),
            None => Err(BackendError::Decode(format!(
                "{} {} returned a body that is not a response envelope",
                method, path
            ))),
        }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
        token: &str,
    ) -> Result<T, BackendError> {
        let url = self.endpoint(segments);
        let path = url.path().to_string();
        self.call::<(), T>(Method::GET, url, query, token, None)
            .await?
            .ok_or_else(|| BackendError::Decode(format!("GET {path} returned no data")))
    }

    async fn send<B, T>(
        &self,
        method: Method,
        segments: &[&str],
        token: &str,
        body: &B,
    ) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments);
        let label = format!("{method} {}", url.path());
        self.call(method, url, &[], token, Some(body))
            .await?
            .ok_or_else(|| BackendError::Decode(format!("{label} returned no data")))
    }

    /// For calls whose response carries no data worth keeping.
    async fn execute<B>(
        &self,
        method: Method,
        segments: &[&str],
        token: &str,
        body: Option<&B>,
    ) -> Result<(), BackendError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = self.endpoint(segments);
        self.call::<B, serde_json::Value>(method, url, &[], token, body)
            .await
            .map(|_| ())
    }
}

fn default_message(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(|r| r.to_string())
        .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()))
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn document_types(
        &self,
        token: &str,
        company_id: &str,
    ) -> Result<Vec<DocumentTypeConfig>, BackendError> {
        self.fetch(&["api", "document-types", "company", company_id], &[], token)
            .await
    }

    async fn create_document_type(
        &self,
        token: &str,
        company_id: &str,
        config: &DocumentTypeConfig,
    ) -> Result<DocumentTypeConfig, BackendError> {
        let body = serde_json::json!({
            "companyId": company_id,
            "name": config.name,
            "aiEnabled": config.ai_enabled,
            "extractionMode": config.extraction_mode,
            "fields": config.fields,
        });
        self.send(Method::POST, &["api", "document-types"], token, &body)
            .await
    }

    async fn update_document_type(
        &self,
        token: &str,
        company_id: &str,
        name: &str,
        config: &DocumentTypeConfig,
    ) -> Result<DocumentTypeConfig, BackendError> {
        self.send(
            Method::PUT,
            &["api", "document-types", "company", company_id, name],
            token,
            config,
        )
        .await
    }

    async fn delete_document_type(
        &self,
        token: &str,
        company_id: &str,
        name: &str,
    ) -> Result<(), BackendError> {
        self.execute::<()>(
            Method::DELETE,
            &["api", "document-types", "company", company_id, name],
            token,
            None,
        )
        .await
    }

    async fn set_document_type_active(
        &self,
        token: &str,
        company_id: &str,
        name: &str,
        active: bool,
    ) -> Result<DocumentTypeConfig, BackendError> {
        let body = serde_json::json!({ "isActive": active });
        self.send(
            Method::PATCH,
            &["api", "document-types", "company", company_id, name, "active"],
            token,
            &body,
        )
        .await
    }

    async fn create_driver(&self, token: &str, driver: &NewDriver) -> Result<Driver, BackendError> {
        self.send(Method::POST, &["api", "drivers"], token, driver).await
    }

    async fn driver(&self, token: &str, driver_id: &str) -> Result<Driver, BackendError> {
        self.fetch(&["api", "drivers", driver_id], &[], token).await
    }

    async fn drivers(&self, token: &str, company_id: &str) -> Result<Vec<Driver>, BackendError> {
        self.fetch(&["api", "drivers"], &[("companyId", company_id)], token)
            .await
    }

    async fn driver_documents(
        &self,
        token: &str,
        driver_id: &str,
    ) -> Result<Vec<Document>, BackendError> {
        self.fetch(&["api", "drivers", driver_id, "documents"], &[], token)
            .await
    }

    async fn delete_document(
        &self,
        token: &str,
        driver_id: &str,
        document_id: &str,
    ) -> Result<(), BackendError> {
        self.execute::<()>(
            Method::DELETE,
            &["api", "drivers", driver_id, "documents", document_id],
            token,
            None,
        )
        .await
    }

    async fn document_counts(
        &self,
        token: &str,
        company_id: &str,
    ) -> Result<Vec<DocumentCount>, BackendError> {
        self.fetch(
            &["api", "drivers", "document-counts"],
            &[("companyId", company_id)],
            token,
        )
        .await
    }

    async fn complete_onboarding(
        &self,
        token: &str,
        driver_id: &str,
        completion: &OnboardingCompletion,
    ) -> Result<(), BackendError> {
        self.execute(
            Method::POST,
            &["api", "drivers", driver_id, "onboarding", "complete"],
            token,
            Some(completion),
        )
        .await
    }

    async fn send_invitation(
        &self,
        token: &str,
        invitation: &DriverInvitation,
    ) -> Result<(), BackendError> {
        self.execute(Method::POST, &["api", "driver-invitations"], token, Some(invitation))
            .await
    }
}
