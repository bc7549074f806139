pub mod auth;
pub mod document_types;
pub mod drivers;
pub mod error;
pub mod onboarding;
pub mod wizard;

use crate::state::SharedState;
use axum::{routing::get, Router};

async fn health() -> &'static str {
    "OK"
}

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/wizards", wizard::router(state.clone()))
        .nest("/api/document-types", document_types::router(state.clone()))
        .nest("/api/drivers", drivers::router(state.clone()))
        .nest("/api/onboarding", onboarding::router(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::domain::models::{Document, DocumentStatus, Driver};
    use crate::services::backend::fake::{document_type, FakeBackend};
    use crate::state::AppState;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use chrono::Utc;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state(backend: Arc<FakeBackend>) -> SharedState {
        let config = AppConfig::from_lookup(|key| match key {
            "BACKEND_API_URL" => Some("http://backend.test".to_string()),
            "REFETCH_DELAY_MS" => Some("0".to_string()),
            _ => None,
        })
        .unwrap();
        Arc::new(AppState::new(config, backend))
    }

    async fn send(
        state: &SharedState,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        send_as(state, "test-token", method, uri, body).await
    }

    async fn send_as(
        state: &SharedState,
        token: &str,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"));
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = routes(state.clone())
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    fn personal_info() -> Value {
        json!({
            "firstName": "Maria",
            "lastName": "Lopez",
            "email": "maria@example.com",
            "phone": "+1 555 010 2030",
            "location": "Austin",
            "employeeId": "EMP-7"
        })
    }

    #[tokio::test]
    async fn test_health() {
        let state = test_state(Arc::new(FakeBackend::new()));
        let response = routes(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_requests_without_token_are_rejected() {
        let state = test_state(Arc::new(FakeBackend::new()));
        let request = Request::post("/api/wizards")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "companyId": "co-1" }).to_string()))
            .unwrap();
        let response = routes(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_wizard_skip_flow() {
        let backend = Arc::new(FakeBackend::with_types(vec![
            document_type("License", true),
            document_type("Insurance", false),
        ]));
        let state = test_state(backend.clone());

        let (status, body) = send(&state, "POST", "/api/wizards", Some(json!({ "companyId": "co-1" }))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["currentStep"], 1);
        assert_eq!(body["requiredDocumentTypes"], json!(["License"]));
        let id = body["id"].as_str().unwrap().to_string();

        // Blank form is rejected with field errors and no backend write.
        let (status, body) = send(&state, "POST", &format!("/api/wizards/{id}/next"), None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["fields"]["firstName"], "First name is required");
        assert_eq!(backend.count("create_driver"), 0);

        let (status, _) = send(&state, "PATCH", &format!("/api/wizards/{id}/form"), Some(personal_info())).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&state, "POST", &format!("/api/wizards/{id}/next"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["currentStep"], 2);
        assert_eq!(body["createdDriverId"], "drv-1");
        assert_eq!(body["stepTitle"], "Document Collection");

        send(
            &state,
            "PATCH",
            &format!("/api/wizards/{id}/form"),
            Some(json!({ "documentOption": "skip" })),
        )
        .await;
        let (status, body) = send(&state, "POST", &format!("/api/wizards/{id}/next"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["currentStep"], 8);
        assert_eq!(body["terminalView"], "skipSummary");
        assert_eq!(body["toast"]["kind"], "success");
        assert_eq!(backend.count("create_driver"), 1);
    }

    #[tokio::test]
    async fn test_wizard_back_from_first_step_ends_session() {
        let state = test_state(Arc::new(FakeBackend::new()));
        let (_, body) = send(&state, "POST", "/api/wizards", Some(json!({ "companyId": "co-1" }))).await;
        let id = body["id"].as_str().unwrap().to_string();

        let (status, body) = send(&state, "POST", &format!("/api/wizards/{id}/back"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["back"]["outcome"], "exit");

        let (status, _) = send(&state, "GET", &format!("/api/wizards/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_wizard_edits_refused_while_next_runs() {
        let backend = Arc::new(FakeBackend::new());
        backend.slow("create_driver", Duration::from_millis(200));
        let state = test_state(backend.clone());
        let (_, body) = send(&state, "POST", "/api/wizards", Some(json!({ "companyId": "co-1" }))).await;
        let id = body["id"].as_str().unwrap().to_string();
        send(&state, "PATCH", &format!("/api/wizards/{id}/form"), Some(personal_info())).await;

        let running = {
            let state = state.clone();
            let uri = format!("/api/wizards/{id}/next");
            tokio::spawn(async move { send(&state, "POST", &uri, None).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let (status, _) = send(
            &state,
            "PATCH",
            &format!("/api/wizards/{id}/form"),
            Some(json!({ "documentOption": "skip" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = send(&state, "POST", &format!("/api/wizards/{id}/back"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(&state, "GET", &format!("/api/wizards/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["busy"], true);
        assert_eq!(body["currentStep"], 1);

        let (status, _) = send(&state, "POST", &format!("/api/wizards/{id}/next"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = running.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["currentStep"], 2);
        assert_eq!(backend.count("create_driver"), 1);

        let (_, body) = send(&state, "GET", &format!("/api/wizards/{id}"), None).await;
        assert_eq!(body["busy"], false);
        assert_eq!(body["currentStep"], 2);
        assert!(body["formData"]["documentOption"].is_null());
    }

    #[tokio::test]
    async fn test_wizard_hidden_from_other_tokens() {
        let state = test_state(Arc::new(FakeBackend::new()));
        let (_, body) = send(&state, "POST", "/api/wizards", Some(json!({ "companyId": "co-1" }))).await;
        let id = body["id"].as_str().unwrap().to_string();
        let uri = format!("/api/wizards/{id}");

        let (status, _) = send_as(&state, "other-token", "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send_as(
            &state,
            "other-token",
            "PATCH",
            &format!("{uri}/form"),
            Some(json!({ "firstName": "Mallory" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let request = Request::get(uri.as_str()).body(Body::empty()).unwrap();
        let response = routes(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let (status, body) = send(&state, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["formData"]["firstName"], "");
    }

    #[tokio::test]
    async fn test_reused_upload_id_resets_verification() {
        let state = test_state(Arc::new(FakeBackend::new()));
        let (_, body) = send(&state, "POST", "/api/wizards", Some(json!({ "companyId": "co-1" }))).await;
        let id = body["id"].as_str().unwrap().to_string();
        let documents = format!("/api/wizards/{id}/documents");

        send(
            &state,
            "POST",
            &documents,
            Some(json!({ "id": "up-1", "documentType": "License", "fileName": "license.pdf" })),
        )
        .await;
        let (_, body) = send(&state, "POST", &format!("{documents}/up-1/verify"), None).await;
        assert_eq!(body["formData"]["allDocumentsVerified"], true);

        let (status, body) = send(
            &state,
            "POST",
            &documents,
            Some(json!({ "id": "up-1", "documentType": "Insurance", "fileName": "insurance.pdf" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["formData"]["uploadedDocuments"].as_array().unwrap().len(), 1);
        assert_eq!(body["formData"]["uploadedDocuments"][0]["documentType"], "Insurance");
        assert_eq!(body["formData"]["verifiedDocuments"], json!([]));
        assert_eq!(body["formData"]["allDocumentsVerified"], false);
    }

    #[tokio::test]
    async fn test_reminder_days_capped_at_three() {
        let state = test_state(Arc::new(FakeBackend::new()));
        let (_, body) = send(&state, "POST", "/api/wizards", Some(json!({ "companyId": "co-1" }))).await;
        let id = body["id"].as_str().unwrap().to_string();

        for day in [7, 14] {
            send(&state, "POST", &format!("/api/wizards/{id}/reminders/days/{day}"), None).await;
        }
        let (_, body) = send(&state, "POST", &format!("/api/wizards/{id}/reminders/days/60"), None).await;
        assert_eq!(body["changed"], false);
        assert_eq!(body["days"], json!([30, 14, 7]));

        let (_, body) = send(&state, "POST", &format!("/api/wizards/{id}/reminders/days/14"), None).await;
        assert_eq!(body["changed"], true);
        assert_eq!(body["days"], json!([30, 7]));
    }

    #[tokio::test]
    async fn test_toggle_blocked_by_plan_limit() {
        let backend = Arc::new(FakeBackend::with_types(vec![
            document_type("License", true),
            document_type("Insurance", false),
        ]));
        let state = test_state(backend.clone());

        let (status, body) = send(
            &state,
            "POST",
            "/api/document-types/company/co-1/Insurance/active",
            Some(json!({ "isActive": true, "plan": "free" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["upgrade"], true);
        assert_eq!(backend.count("set_document_type_active"), 0);

        let (status, body) = send(
            &state,
            "POST",
            "/api/document-types/company/co-1/Insurance/active",
            Some(json!({ "isActive": true, "plan": "starter" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isActive"], true);
    }

    #[tokio::test]
    async fn test_field_validation_endpoint() {
        let state = test_state(Arc::new(FakeBackend::new()));
        let (status, body) = send(
            &state,
            "POST",
            "/api/document-types/fields/validate",
            Some(json!({ "field": { "name": "1st", "label": "" } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid"], false);
        assert!(body["errors"]["name"].is_string());
        assert_eq!(body["errors"]["label"], "Field label is required");
        assert!(body.get("draft").is_none());

        let (status, body) = send(
            &state,
            "POST",
            "/api/document-types/fields/validate",
            Some(json!({
                "draft": { "name": "Medical Card", "fields": [{ "name": "expiry", "label": "Expiry" }] },
                "field": { "name": " examiner ", "label": "Examiner" }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid"], true);
        assert_eq!(body["draft"]["fields"][1]["name"], "examiner");
        assert_eq!(body["draft"]["fields"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_onboarding_step_validation() {
        let state = test_state(Arc::new(FakeBackend::new()));
        let (status, body) = send(&state, "POST", "/api/onboarding/validate?step=1", Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid"], false);
        assert_eq!(body["firstInvalidStep"], 1);
        assert_eq!(body["complete"], false);
        assert!(body["errors"]["companyName"].is_string());

        let (status, _) = send(&state, "POST", "/api/onboarding/validate?step=9", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_driver_list_and_compliance() {
        let backend = Arc::new(FakeBackend::with_types(vec![
            document_type("License", true),
            document_type("Insurance", true),
        ]));
        backend.insert_driver(Driver {
            id: "drv-7".to_string(),
            first_name: "Sam".to_string(),
            last_name: "Reed".to_string(),
            email: "sam@example.com".to_string(),
            phone: String::new(),
            location: String::new(),
            employee_id: String::new(),
            documents: vec![Document {
                id: "doc-1".to_string(),
                driver_id: Some("drv-7".to_string()),
                document_type: "License".to_string(),
                status: DocumentStatus::Active,
                expiry_date: None,
                uploaded_at: Utc::now(),
                file_name: "license.pdf".to_string(),
            }],
            compliance_score: None,
        });
        let state = test_state(backend.clone());

        let (status, body) = send(&state, "GET", "/api/drivers?companyId=co-1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["fullName"], "Sam Reed");
        assert_eq!(body[0]["complianceScore"], 50);
        assert_eq!(body[0]["badge"], "red");
        assert_eq!(body[0]["documentCount"], 1);

        let (status, body) = send(&state, "GET", "/api/drivers/drv-7/compliance?companyId=co-1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["coveredTypes"], json!(["License"]));
        assert_eq!(body["missingTypes"], json!(["Insurance"]));

        let (status, _) = send(&state, "DELETE", "/api/drivers/drv-7/documents/doc-1?companyId=co-1", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(backend.count("delete_document"), 1);
    }

    #[tokio::test]
    async fn test_unknown_wizard_is_not_found() {
        let state = test_state(Arc::new(FakeBackend::new()));
        let (status, body) = send(
            &state,
            "GET",
            "/api/wizards/00000000-0000-0000-0000-000000000000",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("not found"));
    }
}
