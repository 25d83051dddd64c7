//! Handler tests for the mailer domain
//!
//! These drive the mailer router with in-memory storage and a recording
//! transport, checking status codes, JSON shapes and the dispatch endpoints.

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use domain_mailer::*;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tower::ServiceExt; // For oneshot()
use uuid::Uuid;

// Helper to parse JSON response body
async fn json_body<T: serde::de::DeserializeOwned>(body: Body) -> T {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Transport that records every message instead of talking SMTP.
#[derive(Clone, Default)]
struct RecordingFactory {
    outbox: Arc<Mutex<Vec<OutgoingEmail>>>,
}

struct RecordingTransport {
    outbox: Arc<Mutex<Vec<OutgoingEmail>>>,
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, email: &OutgoingEmail) -> MailerResult<SentEmail> {
        let mut outbox = self.outbox.lock().unwrap();
        outbox.push(email.clone());
        Ok(SentEmail {
            message_id: Some(format!("<{}@test>", outbox.len())),
        })
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

impl TransportFactory for RecordingFactory {
    fn connect(&self, _profile: &SmtpProfile) -> MailerResult<Box<dyn MailTransport>> {
        Ok(Box::new(RecordingTransport {
            outbox: Arc::clone(&self.outbox),
        }))
    }
}

struct TestApp {
    service: MailerService<InMemoryMailerStore>,
    factory: RecordingFactory,
}

impl TestApp {
    fn new() -> Self {
        let store = Arc::new(InMemoryMailerStore::new());
        Self {
            service: MailerService::new(store),
            factory: RecordingFactory::default(),
        }
    }

    fn router(&self) -> Router {
        let dispatcher = Dispatcher::new(
            Arc::clone(self.service.store()),
            Arc::new(self.factory.clone()),
            FailurePolicy::Continue,
        );
        handlers::router(self.service.clone(), dispatcher)
    }

    fn sent(&self) -> Vec<OutgoingEmail> {
        self.factory.outbox.lock().unwrap().clone()
    }

    async fn template(&self, name: &str) -> EmailTemplate {
        self.service
            .create_template(CreateEmailTemplate {
                name: name.to_string(),
                subject: "Hello".to_string(),
                body: "<p>Hi {{first_name}}</p>".to_string(),
            })
            .await
            .unwrap()
    }

    async fn user(&self, first_name: &str, email: &str) -> EmailUser {
        self.service
            .create_user(CreateEmailUser {
                first_name: Some(first_name.to_string()),
                last_name: None,
                email: email.to_string(),
            })
            .await
            .unwrap()
    }

    async fn default_profile(&self) -> SmtpProfile {
        self.service
            .create_smtp_profile(CreateSmtpProfile {
                name: "relay".to_string(),
                host: "smtp.example.com".to_string(),
                port: 587,
                username: "news@example.com".to_string(),
                password: "secret".to_string(),
                use_tls: true,
                use_ssl: false,
                is_default: true,
            })
            .await
            .unwrap()
    }

    async fn schedule_for_user(&self, template_id: Uuid, user_id: Uuid) -> ScheduledEmail {
        self.service
            .create_scheduled_email(CreateScheduledEmail {
                template_id,
                user_id: Some(user_id),
                cluster_id: None,
                scheduled_time: Utc::now() - Duration::minutes(5),
            })
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_create_template_handler_returns_201() {
    let app = TestApp::new();

    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/templates",
            json!({
                "name": "welcome",
                "subject": "Welcome aboard",
                "body": "<p>Hi {{first_name}}</p>"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);

    let template: EmailTemplate = json_body(response.into_body()).await;
    assert_eq!(template.name, "welcome");
    assert_eq!(template.subject, "Welcome aboard");
}

#[tokio::test]
async fn test_create_template_handler_rejects_bad_syntax() {
    let app = TestApp::new();

    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/templates",
            json!({
                "name": "broken",
                "subject": "Oops",
                "body": "<p>Hi {{first_name</p>"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["error"], "TEMPLATE_ERROR");
}

#[tokio::test]
async fn test_create_user_handler_validates_email() {
    let app = TestApp::new();

    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/users",
            json!({ "first_name": "Ana", "email": "not-an-email" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_duplicate_template_name_returns_409() {
    let app = TestApp::new();
    app.template("welcome").await;

    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/templates",
            json!({ "name": "welcome", "subject": "Again", "body": "<p>Again</p>" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_get_unknown_template_returns_404() {
    let app = TestApp::new();

    let response = app
        .router()
        .oneshot(get(&format!("/templates/{}", Uuid::now_v7())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_smtp_profile_password_is_never_returned() {
    let app = TestApp::new();
    let profile = app.default_profile().await;

    let response = app
        .router()
        .oneshot(get(&format!("/smtp-profiles/{}", profile.id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = json_body(response.into_body()).await;
    assert!(body.get("password").is_none());
    assert_eq!(body["default"], true);
    assert_eq!(body["username"], "news@example.com");
}

#[tokio::test]
async fn test_second_default_profile_returns_409() {
    let app = TestApp::new();
    app.default_profile().await;

    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/smtp-profiles",
            json!({
                "name": "backup",
                "host": "smtp.backup.com",
                "port": 25,
                "username": "",
                "password": "",
                "default": true
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_replace_and_list_cluster_members() {
    let app = TestApp::new();
    let ana = app.user("Ana", "ana@example.com").await;
    let bob = app.user("Bob", "bob@example.com").await;

    let response = app
        .router()
        .oneshot(json_request("POST", "/clusters", json!({ "name": "team" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let cluster: Cluster = json_body(response.into_body()).await;

    let response = app
        .router()
        .oneshot(json_request(
            "PUT",
            &format!("/clusters/{}/members", cluster.id),
            json!({ "member_ids": [bob.id, ana.id] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router()
        .oneshot(get(&format!("/clusters/{}/members", cluster.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let members: Vec<EmailUser> = json_body(response.into_body()).await;
    let emails: Vec<&str> = members.iter().map(|u| u.email.as_str()).collect();
    assert_eq!(emails, vec!["ana@example.com", "bob@example.com"]);
}

#[tokio::test]
async fn test_cluster_with_unknown_member_returns_400() {
    let app = TestApp::new();

    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/clusters",
            json!({ "name": "ghosts", "member_ids": [Uuid::now_v7()] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_dispatch_endpoint_sends_and_marks_sent() {
    let app = TestApp::new();
    app.default_profile().await;
    let template = app.template("welcome").await;
    let ana = app.user("Ana", "ana@example.com").await;
    let scheduled = app.schedule_for_user(template.id, ana.id).await;

    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/scheduled-emails/dispatch",
            json!({ "ids": [scheduled.id] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let report: DispatchReport = json_body(response.into_body()).await;
    assert_eq!(report.summary.sent, 1);
    assert_eq!(report.outcomes[0].status, SendStatus::Sent);
    assert!(report.is_success());

    let sent = app.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].from, "news@example.com");
    assert_eq!(sent[0].to, "ana@example.com");
    assert_eq!(sent[0].html_body, "<p>Hi Ana</p>");

    let stored = app.service.get_scheduled_email(scheduled.id).await.unwrap();
    assert!(stored.is_sent);

    let response = app
        .router()
        .oneshot(get("/emails?to_email=ana@example.com"))
        .await
        .unwrap();
    let logs: Vec<Email> = json_body(response.into_body()).await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, EmailStatus::Sent);
}

#[tokio::test]
async fn test_dispatch_without_default_profile_reports_configuration_error() {
    let app = TestApp::new();
    let template = app.template("welcome").await;
    let ana = app.user("Ana", "ana@example.com").await;
    let scheduled = app.schedule_for_user(template.id, ana.id).await;

    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/scheduled-emails/dispatch",
            json!({ "ids": [scheduled.id] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let report: DispatchReport = json_body(response.into_body()).await;
    assert_eq!(report.outcomes[0].status, SendStatus::ConfigurationError);
    assert!(
        report
            .messages
            .iter()
            .any(|m| m.level == MessageLevel::Error && m.text == NO_DEFAULT_PROFILE)
    );
    assert!(app.sent().is_empty());

    let stored = app.service.get_scheduled_email(scheduled.id).await.unwrap();
    assert!(!stored.is_sent);
}

#[tokio::test]
async fn test_dispatch_due_skips_future_sends() {
    let app = TestApp::new();
    app.default_profile().await;
    let template = app.template("welcome").await;
    let ana = app.user("Ana", "ana@example.com").await;
    let due = app.schedule_for_user(template.id, ana.id).await;
    let future = app
        .service
        .create_scheduled_email(CreateScheduledEmail {
            template_id: template.id,
            user_id: Some(ana.id),
            cluster_id: None,
            scheduled_time: Utc::now() + Duration::days(1),
        })
        .await
        .unwrap();

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/scheduled-emails/dispatch-due")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let report: DispatchReport = json_body(response.into_body()).await;
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].scheduled_email_id, due.id);

    let stored = app.service.get_scheduled_email(future.id).await.unwrap();
    assert!(!stored.is_sent);
}
