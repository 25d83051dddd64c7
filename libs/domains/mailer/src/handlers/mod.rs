//! HTTP handlers for the mailer.
//!
//! [`router`] returns every route without the `/api` prefix; the
//! application nests it. OpenAPI paths are documented with the prefix.

use axum::Router;
use std::sync::Arc;
use utoipa::OpenApi;

use crate::dispatch::{
    Delivery, DispatchReport, DispatchSummary, Dispatcher, FailurePolicy, MessageLevel,
    OperatorMessage, RecipientResult, SendOutcome, SendStatus,
};
use crate::error::ErrorResponse;
use crate::models::{
    Cluster, CreateCluster, CreateEmailTemplate, CreateEmailUser, CreateScheduledEmail,
    CreateSmtpProfile, Email, EmailStatus, EmailTemplate, EmailUser, ScheduledEmail,
    SetClusterMembers, SmtpProfile, UpdateCluster, UpdateEmailTemplate, UpdateEmailUser,
    UpdateScheduledEmail, UpdateSmtpProfile,
};
use crate::repository::MailerStore;
use crate::service::MailerService;
use crate::transport::TransportFactory;

pub mod clusters;
pub mod emails;
pub mod scheduled_emails;
pub mod smtp_profiles;
pub mod templates;
pub mod users;

/// Shared state for every mailer handler
pub struct MailerState<S: MailerStore, F: TransportFactory> {
    pub service: MailerService<S>,
    pub dispatcher: Dispatcher<S, F>,
}

pub(crate) type SharedState<S, F> = Arc<MailerState<S, F>>;

/// OpenAPI documentation for the mailer API
#[derive(OpenApi)]
#[openapi(
    paths(
        templates::list_templates,
        templates::create_template,
        templates::get_template,
        templates::update_template,
        templates::delete_template,
        users::list_users,
        users::create_user,
        users::get_user,
        users::update_user,
        users::delete_user,
        clusters::list_clusters,
        clusters::create_cluster,
        clusters::get_cluster,
        clusters::update_cluster,
        clusters::delete_cluster,
        clusters::list_members,
        clusters::set_members,
        smtp_profiles::list_smtp_profiles,
        smtp_profiles::create_smtp_profile,
        smtp_profiles::get_smtp_profile,
        smtp_profiles::update_smtp_profile,
        smtp_profiles::delete_smtp_profile,
        scheduled_emails::list_scheduled_emails,
        scheduled_emails::create_scheduled_email,
        scheduled_emails::get_scheduled_email,
        scheduled_emails::update_scheduled_email,
        scheduled_emails::delete_scheduled_email,
        scheduled_emails::dispatch,
        scheduled_emails::dispatch_due,
        emails::list_emails,
        emails::get_email,
    ),
    components(schemas(
        ErrorResponse,
        EmailTemplate,
        CreateEmailTemplate,
        UpdateEmailTemplate,
        EmailUser,
        CreateEmailUser,
        UpdateEmailUser,
        Cluster,
        CreateCluster,
        UpdateCluster,
        SetClusterMembers,
        SmtpProfile,
        CreateSmtpProfile,
        UpdateSmtpProfile,
        ScheduledEmail,
        CreateScheduledEmail,
        UpdateScheduledEmail,
        scheduled_emails::DispatchRequest,
        Email,
        EmailStatus,
        DispatchReport,
        DispatchSummary,
        SendOutcome,
        SendStatus,
        RecipientResult,
        Delivery,
        OperatorMessage,
        MessageLevel,
        FailurePolicy,
    )),
    tags(
        (name = "templates", description = "Email template management"),
        (name = "users", description = "Recipient management"),
        (name = "clusters", description = "Recipient groups"),
        (name = "smtp-profiles", description = "Outbound SMTP settings"),
        (name = "scheduled-emails", description = "Scheduled sends and dispatch"),
        (name = "emails", description = "Delivery log"),
    )
)]
pub struct ApiDoc;

/// Create the mailer router with all HTTP endpoints
pub fn router<S, F>(service: MailerService<S>, dispatcher: Dispatcher<S, F>) -> Router
where
    S: MailerStore + 'static,
    F: TransportFactory + 'static,
{
    let state = Arc::new(MailerState {
        service,
        dispatcher,
    });

    Router::new()
        .nest("/templates", templates::router())
        .nest("/users", users::router())
        .nest("/clusters", clusters::router())
        .nest("/smtp-profiles", smtp_profiles::router())
        .nest("/scheduled-emails", scheduled_emails::router())
        .nest("/emails", emails::router())
        .with_state(state)
}
