//! Dispatch of scheduled sends.
//!
//! A run resolves the default SMTP transport once, then walks the selected
//! scheduled sends in request order. Every failure is caught per send and
//! reported; nothing aborts the batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use strum::{Display, EnumString};
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{MailerError, MailerResult};
use crate::models::{EmailTemplate, EmailUser, NewEmail, ScheduledEmail};
use crate::recipients::{describe_scheduled_email, resolve_recipients};
use crate::repository::MailerStore;
use crate::templates::{TemplateRenderer, recipient_context};
use crate::transport::{
    OutgoingEmail, ResolvedTransport, SentEmail, TransportFactory, resolve_default_transport,
};

/// Message shown when no SMTP profile is flagged default.
pub const NO_DEFAULT_PROFILE: &str = "No default SMTP profile found.";

/// What happens to the remaining recipients of a send after one fails.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum FailurePolicy {
    /// Keep delivering to later recipients
    #[default]
    Continue,
    /// Stop the send; later recipients are skipped
    Abort,
}

/// Final state of one scheduled send within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SendStatus {
    Sent,
    Failed,
    ConfigurationError,
    NotFound,
    AlreadySent,
    /// The id was already processed earlier in the same run
    Duplicate,
}

/// Delivery result for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Delivery {
    Delivered { message_id: Option<String> },
    Failed { error: String },
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RecipientResult {
    pub user_id: Uuid,
    pub email: String,
    pub delivery: Delivery,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SendOutcome {
    pub scheduled_email_id: Uuid,
    pub status: SendStatus,
    pub recipients: Vec<RecipientResult>,
    /// First error hit while processing this send
    pub error: Option<String>,
}

impl SendOutcome {
    fn without_recipients(id: Uuid, status: SendStatus, error: Option<String>) -> Self {
        Self {
            scheduled_email_id: id,
            status,
            recipients: Vec::new(),
            error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Error,
}

/// User-visible message produced by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OperatorMessage {
    pub level: MessageLevel,
    pub text: String,
}

/// Counts over the sends of a run.
///
/// `skipped` covers unknown ids, sends that were already sent and repeated
/// ids within one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DispatchSummary {
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DispatchReport {
    pub outcomes: Vec<SendOutcome>,
    pub summary: DispatchSummary,
    pub messages: Vec<OperatorMessage>,
}

impl DispatchReport {
    fn info(&mut self, text: impl Into<String>) {
        self.messages.push(OperatorMessage {
            level: MessageLevel::Info,
            text: text.into(),
        });
    }

    fn error(&mut self, text: impl Into<String>) {
        self.messages.push(OperatorMessage {
            level: MessageLevel::Error,
            text: text.into(),
        });
    }

    fn record(&mut self, outcome: SendOutcome) {
        match outcome.status {
            SendStatus::Sent => self.summary.sent += 1,
            SendStatus::Failed | SendStatus::ConfigurationError => self.summary.failed += 1,
            SendStatus::NotFound | SendStatus::AlreadySent | SendStatus::Duplicate => {
                self.summary.skipped += 1
            }
        }
        self.outcomes.push(outcome);
    }

    pub fn is_success(&self) -> bool {
        self.summary.failed == 0
    }
}

/// The transport a run delivers through, fixed when the run starts.
pub enum DefaultTransport {
    Ready(ResolvedTransport),
    /// No profile is flagged default
    Missing,
    /// Lookup or connection failed
    Unavailable(String),
}

/// Drives scheduled sends through recipients, rendering and transport.
pub struct Dispatcher<S, F> {
    store: Arc<S>,
    transports: Arc<F>,
    renderer: TemplateRenderer,
    policy: FailurePolicy,
}

impl<S, F> Dispatcher<S, F>
where
    S: MailerStore,
    F: TransportFactory,
{
    pub fn new(store: Arc<S>, transports: Arc<F>, policy: FailurePolicy) -> Self {
        Self {
            store,
            transports,
            renderer: TemplateRenderer::new(),
            policy,
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Look up the default SMTP profile and connect to it.
    pub async fn resolve_transport(&self) -> DefaultTransport {
        match resolve_default_transport(self.store.as_ref(), self.transports.as_ref()).await {
            Ok(Some(resolved)) => DefaultTransport::Ready(resolved),
            Ok(None) => DefaultTransport::Missing,
            Err(e) => {
                error!(error = %e, "Failed to resolve default SMTP transport");
                DefaultTransport::Unavailable(e.to_string())
            }
        }
    }

    /// Dispatch the given scheduled sends, in order.
    #[instrument(skip(self, ids), fields(count = ids.len(), policy = %self.policy))]
    pub async fn dispatch(&self, ids: &[Uuid]) -> DispatchReport {
        if ids.is_empty() {
            return DispatchReport::default();
        }
        let transport = self.resolve_transport().await;
        self.dispatch_with(ids, &transport).await
    }

    /// Dispatch every unsent send scheduled at or before `now`.
    #[instrument(skip(self))]
    pub async fn dispatch_due(&self, now: DateTime<Utc>) -> MailerResult<DispatchReport> {
        let due = self.store.list_due_scheduled_emails(now).await?;
        let ids: Vec<Uuid> = due.iter().map(|s| s.id).collect();
        info!(due = ids.len(), "Dispatching due scheduled emails");
        Ok(self.dispatch(&ids).await)
    }

    /// Dispatch through an already-resolved transport.
    ///
    /// Each id is attempted at most once per run; repeats keep the position of
    /// their first occurrence and are reported as `Duplicate`.
    pub async fn dispatch_with(&self, ids: &[Uuid], transport: &DefaultTransport) -> DispatchReport {
        let mut report = DispatchReport::default();
        let mut seen = HashSet::with_capacity(ids.len());

        for &id in ids {
            if !seen.insert(id) {
                debug!(scheduled_email_id = %id, "Repeated id in dispatch run, skipping");
                report.record(SendOutcome::without_recipients(id, SendStatus::Duplicate, None));
                continue;
            }
            let outcome = self.dispatch_one(id, transport, &mut report).await;
            report.record(outcome);
        }

        info!(
            sent = report.summary.sent,
            failed = report.summary.failed,
            skipped = report.summary.skipped,
            "Dispatch run finished"
        );
        report
    }

    async fn dispatch_one(
        &self,
        id: Uuid,
        transport: &DefaultTransport,
        report: &mut DispatchReport,
    ) -> SendOutcome {
        let scheduled = match self.store.get_scheduled_email(id).await {
            Ok(Some(scheduled)) => scheduled,
            Ok(None) => {
                let err = MailerError::not_found("Scheduled email", id);
                report.error(format!("Error: {err}"));
                return SendOutcome::without_recipients(
                    id,
                    SendStatus::NotFound,
                    Some(err.to_string()),
                );
            }
            Err(e) => return fail(report, id, Vec::new(), e.to_string()),
        };

        if scheduled.is_sent {
            info!(scheduled_email_id = %id, "Scheduled email already sent, skipping");
            report.info(format!("Scheduled email {id} was already sent."));
            return SendOutcome::without_recipients(id, SendStatus::AlreadySent, None);
        }

        let (template, recipients) = match self.prepare(&scheduled).await {
            Ok(prepared) => prepared,
            Err(e) => return fail(report, id, Vec::new(), e.to_string()),
        };
        let label = describe_scheduled_email(self.store.as_ref(), &scheduled, &template).await;

        let mut results = Vec::with_capacity(recipients.len());
        let mut first_error: Option<String> = None;

        if !recipients.is_empty() {
            let resolved = match transport {
                DefaultTransport::Ready(resolved) => resolved,
                DefaultTransport::Missing => {
                    warn!(scheduled_email_id = %id, "No default SMTP profile");
                    report.error(NO_DEFAULT_PROFILE);
                    return SendOutcome::without_recipients(
                        id,
                        SendStatus::ConfigurationError,
                        Some(NO_DEFAULT_PROFILE.to_string()),
                    );
                }
                DefaultTransport::Unavailable(cause) => {
                    return fail(report, id, Vec::new(), cause.clone());
                }
            };

            for user in &recipients {
                let delivery = if first_error.is_some() && self.policy == FailurePolicy::Abort {
                    Delivery::Skipped
                } else {
                    match self.deliver(&template, user, resolved).await {
                        Ok(sent) => Delivery::Delivered {
                            message_id: sent.message_id,
                        },
                        Err(e) => {
                            let error = e.to_string();
                            first_error.get_or_insert_with(|| error.clone());
                            Delivery::Failed { error }
                        }
                    }
                };
                results.push(RecipientResult {
                    user_id: user.id,
                    email: user.email.clone(),
                    delivery,
                });
            }
        }

        if let Some(cause) = first_error {
            return fail(report, id, results, cause);
        }

        if let Err(e) = self.store.mark_scheduled_email_sent(id).await {
            return fail(report, id, results, e.to_string());
        }

        info!(
            scheduled_email_id = %id,
            recipients = results.len(),
            "Scheduled email sent"
        );
        report.info(format!(
            "Sent '{}' to {} recipient(s).",
            label,
            results.len()
        ));

        SendOutcome {
            scheduled_email_id: id,
            status: SendStatus::Sent,
            recipients: results,
            error: None,
        }
    }

    async fn prepare(
        &self,
        scheduled: &ScheduledEmail,
    ) -> MailerResult<(EmailTemplate, Vec<EmailUser>)> {
        let template = self
            .store
            .get_template(scheduled.template_id)
            .await?
            .ok_or_else(|| {
                MailerError::Integrity(format!(
                    "Scheduled email {} references missing template {}",
                    scheduled.id, scheduled.template_id
                ))
            })?;
        let recipients = resolve_recipients(self.store.as_ref(), scheduled).await?;
        Ok((template, recipients))
    }

    /// Render, log and transmit one message.
    async fn deliver(
        &self,
        template: &EmailTemplate,
        user: &EmailUser,
        resolved: &ResolvedTransport,
    ) -> MailerResult<SentEmail> {
        let html_body = self
            .renderer
            .render(&template.body, &recipient_context(user))?;

        let log = self
            .store
            .create_email_log(NewEmail {
                to_email: user.email.clone(),
                template_id: template.id,
            })
            .await?;

        let email = OutgoingEmail {
            from: resolved.sender().to_string(),
            to: user.email.clone(),
            subject: template.subject.clone(),
            html_body,
        };

        match resolved.transport.send(&email).await {
            Ok(sent) => {
                if let Err(e) = self.store.mark_email_sent(log.id, Utc::now()).await {
                    warn!(email_id = %log.id, error = %e, "Failed to mark email log as sent");
                }
                Ok(sent)
            }
            Err(e) => {
                if let Err(log_err) = self.store.mark_email_failed(log.id, &e.to_string()).await {
                    warn!(email_id = %log.id, error = %log_err, "Failed to mark email log as failed");
                }
                Err(e)
            }
        }
    }
}

fn fail(
    report: &mut DispatchReport,
    id: Uuid,
    recipients: Vec<RecipientResult>,
    cause: String,
) -> SendOutcome {
    error!(scheduled_email_id = %id, error = %cause, "Scheduled email failed");
    report.error(format!("Error: {cause}"));
    SendOutcome {
        scheduled_email_id: id,
        status: SendStatus::Failed,
        recipients,
        error: Some(cause),
    }
}
