use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::MailerResult;
use crate::models::{
    Cluster, ClusterFilter, CreateCluster, CreateEmailTemplate, CreateEmailUser,
    CreateScheduledEmail, CreateSmtpProfile, Email, EmailFilter, EmailTemplate, EmailUser,
    NewEmail, ScheduledEmail, ScheduledEmailFilter, SmtpProfile, SmtpProfileFilter,
    TemplateFilter, UpdateCluster, UpdateEmailTemplate, UpdateEmailUser, UpdateScheduledEmail,
    UpdateSmtpProfile, UserFilter,
};

/// Persistence for email templates
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    async fn create_template(&self, input: CreateEmailTemplate) -> MailerResult<EmailTemplate>;

    async fn get_template(&self, id: Uuid) -> MailerResult<Option<EmailTemplate>>;

    async fn find_template_by_name(&self, name: &str) -> MailerResult<Option<EmailTemplate>>;

    async fn list_templates(&self, filter: TemplateFilter) -> MailerResult<Vec<EmailTemplate>>;

    async fn update_template(
        &self,
        id: Uuid,
        input: UpdateEmailTemplate,
    ) -> MailerResult<EmailTemplate>;

    /// Deleting a template also deletes its delivery log and scheduled sends
    async fn delete_template(&self, id: Uuid) -> MailerResult<bool>;
}

/// Persistence for recipients
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, input: CreateEmailUser) -> MailerResult<EmailUser>;

    async fn get_user(&self, id: Uuid) -> MailerResult<Option<EmailUser>>;

    async fn find_user_by_email(&self, email: &str) -> MailerResult<Option<EmailUser>>;

    /// Users with the given ids, in ascending id order. Unknown ids are skipped.
    async fn get_users(&self, ids: &[Uuid]) -> MailerResult<Vec<EmailUser>>;

    async fn list_users(&self, filter: UserFilter) -> MailerResult<Vec<EmailUser>>;

    async fn update_user(&self, id: Uuid, input: UpdateEmailUser) -> MailerResult<EmailUser>;

    /// Deleting a user removes it from clusters and deletes scheduled sends targeting it
    async fn delete_user(&self, id: Uuid) -> MailerResult<bool>;
}

/// Persistence for clusters and their membership
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterRepository: Send + Sync {
    async fn create_cluster(&self, input: CreateCluster) -> MailerResult<Cluster>;

    async fn get_cluster(&self, id: Uuid) -> MailerResult<Option<Cluster>>;

    async fn list_clusters(&self, filter: ClusterFilter) -> MailerResult<Vec<Cluster>>;

    async fn update_cluster(&self, id: Uuid, input: UpdateCluster) -> MailerResult<Cluster>;

    /// Replace the member set of a cluster
    async fn set_cluster_members(&self, id: Uuid, member_ids: Vec<Uuid>)
    -> MailerResult<Cluster>;

    /// Deleting a cluster deletes scheduled sends targeting it
    async fn delete_cluster(&self, id: Uuid) -> MailerResult<bool>;
}

/// Persistence for SMTP profiles
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SmtpProfileRepository: Send + Sync {
    async fn create_smtp_profile(&self, input: CreateSmtpProfile) -> MailerResult<SmtpProfile>;

    async fn get_smtp_profile(&self, id: Uuid) -> MailerResult<Option<SmtpProfile>>;

    async fn list_smtp_profiles(&self, filter: SmtpProfileFilter)
    -> MailerResult<Vec<SmtpProfile>>;

    async fn update_smtp_profile(
        &self,
        id: Uuid,
        input: UpdateSmtpProfile,
    ) -> MailerResult<SmtpProfile>;

    async fn delete_smtp_profile(&self, id: Uuid) -> MailerResult<bool>;

    /// The oldest profile flagged default, if any
    async fn find_default_smtp_profile(&self) -> MailerResult<Option<SmtpProfile>>;
}

/// Persistence for scheduled sends
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScheduledEmailRepository: Send + Sync {
    async fn create_scheduled_email(
        &self,
        input: CreateScheduledEmail,
    ) -> MailerResult<ScheduledEmail>;

    async fn get_scheduled_email(&self, id: Uuid) -> MailerResult<Option<ScheduledEmail>>;

    async fn list_scheduled_emails(
        &self,
        filter: ScheduledEmailFilter,
    ) -> MailerResult<Vec<ScheduledEmail>>;

    /// Unsent sends scheduled at or before `now`, oldest first
    async fn list_due_scheduled_emails(&self, now: DateTime<Utc>)
    -> MailerResult<Vec<ScheduledEmail>>;

    async fn update_scheduled_email(
        &self,
        id: Uuid,
        input: UpdateScheduledEmail,
    ) -> MailerResult<ScheduledEmail>;

    /// Set `is_sent`; there is no way back
    async fn mark_scheduled_email_sent(&self, id: Uuid) -> MailerResult<ScheduledEmail>;

    async fn delete_scheduled_email(&self, id: Uuid) -> MailerResult<bool>;
}

/// Persistence for the delivery log
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailLogRepository: Send + Sync {
    /// Insert a `pending` record
    async fn create_email_log(&self, input: NewEmail) -> MailerResult<Email>;

    async fn get_email_log(&self, id: Uuid) -> MailerResult<Option<Email>>;

    async fn list_email_logs(&self, filter: EmailFilter) -> MailerResult<Vec<Email>>;

    async fn mark_email_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> MailerResult<Email>;

    async fn mark_email_failed(&self, id: Uuid, error: &str) -> MailerResult<Email>;
}

/// Everything the mailer needs from storage
pub trait MailerStore:
    TemplateRepository
    + UserRepository
    + ClusterRepository
    + SmtpProfileRepository
    + ScheduledEmailRepository
    + EmailLogRepository
{
}

impl<T> MailerStore for T where
    T: TemplateRepository
        + UserRepository
        + ClusterRepository
        + SmtpProfileRepository
        + ScheduledEmailRepository
        + EmailLogRepository
{
}
