//! Domain models and DTOs for the mailer.

use chrono::{DateTime, Utc};
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

fn default_limit() -> usize {
    50
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Distinguishes an explicit `null` (`Some(None)`) from an absent field (`None`).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ============================================================================
// Email templates
// ============================================================================

/// Reusable email template. `body` is HTML with handlebars placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EmailTemplate {
    pub id: Uuid,
    /// Unique template name
    pub name: String,
    /// Subject line, sent verbatim
    pub subject: String,
    /// HTML body with `{{placeholder}}` syntax
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmailTemplate {
    pub fn new(input: CreateEmailTemplate) -> Self {
        let now = now();
        Self {
            id: Uuid::now_v7(),
            name: input.name,
            subject: input.subject,
            body: input.body,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_update(&mut self, update: UpdateEmailTemplate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(subject) = update.subject {
            self.subject = subject;
        }
        if let Some(body) = update.body {
            self.body = body;
        }
        self.updated_at = now();
    }
}

impl fmt::Display for EmailTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateEmailTemplate {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateEmailTemplate {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub subject: Option<String>,
    pub body: Option<String>,
}

/// Query filters for listing templates
#[derive(Debug, Clone, Deserialize, ToSchema, IntoParams)]
pub struct TemplateFilter {
    /// Substring match on name or subject
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

impl Default for TemplateFilter {
    fn default() -> Self {
        Self {
            search: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

// ============================================================================
// Delivery log
// ============================================================================

/// Delivery state of a single logged email.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EmailStatus {
    #[default]
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "sent")]
    Sent,
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// One logged delivery attempt to one address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Email {
    pub id: Uuid,
    pub to_email: String,
    pub template_id: Uuid,
    pub status: EmailStatus,
    /// Transport error for failed deliveries
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl Email {
    pub fn pending(input: NewEmail) -> Self {
        Self {
            id: Uuid::now_v7(),
            to_email: input.to_email,
            template_id: input.template_id,
            status: EmailStatus::Pending,
            error_message: None,
            created_at: now(),
            sent_at: None,
        }
    }
}

/// Log record written right before a transmission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEmail {
    pub to_email: String,
    pub template_id: Uuid,
}

/// Query filters for the delivery log
#[derive(Debug, Clone, Deserialize, ToSchema, IntoParams)]
pub struct EmailFilter {
    pub status: Option<EmailStatus>,
    pub to_email: Option<String>,
    pub template_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

impl Default for EmailFilter {
    fn default() -> Self {
        Self {
            status: None,
            to_email: None,
            template_id: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

// ============================================================================
// Recipients
// ============================================================================

/// A newsletter recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EmailUser {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Unique address
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmailUser {
    pub fn new(input: CreateEmailUser) -> Self {
        let now = now();
        Self {
            id: Uuid::now_v7(),
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_update(&mut self, update: UpdateEmailUser) {
        if let Some(first_name) = update.first_name {
            self.first_name = first_name;
        }
        if let Some(last_name) = update.last_name {
            self.last_name = last_name;
        }
        if let Some(email) = update.email {
            self.email = email;
        }
        self.updated_at = now();
    }
}

impl fmt::Display for EmailUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Names that are unset or blank are left out of the label
        let names = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect::<Vec<_>>();
        if names.is_empty() {
            write!(f, "<{}>", self.email)
        } else {
            write!(f, "{} <{}>", names.join(" "), self.email)
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateEmailUser {
    #[validate(length(max = 100))]
    pub first_name: Option<String>,
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateEmailUser {
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub first_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub last_name: Option<Option<String>>,
    #[validate(email)]
    pub email: Option<String>,
}

/// Query filters for listing recipients
#[derive(Debug, Clone, Deserialize, ToSchema, IntoParams)]
pub struct UserFilter {
    /// Substring match on first name, last name or email
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

impl Default for UserFilter {
    fn default() -> Self {
        Self {
            search: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

// ============================================================================
// Clusters
// ============================================================================

/// Named group of recipients. `member_ids` is kept in ascending order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Cluster {
    pub id: Uuid,
    pub name: String,
    pub member_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cluster {
    pub fn new(input: CreateCluster) -> Self {
        let now = now();
        let mut cluster = Self {
            id: Uuid::now_v7(),
            name: input.name,
            member_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        cluster.set_members(input.member_ids);
        cluster
    }

    /// Replace the member set, dropping duplicates and keeping id order.
    pub fn set_members(&mut self, mut member_ids: Vec<Uuid>) {
        member_ids.sort();
        member_ids.dedup();
        self.member_ids = member_ids;
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateCluster {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub member_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateCluster {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
}

/// Full replacement of a cluster's member set
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SetClusterMembers {
    pub member_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize, ToSchema, IntoParams)]
pub struct ClusterFilter {
    /// Substring match on name
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

impl Default for ClusterFilter {
    fn default() -> Self {
        Self {
            search: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

// ============================================================================
// SMTP profiles
// ============================================================================

/// Outbound SMTP connection settings. At most one profile is the default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SmtpProfile {
    pub id: Uuid,
    pub name: String,
    pub host: String,
    pub port: u16,
    /// Login name; also used as the From address
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    /// STARTTLS after connecting
    pub use_tls: bool,
    /// Implicit TLS from the first byte (SMTPS)
    pub use_ssl: bool,
    #[serde(rename = "default")]
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SmtpProfile {
    pub fn new(input: CreateSmtpProfile) -> Self {
        let now = now();
        Self {
            id: Uuid::now_v7(),
            name: input.name,
            host: input.host,
            port: input.port,
            username: input.username,
            password: input.password,
            use_tls: input.use_tls,
            use_ssl: input.use_ssl,
            is_default: input.is_default,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_update(&mut self, update: UpdateSmtpProfile) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(host) = update.host {
            self.host = host;
        }
        if let Some(port) = update.port {
            self.port = port;
        }
        if let Some(username) = update.username {
            self.username = username;
        }
        if let Some(password) = update.password {
            self.password = password;
        }
        if let Some(use_tls) = update.use_tls {
            self.use_tls = use_tls;
        }
        if let Some(use_ssl) = update.use_ssl {
            self.use_ssl = use_ssl;
        }
        if let Some(is_default) = update.is_default {
            self.is_default = is_default;
        }
        self.updated_at = now();
    }

    pub fn security(&self) -> ConnectionSecurity {
        if self.use_ssl {
            ConnectionSecurity::Ssl
        } else if self.use_tls {
            ConnectionSecurity::StartTls
        } else {
            ConnectionSecurity::Plain
        }
    }
}

impl fmt::Display for SmtpProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionSecurity {
    Plain,
    StartTls,
    Ssl,
}

fn validate_tls_exclusive(input: &CreateSmtpProfile) -> Result<(), ValidationError> {
    if input.use_tls && input.use_ssl {
        return Err(ValidationError::new("tls_ssl_exclusive")
            .with_message("use_tls and use_ssl are mutually exclusive".into()));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_tls_exclusive"))]
pub struct CreateSmtpProfile {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    #[validate(length(max = 255))]
    pub username: String,
    #[validate(length(max = 255))]
    pub password: String,
    #[serde(default)]
    pub use_tls: bool,
    #[serde(default)]
    pub use_ssl: bool,
    #[serde(default, rename = "default")]
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateSmtpProfile {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub host: Option<String>,
    #[validate(range(min = 1))]
    pub port: Option<u16>,
    #[validate(length(max = 255))]
    pub username: Option<String>,
    #[validate(length(max = 255))]
    pub password: Option<String>,
    pub use_tls: Option<bool>,
    pub use_ssl: Option<bool>,
    #[serde(rename = "default")]
    pub is_default: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, ToSchema, IntoParams)]
pub struct SmtpProfileFilter {
    #[serde(rename = "default")]
    pub is_default: Option<bool>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

impl Default for SmtpProfileFilter {
    fn default() -> Self {
        Self {
            is_default: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

// ============================================================================
// Scheduled sends
// ============================================================================

/// Intent to deliver one template to one target at or after `scheduled_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ScheduledEmail {
    pub id: Uuid,
    pub template_id: Uuid,
    pub user_id: Option<Uuid>,
    pub cluster_id: Option<Uuid>,
    pub scheduled_time: DateTime<Utc>,
    /// Flips to true once, after every recipient was delivered
    pub is_sent: bool,
    pub created_at: DateTime<Utc>,
}

impl ScheduledEmail {
    pub fn new(input: CreateScheduledEmail) -> Self {
        Self {
            id: Uuid::now_v7(),
            template_id: input.template_id,
            user_id: input.user_id,
            cluster_id: input.cluster_id,
            scheduled_time: input.scheduled_time,
            is_sent: false,
            created_at: now(),
        }
    }

    pub fn apply_update(&mut self, update: UpdateScheduledEmail) {
        if let Some(template_id) = update.template_id {
            self.template_id = template_id;
        }
        if let Some(user_id) = update.user_id {
            self.user_id = user_id;
        }
        if let Some(cluster_id) = update.cluster_id {
            self.cluster_id = cluster_id;
        }
        if let Some(scheduled_time) = update.scheduled_time {
            self.scheduled_time = scheduled_time;
        }
    }

    /// Who this send goes to. A cluster wins over a user when both are set.
    pub fn target(&self) -> RecipientTarget {
        match (self.cluster_id, self.user_id) {
            (Some(cluster_id), _) => RecipientTarget::Cluster(cluster_id),
            (None, Some(user_id)) => RecipientTarget::User(user_id),
            (None, None) => RecipientTarget::Nobody,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.is_sent && self.scheduled_time <= now
    }
}

/// Resolved target of a scheduled send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientTarget {
    Cluster(Uuid),
    User(Uuid),
    Nobody,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateScheduledEmail {
    pub template_id: Uuid,
    pub user_id: Option<Uuid>,
    pub cluster_id: Option<Uuid>,
    pub scheduled_time: DateTime<Utc>,
}

/// `is_sent` is absent: only a dispatch run sets it.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateScheduledEmail {
    pub template_id: Option<Uuid>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub user_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub cluster_id: Option<Option<Uuid>>,
    pub scheduled_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, ToSchema, IntoParams)]
pub struct ScheduledEmailFilter {
    pub is_sent: Option<bool>,
    /// Only sends scheduled at or before this instant
    pub due_before: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

impl Default for ScheduledEmailFilter {
    fn default() -> Self {
        Self {
            is_sent: None,
            due_before: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduled(user_id: Option<Uuid>, cluster_id: Option<Uuid>) -> ScheduledEmail {
        ScheduledEmail::new(CreateScheduledEmail {
            template_id: Uuid::now_v7(),
            user_id,
            cluster_id,
            scheduled_time: Utc::now(),
        })
    }

    #[test]
    fn test_cluster_takes_precedence_over_user() {
        let user_id = Uuid::now_v7();
        let cluster_id = Uuid::now_v7();

        assert_eq!(
            scheduled(Some(user_id), Some(cluster_id)).target(),
            RecipientTarget::Cluster(cluster_id)
        );
        assert_eq!(
            scheduled(Some(user_id), None).target(),
            RecipientTarget::User(user_id)
        );
        assert_eq!(scheduled(None, None).target(), RecipientTarget::Nobody);
    }

    #[test]
    fn test_cluster_members_are_sorted_and_deduplicated() {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        let cluster = Cluster::new(CreateCluster {
            name: "team".into(),
            member_ids: vec![b, a, b],
        });
        assert_eq!(cluster.member_ids, vec![a, b]);
    }

    #[test]
    fn test_user_display() {
        let user = EmailUser::new(CreateEmailUser {
            first_name: Some("Ana".into()),
            last_name: None,
            email: "ana@x.com".into(),
        });
        assert_eq!(user.to_string(), "Ana <ana@x.com>");

        let full = EmailUser::new(CreateEmailUser {
            first_name: Some("Ana".into()),
            last_name: Some("Lima".into()),
            email: "ana@x.com".into(),
        });
        assert_eq!(full.to_string(), "Ana Lima <ana@x.com>");

        let anonymous = EmailUser::new(CreateEmailUser {
            first_name: None,
            last_name: Some(" ".into()),
            email: "anon@x.com".into(),
        });
        assert_eq!(anonymous.to_string(), "<anon@x.com>");
    }

    #[test]
    fn test_smtp_profile_rejects_tls_and_ssl_together() {
        let input = CreateSmtpProfile {
            name: "relay".into(),
            host: "smtp.example.com".into(),
            port: 465,
            username: "news@example.com".into(),
            password: "secret".into(),
            use_tls: true,
            use_ssl: true,
            is_default: false,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_smtp_profile_password_is_not_serialized() {
        let profile = SmtpProfile::new(CreateSmtpProfile {
            name: "relay".into(),
            host: "smtp.example.com".into(),
            port: 587,
            username: "news@example.com".into(),
            password: "secret".into(),
            use_tls: true,
            use_ssl: false,
            is_default: true,
        });
        let json = serde_json::to_value(&profile).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["default"], true);
        assert_eq!(profile.security(), ConnectionSecurity::StartTls);
    }

    #[test]
    fn test_update_distinguishes_null_from_absent() {
        let cleared: UpdateScheduledEmail =
            serde_json::from_str(r#"{"user_id": null}"#).unwrap();
        assert_eq!(cleared.user_id, Some(None));
        assert_eq!(cleared.cluster_id, None);
    }

    #[test]
    fn test_email_status_round_trips_as_lowercase() {
        assert_eq!(EmailStatus::Failed.to_string(), "failed");
        assert_eq!("sent".parse::<EmailStatus>().unwrap(), EmailStatus::Sent);
    }
}
