//! In-memory store for development and tests.
//!
//! Mirrors the cascade-delete behavior of the PostgreSQL schema but performs
//! no foreign-key checks, so dangling references can be set up on purpose.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{MailerError, MailerResult};
use crate::models::{
    Cluster, ClusterFilter, CreateCluster, CreateEmailTemplate, CreateEmailUser,
    CreateScheduledEmail, CreateSmtpProfile, Email, EmailFilter, EmailStatus, EmailTemplate,
    EmailUser, NewEmail, ScheduledEmail, ScheduledEmailFilter, SmtpProfile, SmtpProfileFilter,
    TemplateFilter, UpdateCluster, UpdateEmailTemplate, UpdateEmailUser, UpdateScheduledEmail,
    UpdateSmtpProfile, UserFilter,
};
use crate::repository::{
    ClusterRepository, EmailLogRepository, ScheduledEmailRepository, SmtpProfileRepository,
    TemplateRepository, UserRepository,
};

#[derive(Debug, Default)]
struct Tables {
    templates: BTreeMap<Uuid, EmailTemplate>,
    users: BTreeMap<Uuid, EmailUser>,
    clusters: BTreeMap<Uuid, Cluster>,
    smtp_profiles: BTreeMap<Uuid, SmtpProfile>,
    scheduled: BTreeMap<Uuid, ScheduledEmail>,
    emails: BTreeMap<Uuid, Email>,
}

/// Shared in-memory implementation of every mailer repository.
///
/// Clones share the same tables.
#[derive(Debug, Default, Clone)]
pub struct InMemoryMailerStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryMailerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_search(search: Option<&str>, fields: &[Option<&str>]) -> bool {
    let Some(needle) = search else {
        return true;
    };
    fields.iter().flatten().any(|field| field.contains(needle))
}

fn page<T: Clone>(items: impl Iterator<Item = T>, offset: usize, limit: usize) -> Vec<T> {
    items.skip(offset).take(limit).collect()
}

#[async_trait]
impl TemplateRepository for InMemoryMailerStore {
    async fn create_template(&self, input: CreateEmailTemplate) -> MailerResult<EmailTemplate> {
        let template = EmailTemplate::new(input);
        self.tables
            .write()
            .await
            .templates
            .insert(template.id, template.clone());

        tracing::info!(template_id = %template.id, "Created email template");
        Ok(template)
    }

    async fn get_template(&self, id: Uuid) -> MailerResult<Option<EmailTemplate>> {
        Ok(self.tables.read().await.templates.get(&id).cloned())
    }

    async fn find_template_by_name(&self, name: &str) -> MailerResult<Option<EmailTemplate>> {
        let tables = self.tables.read().await;
        Ok(tables.templates.values().find(|t| t.name == name).cloned())
    }

    async fn list_templates(&self, filter: TemplateFilter) -> MailerResult<Vec<EmailTemplate>> {
        let tables = self.tables.read().await;
        let search = filter.search.as_deref();
        Ok(page(
            tables
                .templates
                .values()
                .filter(|t| matches_search(search, &[Some(&t.name), Some(&t.subject)]))
                .cloned(),
            filter.offset,
            filter.limit,
        ))
    }

    async fn update_template(
        &self,
        id: Uuid,
        input: UpdateEmailTemplate,
    ) -> MailerResult<EmailTemplate> {
        let mut tables = self.tables.write().await;
        let template = tables
            .templates
            .get_mut(&id)
            .ok_or_else(|| MailerError::not_found("Email template", id))?;
        template.apply_update(input);

        tracing::info!(template_id = %id, "Updated email template");
        Ok(template.clone())
    }

    async fn delete_template(&self, id: Uuid) -> MailerResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.templates.remove(&id).is_none() {
            return Ok(false);
        }
        tables.emails.retain(|_, e| e.template_id != id);
        tables.scheduled.retain(|_, s| s.template_id != id);

        tracing::info!(template_id = %id, "Deleted email template");
        Ok(true)
    }
}

#[async_trait]
impl UserRepository for InMemoryMailerStore {
    async fn create_user(&self, input: CreateEmailUser) -> MailerResult<EmailUser> {
        let user = EmailUser::new(input);
        self.tables.write().await.users.insert(user.id, user.clone());

        tracing::info!(user_id = %user.id, "Created email user");
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> MailerResult<Option<EmailUser>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> MailerResult<Option<EmailUser>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn get_users(&self, ids: &[Uuid]) -> MailerResult<Vec<EmailUser>> {
        let tables = self.tables.read().await;
        let mut users: Vec<EmailUser> = ids
            .iter()
            .filter_map(|id| tables.users.get(id).cloned())
            .collect();
        users.sort_by_key(|u| u.id);
        users.dedup_by_key(|u| u.id);
        Ok(users)
    }

    async fn list_users(&self, filter: UserFilter) -> MailerResult<Vec<EmailUser>> {
        let tables = self.tables.read().await;
        let search = filter.search.as_deref();
        Ok(page(
            tables
                .users
                .values()
                .filter(|u| {
                    matches_search(
                        search,
                        &[
                            u.first_name.as_deref(),
                            u.last_name.as_deref(),
                            Some(&u.email),
                        ],
                    )
                })
                .cloned(),
            filter.offset,
            filter.limit,
        ))
    }

    async fn update_user(&self, id: Uuid, input: UpdateEmailUser) -> MailerResult<EmailUser> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| MailerError::not_found("Email user", id))?;
        user.apply_update(input);

        tracing::info!(user_id = %id, "Updated email user");
        Ok(user.clone())
    }

    async fn delete_user(&self, id: Uuid) -> MailerResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&id).is_none() {
            return Ok(false);
        }
        for cluster in tables.clusters.values_mut() {
            cluster.member_ids.retain(|member| *member != id);
        }
        tables.scheduled.retain(|_, s| s.user_id != Some(id));

        tracing::info!(user_id = %id, "Deleted email user");
        Ok(true)
    }
}

#[async_trait]
impl ClusterRepository for InMemoryMailerStore {
    async fn create_cluster(&self, input: CreateCluster) -> MailerResult<Cluster> {
        let cluster = Cluster::new(input);
        self.tables
            .write()
            .await
            .clusters
            .insert(cluster.id, cluster.clone());

        tracing::info!(cluster_id = %cluster.id, members = cluster.member_ids.len(), "Created cluster");
        Ok(cluster)
    }

    async fn get_cluster(&self, id: Uuid) -> MailerResult<Option<Cluster>> {
        Ok(self.tables.read().await.clusters.get(&id).cloned())
    }

    async fn list_clusters(&self, filter: ClusterFilter) -> MailerResult<Vec<Cluster>> {
        let tables = self.tables.read().await;
        let search = filter.search.as_deref();
        Ok(page(
            tables
                .clusters
                .values()
                .filter(|c| matches_search(search, &[Some(&c.name)]))
                .cloned(),
            filter.offset,
            filter.limit,
        ))
    }

    async fn update_cluster(&self, id: Uuid, input: UpdateCluster) -> MailerResult<Cluster> {
        let mut tables = self.tables.write().await;
        let cluster = tables
            .clusters
            .get_mut(&id)
            .ok_or_else(|| MailerError::not_found("Cluster", id))?;
        if let Some(name) = input.name {
            cluster.name = name;
        }
        cluster.updated_at = Utc::now();

        Ok(cluster.clone())
    }

    async fn set_cluster_members(
        &self,
        id: Uuid,
        member_ids: Vec<Uuid>,
    ) -> MailerResult<Cluster> {
        let mut tables = self.tables.write().await;
        let cluster = tables
            .clusters
            .get_mut(&id)
            .ok_or_else(|| MailerError::not_found("Cluster", id))?;
        cluster.set_members(member_ids);
        cluster.updated_at = Utc::now();

        tracing::info!(cluster_id = %id, members = cluster.member_ids.len(), "Replaced cluster members");
        Ok(cluster.clone())
    }

    async fn delete_cluster(&self, id: Uuid) -> MailerResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.clusters.remove(&id).is_none() {
            return Ok(false);
        }
        tables.scheduled.retain(|_, s| s.cluster_id != Some(id));

        tracing::info!(cluster_id = %id, "Deleted cluster");
        Ok(true)
    }
}

#[async_trait]
impl SmtpProfileRepository for InMemoryMailerStore {
    async fn create_smtp_profile(&self, input: CreateSmtpProfile) -> MailerResult<SmtpProfile> {
        let profile = SmtpProfile::new(input);
        self.tables
            .write()
            .await
            .smtp_profiles
            .insert(profile.id, profile.clone());

        tracing::info!(smtp_profile_id = %profile.id, default = profile.is_default, "Created SMTP profile");
        Ok(profile)
    }

    async fn get_smtp_profile(&self, id: Uuid) -> MailerResult<Option<SmtpProfile>> {
        Ok(self.tables.read().await.smtp_profiles.get(&id).cloned())
    }

    async fn list_smtp_profiles(
        &self,
        filter: SmtpProfileFilter,
    ) -> MailerResult<Vec<SmtpProfile>> {
        let tables = self.tables.read().await;
        Ok(page(
            tables
                .smtp_profiles
                .values()
                .filter(|p| filter.is_default.is_none_or(|d| p.is_default == d))
                .cloned(),
            filter.offset,
            filter.limit,
        ))
    }

    async fn update_smtp_profile(
        &self,
        id: Uuid,
        input: UpdateSmtpProfile,
    ) -> MailerResult<SmtpProfile> {
        let mut tables = self.tables.write().await;
        let profile = tables
            .smtp_profiles
            .get_mut(&id)
            .ok_or_else(|| MailerError::not_found("SMTP profile", id))?;
        profile.apply_update(input);

        tracing::info!(smtp_profile_id = %id, "Updated SMTP profile");
        Ok(profile.clone())
    }

    async fn delete_smtp_profile(&self, id: Uuid) -> MailerResult<bool> {
        Ok(self.tables.write().await.smtp_profiles.remove(&id).is_some())
    }

    async fn find_default_smtp_profile(&self) -> MailerResult<Option<SmtpProfile>> {
        let tables = self.tables.read().await;
        Ok(tables
            .smtp_profiles
            .values()
            .find(|p| p.is_default)
            .cloned())
    }
}

#[async_trait]
impl ScheduledEmailRepository for InMemoryMailerStore {
    async fn create_scheduled_email(
        &self,
        input: CreateScheduledEmail,
    ) -> MailerResult<ScheduledEmail> {
        let scheduled = ScheduledEmail::new(input);
        self.tables
            .write()
            .await
            .scheduled
            .insert(scheduled.id, scheduled.clone());

        tracing::info!(scheduled_email_id = %scheduled.id, "Created scheduled email");
        Ok(scheduled)
    }

    async fn get_scheduled_email(&self, id: Uuid) -> MailerResult<Option<ScheduledEmail>> {
        Ok(self.tables.read().await.scheduled.get(&id).cloned())
    }

    async fn list_scheduled_emails(
        &self,
        filter: ScheduledEmailFilter,
    ) -> MailerResult<Vec<ScheduledEmail>> {
        let tables = self.tables.read().await;
        let mut result: Vec<ScheduledEmail> = tables
            .scheduled
            .values()
            .filter(|s| filter.is_sent.is_none_or(|sent| s.is_sent == sent))
            .filter(|s| filter.due_before.is_none_or(|t| s.scheduled_time <= t))
            .cloned()
            .collect();
        result.sort_by_key(|s| (s.scheduled_time, s.id));

        Ok(page(result.into_iter(), filter.offset, filter.limit))
    }

    async fn list_due_scheduled_emails(
        &self,
        now: DateTime<Utc>,
    ) -> MailerResult<Vec<ScheduledEmail>> {
        let tables = self.tables.read().await;
        let mut due: Vec<ScheduledEmail> = tables
            .scheduled
            .values()
            .filter(|s| s.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|s| (s.scheduled_time, s.id));
        Ok(due)
    }

    async fn update_scheduled_email(
        &self,
        id: Uuid,
        input: UpdateScheduledEmail,
    ) -> MailerResult<ScheduledEmail> {
        let mut tables = self.tables.write().await;
        let scheduled = tables
            .scheduled
            .get_mut(&id)
            .ok_or_else(|| MailerError::not_found("Scheduled email", id))?;
        scheduled.apply_update(input);

        Ok(scheduled.clone())
    }

    async fn mark_scheduled_email_sent(&self, id: Uuid) -> MailerResult<ScheduledEmail> {
        let mut tables = self.tables.write().await;
        let scheduled = tables
            .scheduled
            .get_mut(&id)
            .ok_or_else(|| MailerError::not_found("Scheduled email", id))?;
        scheduled.is_sent = true;

        Ok(scheduled.clone())
    }

    async fn delete_scheduled_email(&self, id: Uuid) -> MailerResult<bool> {
        Ok(self.tables.write().await.scheduled.remove(&id).is_some())
    }
}

#[async_trait]
impl EmailLogRepository for InMemoryMailerStore {
    async fn create_email_log(&self, input: NewEmail) -> MailerResult<Email> {
        let email = Email::pending(input);
        self.tables
            .write()
            .await
            .emails
            .insert(email.id, email.clone());
        Ok(email)
    }

    async fn get_email_log(&self, id: Uuid) -> MailerResult<Option<Email>> {
        Ok(self.tables.read().await.emails.get(&id).cloned())
    }

    async fn list_email_logs(&self, filter: EmailFilter) -> MailerResult<Vec<Email>> {
        let tables = self.tables.read().await;
        // newest first
        Ok(page(
            tables
                .emails
                .values()
                .rev()
                .filter(|e| filter.status.is_none_or(|s| e.status == s))
                .filter(|e| filter.template_id.is_none_or(|t| e.template_id == t))
                .filter(|e| {
                    filter
                        .to_email
                        .as_deref()
                        .is_none_or(|to| e.to_email == to)
                })
                .cloned(),
            filter.offset,
            filter.limit,
        ))
    }

    async fn mark_email_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> MailerResult<Email> {
        let mut tables = self.tables.write().await;
        let email = tables
            .emails
            .get_mut(&id)
            .ok_or_else(|| MailerError::not_found("Email", id))?;
        email.status = EmailStatus::Sent;
        email.sent_at = Some(sent_at);
        email.error_message = None;
        Ok(email.clone())
    }

    async fn mark_email_failed(&self, id: Uuid, error: &str) -> MailerResult<Email> {
        let mut tables = self.tables.write().await;
        let email = tables
            .emails
            .get_mut(&id)
            .ok_or_else(|| MailerError::not_found("Email", id))?;
        email.status = EmailStatus::Failed;
        email.error_message = Some(error.to_string());
        Ok(email.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template_input(name: &str) -> CreateEmailTemplate {
        CreateEmailTemplate {
            name: name.to_string(),
            subject: "Hello".to_string(),
            body: "Hi {{first_name}}!".to_string(),
        }
    }

    fn user_input(email: &str) -> CreateEmailUser {
        CreateEmailUser {
            first_name: None,
            last_name: None,
            email: email.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_search_templates() {
        let store = InMemoryMailerStore::new();
        store.create_template(template_input("Welcome")).await.unwrap();
        store.create_template(template_input("Digest")).await.unwrap();

        let found = store
            .list_templates(TemplateFilter {
                search: Some("Welc".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Welcome");

        let by_name = store.find_template_by_name("Digest").await.unwrap();
        assert!(by_name.is_some());
    }

    #[tokio::test]
    async fn test_delete_template_cascades() {
        let store = InMemoryMailerStore::new();
        let template = store.create_template(template_input("Welcome")).await.unwrap();
        let scheduled = store
            .create_scheduled_email(CreateScheduledEmail {
                template_id: template.id,
                user_id: None,
                cluster_id: None,
                scheduled_time: Utc::now(),
            })
            .await
            .unwrap();
        let log = store
            .create_email_log(NewEmail {
                to_email: "ana@x.com".into(),
                template_id: template.id,
            })
            .await
            .unwrap();

        assert!(store.delete_template(template.id).await.unwrap());
        assert!(store.get_scheduled_email(scheduled.id).await.unwrap().is_none());
        assert!(store.get_email_log(log.id).await.unwrap().is_none());
        assert!(!store.delete_template(template.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_user_leaves_clusters_and_drops_sends() {
        let store = InMemoryMailerStore::new();
        let ana = store.create_user(user_input("ana@x.com")).await.unwrap();
        let bob = store.create_user(user_input("bob@x.com")).await.unwrap();
        let cluster = store
            .create_cluster(CreateCluster {
                name: "team".into(),
                member_ids: vec![ana.id, bob.id],
            })
            .await
            .unwrap();
        let scheduled = store
            .create_scheduled_email(CreateScheduledEmail {
                template_id: Uuid::now_v7(),
                user_id: Some(ana.id),
                cluster_id: None,
                scheduled_time: Utc::now(),
            })
            .await
            .unwrap();

        store.delete_user(ana.id).await.unwrap();

        let cluster = store.get_cluster(cluster.id).await.unwrap().unwrap();
        assert_eq!(cluster.member_ids, vec![bob.id]);
        assert!(store.get_scheduled_email(scheduled.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_users_returns_id_order() {
        let store = InMemoryMailerStore::new();
        let first = store.create_user(user_input("a@x.com")).await.unwrap();
        let second = store.create_user(user_input("b@x.com")).await.unwrap();

        let users = store
            .get_users(&[second.id, Uuid::now_v7(), first.id])
            .await
            .unwrap();
        let ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn test_due_scheduled_emails_excludes_sent_and_future() {
        let store = InMemoryMailerStore::new();
        let now = Utc::now();
        let make = |offset_minutes: i64| CreateScheduledEmail {
            template_id: Uuid::now_v7(),
            user_id: None,
            cluster_id: None,
            scheduled_time: now + chrono::Duration::minutes(offset_minutes),
        };

        let past = store.create_scheduled_email(make(-10)).await.unwrap();
        let sent = store.create_scheduled_email(make(-5)).await.unwrap();
        store.create_scheduled_email(make(30)).await.unwrap();
        store.mark_scheduled_email_sent(sent.id).await.unwrap();

        let due = store.list_due_scheduled_emails(now).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, past.id);
    }

    #[tokio::test]
    async fn test_email_log_lifecycle() {
        let store = InMemoryMailerStore::new();
        let log = store
            .create_email_log(NewEmail {
                to_email: "ana@x.com".into(),
                template_id: Uuid::now_v7(),
            })
            .await
            .unwrap();
        assert_eq!(log.status, EmailStatus::Pending);

        let failed = store.mark_email_failed(log.id, "mailbox full").await.unwrap();
        assert_eq!(failed.status, EmailStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("mailbox full"));

        let failed_only = store
            .list_email_logs(EmailFilter {
                status: Some(EmailStatus::Failed),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(failed_only.len(), 1);
    }
}
