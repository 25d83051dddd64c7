use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::error::{MailerError, MailerResult};
use crate::models::{
    Cluster, ClusterFilter, CreateCluster, CreateEmailTemplate, CreateEmailUser,
    CreateScheduledEmail, CreateSmtpProfile, Email, EmailFilter, EmailTemplate, EmailUser,
    ScheduledEmail, ScheduledEmailFilter, SmtpProfile, SmtpProfileFilter, TemplateFilter,
    UpdateCluster, UpdateEmailTemplate, UpdateEmailUser, UpdateScheduledEmail, UpdateSmtpProfile,
    UserFilter,
};
use crate::repository::MailerStore;
use crate::templates::TemplateRenderer;

/// Service layer for mailer records: validation and write-time invariants.
pub struct MailerService<S: MailerStore> {
    store: Arc<S>,
    renderer: TemplateRenderer,
}

impl<S: MailerStore> Clone for MailerService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            renderer: self.renderer.clone(),
        }
    }
}

impl<S: MailerStore> MailerService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            renderer: TemplateRenderer::new(),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // ------------------------------------------------------------------
    // Templates
    // ------------------------------------------------------------------

    /// Create a template; the name must be unique and the body must compile
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_template(&self, input: CreateEmailTemplate) -> MailerResult<EmailTemplate> {
        input.validate()?;
        self.renderer.validate(&input.body)?;
        self.ensure_template_name_free(&input.name, None).await?;

        self.store.create_template(input).await
    }

    pub async fn get_template(&self, id: Uuid) -> MailerResult<EmailTemplate> {
        self.store
            .get_template(id)
            .await?
            .ok_or_else(|| MailerError::not_found("Email template", id))
    }

    pub async fn list_templates(&self, filter: TemplateFilter) -> MailerResult<Vec<EmailTemplate>> {
        self.store.list_templates(filter).await
    }

    #[instrument(skip(self, input))]
    pub async fn update_template(
        &self,
        id: Uuid,
        input: UpdateEmailTemplate,
    ) -> MailerResult<EmailTemplate> {
        input.validate()?;
        if let Some(body) = &input.body {
            self.renderer.validate(body)?;
        }
        if let Some(name) = &input.name {
            self.ensure_template_name_free(name, Some(id)).await?;
        }

        self.store.update_template(id, input).await
    }

    /// Delete a template along with its delivery log and scheduled sends
    #[instrument(skip(self))]
    pub async fn delete_template(&self, id: Uuid) -> MailerResult<()> {
        if !self.store.delete_template(id).await? {
            return Err(MailerError::not_found("Email template", id));
        }
        Ok(())
    }

    async fn ensure_template_name_free(&self, name: &str, owner: Option<Uuid>) -> MailerResult<()> {
        match self.store.find_template_by_name(name).await? {
            Some(existing) if Some(existing.id) != owner => Err(MailerError::Conflict(format!(
                "Template name '{}' is already in use",
                name
            ))),
            _ => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create_user(&self, input: CreateEmailUser) -> MailerResult<EmailUser> {
        input.validate()?;
        self.ensure_email_free(&input.email, None).await?;

        self.store.create_user(input).await
    }

    pub async fn get_user(&self, id: Uuid) -> MailerResult<EmailUser> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| MailerError::not_found("Email user", id))
    }

    pub async fn list_users(&self, filter: UserFilter) -> MailerResult<Vec<EmailUser>> {
        self.store.list_users(filter).await
    }

    #[instrument(skip(self, input))]
    pub async fn update_user(&self, id: Uuid, input: UpdateEmailUser) -> MailerResult<EmailUser> {
        input.validate()?;
        if let Some(email) = &input.email {
            self.ensure_email_free(email, Some(id)).await?;
        }

        self.store.update_user(id, input).await
    }

    /// Delete a user, dropping it from clusters and deleting sends that target it
    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: Uuid) -> MailerResult<()> {
        if !self.store.delete_user(id).await? {
            return Err(MailerError::not_found("Email user", id));
        }
        Ok(())
    }

    async fn ensure_email_free(&self, email: &str, owner: Option<Uuid>) -> MailerResult<()> {
        match self.store.find_user_by_email(email).await? {
            Some(existing) if Some(existing.id) != owner => Err(MailerError::Conflict(format!(
                "Email address '{}' is already registered",
                email
            ))),
            _ => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Clusters
    // ------------------------------------------------------------------

    #[instrument(skip(self, input), fields(name = %input.name, members = input.member_ids.len()))]
    pub async fn create_cluster(&self, input: CreateCluster) -> MailerResult<Cluster> {
        input.validate()?;
        self.ensure_users_exist(&input.member_ids).await?;

        self.store.create_cluster(input).await
    }

    pub async fn get_cluster(&self, id: Uuid) -> MailerResult<Cluster> {
        self.store
            .get_cluster(id)
            .await?
            .ok_or_else(|| MailerError::not_found("Cluster", id))
    }

    pub async fn list_clusters(&self, filter: ClusterFilter) -> MailerResult<Vec<Cluster>> {
        self.store.list_clusters(filter).await
    }

    #[instrument(skip(self, input))]
    pub async fn update_cluster(&self, id: Uuid, input: UpdateCluster) -> MailerResult<Cluster> {
        input.validate()?;
        self.store.update_cluster(id, input).await
    }

    /// Replace the member set of a cluster
    #[instrument(skip(self, member_ids), fields(members = member_ids.len()))]
    pub async fn set_cluster_members(
        &self,
        id: Uuid,
        member_ids: Vec<Uuid>,
    ) -> MailerResult<Cluster> {
        self.get_cluster(id).await?;
        self.ensure_users_exist(&member_ids).await?;

        self.store.set_cluster_members(id, member_ids).await
    }

    /// Members of a cluster in ascending id order
    pub async fn list_cluster_members(&self, id: Uuid) -> MailerResult<Vec<EmailUser>> {
        let cluster = self.get_cluster(id).await?;
        self.store.get_users(&cluster.member_ids).await
    }

    #[instrument(skip(self))]
    pub async fn delete_cluster(&self, id: Uuid) -> MailerResult<()> {
        if !self.store.delete_cluster(id).await? {
            return Err(MailerError::not_found("Cluster", id));
        }
        Ok(())
    }

    async fn ensure_users_exist(&self, ids: &[Uuid]) -> MailerResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let wanted: BTreeSet<Uuid> = ids.iter().copied().collect();
        let found: BTreeSet<Uuid> = self
            .store
            .get_users(ids)
            .await?
            .into_iter()
            .map(|u| u.id)
            .collect();

        let missing: Vec<String> = wanted
            .difference(&found)
            .map(|id| id.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(MailerError::Validation(format!(
                "Unknown user ids: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // SMTP profiles
    // ------------------------------------------------------------------

    /// Create a profile. Only one profile may be the default.
    #[instrument(skip(self, input), fields(name = %input.name, default = input.is_default))]
    pub async fn create_smtp_profile(&self, input: CreateSmtpProfile) -> MailerResult<SmtpProfile> {
        input.validate()?;
        if input.is_default {
            self.ensure_no_other_default(None).await?;
        }

        self.store.create_smtp_profile(input).await
    }

    pub async fn get_smtp_profile(&self, id: Uuid) -> MailerResult<SmtpProfile> {
        self.store
            .get_smtp_profile(id)
            .await?
            .ok_or_else(|| MailerError::not_found("SMTP profile", id))
    }

    pub async fn list_smtp_profiles(
        &self,
        filter: SmtpProfileFilter,
    ) -> MailerResult<Vec<SmtpProfile>> {
        self.store.list_smtp_profiles(filter).await
    }

    #[instrument(skip(self, input))]
    pub async fn update_smtp_profile(
        &self,
        id: Uuid,
        input: UpdateSmtpProfile,
    ) -> MailerResult<SmtpProfile> {
        input.validate()?;
        let current = self.get_smtp_profile(id).await?;

        let use_tls = input.use_tls.unwrap_or(current.use_tls);
        let use_ssl = input.use_ssl.unwrap_or(current.use_ssl);
        if use_tls && use_ssl {
            return Err(MailerError::Validation(
                "use_tls and use_ssl are mutually exclusive".to_string(),
            ));
        }
        if input.is_default == Some(true) && !current.is_default {
            self.ensure_no_other_default(Some(id)).await?;
        }

        self.store.update_smtp_profile(id, input).await
    }

    #[instrument(skip(self))]
    pub async fn delete_smtp_profile(&self, id: Uuid) -> MailerResult<()> {
        if !self.store.delete_smtp_profile(id).await? {
            return Err(MailerError::not_found("SMTP profile", id));
        }
        Ok(())
    }

    async fn ensure_no_other_default(&self, owner: Option<Uuid>) -> MailerResult<()> {
        match self.store.find_default_smtp_profile().await? {
            Some(existing) if Some(existing.id) != owner => Err(MailerError::Conflict(format!(
                "SMTP profile '{}' is already the default",
                existing.name
            ))),
            _ => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Scheduled sends
    // ------------------------------------------------------------------

    #[instrument(skip(self, input), fields(template_id = %input.template_id))]
    pub async fn create_scheduled_email(
        &self,
        input: CreateScheduledEmail,
    ) -> MailerResult<ScheduledEmail> {
        input.validate()?;
        self.ensure_references(Some(input.template_id), input.user_id, input.cluster_id)
            .await?;

        self.store.create_scheduled_email(input).await
    }

    pub async fn get_scheduled_email(&self, id: Uuid) -> MailerResult<ScheduledEmail> {
        self.store
            .get_scheduled_email(id)
            .await?
            .ok_or_else(|| MailerError::not_found("Scheduled email", id))
    }

    pub async fn list_scheduled_emails(
        &self,
        filter: ScheduledEmailFilter,
    ) -> MailerResult<Vec<ScheduledEmail>> {
        self.store.list_scheduled_emails(filter).await
    }

    #[instrument(skip(self, input))]
    pub async fn update_scheduled_email(
        &self,
        id: Uuid,
        input: UpdateScheduledEmail,
    ) -> MailerResult<ScheduledEmail> {
        input.validate()?;
        self.ensure_references(
            input.template_id,
            input.user_id.flatten(),
            input.cluster_id.flatten(),
        )
        .await?;

        self.store.update_scheduled_email(id, input).await
    }

    #[instrument(skip(self))]
    pub async fn delete_scheduled_email(&self, id: Uuid) -> MailerResult<()> {
        if !self.store.delete_scheduled_email(id).await? {
            return Err(MailerError::not_found("Scheduled email", id));
        }
        Ok(())
    }

    async fn ensure_references(
        &self,
        template_id: Option<Uuid>,
        user_id: Option<Uuid>,
        cluster_id: Option<Uuid>,
    ) -> MailerResult<()> {
        if let Some(id) = template_id {
            if self.store.get_template(id).await?.is_none() {
                return Err(MailerError::Validation(format!("Template {id} does not exist")));
            }
        }
        if let Some(id) = user_id {
            if self.store.get_user(id).await?.is_none() {
                return Err(MailerError::Validation(format!("User {id} does not exist")));
            }
        }
        if let Some(id) = cluster_id {
            if self.store.get_cluster(id).await?.is_none() {
                return Err(MailerError::Validation(format!("Cluster {id} does not exist")));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Delivery log
    // ------------------------------------------------------------------

    pub async fn get_email_log(&self, id: Uuid) -> MailerResult<Email> {
        self.store
            .get_email_log(id)
            .await?
            .ok_or_else(|| MailerError::not_found("Email", id))
    }

    pub async fn list_email_logs(&self, filter: EmailFilter) -> MailerResult<Vec<Email>> {
        self.store.list_email_logs(filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryMailerStore;
    use chrono::Utc;

    fn service() -> MailerService<InMemoryMailerStore> {
        MailerService::new(Arc::new(InMemoryMailerStore::new()))
    }

    fn template(name: &str, body: &str) -> CreateEmailTemplate {
        CreateEmailTemplate {
            name: name.into(),
            subject: "Subject".into(),
            body: body.into(),
        }
    }

    fn profile(name: &str, is_default: bool) -> CreateSmtpProfile {
        CreateSmtpProfile {
            name: name.into(),
            host: "smtp.example.com".into(),
            port: 587,
            username: "news@example.com".into(),
            password: "secret".into(),
            use_tls: true,
            use_ssl: false,
            is_default,
        }
    }

    fn user(email: &str) -> CreateEmailUser {
        CreateEmailUser {
            first_name: Some("Ana".into()),
            last_name: None,
            email: email.into(),
        }
    }

    #[tokio::test]
    async fn test_template_name_must_be_unique() {
        let service = service();
        service.create_template(template("Welcome", "Hi")).await.unwrap();

        let err = service
            .create_template(template("Welcome", "Hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, MailerError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_template_body_must_compile() {
        let service = service();
        let err = service
            .create_template(template("Broken", "Hi {{#each}}"))
            .await
            .unwrap_err();
        assert!(matches!(err, MailerError::Template(_)));
    }

    #[tokio::test]
    async fn test_template_rename_to_own_name_is_allowed() {
        let service = service();
        let created = service.create_template(template("Welcome", "Hi")).await.unwrap();

        let updated = service
            .update_template(
                created.id,
                UpdateEmailTemplate {
                    name: Some("Welcome".into()),
                    body: Some("Hi {{first_name}}".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.body, "Hi {{first_name}}");
    }

    #[tokio::test]
    async fn test_user_email_is_validated_and_unique() {
        let service = service();
        let err = service.create_user(user("not-an-email")).await.unwrap_err();
        assert!(matches!(err, MailerError::Validation(_)));

        service.create_user(user("ana@x.com")).await.unwrap();
        let err = service.create_user(user("ana@x.com")).await.unwrap_err();
        assert!(matches!(err, MailerError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_second_default_profile_is_rejected() {
        let service = service();
        service.create_smtp_profile(profile("primary", true)).await.unwrap();

        let err = service
            .create_smtp_profile(profile("secondary", true))
            .await
            .unwrap_err();
        assert!(matches!(err, MailerError::Conflict(_)));

        let backup = service
            .create_smtp_profile(profile("backup", false))
            .await
            .unwrap();
        let err = service
            .update_smtp_profile(
                backup.id,
                UpdateSmtpProfile {
                    is_default: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MailerError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_cannot_enable_tls_and_ssl() {
        let service = service();
        let created = service.create_smtp_profile(profile("primary", false)).await.unwrap();

        let err = service
            .update_smtp_profile(
                created.id,
                UpdateSmtpProfile {
                    use_ssl: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MailerError::Validation(_)));

        let switched = service
            .update_smtp_profile(
                created.id,
                UpdateSmtpProfile {
                    use_ssl: Some(true),
                    use_tls: Some(false),
                    port: Some(465),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(switched.use_ssl);
    }

    #[tokio::test]
    async fn test_cluster_members_must_exist() {
        let service = service();
        let ana = service.create_user(user("ana@x.com")).await.unwrap();

        let err = service
            .create_cluster(CreateCluster {
                name: "team".into(),
                member_ids: vec![ana.id, Uuid::now_v7()],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MailerError::Validation(_)));

        let cluster = service
            .create_cluster(CreateCluster {
                name: "team".into(),
                member_ids: vec![],
            })
            .await
            .unwrap();
        service
            .set_cluster_members(cluster.id, vec![ana.id, ana.id])
            .await
            .unwrap();
        let members = service.list_cluster_members(cluster.id).await.unwrap();
        assert_eq!(members, vec![ana]);
    }

    #[tokio::test]
    async fn test_scheduled_email_references_must_exist() {
        let service = service();
        let err = service
            .create_scheduled_email(CreateScheduledEmail {
                template_id: Uuid::now_v7(),
                user_id: None,
                cluster_id: None,
                scheduled_time: Utc::now(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MailerError::Validation(_)));

        let template = service.create_template(template("Welcome", "Hi")).await.unwrap();
        let scheduled = service
            .create_scheduled_email(CreateScheduledEmail {
                template_id: template.id,
                user_id: None,
                cluster_id: None,
                scheduled_time: Utc::now(),
            })
            .await
            .unwrap();
        assert!(!scheduled.is_sent);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let service = service();
        let err = service.delete_cluster(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, MailerError::NotFound { .. }));
    }
}
