//! PostgreSQL store backed by sea-orm.
//!
//! Cascade deletes are enforced by the foreign keys created in the migration.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};
use uuid::Uuid;

use crate::entity::{
    cluster, cluster_user, email, email_template, email_user, scheduled_email, smtp_profile,
};
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

/// PostgreSQL implementation of every mailer repository
#[derive(Clone)]
pub struct PgMailerStore {
    db: DatabaseConnection,
}

impl PgMailerStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn member_ids(&self, cluster_id: Uuid) -> MailerResult<Vec<Uuid>> {
        let ids = cluster_user::Entity::find()
            .filter(cluster_user::Column::ClusterId.eq(cluster_id))
            .order_by_asc(cluster_user::Column::UserId)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|m| m.user_id)
            .collect();
        Ok(ids)
    }
}

fn to_db_time(at: DateTime<Utc>) -> DateTime<FixedOffset> {
    at.into()
}

#[async_trait]
impl TemplateRepository for PgMailerStore {
    async fn create_template(&self, input: CreateEmailTemplate) -> MailerResult<EmailTemplate> {
        let model: email_template::ActiveModel = EmailTemplate::new(input).into();
        let template: EmailTemplate = model.insert(&self.db).await?.into();

        tracing::info!(template_id = %template.id, "Created email template");
        Ok(template)
    }

    async fn get_template(&self, id: Uuid) -> MailerResult<Option<EmailTemplate>> {
        let result = email_template::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(Into::into);
        Ok(result)
    }

    async fn find_template_by_name(&self, name: &str) -> MailerResult<Option<EmailTemplate>> {
        let result = email_template::Entity::find()
            .filter(email_template::Column::Name.eq(name))
            .one(&self.db)
            .await?
            .map(Into::into);
        Ok(result)
    }

    async fn list_templates(&self, filter: TemplateFilter) -> MailerResult<Vec<EmailTemplate>> {
        let mut query = email_template::Entity::find();

        if let Some(search) = &filter.search {
            query = query.filter(
                Condition::any()
                    .add(email_template::Column::Name.contains(search))
                    .add(email_template::Column::Subject.contains(search)),
            );
        }

        let templates = query
            .order_by_asc(email_template::Column::Id)
            .limit(filter.limit as u64)
            .offset(filter.offset as u64)
            .all(&self.db)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();
        Ok(templates)
    }

    async fn update_template(
        &self,
        id: Uuid,
        input: UpdateEmailTemplate,
    ) -> MailerResult<EmailTemplate> {
        let mut template: EmailTemplate = email_template::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| MailerError::not_found("Email template", id))?
            .into();
        template.apply_update(input);

        let model = email_template::ActiveModel {
            id: Set(id),
            name: Set(template.name),
            subject: Set(template.subject),
            body: Set(template.body),
            updated_at: Set(to_db_time(template.updated_at)),
            ..Default::default()
        };

        tracing::info!(template_id = %id, "Updated email template");
        Ok(model.update(&self.db).await?.into())
    }

    async fn delete_template(&self, id: Uuid) -> MailerResult<bool> {
        let result = email_template::Entity::delete_by_id(id)
            .exec(&self.db)
            .await?;

        if result.rows_affected > 0 {
            tracing::info!(template_id = %id, "Deleted email template");
        }
        Ok(result.rows_affected > 0)
    }
}

#[async_trait]
impl UserRepository for PgMailerStore {
    async fn create_user(&self, input: CreateEmailUser) -> MailerResult<EmailUser> {
        let model: email_user::ActiveModel = EmailUser::new(input).into();
        let user: EmailUser = model.insert(&self.db).await?.into();

        tracing::info!(user_id = %user.id, "Created email user");
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> MailerResult<Option<EmailUser>> {
        let result = email_user::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(Into::into);
        Ok(result)
    }

    async fn find_user_by_email(&self, email: &str) -> MailerResult<Option<EmailUser>> {
        let result = email_user::Entity::find()
            .filter(email_user::Column::Email.eq(email))
            .one(&self.db)
            .await?
            .map(Into::into);
        Ok(result)
    }

    async fn get_users(&self, ids: &[Uuid]) -> MailerResult<Vec<EmailUser>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let users = email_user::Entity::find()
            .filter(email_user::Column::Id.is_in(ids.iter().copied()))
            .order_by_asc(email_user::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();
        Ok(users)
    }

    async fn list_users(&self, filter: UserFilter) -> MailerResult<Vec<EmailUser>> {
        let mut query = email_user::Entity::find();

        if let Some(search) = &filter.search {
            query = query.filter(
                Condition::any()
                    .add(email_user::Column::FirstName.contains(search))
                    .add(email_user::Column::LastName.contains(search))
                    .add(email_user::Column::Email.contains(search)),
            );
        }

        let users = query
            .order_by_asc(email_user::Column::Id)
            .limit(filter.limit as u64)
            .offset(filter.offset as u64)
            .all(&self.db)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();
        Ok(users)
    }

    async fn update_user(&self, id: Uuid, input: UpdateEmailUser) -> MailerResult<EmailUser> {
        let mut user: EmailUser = email_user::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| MailerError::not_found("Email user", id))?
            .into();
        user.apply_update(input);

        let model = email_user::ActiveModel {
            id: Set(id),
            first_name: Set(user.first_name),
            last_name: Set(user.last_name),
            email: Set(user.email),
            updated_at: Set(to_db_time(user.updated_at)),
            ..Default::default()
        };

        tracing::info!(user_id = %id, "Updated email user");
        Ok(model.update(&self.db).await?.into())
    }

    async fn delete_user(&self, id: Uuid) -> MailerResult<bool> {
        let result = email_user::Entity::delete_by_id(id).exec(&self.db).await?;

        if result.rows_affected > 0 {
            tracing::info!(user_id = %id, "Deleted email user");
        }
        Ok(result.rows_affected > 0)
    }
}

#[async_trait]
impl ClusterRepository for PgMailerStore {
    async fn create_cluster(&self, input: CreateCluster) -> MailerResult<Cluster> {
        let cluster = Cluster::new(input);

        let txn = self.db.begin().await?;
        cluster::ActiveModel::from(&cluster).insert(&txn).await?;
        if !cluster.member_ids.is_empty() {
            cluster_user::Entity::insert_many(cluster.member_ids.iter().map(|user_id| {
                cluster_user::ActiveModel {
                    cluster_id: Set(cluster.id),
                    user_id: Set(*user_id),
                }
            }))
            .exec(&txn)
            .await?;
        }
        txn.commit().await?;

        tracing::info!(cluster_id = %cluster.id, members = cluster.member_ids.len(), "Created cluster");
        Ok(cluster)
    }

    async fn get_cluster(&self, id: Uuid) -> MailerResult<Option<Cluster>> {
        let Some(model) = cluster::Entity::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };
        let member_ids = self.member_ids(id).await?;
        Ok(Some(model.into_cluster(member_ids)))
    }

    async fn list_clusters(&self, filter: ClusterFilter) -> MailerResult<Vec<Cluster>> {
        let mut query = cluster::Entity::find();

        if let Some(search) = &filter.search {
            query = query.filter(cluster::Column::Name.contains(search));
        }

        let models = query
            .order_by_asc(cluster::Column::Id)
            .limit(filter.limit as u64)
            .offset(filter.offset as u64)
            .all(&self.db)
            .await?;

        let mut clusters = Vec::with_capacity(models.len());
        for model in models {
            let member_ids = self.member_ids(model.id).await?;
            clusters.push(model.into_cluster(member_ids));
        }
        Ok(clusters)
    }

    async fn update_cluster(&self, id: Uuid, input: UpdateCluster) -> MailerResult<Cluster> {
        let mut model: cluster::ActiveModel = cluster::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| MailerError::not_found("Cluster", id))?
            .into();

        if let Some(name) = input.name {
            model.name = Set(name);
        }
        model.updated_at = Set(to_db_time(Utc::now()));

        let updated = model.update(&self.db).await?;
        let member_ids = self.member_ids(id).await?;
        Ok(updated.into_cluster(member_ids))
    }

    async fn set_cluster_members(
        &self,
        id: Uuid,
        member_ids: Vec<Uuid>,
    ) -> MailerResult<Cluster> {
        let model = cluster::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| MailerError::not_found("Cluster", id))?;
        let mut cluster = model.into_cluster(Vec::new());
        cluster.set_members(member_ids);
        cluster.updated_at = Utc::now();

        let txn = self.db.begin().await?;
        cluster_user::Entity::delete_many()
            .filter(cluster_user::Column::ClusterId.eq(id))
            .exec(&txn)
            .await?;
        if !cluster.member_ids.is_empty() {
            cluster_user::Entity::insert_many(cluster.member_ids.iter().map(|user_id| {
                cluster_user::ActiveModel {
                    cluster_id: Set(id),
                    user_id: Set(*user_id),
                }
            }))
            .exec(&txn)
            .await?;
        }
        cluster::ActiveModel {
            id: Set(id),
            updated_at: Set(to_db_time(cluster.updated_at)),
            ..Default::default()
        }
        .update(&txn)
        .await?;
        txn.commit().await?;

        tracing::info!(cluster_id = %id, members = cluster.member_ids.len(), "Replaced cluster members");
        Ok(cluster)
    }

    async fn delete_cluster(&self, id: Uuid) -> MailerResult<bool> {
        let result = cluster::Entity::delete_by_id(id).exec(&self.db).await?;

        if result.rows_affected > 0 {
            tracing::info!(cluster_id = %id, "Deleted cluster");
        }
        Ok(result.rows_affected > 0)
    }
}

#[async_trait]
impl SmtpProfileRepository for PgMailerStore {
    async fn create_smtp_profile(&self, input: CreateSmtpProfile) -> MailerResult<SmtpProfile> {
        let model: smtp_profile::ActiveModel = SmtpProfile::new(input).into();
        let profile = SmtpProfile::try_from(model.insert(&self.db).await?)?;

        tracing::info!(smtp_profile_id = %profile.id, default = profile.is_default, "Created SMTP profile");
        Ok(profile)
    }

    async fn get_smtp_profile(&self, id: Uuid) -> MailerResult<Option<SmtpProfile>> {
        smtp_profile::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(SmtpProfile::try_from)
            .transpose()
    }

    async fn list_smtp_profiles(
        &self,
        filter: SmtpProfileFilter,
    ) -> MailerResult<Vec<SmtpProfile>> {
        let mut query = smtp_profile::Entity::find();

        if let Some(is_default) = filter.is_default {
            query = query.filter(smtp_profile::Column::IsDefault.eq(is_default));
        }

        query
            .order_by_asc(smtp_profile::Column::CreatedAt)
            .limit(filter.limit as u64)
            .offset(filter.offset as u64)
            .all(&self.db)
            .await?
            .into_iter()
            .map(SmtpProfile::try_from)
            .collect()
    }

    async fn update_smtp_profile(
        &self,
        id: Uuid,
        input: UpdateSmtpProfile,
    ) -> MailerResult<SmtpProfile> {
        let model = smtp_profile::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| MailerError::not_found("SMTP profile", id))?;
        let mut profile = SmtpProfile::try_from(model)?;
        profile.apply_update(input);

        let model: smtp_profile::ActiveModel = profile.into();
        let updated = SmtpProfile::try_from(model.update(&self.db).await?)?;

        tracing::info!(smtp_profile_id = %id, "Updated SMTP profile");
        Ok(updated)
    }

    async fn delete_smtp_profile(&self, id: Uuid) -> MailerResult<bool> {
        let result = smtp_profile::Entity::delete_by_id(id)
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn find_default_smtp_profile(&self) -> MailerResult<Option<SmtpProfile>> {
        smtp_profile::Entity::find()
            .filter(smtp_profile::Column::IsDefault.eq(true))
            .order_by_asc(smtp_profile::Column::CreatedAt)
            .one(&self.db)
            .await?
            .map(SmtpProfile::try_from)
            .transpose()
    }
}

#[async_trait]
impl ScheduledEmailRepository for PgMailerStore {
    async fn create_scheduled_email(
        &self,
        input: CreateScheduledEmail,
    ) -> MailerResult<ScheduledEmail> {
        let model: scheduled_email::ActiveModel = ScheduledEmail::new(input).into();
        let scheduled: ScheduledEmail = model.insert(&self.db).await?.into();

        tracing::info!(scheduled_email_id = %scheduled.id, "Created scheduled email");
        Ok(scheduled)
    }

    async fn get_scheduled_email(&self, id: Uuid) -> MailerResult<Option<ScheduledEmail>> {
        let result = scheduled_email::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(Into::into);
        Ok(result)
    }

    async fn list_scheduled_emails(
        &self,
        filter: ScheduledEmailFilter,
    ) -> MailerResult<Vec<ScheduledEmail>> {
        let mut query = scheduled_email::Entity::find();

        if let Some(is_sent) = filter.is_sent {
            query = query.filter(scheduled_email::Column::IsSent.eq(is_sent));
        }
        if let Some(due_before) = filter.due_before {
            query = query.filter(scheduled_email::Column::ScheduledTime.lte(to_db_time(due_before)));
        }

        let scheduled = query
            .order_by_asc(scheduled_email::Column::ScheduledTime)
            .order_by_asc(scheduled_email::Column::Id)
            .limit(filter.limit as u64)
            .offset(filter.offset as u64)
            .all(&self.db)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();
        Ok(scheduled)
    }

    async fn list_due_scheduled_emails(
        &self,
        now: DateTime<Utc>,
    ) -> MailerResult<Vec<ScheduledEmail>> {
        let due = scheduled_email::Entity::find()
            .filter(scheduled_email::Column::IsSent.eq(false))
            .filter(scheduled_email::Column::ScheduledTime.lte(to_db_time(now)))
            .order_by_asc(scheduled_email::Column::ScheduledTime)
            .order_by_asc(scheduled_email::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();
        Ok(due)
    }

    async fn update_scheduled_email(
        &self,
        id: Uuid,
        input: UpdateScheduledEmail,
    ) -> MailerResult<ScheduledEmail> {
        let mut scheduled: ScheduledEmail = scheduled_email::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| MailerError::not_found("Scheduled email", id))?
            .into();
        scheduled.apply_update(input);

        let model = scheduled_email::ActiveModel {
            id: Set(id),
            template_id: Set(scheduled.template_id),
            user_id: Set(scheduled.user_id),
            cluster_id: Set(scheduled.cluster_id),
            scheduled_time: Set(to_db_time(scheduled.scheduled_time)),
            ..Default::default()
        };
        Ok(model.update(&self.db).await?.into())
    }

    async fn mark_scheduled_email_sent(&self, id: Uuid) -> MailerResult<ScheduledEmail> {
        let model = scheduled_email::ActiveModel {
            id: Set(id),
            is_sent: Set(true),
            ..Default::default()
        };
        let updated = model.update(&self.db).await.map_err(|e| match e {
            sea_orm::DbErr::RecordNotUpdated => MailerError::not_found("Scheduled email", id),
            other => other.into(),
        })?;
        Ok(updated.into())
    }

    async fn delete_scheduled_email(&self, id: Uuid) -> MailerResult<bool> {
        let result = scheduled_email::Entity::delete_by_id(id)
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }
}

#[async_trait]
impl EmailLogRepository for PgMailerStore {
    async fn create_email_log(&self, input: NewEmail) -> MailerResult<Email> {
        let model: email::ActiveModel = Email::pending(input).into();
        Ok(model.insert(&self.db).await?.into())
    }

    async fn get_email_log(&self, id: Uuid) -> MailerResult<Option<Email>> {
        let result = email::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(Into::into);
        Ok(result)
    }

    async fn list_email_logs(&self, filter: EmailFilter) -> MailerResult<Vec<Email>> {
        let mut query = email::Entity::find();

        if let Some(status) = filter.status {
            query = query.filter(email::Column::Status.eq(status));
        }
        if let Some(to_email) = &filter.to_email {
            query = query.filter(email::Column::ToEmail.eq(to_email.as_str()));
        }
        if let Some(template_id) = filter.template_id {
            query = query.filter(email::Column::TemplateId.eq(template_id));
        }

        let emails = query
            .order_by_desc(email::Column::CreatedAt)
            .limit(filter.limit as u64)
            .offset(filter.offset as u64)
            .all(&self.db)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();
        Ok(emails)
    }

    async fn mark_email_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> MailerResult<Email> {
        let model = email::ActiveModel {
            id: Set(id),
            status: Set(EmailStatus::Sent),
            sent_at: Set(Some(to_db_time(sent_at))),
            error_message: Set(None),
            ..Default::default()
        };
        Ok(model.update(&self.db).await?.into())
    }

    async fn mark_email_failed(&self, id: Uuid, error: &str) -> MailerResult<Email> {
        let model = email::ActiveModel {
            id: Set(id),
            status: Set(EmailStatus::Failed),
            error_message: Set(Some(error.to_string())),
            ..Default::default()
        };
        Ok(model.update(&self.db).await?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn profile_model(id: Uuid, port: i32) -> smtp_profile::Model {
        let now = to_db_time(Utc::now());
        smtp_profile::Model {
            id,
            name: "primary".into(),
            host: "smtp.example.com".into(),
            port,
            username: "news@example.com".into(),
            password: "secret".into(),
            use_tls: true,
            use_ssl: false,
            is_default: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_find_default_smtp_profile() {
        let id = Uuid::now_v7();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![profile_model(id, 587)]])
            .into_connection();
        let store = PgMailerStore::new(db);

        let profile = store.find_default_smtp_profile().await.unwrap().unwrap();
        assert_eq!(profile.id, id);
        assert_eq!(profile.port, 587);
        assert!(profile.is_default);
    }

    #[tokio::test]
    async fn test_out_of_range_port_is_integrity_error() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![profile_model(Uuid::now_v7(), 70_000)]])
            .into_connection();
        let store = PgMailerStore::new(db);

        let err = store.find_default_smtp_profile().await.unwrap_err();
        assert!(matches!(err, MailerError::Integrity(_)));
    }

    #[tokio::test]
    async fn test_get_users_skips_query_for_empty_ids() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let store = PgMailerStore::new(db);

        assert!(store.get_users(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_reports_missing_rows() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();
        let store = PgMailerStore::new(db);

        assert!(!store.delete_cluster(Uuid::now_v7()).await.unwrap());
    }
}
