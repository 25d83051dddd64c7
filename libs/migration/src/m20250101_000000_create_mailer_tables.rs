use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EmailTemplate::Table)
                    .if_not_exists()
                    .col(pk_uuid(EmailTemplate::Id))
                    .col(
                        ColumnDef::new(EmailTemplate::Name)
                            .string_len(100)
                            .not_null()
                            .unique_key(),
                    )
                    .col(string_len(EmailTemplate::Subject, 255))
                    .col(text(EmailTemplate::Body))
                    .col(
                        timestamp_with_time_zone(EmailTemplate::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(EmailTemplate::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EmailUser::Table)
                    .if_not_exists()
                    .col(pk_uuid(EmailUser::Id))
                    .col(string_len_null(EmailUser::FirstName, 100))
                    .col(string_len_null(EmailUser::LastName, 100))
                    .col(
                        ColumnDef::new(EmailUser::Email)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        timestamp_with_time_zone(EmailUser::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(EmailUser::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Cluster::Table)
                    .if_not_exists()
                    .col(pk_uuid(Cluster::Id))
                    .col(string_len(Cluster::Name, 100))
                    .col(
                        timestamp_with_time_zone(Cluster::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Cluster::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Cluster membership; removing either side drops the link
        manager
            .create_table(
                Table::create()
                    .table(ClusterUsers::Table)
                    .if_not_exists()
                    .col(uuid(ClusterUsers::ClusterId))
                    .col(uuid(ClusterUsers::UserId))
                    .primary_key(
                        Index::create()
                            .col(ClusterUsers::ClusterId)
                            .col(ClusterUsers::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cluster_users_cluster")
                            .from(ClusterUsers::Table, ClusterUsers::ClusterId)
                            .to(Cluster::Table, Cluster::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cluster_users_user")
                            .from(ClusterUsers::Table, ClusterUsers::UserId)
                            .to(EmailUser::Table, EmailUser::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SmtpProfile::Table)
                    .if_not_exists()
                    .col(pk_uuid(SmtpProfile::Id))
                    .col(string_len(SmtpProfile::Name, 100))
                    .col(string_len(SmtpProfile::Host, 255))
                    .col(integer(SmtpProfile::Port))
                    .col(string_len(SmtpProfile::Username, 255).default(""))
                    .col(string_len(SmtpProfile::Password, 255).default(""))
                    .col(boolean(SmtpProfile::UseTls).default(false))
                    .col(boolean(SmtpProfile::UseSsl).default(false))
                    .col(boolean(SmtpProfile::IsDefault).default(false))
                    .col(
                        timestamp_with_time_zone(SmtpProfile::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(SmtpProfile::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Delivery log; one row per recipient per attempt
        manager
            .create_table(
                Table::create()
                    .table(Email::Table)
                    .if_not_exists()
                    .col(pk_uuid(Email::Id))
                    .col(string_len(Email::ToEmail, 255))
                    .col(uuid(Email::TemplateId))
                    .col(text(Email::Status).default("pending"))
                    .col(text_null(Email::ErrorMessage))
                    .col(
                        timestamp_with_time_zone(Email::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(timestamp_with_time_zone_null(Email::SentAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_email_template")
                            .from(Email::Table, Email::TemplateId)
                            .to(EmailTemplate::Table, EmailTemplate::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ScheduledEmail::Table)
                    .if_not_exists()
                    .col(pk_uuid(ScheduledEmail::Id))
                    .col(uuid(ScheduledEmail::TemplateId))
                    .col(uuid_null(ScheduledEmail::UserId))
                    .col(uuid_null(ScheduledEmail::ClusterId))
                    .col(timestamp_with_time_zone(ScheduledEmail::ScheduledTime))
                    .col(boolean(ScheduledEmail::IsSent).default(false))
                    .col(
                        timestamp_with_time_zone(ScheduledEmail::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_scheduled_email_template")
                            .from(ScheduledEmail::Table, ScheduledEmail::TemplateId)
                            .to(EmailTemplate::Table, EmailTemplate::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_scheduled_email_user")
                            .from(ScheduledEmail::Table, ScheduledEmail::UserId)
                            .to(EmailUser::Table, EmailUser::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_scheduled_email_cluster")
                            .from(ScheduledEmail::Table, ScheduledEmail::ClusterId)
                            .to(Cluster::Table, Cluster::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_email_to_email")
                    .table(Email::Table)
                    .col(Email::ToEmail)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_email_created_at")
                    .table(Email::Table)
                    .col(Email::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Due lookups filter on unsent rows ordered by time
        manager
            .create_index(
                Index::create()
                    .name("idx_scheduled_email_due")
                    .table(ScheduledEmail::Table)
                    .col(ScheduledEmail::IsSent)
                    .col(ScheduledEmail::ScheduledTime)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_smtp_profile_is_default")
                    .table(SmtpProfile::Table)
                    .col(SmtpProfile::IsDefault)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ScheduledEmail::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Email::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(SmtpProfile::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(ClusterUsers::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Cluster::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(EmailUser::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(EmailTemplate::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum EmailTemplate {
    Table,
    Id,
    Name,
    Subject,
    Body,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum EmailUser {
    Table,
    Id,
    FirstName,
    LastName,
    Email,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Cluster {
    Table,
    Id,
    Name,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ClusterUsers {
    Table,
    ClusterId,
    UserId,
}

#[derive(DeriveIden)]
enum SmtpProfile {
    Table,
    Id,
    Name,
    Host,
    Port,
    Username,
    Password,
    UseTls,
    UseSsl,
    IsDefault,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Email {
    Table,
    Id,
    ToEmail,
    TemplateId,
    Status,
    ErrorMessage,
    CreatedAt,
    SentAt,
}

#[derive(DeriveIden)]
enum ScheduledEmail {
    Table,
    Id,
    TemplateId,
    UserId,
    ClusterId,
    ScheduledTime,
    IsSent,
    CreatedAt,
}
