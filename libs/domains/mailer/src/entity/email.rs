use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

use crate::models::{Email, EmailStatus};

/// Delivery log row
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "email")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub to_email: String,
    pub template_id: Uuid,
    pub status: EmailStatus,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub sent_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Email {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            to_email: model.to_email,
            template_id: model.template_id,
            status: model.status,
            error_message: model.error_message,
            created_at: model.created_at.into(),
            sent_at: model.sent_at.map(Into::into),
        }
    }
}

impl From<Email> for ActiveModel {
    fn from(email: Email) -> Self {
        ActiveModel {
            id: Set(email.id),
            to_email: Set(email.to_email),
            template_id: Set(email.template_id),
            status: Set(email.status),
            error_message: Set(email.error_message),
            created_at: Set(email.created_at.into()),
            sent_at: Set(email.sent_at.map(Into::into)),
        }
    }
}
