use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

use crate::models::EmailTemplate;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "email_template")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    pub subject: String,
    #[sea_orm(column_type = "Text")]
    pub body: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for EmailTemplate {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            subject: model.subject,
            body: model.body,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

impl From<EmailTemplate> for ActiveModel {
    fn from(template: EmailTemplate) -> Self {
        ActiveModel {
            id: Set(template.id),
            name: Set(template.name),
            subject: Set(template.subject),
            body: Set(template.body),
            created_at: Set(template.created_at.into()),
            updated_at: Set(template.updated_at.into()),
        }
    }
}
