use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

use crate::models::ScheduledEmail;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "scheduled_email")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub template_id: Uuid,
    pub user_id: Option<Uuid>,
    pub cluster_id: Option<Uuid>,
    pub scheduled_time: DateTimeWithTimeZone,
    pub is_sent: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for ScheduledEmail {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            template_id: model.template_id,
            user_id: model.user_id,
            cluster_id: model.cluster_id,
            scheduled_time: model.scheduled_time.into(),
            is_sent: model.is_sent,
            created_at: model.created_at.into(),
        }
    }
}

impl From<ScheduledEmail> for ActiveModel {
    fn from(scheduled: ScheduledEmail) -> Self {
        ActiveModel {
            id: Set(scheduled.id),
            template_id: Set(scheduled.template_id),
            user_id: Set(scheduled.user_id),
            cluster_id: Set(scheduled.cluster_id),
            scheduled_time: Set(scheduled.scheduled_time.into()),
            is_sent: Set(scheduled.is_sent),
            created_at: Set(scheduled.created_at.into()),
        }
    }
}
