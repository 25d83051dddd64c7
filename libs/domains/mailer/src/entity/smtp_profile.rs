use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

use crate::error::MailerError;
use crate::models::SmtpProfile;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "smtp_profile")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub host: String,
    pub port: i32,
    pub username: String,
    pub password: String,
    pub use_tls: bool,
    pub use_ssl: bool,
    pub is_default: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for SmtpProfile {
    type Error = MailerError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let port = u16::try_from(model.port).map_err(|_| {
            MailerError::Integrity(format!(
                "SMTP profile {} has out-of-range port {}",
                model.id, model.port
            ))
        })?;

        Ok(Self {
            id: model.id,
            name: model.name,
            host: model.host,
            port,
            username: model.username,
            password: model.password,
            use_tls: model.use_tls,
            use_ssl: model.use_ssl,
            is_default: model.is_default,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }
}

impl From<SmtpProfile> for ActiveModel {
    fn from(profile: SmtpProfile) -> Self {
        ActiveModel {
            id: Set(profile.id),
            name: Set(profile.name),
            host: Set(profile.host),
            port: Set(i32::from(profile.port)),
            username: Set(profile.username),
            password: Set(profile.password),
            use_tls: Set(profile.use_tls),
            use_ssl: Set(profile.use_ssl),
            is_default: Set(profile.is_default),
            created_at: Set(profile.created_at.into()),
            updated_at: Set(profile.updated_at.into()),
        }
    }
}
