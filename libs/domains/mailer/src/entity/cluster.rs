use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

use crate::models::Cluster;

/// Cluster row; membership lives in [`super::cluster_user`].
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "cluster")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn into_cluster(self, member_ids: Vec<Uuid>) -> Cluster {
        let mut cluster = Cluster {
            id: self.id,
            name: self.name,
            member_ids: Vec::new(),
            created_at: self.created_at.into(),
            updated_at: self.updated_at.into(),
        };
        cluster.set_members(member_ids);
        cluster
    }
}

impl From<&Cluster> for ActiveModel {
    fn from(cluster: &Cluster) -> Self {
        ActiveModel {
            id: Set(cluster.id),
            name: Set(cluster.name.clone()),
            created_at: Set(cluster.created_at.into()),
            updated_at: Set(cluster.updated_at.into()),
        }
    }
}
