use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "vehicles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub carrier_id: String,
    pub plate: String,
    /// Free-form vehicle class, e.g. "Tir", "Kamyon", "Kamyonet"
    pub vehicle_type: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::carriers::Entity",
        from = "Column::CarrierId",
        to = "super::carriers::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Carriers,
}

impl Related<super::carriers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Carriers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
