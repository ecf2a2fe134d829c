use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A shipment ("voyage") record. Document attachments live in the
/// `documents` JSON column as an array of
/// [`crate::services::upload::UploadedDocument`] values.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "operations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub voyage_no: String,
    /// "FTL" or "LTL"
    pub transport_type: String,

    pub carrier_id: String,
    pub carrier_name: String,
    pub vehicle_id: Option<String>,
    pub vehicle_plate: Option<String>,
    pub vehicle_type: Option<String>,
    pub trailer_plate: Option<String>,

    pub loading_date: DateTimeUtc,
    pub unloading_date: DateTimeUtc,
    pub order_date: DateTimeUtc,

    pub origin: String,
    pub destination: String,
    pub loading_address: String,
    pub delivery_address: String,

    pub customer_name: String,
    pub shipper: String,
    pub consignee: String,
    pub supplier: String,

    pub order_no: String,
    pub waybill_no: String,
    pub invoice_no: String,

    pub quantity: i32,
    pub weight_kg: f64,
    pub volumetric_weight: f64,
    pub cargo_description: String,
    pub goods_value: f64,

    pub total_amount: f64,
    /// "TRY", "USD" or "EUR"
    pub currency: String,
    pub payment_term_days: i32,
    pub vehicle_cost: f64,
    pub freight_sale_amount: f64,
    /// Derived: freight_sale_amount - vehicle_cost. Never client-supplied.
    pub profit: f64,
    pub profit_percent: f64,

    pub driver_name: String,
    pub driver_phone: String,

    /// One of the OperationStatus wire values, advanced by document uploads.
    pub status: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub documents: Json,
    #[sea_orm(default_value = true)]
    pub is_active: bool,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub created_by: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::carriers::Entity",
        from = "Column::CarrierId",
        to = "super::carriers::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Carriers,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::CreatedBy",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Users,
}

impl Related<super::carriers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Carriers.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
