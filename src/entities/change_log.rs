use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable record of a field-level change on an order. Rows are inserted
/// by the workflow services in the same transaction as the change they
/// describe, and never updated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "change_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,
    pub negotiation_id: Option<Uuid>,
    pub actor_id: Uuid,
    pub previous_values: Json,
    pub new_values: Json,
    pub review_status: ChangeReviewStatus,
    pub created_at: DateTime<Utc>,
}

/// Counter-party acknowledgement sub-state for changes that require it.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeReviewStatus {
    #[sea_orm(string_value = "NOT_REQUIRED")]
    NotRequired,
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "ACKNOWLEDGED")]
    Acknowledged,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::negotiation::Entity",
        from = "Column::NegotiationId",
        to = "super::negotiation::Column::Id"
    )]
    Negotiation,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::negotiation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Negotiation.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
