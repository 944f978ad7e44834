use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Order placed by a customer against a manufacturer collection.
///
/// Mutated only through the workflow services; price and quantity fields are
/// overwritten by the negotiation engine when an offer is accepted, with the
/// agreed values snapshotted into the `agreed_*` columns for permanent record.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[validate(length(
        min = 1,
        max = 50,
        message = "Order number must be between 1 and 50 characters"
    ))]
    pub order_number: String,

    pub customer_id: Uuid,
    pub company_id: Uuid,
    pub collection_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub currency: String,
    pub production_days: Option<i32>,
    pub status: OrderStatus,
    pub agreed_unit_price: Option<Decimal>,
    pub agreed_production_days: Option<i32>,
    pub agreed_quantity: Option<i32>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "QUOTE_SENT")]
    QuoteSent,
    #[sea_orm(string_value = "CUSTOMER_QUOTE_SENT")]
    CustomerQuoteSent,
    #[sea_orm(string_value = "CONFIRMED")]
    Confirmed,
    #[sea_orm(string_value = "IN_PRODUCTION")]
    InProduction,
    #[sea_orm(string_value = "PRODUCTION_COMPLETE")]
    ProductionComplete,
    #[sea_orm(string_value = "SHIPPED")]
    Shipped,
    #[sea_orm(string_value = "DELIVERED")]
    Delivered,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

impl OrderStatus {
    /// Terminal states admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Physical production has begun (or finished); cancellation is blocked
    /// from here on.
    pub fn production_started(&self) -> bool {
        matches!(
            self,
            Self::InProduction | Self::ProductionComplete | Self::Shipped | Self::Delivered
        )
    }

    /// Cancellation is allowed from any non-terminal state before production.
    pub fn can_cancel(&self) -> bool {
        !self.is_terminal() && !self.production_started()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::collection::Entity",
        from = "Column::CollectionId",
        to = "super::collection::Column::Id"
    )]
    Collection,
    #[sea_orm(has_many = "super::negotiation::Entity")]
    Negotiations,
    #[sea_orm(has_many = "super::change_log::Entity")]
    ChangeLogs,
}

impl Related<super::collection::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Collection.def()
    }
}

impl Related<super::negotiation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Negotiations.def()
    }
}

impl Related<super::change_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChangeLogs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_window_closes_once_production_starts() {
        assert!(OrderStatus::Pending.can_cancel());
        assert!(OrderStatus::QuoteSent.can_cancel());
        assert!(OrderStatus::CustomerQuoteSent.can_cancel());
        assert!(OrderStatus::Confirmed.can_cancel());
        assert!(!OrderStatus::InProduction.can_cancel());
        assert!(!OrderStatus::ProductionComplete.can_cancel());
        assert!(!OrderStatus::Shipped.can_cancel());
        assert!(!OrderStatus::Delivered.can_cancel());
        assert!(!OrderStatus::Cancelled.can_cancel());
    }
}
