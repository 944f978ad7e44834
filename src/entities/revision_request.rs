use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Formal, audited change request against an order, sample, or production
/// record. Every row links to at least one of the three; rows are never
/// deleted once created.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "revision_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub revision_number: String,
    pub title: String,
    pub description: String,
    pub revision_type: RevisionType,
    pub status: RevisionStatus,
    pub approval_level: i32,
    pub order_id: Option<Uuid>,
    pub sample_id: Option<Uuid>,
    pub production_tracking_id: Option<Uuid>,
    pub negotiation_id: Option<Uuid>,
    pub requested_by: Uuid,
    pub assigned_to: Option<Uuid>,
    pub estimated_cost_impact: Option<Decimal>,
    pub estimated_time_impact_days: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// True once no further transition is defined.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            RevisionStatus::Completed | RevisionStatus::Cancelled
        )
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display, utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RevisionType {
    #[sea_orm(string_value = "DESIGN")]
    Design,
    #[sea_orm(string_value = "MATERIAL")]
    Material,
    #[sea_orm(string_value = "QUANTITY")]
    Quantity,
    #[sea_orm(string_value = "PRICE")]
    Price,
    #[sea_orm(string_value = "SCHEDULE")]
    Schedule,
    #[sea_orm(string_value = "OTHER")]
    Other,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RevisionStatus {
    #[sea_orm(string_value = "NOT_STARTED")]
    NotStarted,
    #[sea_orm(string_value = "IN_PROGRESS")]
    InProgress,
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::revision_timeline::Entity")]
    Timeline,
}

impl Related<super::revision_timeline::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Timeline.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
