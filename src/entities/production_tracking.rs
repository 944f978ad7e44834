use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Production tracking record attached to exactly one order or one sample.
///
/// The owner is stored as a discriminant plus a single id column and exposed
/// as the [`OwnedBy`] tagged union, so "both set" or "neither set" cannot be
/// represented.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "production_trackings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub owner_type: OwnerType,
    pub owner_id: Uuid,
    pub current_stage: ProductionStage,
    pub overall_status: OverallStatus,
    pub plan_status: PlanStatus,
    pub plan_notes: Option<String>,
    pub customer_rejection_reason: Option<String>,
    pub revision_count: i32,
    pub can_start_production: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn owned_by(&self) -> OwnedBy {
        match self.owner_type {
            OwnerType::Order => OwnedBy::Order(self.owner_id),
            OwnerType::Sample => OwnedBy::Sample(self.owner_id),
        }
    }
}

/// Tagged union naming the single entity a tracking record belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnedBy {
    Order(Uuid),
    Sample(Uuid),
}

impl OwnedBy {
    pub fn discriminant(&self) -> (OwnerType, Uuid) {
        match *self {
            OwnedBy::Order(id) => (OwnerType::Order, id),
            OwnedBy::Sample(id) => (OwnerType::Sample, id),
        }
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnerType {
    #[sea_orm(string_value = "ORDER")]
    Order,
    #[sea_orm(string_value = "SAMPLE")]
    Sample,
}

/// Ordered manufacturing phases for a textile production run.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductionStage {
    #[sea_orm(string_value = "PLANNING")]
    Planning,
    #[sea_orm(string_value = "MATERIAL_SOURCING")]
    MaterialSourcing,
    #[sea_orm(string_value = "CUTTING")]
    Cutting,
    #[sea_orm(string_value = "SEWING")]
    Sewing,
    #[sea_orm(string_value = "FINISHING")]
    Finishing,
    #[sea_orm(string_value = "QUALITY_CONTROL")]
    QualityControl,
    #[sea_orm(string_value = "PACKAGING")]
    Packaging,
}

impl ProductionStage {
    /// Stages from cutting onwards commit physical material; entering them
    /// requires an approved production plan.
    pub fn is_active_manufacturing(&self) -> bool {
        *self >= Self::Cutting
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Self::Packaging)
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
    #[sea_orm(string_value = "NOT_STARTED")]
    NotStarted,
    #[sea_orm(string_value = "IN_PROGRESS")]
    InProgress,
    #[sea_orm(string_value = "ON_HOLD")]
    OnHold,
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    #[sea_orm(string_value = "DRAFT")]
    Draft,
    #[sea_orm(string_value = "SENT")]
    Sent,
    #[sea_orm(string_value = "APPROVED")]
    Approved,
    #[sea_orm(string_value = "REJECTED")]
    Rejected,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::production_stage_update::Entity")]
    StageUpdates,
}

impl Related<super::production_stage_update::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StageUpdates.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_manufacturing_starts_at_cutting() {
        assert!(!ProductionStage::Planning.is_active_manufacturing());
        assert!(!ProductionStage::MaterialSourcing.is_active_manufacturing());
        assert!(ProductionStage::Cutting.is_active_manufacturing());
        assert!(ProductionStage::Packaging.is_active_manufacturing());
    }

    #[test]
    fn owned_by_round_trips_through_discriminant() {
        let id = Uuid::new_v4();
        let (ty, owner_id) = OwnedBy::Sample(id).discriminant();
        assert_eq!(ty, OwnerType::Sample);
        assert_eq!(owner_id, id);
    }
}
