use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only audit record of one lifecycle event on a revision request.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "revision_timelines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub revision_request_id: Uuid,
    pub event: RevisionEvent,
    pub actor_id: Uuid,
    pub comments: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RevisionEvent {
    #[sea_orm(string_value = "CREATED")]
    Created,
    #[sea_orm(string_value = "SUBMITTED")]
    Submitted,
    #[sea_orm(string_value = "APPROVED")]
    Approved,
    #[sea_orm(string_value = "REJECTED")]
    Rejected,
    #[sea_orm(string_value = "IMPLEMENTED")]
    Implemented,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::revision_request::Entity",
        from = "Column::RevisionRequestId",
        to = "super::revision_request::Column::Id"
    )]
    RevisionRequest,
}

impl Related<super::revision_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RevisionRequest.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
