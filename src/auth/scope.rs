use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::user::{self, Entity as UserEntity, UserRole},
    errors::ServiceError,
};

use super::AuthUser;

/// Resolved capabilities of the calling user.
///
/// Resolution happens exactly once per request; the workflow engines consume
/// this sum type and never compare role strings themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    Customer { user_id: Uuid },
    ManufacturerMember { user_id: Uuid, company_id: Uuid },
    Admin { user_id: Uuid },
}

impl Caller {
    pub fn user_id(&self) -> Uuid {
        match *self {
            Caller::Customer { user_id }
            | Caller::ManufacturerMember { user_id, .. }
            | Caller::Admin { user_id } => user_id,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Caller::Admin { .. })
    }

    /// Company the caller belongs to, if a manufacturer member.
    pub fn company_id(&self) -> Option<Uuid> {
        match *self {
            Caller::ManufacturerMember { company_id, .. } => Some(company_id),
            _ => None,
        }
    }
}

/// Resolves a decoded token into a [`Caller`] and answers company-membership
/// queries for notification fan-out.
#[derive(Clone)]
pub struct IdentityService {
    db: Arc<DbPool>,
}

impl IdentityService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    pub async fn resolve(&self, auth_user: &AuthUser) -> Result<Caller, ServiceError> {
        let user_id = Uuid::parse_str(&auth_user.user_id)
            .map_err(|_| ServiceError::AuthError("Token subject is not a valid user id".into()))?;

        let user = UserEntity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::AuthError("Unknown user".into()))?;

        match user.role {
            UserRole::Customer => Ok(Caller::Customer { user_id }),
            UserRole::Manufacturer => {
                let company_id = user.company_id.ok_or_else(|| {
                    ServiceError::Forbidden(
                        "Manufacturer account is not linked to a company".into(),
                    )
                })?;
                Ok(Caller::ManufacturerMember {
                    user_id,
                    company_id,
                })
            }
            UserRole::Admin => Ok(Caller::Admin { user_id }),
        }
    }

    /// Ids of every user belonging to the given manufacturer company.
    pub async fn company_member_ids(&self, company_id: Uuid) -> Result<Vec<Uuid>, ServiceError> {
        let members = UserEntity::find()
            .filter(user::Column::CompanyId.eq(company_id))
            .all(&*self.db)
            .await?;
        Ok(members.into_iter().map(|m| m.id).collect())
    }
}
