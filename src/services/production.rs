use crate::{
    auth::{Caller, IdentityService},
    db::DbPool,
    entities::order::{
        ActiveModel as OrderActiveModel, Entity as OrderEntity, OrderStatus,
    },
    entities::production_stage_update::{
        self, ActiveModel as StageUpdateActiveModel, Entity as StageUpdateEntity,
        Model as StageUpdateModel, StageStatus,
    },
    entities::production_tracking::{
        self, ActiveModel as TrackingActiveModel, Entity as TrackingEntity,
        Model as TrackingModel, OverallStatus, OwnedBy, PlanStatus, ProductionStage,
    },
    entities::sample::Entity as SampleEntity,
    errors::ServiceError,
    events::{Event, EventSender},
    notifications::{EntityLink, Notification, Notifier},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct CreateTrackingRequest {
    pub owned_by: OwnedBy,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendPlanRequest {
    #[validate(length(min = 1, max = 5000, message = "Plan notes are required"))]
    pub plan_notes: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PlanDecisionRequest {
    pub approve: bool,
    #[validate(length(max = 2000, message = "Rejection reason must be at most 2000 characters"))]
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StageUpdateRequest {
    pub stage: ProductionStage,
    pub status: StageStatus,
    #[validate(length(max = 2000, message = "Note must be at most 2000 characters"))]
    pub note: Option<String>,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
    pub delay_reason: Option<String>,
    #[validate(range(min = 0, message = "Extra days cannot be negative"))]
    pub extra_days: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingResponse {
    pub id: Uuid,
    pub owned_by: OwnedBy,
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

/// Customer and manufacturer company on the owning entity, used for
/// permission checks and notification routing.
struct OwnerParties {
    customer_id: Uuid,
    company_id: Uuid,
}

/// Production workflow engine: plan approval gating plus the staged
/// manufacturing progression.
///
/// The invariant enforced here is that no tracking record may sit in an
/// active-manufacturing stage while its plan is anything but APPROVED.
#[derive(Clone)]
pub struct ProductionService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    notifier: Arc<dyn Notifier>,
    identity: IdentityService,
}

impl ProductionService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        notifier: Arc<dyn Notifier>,
        identity: IdentityService,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            notifier,
            identity,
        }
    }

    /// Creates a tracking record for an order or sample. Manufacturer side
    /// only; the record starts in PLANNING with a DRAFT plan.
    #[instrument(skip(self, request))]
    pub async fn create_tracking(
        &self,
        caller: &Caller,
        request: CreateTrackingRequest,
    ) -> Result<TrackingResponse, ServiceError> {
        let parties = self.resolve_owner(&*self.db_pool, request.owned_by).await?;
        assert_manufacturer(&parties, caller)?;

        let (owner_type, owner_id) = request.owned_by.discriminant();
        let existing = TrackingEntity::find()
            .filter(production_tracking::Column::OwnerType.eq(owner_type))
            .filter(production_tracking::Column::OwnerId.eq(owner_id))
            .one(&*self.db_pool)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "Production tracking already exists for this entity".into(),
            ));
        }

        let now = Utc::now();
        let tracking = TrackingActiveModel {
            id: Set(Uuid::new_v4()),
            owner_type: Set(owner_type),
            owner_id: Set(owner_id),
            current_stage: Set(ProductionStage::Planning),
            overall_status: Set(OverallStatus::NotStarted),
            plan_status: Set(PlanStatus::Draft),
            plan_notes: Set(None),
            customer_rejection_reason: Set(None),
            revision_count: Set(0),
            can_start_production: Set(false),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&*self.db_pool)
        .await?;

        info!(tracking_id = %tracking.id, "Production tracking created");
        if let Err(e) = self
            .event_sender
            .send(Event::ProductionTrackingCreated(tracking.id))
            .await
        {
            warn!(error = %e, "Failed to send tracking created event");
        }

        Ok(model_to_response(tracking))
    }

    /// Sends the production plan to the customer for approval. Allowed from
    /// DRAFT or, after a rejection, from REJECTED.
    #[instrument(skip(self, request), fields(tracking_id = %tracking_id))]
    pub async fn send_production_plan(
        &self,
        caller: &Caller,
        tracking_id: Uuid,
        request: SendPlanRequest,
    ) -> Result<TrackingResponse, ServiceError> {
        request.validate()?;

        let txn = self.db_pool.begin().await?;
        let tracking = find_tracking_locked(&txn, tracking_id).await?;
        let parties = self.resolve_owner_txn(&txn, tracking.owned_by()).await?;
        assert_manufacturer(&parties, caller)?;

        if !matches!(tracking.plan_status, PlanStatus::Draft | PlanStatus::Rejected) {
            return Err(ServiceError::Conflict(format!(
                "Cannot send a plan whose status is {}",
                tracking.plan_status
            )));
        }

        let mut active: TrackingActiveModel = tracking.into();
        active.plan_status = Set(PlanStatus::Sent);
        active.plan_notes = Set(Some(request.plan_notes));
        active.customer_rejection_reason = Set(None);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        info!(tracking_id = %tracking_id, "Production plan sent");
        if let Err(e) = self
            .event_sender
            .send(Event::ProductionPlanSent(tracking_id))
            .await
        {
            warn!(error = %e, "Failed to send plan sent event");
        }

        self.notify_user(
            parties.customer_id,
            "Production plan received",
            "A production plan is awaiting your approval",
            tracking_id,
        )
        .await;

        Ok(model_to_response(updated))
    }

    /// Customer decision on a SENT plan. Approval unlocks manufacturing;
    /// rejection records the reason and bumps the revision counter so the
    /// manufacturer can resend.
    #[instrument(skip(self, request), fields(tracking_id = %tracking_id))]
    pub async fn respond_to_production_plan(
        &self,
        caller: &Caller,
        tracking_id: Uuid,
        request: PlanDecisionRequest,
    ) -> Result<TrackingResponse, ServiceError> {
        request.validate()?;

        let txn = self.db_pool.begin().await?;
        let tracking = find_tracking_locked(&txn, tracking_id).await?;
        let parties = self.resolve_owner_txn(&txn, tracking.owned_by()).await?;
        assert_customer(&parties, caller)?;

        if tracking.plan_status != PlanStatus::Sent {
            return Err(ServiceError::Conflict(
                "This plan is not awaiting a decision".into(),
            ));
        }

        let revision_count = tracking.revision_count;
        let mut active: TrackingActiveModel = tracking.into();
        let new_revision_count;
        if request.approve {
            new_revision_count = revision_count;
            active.plan_status = Set(PlanStatus::Approved);
            active.can_start_production = Set(true);
            active.customer_rejection_reason = Set(None);
        } else {
            new_revision_count = revision_count + 1;
            active.plan_status = Set(PlanStatus::Rejected);
            active.revision_count = Set(new_revision_count);
            active.customer_rejection_reason = Set(request.rejection_reason);
        }
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        let event = if request.approve {
            Event::ProductionPlanApproved(tracking_id)
        } else {
            Event::ProductionPlanRejected {
                tracking_id,
                revision_count: new_revision_count,
            }
        };
        if let Err(e) = self.event_sender.send(event).await {
            warn!(error = %e, "Failed to send plan decision event");
        }

        let (title, message) = if request.approve {
            ("Plan approved", "The customer approved the production plan")
        } else {
            ("Plan rejected", "The customer rejected the production plan")
        };
        self.notify_company(parties.company_id, title, message, tracking_id)
            .await;

        Ok(model_to_response(updated))
    }

    /// Appends a stage update and moves the tracking record forward.
    ///
    /// Entering any stage from cutting onwards requires an approved plan.
    /// Requires the manufacturer role; ownership is checked for company
    /// members while admins are still rejected here because stage updates
    /// assert facts about the factory floor.
    #[instrument(skip(self, request), fields(tracking_id = %tracking_id))]
    pub async fn update_production_stage(
        &self,
        caller: &Caller,
        tracking_id: Uuid,
        request: StageUpdateRequest,
    ) -> Result<TrackingResponse, ServiceError> {
        request.validate()?;

        let txn = self.db_pool.begin().await?;
        let tracking = find_tracking_locked(&txn, tracking_id).await?;
        let parties = self.resolve_owner_txn(&txn, tracking.owned_by()).await?;

        match caller {
            Caller::ManufacturerMember { company_id, .. }
                if *company_id == parties.company_id => {}
            _ => {
                return Err(ServiceError::Forbidden(
                    "Only the manufacturer can report production progress".into(),
                ))
            }
        }

        if tracking.overall_status == OverallStatus::Cancelled
            || tracking.overall_status == OverallStatus::Completed
        {
            return Err(ServiceError::Conflict(format!(
                "Production is already {}",
                tracking.overall_status
            )));
        }

        if request.stage.is_active_manufacturing() && tracking.plan_status != PlanStatus::Approved {
            return Err(ServiceError::Conflict(
                "Production plan must be approved before manufacturing can begin".into(),
            ));
        }

        let now = Utc::now();
        StageUpdateActiveModel {
            id: Set(Uuid::new_v4()),
            tracking_id: Set(tracking_id),
            stage: Set(request.stage),
            status: Set(request.status),
            note: Set(request.note),
            actual_start: Set(request.actual_start),
            actual_end: Set(request.actual_end),
            delay_reason: Set(request.delay_reason),
            extra_days: Set(request.extra_days),
            created_by: Set(caller.user_id()),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let overall = overall_status_for(request.stage, request.status);
        let owned_by = tracking.owned_by();

        let mut active: TrackingActiveModel = tracking.into();
        active.current_stage = Set(request.stage);
        active.overall_status = Set(overall);
        active.updated_at = Set(Some(now));
        let updated = active.update(&txn).await?;

        // Mirror manufacturing progress onto the owning order's status.
        if let OwnedBy::Order(order_id) = owned_by {
            self.mirror_order_status(&txn, order_id, request.stage, overall)
                .await?;
        }

        txn.commit().await?;

        info!(
            tracking_id = %tracking_id,
            stage = %request.stage,
            status = %request.status,
            overall = %overall,
            "Production stage updated"
        );
        if let Err(e) = self
            .event_sender
            .send(Event::ProductionStageUpdated {
                tracking_id,
                stage: request.stage.to_string(),
                status: request.status.to_string(),
            })
            .await
        {
            warn!(error = %e, "Failed to send stage updated event");
        }

        self.notify_user(
            parties.customer_id,
            "Production update",
            &format!("Production stage {} is now {}", request.stage, request.status),
            tracking_id,
        )
        .await;

        Ok(model_to_response(updated))
    }

    /// Retrieves a tracking record, gated to its parties.
    #[instrument(skip(self), fields(tracking_id = %tracking_id))]
    pub async fn get_tracking(
        &self,
        caller: &Caller,
        tracking_id: Uuid,
    ) -> Result<TrackingResponse, ServiceError> {
        let tracking = TrackingEntity::find_by_id(tracking_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Production tracking {} not found", tracking_id))
            })?;
        let parties = self.resolve_owner(&*self.db_pool, tracking.owned_by()).await?;
        assert_party(&parties, caller)?;
        Ok(model_to_response(tracking))
    }

    /// Stage-update history for a tracking record, oldest first.
    #[instrument(skip(self), fields(tracking_id = %tracking_id))]
    pub async fn list_stage_updates(
        &self,
        caller: &Caller,
        tracking_id: Uuid,
    ) -> Result<Vec<StageUpdateModel>, ServiceError> {
        let tracking = TrackingEntity::find_by_id(tracking_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Production tracking {} not found", tracking_id))
            })?;
        let parties = self.resolve_owner(&*self.db_pool, tracking.owned_by()).await?;
        assert_party(&parties, caller)?;

        let updates = StageUpdateEntity::find()
            .filter(production_stage_update::Column::TrackingId.eq(tracking_id))
            .order_by_asc(production_stage_update::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?;
        Ok(updates)
    }

    async fn mirror_order_status(
        &self,
        txn: &DatabaseTransaction,
        order_id: Uuid,
        stage: ProductionStage,
        overall: OverallStatus,
    ) -> Result<(), ServiceError> {
        let order = OrderEntity::find_by_id(order_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let new_status = if overall == OverallStatus::Completed {
            Some(OrderStatus::ProductionComplete)
        } else if stage.is_active_manufacturing() && order.status == OrderStatus::Confirmed {
            Some(OrderStatus::InProduction)
        } else {
            None
        };

        if let Some(status) = new_status {
            if order.status != status {
                let old_status = order.status;
                let version = order.version;
                let mut active: OrderActiveModel = order.into();
                active.status = Set(status);
                active.updated_at = Set(Some(Utc::now()));
                active.version = Set(version + 1);
                active.update(txn).await?;

                if let Err(e) = self
                    .event_sender
                    .send(Event::OrderStatusChanged {
                        order_id,
                        old_status: old_status.to_string(),
                        new_status: status.to_string(),
                    })
                    .await
                {
                    warn!(error = %e, order_id = %order_id, "Failed to send status changed event");
                }
            }
        }
        Ok(())
    }

    async fn resolve_owner<C>(&self, db: &C, owned_by: OwnedBy) -> Result<OwnerParties, ServiceError>
    where
        C: sea_orm::ConnectionTrait,
    {
        match owned_by {
            OwnedBy::Order(order_id) => {
                let order = OrderEntity::find_by_id(order_id)
                    .one(db)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Order {} not found", order_id))
                    })?;
                Ok(OwnerParties {
                    customer_id: order.customer_id,
                    company_id: order.company_id,
                })
            }
            OwnedBy::Sample(sample_id) => {
                let sample = SampleEntity::find_by_id(sample_id)
                    .one(db)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Sample {} not found", sample_id))
                    })?;
                Ok(OwnerParties {
                    customer_id: sample.customer_id,
                    company_id: sample.company_id,
                })
            }
        }
    }

    async fn resolve_owner_txn(
        &self,
        txn: &DatabaseTransaction,
        owned_by: OwnedBy,
    ) -> Result<OwnerParties, ServiceError> {
        self.resolve_owner(txn, owned_by).await
    }

    async fn notify_user(&self, user_id: Uuid, title: &str, message: &str, tracking_id: Uuid) {
        let notification = Notification::new(user_id, title, message)
            .with_link(EntityLink::ProductionTracking(tracking_id));
        if let Err(e) = self.notifier.send(notification).await {
            warn!(error = %e, user_id = %user_id, "Failed to dispatch notification");
        }
    }

    async fn notify_company(&self, company_id: Uuid, title: &str, message: &str, tracking_id: Uuid) {
        match self.identity.company_member_ids(company_id).await {
            Ok(member_ids) => {
                for member_id in member_ids {
                    self.notify_user(member_id, title, message, tracking_id).await;
                }
            }
            Err(e) => {
                error!(error = %e, company_id = %company_id, "Failed to resolve company members for notification");
            }
        }
    }
}

async fn find_tracking_locked(
    txn: &DatabaseTransaction,
    tracking_id: Uuid,
) -> Result<TrackingModel, ServiceError> {
    TrackingEntity::find_by_id(tracking_id)
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Production tracking {} not found", tracking_id))
        })
}

/// Overall status after a stage update: cancellation and holds dominate,
/// completing the final stage completes the run, anything else keeps it
/// in progress.
fn overall_status_for(stage: ProductionStage, status: StageStatus) -> OverallStatus {
    match status {
        StageStatus::Cancelled => OverallStatus::Cancelled,
        StageStatus::OnHold => OverallStatus::OnHold,
        StageStatus::Completed if stage.is_final() => OverallStatus::Completed,
        _ => OverallStatus::InProgress,
    }
}

fn assert_manufacturer(parties: &OwnerParties, caller: &Caller) -> Result<(), ServiceError> {
    match caller {
        Caller::ManufacturerMember { company_id, .. } if *company_id == parties.company_id => {
            Ok(())
        }
        Caller::Admin { .. } => Ok(()),
        _ => Err(ServiceError::Forbidden(
            "Only the manufacturer can perform this action".into(),
        )),
    }
}

fn assert_customer(parties: &OwnerParties, caller: &Caller) -> Result<(), ServiceError> {
    match caller {
        Caller::Customer { user_id } if *user_id == parties.customer_id => Ok(()),
        Caller::Admin { .. } => Ok(()),
        _ => Err(ServiceError::Forbidden(
            "Only the customer can decide on a production plan".into(),
        )),
    }
}

fn assert_party(parties: &OwnerParties, caller: &Caller) -> Result<(), ServiceError> {
    let permitted = match caller {
        Caller::Customer { user_id } => *user_id == parties.customer_id,
        Caller::ManufacturerMember { company_id, .. } => *company_id == parties.company_id,
        Caller::Admin { .. } => true,
    };
    if permitted {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(
            "You are not a party to this production record".into(),
        ))
    }
}

fn model_to_response(model: TrackingModel) -> TrackingResponse {
    let owned_by = model.owned_by();
    TrackingResponse {
        id: model.id,
        owned_by,
        current_stage: model.current_stage,
        overall_status: model.overall_status,
        plan_status: model.plan_status,
        plan_notes: model.plan_notes,
        customer_rejection_reason: model.customer_rejection_reason,
        revision_count: model.revision_count,
        can_start_production: model.can_start_production,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_stage_completion_completes_the_run() {
        assert_eq!(
            overall_status_for(ProductionStage::Packaging, StageStatus::Completed),
            OverallStatus::Completed
        );
        assert_eq!(
            overall_status_for(ProductionStage::Sewing, StageStatus::Completed),
            OverallStatus::InProgress
        );
    }

    #[test]
    fn holds_and_cancellations_dominate() {
        assert_eq!(
            overall_status_for(ProductionStage::Cutting, StageStatus::OnHold),
            OverallStatus::OnHold
        );
        assert_eq!(
            overall_status_for(ProductionStage::Packaging, StageStatus::Cancelled),
            OverallStatus::Cancelled
        );
    }

    #[test]
    fn plan_decisions_belong_to_the_customer() {
        let parties = OwnerParties {
            customer_id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
        };
        assert!(assert_customer(
            &parties,
            &Caller::Customer {
                user_id: parties.customer_id
            }
        )
        .is_ok());
        assert!(assert_customer(
            &parties,
            &Caller::ManufacturerMember {
                user_id: Uuid::new_v4(),
                company_id: parties.company_id
            }
        )
        .is_err());
    }
}
