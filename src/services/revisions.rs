use crate::{
    auth::{Caller, IdentityService},
    db::DbPool,
    entities::negotiation::Entity as NegotiationEntity,
    entities::order::Entity as OrderEntity,
    entities::production_tracking::{
        Entity as TrackingEntity, Model as TrackingModel, OwnedBy,
    },
    entities::revision_request::{
        self, ActiveModel as RevisionActiveModel, Entity as RevisionEntity,
        Model as RevisionModel, RevisionStatus, RevisionType,
    },
    entities::revision_timeline::{
        self, ActiveModel as TimelineActiveModel, Entity as TimelineEntity,
        Model as TimelineModel, RevisionEvent,
    },
    entities::sample::{Entity as SampleEntity, Model as SampleModel},
    errors::ServiceError,
    events::{Event, EventSender},
    notifications::{EntityLink, Notification, Notifier},
};
use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRevisionRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 5000, message = "Description is required"))]
    pub description: String,
    pub revision_type: RevisionType,
    pub order_id: Option<Uuid>,
    pub sample_id: Option<Uuid>,
    pub production_tracking_id: Option<Uuid>,
    pub negotiation_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub estimated_cost_impact: Option<Decimal>,
    pub estimated_time_impact_days: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RevisionDecisionRequest {
    pub approve: bool,
    #[validate(length(max = 2000, message = "Comments must be at most 2000 characters"))]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionResponse {
    pub id: Uuid,
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

/// Revision request engine: formal change requests linked to the entities
/// they modify, with an approval chain recorded on an append-only timeline.
///
/// State machine: NOT_STARTED -> IN_PROGRESS -> COMPLETED or CANCELLED.
/// Terminal revisions admit no further transition.
#[derive(Clone)]
pub struct RevisionService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    notifier: Arc<dyn Notifier>,
    identity: IdentityService,
}

impl RevisionService {
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

    /// Creates a revision request. Every linked entity is verified to exist
    /// before anything is written, and at least one of order, sample or
    /// production tracking must be linked.
    #[instrument(skip(self, request))]
    pub async fn create_revision(
        &self,
        caller: &Caller,
        request: CreateRevisionRequest,
    ) -> Result<RevisionResponse, ServiceError> {
        request.validate()?;

        if request.order_id.is_none()
            && request.sample_id.is_none()
            && request.production_tracking_id.is_none()
        {
            return Err(ServiceError::ValidationError(
                "A revision must reference at least one of an order, sample, or production tracking"
                    .into(),
            ));
        }

        let txn = self.db_pool.begin().await?;

        self.check_links(&txn, &request, caller).await?;

        let now = Utc::now();
        let revision_id = Uuid::new_v4();

        let revision = RevisionActiveModel {
            id: Set(revision_id),
            revision_number: Set(unique_revision_number(&txn).await?),
            title: Set(request.title),
            description: Set(request.description),
            revision_type: Set(request.revision_type),
            status: Set(RevisionStatus::NotStarted),
            approval_level: Set(0),
            order_id: Set(request.order_id),
            sample_id: Set(request.sample_id),
            production_tracking_id: Set(request.production_tracking_id),
            negotiation_id: Set(request.negotiation_id),
            requested_by: Set(caller.user_id()),
            assigned_to: Set(request.assigned_to),
            estimated_cost_impact: Set(request.estimated_cost_impact),
            estimated_time_impact_days: Set(request.estimated_time_impact_days),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&txn)
        .await?;

        insert_timeline(&txn, revision_id, RevisionEvent::Created, caller.user_id(), None).await?;

        txn.commit().await?;

        info!(revision_id = %revision_id, revision_number = %revision.revision_number, "Revision request created");
        if let Err(e) = self.event_sender.send(Event::RevisionCreated(revision_id)).await {
            warn!(error = %e, "Failed to send revision created event");
        }

        if let Some(assignee) = revision.assigned_to {
            self.notify_user(
                assignee,
                "Revision request assigned",
                &format!("Revision {} was assigned to you", revision.revision_number),
                revision_id,
            )
            .await;
        }

        Ok(model_to_response(revision))
    }

    /// Submits a NOT_STARTED revision for review, moving it to IN_PROGRESS.
    /// Only the requester, the assignee, or an admin may submit.
    #[instrument(skip(self), fields(revision_id = %revision_id))]
    pub async fn submit_revision(
        &self,
        caller: &Caller,
        revision_id: Uuid,
        comments: Option<String>,
    ) -> Result<RevisionResponse, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let revision = find_revision_locked(&txn, revision_id).await?;
        assert_owner_or_assignee(&revision, caller)?;

        if revision.status != RevisionStatus::NotStarted {
            return Err(conflict_for_transition(&revision, "submit"));
        }

        let mut active: RevisionActiveModel = revision.into();
        active.status = Set(RevisionStatus::InProgress);
        active.approval_level = Set(1);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&txn).await?;

        insert_timeline(&txn, revision_id, RevisionEvent::Submitted, caller.user_id(), comments)
            .await?;

        txn.commit().await?;

        if let Err(e) = self.event_sender.send(Event::RevisionSubmitted(revision_id)).await {
            warn!(error = %e, "Failed to send revision submitted event");
        }

        Ok(model_to_response(updated))
    }

    /// Records an approval or rejection on an IN_PROGRESS revision.
    ///
    /// Approval completes the revision; rejection cancels it. The requester
    /// cannot decide on their own revision.
    #[instrument(skip(self, request), fields(revision_id = %revision_id))]
    pub async fn decide_revision(
        &self,
        caller: &Caller,
        revision_id: Uuid,
        request: RevisionDecisionRequest,
    ) -> Result<RevisionResponse, ServiceError> {
        request.validate()?;

        let txn = self.db_pool.begin().await?;
        let revision = find_revision_locked(&txn, revision_id).await?;

        if revision.requested_by == caller.user_id() && !caller.is_admin() {
            return Err(ServiceError::Forbidden(
                "You cannot decide on your own revision request".into(),
            ));
        }
        if revision.status != RevisionStatus::InProgress {
            return Err(conflict_for_transition(&revision, "decide on"));
        }

        let requested_by = revision.requested_by;
        let revision_number = revision.revision_number.clone();
        let approval_level = revision.approval_level;

        let mut active: RevisionActiveModel = revision.into();
        let event;
        let timeline_event;
        if request.approve {
            active.status = Set(RevisionStatus::Completed);
            active.approval_level = Set(approval_level + 1);
            event = Event::RevisionApproved(revision_id);
            timeline_event = RevisionEvent::Approved;
        } else {
            active.status = Set(RevisionStatus::Cancelled);
            event = Event::RevisionRejected(revision_id);
            timeline_event = RevisionEvent::Rejected;
        }
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&txn).await?;

        insert_timeline(&txn, revision_id, timeline_event, caller.user_id(), request.comments)
            .await?;

        txn.commit().await?;

        if let Err(e) = self.event_sender.send(event).await {
            warn!(error = %e, "Failed to send revision decision event");
        }

        let (title, message) = if request.approve {
            (
                "Revision approved",
                format!("Revision {} was approved", revision_number),
            )
        } else {
            (
                "Revision rejected",
                format!("Revision {} was rejected", revision_number),
            )
        };
        self.notify_user(requested_by, title, &message, revision_id).await;

        Ok(model_to_response(updated))
    }

    /// Marks an IN_PROGRESS revision as implemented, completing it without a
    /// counter-party decision. Used when the requester carries out the change
    /// themselves.
    #[instrument(skip(self), fields(revision_id = %revision_id))]
    pub async fn implement_revision(
        &self,
        caller: &Caller,
        revision_id: Uuid,
        comments: Option<String>,
    ) -> Result<RevisionResponse, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let revision = find_revision_locked(&txn, revision_id).await?;
        assert_owner_or_assignee(&revision, caller)?;

        if revision.status != RevisionStatus::InProgress {
            return Err(conflict_for_transition(&revision, "implement"));
        }

        let requested_by = revision.requested_by;
        let revision_number = revision.revision_number.clone();

        let mut active: RevisionActiveModel = revision.into();
        active.status = Set(RevisionStatus::Completed);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&txn).await?;

        insert_timeline(&txn, revision_id, RevisionEvent::Implemented, caller.user_id(), comments)
            .await?;

        txn.commit().await?;

        if let Err(e) = self.event_sender.send(Event::RevisionImplemented(revision_id)).await {
            warn!(error = %e, "Failed to send revision implemented event");
        }

        self.notify_user(
            requested_by,
            "Revision implemented",
            &format!("Revision {} was implemented", revision_number),
            revision_id,
        )
        .await;

        Ok(model_to_response(updated))
    }

    #[instrument(skip(self), fields(revision_id = %revision_id))]
    pub async fn get_revision(
        &self,
        caller: &Caller,
        revision_id: Uuid,
    ) -> Result<RevisionResponse, ServiceError> {
        let revision = RevisionEntity::find_by_id(revision_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Revision request {} not found", revision_id))
            })?;
        assert_viewer(&*self.db_pool, &revision, caller).await?;
        Ok(model_to_response(revision))
    }

    /// Audit timeline of a revision, oldest first.
    #[instrument(skip(self), fields(revision_id = %revision_id))]
    pub async fn list_timeline(
        &self,
        caller: &Caller,
        revision_id: Uuid,
    ) -> Result<Vec<TimelineModel>, ServiceError> {
        let revision = RevisionEntity::find_by_id(revision_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Revision request {} not found", revision_id))
            })?;
        assert_viewer(&*self.db_pool, &revision, caller).await?;

        let timeline = TimelineEntity::find()
            .filter(revision_timeline::Column::RevisionRequestId.eq(revision_id))
            .order_by_asc(revision_timeline::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?;
        Ok(timeline)
    }

    /// Verifies every linked entity exists and that the caller is a party to
    /// the linked order or sample.
    async fn check_links(
        &self,
        txn: &DatabaseTransaction,
        request: &CreateRevisionRequest,
        caller: &Caller,
    ) -> Result<(), ServiceError> {
        if let Some(order_id) = request.order_id {
            let order = OrderEntity::find_by_id(order_id)
                .one(txn)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
            super::orders::assert_order_party(&order, caller)?;
        }
        if let Some(sample_id) = request.sample_id {
            let sample = SampleEntity::find_by_id(sample_id)
                .one(txn)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Sample {} not found", sample_id)))?;
            assert_sample_party(&sample, caller)?;
        }
        if let Some(tracking_id) = request.production_tracking_id {
            let tracking = TrackingEntity::find_by_id(tracking_id)
                .one(txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Production tracking {} not found", tracking_id))
                })?;
            assert_tracking_party(txn, &tracking, caller).await?;
        }
        if let Some(negotiation_id) = request.negotiation_id {
            NegotiationEntity::find_by_id(negotiation_id)
                .one(txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Negotiation {} not found", negotiation_id))
                })?;
        }
        Ok(())
    }

    async fn notify_user(&self, user_id: Uuid, title: &str, message: &str, revision_id: Uuid) {
        let notification = Notification::new(user_id, title, message)
            .with_link(EntityLink::RevisionRequest(revision_id));
        if let Err(e) = self.notifier.send(notification).await {
            warn!(error = %e, user_id = %user_id, "Failed to dispatch notification");
        }
    }
}

async fn find_revision_locked(
    txn: &DatabaseTransaction,
    revision_id: Uuid,
) -> Result<RevisionModel, ServiceError> {
    RevisionEntity::find_by_id(revision_id)
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Revision request {} not found", revision_id))
        })
}

fn conflict_for_transition(revision: &RevisionModel, action: &str) -> ServiceError {
    if revision.is_terminal() {
        ServiceError::Conflict(format!(
            "Cannot {} a revision that is already {}",
            action, revision.status
        ))
    } else {
        ServiceError::Conflict(format!(
            "Cannot {} a revision in status {}",
            action, revision.status
        ))
    }
}

fn assert_owner_or_assignee(revision: &RevisionModel, caller: &Caller) -> Result<(), ServiceError> {
    let permitted = caller.is_admin()
        || revision.requested_by == caller.user_id()
        || revision.assigned_to == Some(caller.user_id());
    if permitted {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(
            "Only the requester or assignee can act on this revision".into(),
        ))
    }
}

fn assert_sample_party(sample: &SampleModel, caller: &Caller) -> Result<(), ServiceError> {
    let permitted = match caller {
        Caller::Customer { user_id } => *user_id == sample.customer_id,
        Caller::ManufacturerMember { company_id, .. } => *company_id == sample.company_id,
        Caller::Admin { .. } => true,
    };
    if permitted {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(
            "You are not a party to this sample".into(),
        ))
    }
}

/// Party check for a tracking record, resolved through its owning order or
/// sample.
async fn assert_tracking_party<C: ConnectionTrait>(
    conn: &C,
    tracking: &TrackingModel,
    caller: &Caller,
) -> Result<(), ServiceError> {
    match tracking.owned_by() {
        OwnedBy::Order(order_id) => {
            let order = OrderEntity::find_by_id(order_id)
                .one(conn)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
            super::orders::assert_order_party(&order, caller)
        }
        OwnedBy::Sample(sample_id) => {
            let sample = SampleEntity::find_by_id(sample_id)
                .one(conn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Sample {} not found", sample_id))
                })?;
            assert_sample_party(&sample, caller)
        }
    }
}

/// Reads require the caller to be the requester, the assignee, an admin, or
/// a party to one of the linked entities.
async fn assert_viewer<C: ConnectionTrait>(
    conn: &C,
    revision: &RevisionModel,
    caller: &Caller,
) -> Result<(), ServiceError> {
    if caller.is_admin()
        || revision.requested_by == caller.user_id()
        || revision.assigned_to == Some(caller.user_id())
    {
        return Ok(());
    }
    if let Some(order_id) = revision.order_id {
        if let Some(order) = OrderEntity::find_by_id(order_id).one(conn).await? {
            if super::orders::assert_order_party(&order, caller).is_ok() {
                return Ok(());
            }
        }
    }
    if let Some(sample_id) = revision.sample_id {
        if let Some(sample) = SampleEntity::find_by_id(sample_id).one(conn).await? {
            if assert_sample_party(&sample, caller).is_ok() {
                return Ok(());
            }
        }
    }
    if let Some(tracking_id) = revision.production_tracking_id {
        if let Some(tracking) = TrackingEntity::find_by_id(tracking_id).one(conn).await? {
            if assert_tracking_party(conn, &tracking, caller).await.is_ok() {
                return Ok(());
            }
        }
    }
    Err(ServiceError::Forbidden(
        "You do not have access to this revision".into(),
    ))
}

fn generate_revision_number() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect();
    format!("REV-{}-{}", Utc::now().format("%Y%m%d"), suffix)
}

/// Picks a revision number that is not yet taken, retrying on the rare
/// suffix collision instead of surfacing the unique-key violation.
async fn unique_revision_number<C: ConnectionTrait>(conn: &C) -> Result<String, ServiceError> {
    for _ in 0..3 {
        let candidate = generate_revision_number();
        let taken = RevisionEntity::find()
            .filter(revision_request::Column::RevisionNumber.eq(candidate.clone()))
            .count(conn)
            .await?;
        if taken == 0 {
            return Ok(candidate);
        }
    }
    Err(ServiceError::InternalError(
        "Could not allocate a unique revision number".into(),
    ))
}

fn model_to_response(model: RevisionModel) -> RevisionResponse {
    RevisionResponse {
        id: model.id,
        revision_number: model.revision_number,
        title: model.title,
        description: model.description,
        revision_type: model.revision_type,
        status: model.status,
        approval_level: model.approval_level,
        order_id: model.order_id,
        sample_id: model.sample_id,
        production_tracking_id: model.production_tracking_id,
        negotiation_id: model.negotiation_id,
        requested_by: model.requested_by,
        assigned_to: model.assigned_to,
        estimated_cost_impact: model.estimated_cost_impact,
        estimated_time_impact_days: model.estimated_time_impact_days,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

async fn insert_timeline(
    txn: &DatabaseTransaction,
    revision_id: Uuid,
    event: RevisionEvent,
    actor_id: Uuid,
    comments: Option<String>,
) -> Result<(), ServiceError> {
    TimelineActiveModel {
        id: Set(Uuid::new_v4()),
        revision_request_id: Set(revision_id),
        event: Set(event),
        actor_id: Set(actor_id),
        comments: Set(comments),
        created_at: Set(Utc::now()),
    }
    .insert(txn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn revision(requested_by: Uuid, status: RevisionStatus) -> RevisionModel {
        let now = Utc::now();
        RevisionModel {
            id: Uuid::new_v4(),
            revision_number: "REV-20240301-AAAAAA".into(),
            title: "Swap lining fabric".into(),
            description: "Replace viscose lining with cupro".into(),
            revision_type: RevisionType::Material,
            status,
            approval_level: 0,
            order_id: Some(Uuid::new_v4()),
            sample_id: None,
            production_tracking_id: None,
            negotiation_id: None,
            requested_by,
            assigned_to: None,
            estimated_cost_impact: None,
            estimated_time_impact_days: None,
            created_at: now,
            updated_at: Some(now),
        }
    }

    #[test]
    fn terminal_revisions_reject_further_transitions() {
        let r = revision(Uuid::new_v4(), RevisionStatus::Completed);
        assert!(r.is_terminal());
        assert!(matches!(
            conflict_for_transition(&r, "submit"),
            ServiceError::Conflict(_)
        ));
    }

    #[test]
    fn only_requester_or_assignee_may_act() {
        let requester = Uuid::new_v4();
        let r = revision(requester, RevisionStatus::NotStarted);

        assert!(assert_owner_or_assignee(&r, &Caller::Customer { user_id: requester }).is_ok());
        assert!(
            assert_owner_or_assignee(&r, &Caller::Customer { user_id: Uuid::new_v4() }).is_err()
        );
        assert!(assert_owner_or_assignee(&r, &Caller::Admin { user_id: Uuid::new_v4() }).is_ok());
    }

    #[test]
    fn revision_numbers_are_prefixed() {
        let n = generate_revision_number();
        assert!(n.starts_with("REV-"));
        assert_eq!(n.len(), "REV-20240301-AAAAAA".len());
    }
}
