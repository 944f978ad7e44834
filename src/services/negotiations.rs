use crate::{
    auth::Caller,
    db::DbPool,
    entities::negotiation::{
        self, ActiveModel as NegotiationActiveModel, Entity as NegotiationEntity,
        Model as NegotiationModel, NegotiationStatus, SenderRole,
    },
    entities::change_log::{ActiveModel as ChangeLogActiveModel, ChangeReviewStatus},
    entities::order::{
        ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel, OrderStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    notifications::{EntityLink, Notification, Notifier},
    services::orders::assert_order_party,
};
use crate::auth::IdentityService;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use sea_orm::TransactionTrait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct SendOfferRequest {
    pub unit_price: Decimal,
    #[validate(range(min = 1, message = "Production days must be at least 1"))]
    pub production_days: i32,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: Option<i32>,
    #[validate(length(max = 2000, message = "Message must be at most 2000 characters"))]
    pub message: Option<String>,
    /// Which side an admin sends the offer on behalf of; defaults to the
    /// manufacturer. Ignored for everyone else.
    pub sender_role: Option<SenderRole>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub sender_role: SenderRole,
    pub sender_id: Uuid,
    pub unit_price: Decimal,
    pub production_days: i32,
    pub quantity: Option<i32>,
    pub message: Option<String>,
    pub status: NegotiationStatus,
    pub responded_by: Option<Uuid>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Bilateral offer/counter-offer engine.
///
/// Offers always target an order; sending a new one supersedes any pending
/// offer in the same transaction, so at most one negotiation per order is
/// ever PENDING. Accepting an offer confirms the order and snapshots the
/// agreed terms.
#[derive(Clone)]
pub struct NegotiationService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    notifier: Arc<dyn Notifier>,
    identity: IdentityService,
}

impl NegotiationService {
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

    /// Sends an offer or counter-offer on an order.
    ///
    /// Runs entirely inside one transaction holding a row lock on the order:
    /// supersede every pending offer, insert the new PENDING one, move the
    /// order to the side-appropriate quote status and write the proposed
    /// terms onto it with a change-log entry.
    #[instrument(skip(self, request), fields(order_id = %order_id))]
    pub async fn send_offer(
        &self,
        caller: &Caller,
        order_id: Uuid,
        request: SendOfferRequest,
    ) -> Result<NegotiationResponse, ServiceError> {
        request.validate()?;
        if request.unit_price <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Unit price must be positive".into(),
            ));
        }

        let txn = self.db_pool.begin().await?;

        let order = OrderEntity::find_by_id(order_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        assert_order_party(&order, caller)?;

        if !matches!(
            order.status,
            OrderStatus::Pending | OrderStatus::QuoteSent | OrderStatus::CustomerQuoteSent
        ) {
            return Err(ServiceError::Conflict(format!(
                "Cannot send offers on an order in status {}",
                order.status
            )));
        }

        let sender_role = match caller {
            Caller::Customer { .. } => SenderRole::Customer,
            Caller::ManufacturerMember { .. } => SenderRole::Manufacturer,
            // Admins send on the manufacturer's behalf unless they say otherwise.
            Caller::Admin { .. } => request.sender_role.unwrap_or(SenderRole::Manufacturer),
        };

        let now = Utc::now();

        let superseded = NegotiationEntity::update_many()
            .col_expr(
                negotiation::Column::Status,
                sea_orm::sea_query::Expr::value(NegotiationStatus::Superseded),
            )
            .filter(negotiation::Column::OrderId.eq(order_id))
            .filter(negotiation::Column::Status.eq(NegotiationStatus::Pending))
            .exec(&txn)
            .await?
            .rows_affected;

        let negotiation_model = NegotiationActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            sender_role: Set(sender_role),
            sender_id: Set(caller.user_id()),
            unit_price: Set(request.unit_price),
            production_days: Set(request.production_days),
            quantity: Set(request.quantity),
            message: Set(request.message),
            status: Set(NegotiationStatus::Pending),
            responded_by: Set(None),
            responded_at: Set(None),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let new_order_status = match sender_role {
            SenderRole::Manufacturer => OrderStatus::QuoteSent,
            SenderRole::Customer => OrderStatus::CustomerQuoteSent,
        };
        let new_quantity = request.quantity.unwrap_or(order.quantity);
        let new_total = request.unit_price * Decimal::from(new_quantity);

        let previous = json!({
            "status": order.status,
            "unitPrice": order.unit_price,
            "productionDays": order.production_days,
            "quantity": order.quantity,
            "totalPrice": order.total_price,
        });
        let proposed = json!({
            "status": new_order_status,
            "unitPrice": request.unit_price,
            "productionDays": request.production_days,
            "quantity": new_quantity,
            "totalPrice": new_total,
        });

        let customer_id = order.customer_id;
        let company_id = order.company_id;
        let order_number = order.order_number.clone();
        let version = order.version;

        let mut order_active: OrderActiveModel = order.into();
        order_active.status = Set(new_order_status);
        order_active.unit_price = Set(request.unit_price);
        order_active.production_days = Set(Some(request.production_days));
        order_active.quantity = Set(new_quantity);
        order_active.total_price = Set(new_total);
        order_active.updated_at = Set(Some(now));
        order_active.version = Set(version + 1);
        order_active.update(&txn).await?;

        insert_change_log(
            &txn,
            order_id,
            Some(negotiation_model.id),
            caller.user_id(),
            previous,
            proposed,
        )
        .await?;

        txn.commit().await?;

        info!(
            negotiation_id = %negotiation_model.id,
            sender_role = %sender_role,
            superseded = superseded,
            "Offer sent"
        );

        if let Err(e) = self
            .event_sender
            .send(Event::OfferSent {
                order_id,
                negotiation_id: negotiation_model.id,
                superseded,
            })
            .await
        {
            warn!(error = %e, order_id = %order_id, "Failed to send offer event");
        }

        let message = format!(
            "New offer on order {}: {} {} / {} days",
            order_number, negotiation_model.unit_price, new_quantity, negotiation_model.production_days
        );
        match sender_role {
            SenderRole::Customer => {
                self.notify_company(company_id, "New offer received", &message, negotiation_model.id)
                    .await;
            }
            SenderRole::Manufacturer => {
                self.notify_user(customer_id, "New offer received", &message, negotiation_model.id)
                    .await;
            }
        }

        Ok(model_to_response(negotiation_model))
    }

    /// Accepts a pending offer: the offer's terms become the order's terms,
    /// the order is confirmed and the agreed values are snapshotted.
    #[instrument(skip(self), fields(negotiation_id = %negotiation_id))]
    pub async fn accept_offer(
        &self,
        caller: &Caller,
        negotiation_id: Uuid,
    ) -> Result<NegotiationResponse, ServiceError> {
        self.respond_to_offer(caller, negotiation_id, true).await
    }

    /// Rejects a pending offer and returns the order to PENDING so either
    /// side can counter.
    #[instrument(skip(self), fields(negotiation_id = %negotiation_id))]
    pub async fn reject_offer(
        &self,
        caller: &Caller,
        negotiation_id: Uuid,
    ) -> Result<NegotiationResponse, ServiceError> {
        self.respond_to_offer(caller, negotiation_id, false).await
    }

    async fn respond_to_offer(
        &self,
        caller: &Caller,
        negotiation_id: Uuid,
        accept: bool,
    ) -> Result<NegotiationResponse, ServiceError> {
        let txn = self.db_pool.begin().await?;

        let negotiation = NegotiationEntity::find_by_id(negotiation_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Negotiation {} not found", negotiation_id))
            })?;

        let order = OrderEntity::find_by_id(negotiation.order_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Order {} not found", negotiation.order_id))
            })?;

        // The first read ran before the order lock was granted; a concurrent
        // response or counter-offer may have resolved this offer in between.
        let negotiation = NegotiationEntity::find_by_id(negotiation_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Negotiation {} not found", negotiation_id))
            })?;

        if negotiation.status != NegotiationStatus::Pending {
            return Err(ServiceError::Conflict(
                "This offer has already been responded to".into(),
            ));
        }
        assert_opposite_party(&order, &negotiation, caller)?;

        let now = Utc::now();
        let order_id = order.id;
        let company_id = order.company_id;
        let order_number = order.order_number.clone();
        let sender_role = negotiation.sender_role;
        let sender_id = negotiation.sender_id;

        let mut neg_active: NegotiationActiveModel = negotiation.clone().into();
        neg_active.status = Set(if accept {
            NegotiationStatus::Accepted
        } else {
            NegotiationStatus::Rejected
        });
        neg_active.responded_by = Set(Some(caller.user_id()));
        neg_active.responded_at = Set(Some(now));
        let updated_negotiation = neg_active.update(&txn).await?;

        let previous = json!({
            "status": order.status,
            "unitPrice": order.unit_price,
            "productionDays": order.production_days,
            "quantity": order.quantity,
            "totalPrice": order.total_price,
        });

        let version = order.version;
        if accept {
            let agreed_quantity = negotiation.quantity.unwrap_or(order.quantity);
            let agreed_total = negotiation.unit_price * Decimal::from(agreed_quantity);

            let new_values = json!({
                "status": OrderStatus::Confirmed,
                "unitPrice": negotiation.unit_price,
                "productionDays": negotiation.production_days,
                "quantity": agreed_quantity,
                "totalPrice": agreed_total,
            });

            let mut order_active: OrderActiveModel = order.into();
            order_active.status = Set(OrderStatus::Confirmed);
            order_active.unit_price = Set(negotiation.unit_price);
            order_active.production_days = Set(Some(negotiation.production_days));
            order_active.quantity = Set(agreed_quantity);
            order_active.total_price = Set(agreed_total);
            order_active.agreed_unit_price = Set(Some(negotiation.unit_price));
            order_active.agreed_production_days = Set(Some(negotiation.production_days));
            order_active.agreed_quantity = Set(Some(agreed_quantity));
            order_active.updated_at = Set(Some(now));
            order_active.version = Set(version + 1);
            order_active.update(&txn).await?;

            insert_change_log(
                &txn,
                order_id,
                Some(negotiation_id),
                caller.user_id(),
                previous,
                new_values,
            )
            .await?;
        } else {
            // A rejected offer reopens the order for counters from either side.
            let new_values = json!({ "status": OrderStatus::Pending });

            let mut order_active: OrderActiveModel = order.into();
            order_active.status = Set(OrderStatus::Pending);
            order_active.updated_at = Set(Some(now));
            order_active.version = Set(version + 1);
            order_active.update(&txn).await?;

            insert_change_log(
                &txn,
                order_id,
                Some(negotiation_id),
                caller.user_id(),
                previous,
                new_values,
            )
            .await?;
        }

        txn.commit().await?;

        info!(
            negotiation_id = %negotiation_id,
            order_id = %order_id,
            accepted = accept,
            "Offer response recorded"
        );

        let event = if accept {
            Event::OfferAccepted {
                order_id,
                negotiation_id,
            }
        } else {
            Event::OfferRejected {
                order_id,
                negotiation_id,
            }
        };
        if let Err(e) = self.event_sender.send(event).await {
            warn!(error = %e, negotiation_id = %negotiation_id, "Failed to send offer response event");
        }

        let (title, message) = if accept {
            (
                "Offer accepted",
                format!("Your offer on order {} was accepted", order_number),
            )
        } else {
            (
                "Offer rejected",
                format!("Your offer on order {} was rejected", order_number),
            )
        };
        // Inform the side that sent the offer.
        match sender_role {
            SenderRole::Customer => {
                self.notify_user(sender_id, title, &message, negotiation_id)
                    .await;
            }
            SenderRole::Manufacturer => {
                self.notify_company(company_id, title, &message, negotiation_id)
                    .await;
            }
        }

        Ok(model_to_response(updated_negotiation))
    }

    /// Full offer history for an order, oldest first.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn list_negotiations(
        &self,
        caller: &Caller,
        order_id: Uuid,
    ) -> Result<Vec<NegotiationResponse>, ServiceError> {
        let order = super::orders::find_order(&self.db_pool, order_id).await?;
        assert_order_party(&order, caller)?;

        let negotiations = NegotiationEntity::find()
            .filter(negotiation::Column::OrderId.eq(order_id))
            .order_by_asc(negotiation::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?;

        Ok(negotiations.into_iter().map(model_to_response).collect())
    }

    async fn notify_user(&self, user_id: Uuid, title: &str, message: &str, negotiation_id: Uuid) {
        let notification = Notification::new(user_id, title, message)
            .with_link(EntityLink::Negotiation(negotiation_id));
        if let Err(e) = self.notifier.send(notification).await {
            warn!(error = %e, user_id = %user_id, "Failed to dispatch notification");
        }
    }

    async fn notify_company(
        &self,
        company_id: Uuid,
        title: &str,
        message: &str,
        negotiation_id: Uuid,
    ) {
        match self.identity.company_member_ids(company_id).await {
            Ok(member_ids) => {
                for member_id in member_ids {
                    self.notify_user(member_id, title, message, negotiation_id)
                        .await;
                }
            }
            Err(e) => {
                error!(error = %e, company_id = %company_id, "Failed to resolve company members for notification");
            }
        }
    }
}

/// The responder must be on the opposite side of the offer's sender. Admins
/// may respond on either side.
fn assert_opposite_party(
    order: &OrderModel,
    negotiation: &NegotiationModel,
    caller: &Caller,
) -> Result<(), ServiceError> {
    let permitted = match (negotiation.sender_role, caller) {
        (SenderRole::Manufacturer, Caller::Customer { user_id }) => *user_id == order.customer_id,
        (SenderRole::Customer, Caller::ManufacturerMember { company_id, .. }) => {
            *company_id == order.company_id
        }
        (_, Caller::Admin { .. }) => true,
        _ => false,
    };
    if permitted {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(
            "Only the receiving party can respond to this offer".into(),
        ))
    }
}

async fn insert_change_log(
    txn: &DatabaseTransaction,
    order_id: Uuid,
    negotiation_id: Option<Uuid>,
    actor_id: Uuid,
    previous_values: serde_json::Value,
    new_values: serde_json::Value,
) -> Result<(), ServiceError> {
    ChangeLogActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        negotiation_id: Set(negotiation_id),
        actor_id: Set(actor_id),
        previous_values: Set(previous_values),
        new_values: Set(new_values),
        review_status: Set(ChangeReviewStatus::NotRequired),
        created_at: Set(Utc::now()),
    }
    .insert(txn)
    .await?;
    Ok(())
}

fn model_to_response(model: NegotiationModel) -> NegotiationResponse {
    NegotiationResponse {
        id: model.id,
        order_id: model.order_id,
        sender_role: model.sender_role,
        sender_id: model.sender_id,
        unit_price: model.unit_price,
        production_days: model.production_days,
        quantity: model.quantity,
        message: model.message,
        status: model.status,
        responded_by: model.responded_by,
        responded_at: model.responded_at,
        created_at: model.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(customer_id: Uuid, company_id: Uuid) -> OrderModel {
        let now = Utc::now();
        OrderModel {
            id: Uuid::new_v4(),
            order_number: "ORD-20240301-XYZ789".into(),
            customer_id,
            company_id,
            collection_id: Uuid::new_v4(),
            quantity: 50,
            unit_price: dec!(4.00),
            total_price: dec!(200.00),
            currency: "USD".into(),
            production_days: None,
            status: OrderStatus::QuoteSent,
            agreed_unit_price: None,
            agreed_production_days: None,
            agreed_quantity: None,
            notes: None,
            created_at: now,
            updated_at: Some(now),
            version: 1,
        }
    }

    fn offer(order_id: Uuid, sender_role: SenderRole, sender_id: Uuid) -> NegotiationModel {
        NegotiationModel {
            id: Uuid::new_v4(),
            order_id,
            sender_role,
            sender_id,
            unit_price: dec!(4.50),
            production_days: 21,
            quantity: None,
            message: None,
            status: NegotiationStatus::Pending,
            responded_by: None,
            responded_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn sender_cannot_respond_to_own_offer() {
        let customer = Uuid::new_v4();
        let company = Uuid::new_v4();
        let manufacturer = Uuid::new_v4();
        let o = order(customer, company);
        let n = offer(o.id, SenderRole::Manufacturer, manufacturer);

        assert!(assert_opposite_party(
            &o,
            &n,
            &Caller::ManufacturerMember {
                user_id: manufacturer,
                company_id: company
            }
        )
        .is_err());
        assert!(assert_opposite_party(&o, &n, &Caller::Customer { user_id: customer }).is_ok());
    }

    #[test]
    fn only_the_order_customer_may_accept_a_manufacturer_offer() {
        let o = order(Uuid::new_v4(), Uuid::new_v4());
        let n = offer(o.id, SenderRole::Manufacturer, Uuid::new_v4());

        assert!(assert_opposite_party(&o, &n, &Caller::Customer { user_id: Uuid::new_v4() }).is_err());
        assert!(assert_opposite_party(&o, &n, &Caller::Admin { user_id: Uuid::new_v4() }).is_ok());
    }

    #[test]
    fn customer_offer_is_answered_by_company_members_only() {
        let company = Uuid::new_v4();
        let o = order(Uuid::new_v4(), company);
        let n = offer(o.id, SenderRole::Customer, o.customer_id);

        assert!(assert_opposite_party(
            &o,
            &n,
            &Caller::ManufacturerMember {
                user_id: Uuid::new_v4(),
                company_id: company
            }
        )
        .is_ok());
        assert!(assert_opposite_party(
            &o,
            &n,
            &Caller::ManufacturerMember {
                user_id: Uuid::new_v4(),
                company_id: Uuid::new_v4()
            }
        )
        .is_err());
    }
}
