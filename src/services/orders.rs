use crate::{
    auth::{Caller, IdentityService},
    db::DbPool,
    entities::collection::Entity as CollectionEntity,
    entities::order::{
        self, ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel,
        OrderStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    notifications::{EntityLink, Notification, Notifier},
};
use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub collection_id: Uuid,
    /// Set by admins creating an order on a customer's behalf; customers
    /// always create for themselves.
    pub customer_id: Option<Uuid>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    pub unit_price: Decimal,
    #[validate(length(min = 3, max = 3, message = "Currency must be 3 characters"))]
    pub currency: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: Uuid,
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

/// Service managing the order lifecycle outside the negotiation cycle:
/// creation, scoped listing, cancellation and fulfillment progression.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    notifier: Arc<dyn Notifier>,
    identity: IdentityService,
}

impl OrderService {
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

    /// Creates a new order against a manufacturer collection. Orders start
    /// PENDING; pricing is finalized through the negotiation engine.
    #[instrument(skip(self, request), fields(collection_id = %request.collection_id))]
    pub async fn create_order(
        &self,
        caller: &Caller,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;

        let customer_id = match caller {
            Caller::Customer { user_id } => *user_id,
            Caller::Admin { .. } => request.customer_id.ok_or_else(|| {
                ServiceError::ValidationError(
                    "customer_id is required when an admin creates an order".into(),
                )
            })?,
            Caller::ManufacturerMember { .. } => {
                return Err(ServiceError::Forbidden(
                    "Manufacturers cannot place orders against their own collections".into(),
                ))
            }
        };

        let collection = CollectionEntity::find_by_id(request.collection_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Collection {} not found", request.collection_id))
            })?;

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let total_price = request.unit_price * Decimal::from(request.quantity);

        let order_model = OrderActiveModel {
            id: Set(order_id),
            order_number: Set(unique_order_number(&*self.db_pool).await?),
            customer_id: Set(customer_id),
            company_id: Set(collection.company_id),
            collection_id: Set(collection.id),
            quantity: Set(request.quantity),
            unit_price: Set(request.unit_price),
            total_price: Set(total_price),
            currency: Set(request.currency),
            production_days: Set(None),
            status: Set(OrderStatus::Pending),
            agreed_unit_price: Set(None),
            agreed_production_days: Set(None),
            agreed_quantity: Set(None),
            notes: Set(request.notes),
            created_at: Set(now),
            updated_at: Set(Some(now)),
            version: Set(1),
        }
        .insert(&*self.db_pool)
        .await?;

        info!(order_id = %order_id, customer_id = %customer_id, "Order created");

        if let Err(e) = self.event_sender.send(Event::OrderCreated(order_id)).await {
            warn!(error = %e, order_id = %order_id, "Failed to send order created event");
        }

        Ok(model_to_response(order_model))
    }

    /// Retrieves an order, gated to its parties.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(
        &self,
        caller: &Caller,
        order_id: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        let order = find_order(&self.db_pool, order_id).await?;
        assert_order_party(&order, caller)?;
        Ok(model_to_response(order))
    }

    /// Lists orders visible to the caller: customers see their own,
    /// manufacturer members see their company's, admins see all. Returns
    /// the page of orders plus the total count.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        caller: &Caller,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<OrderResponse>, u64), ServiceError> {
        let mut condition = Condition::all();
        match caller {
            Caller::Customer { user_id } => {
                condition = condition.add(order::Column::CustomerId.eq(*user_id));
            }
            Caller::ManufacturerMember { company_id, .. } => {
                condition = condition.add(order::Column::CompanyId.eq(*company_id));
            }
            Caller::Admin { .. } => {}
        }

        let paginator = OrderEntity::find()
            .filter(condition)
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db_pool, per_page);

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((orders.into_iter().map(model_to_response).collect(), total))
    }

    /// Cancels an order. Either party may cancel while the order has not
    /// entered physical production; afterwards cancellation is blocked.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn cancel_order(
        &self,
        caller: &Caller,
        order_id: Uuid,
        reason: Option<String>,
    ) -> Result<OrderResponse, ServiceError> {
        let txn = self.db_pool.begin().await?;

        let order = OrderEntity::find_by_id(order_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        assert_order_party(&order, caller)?;

        if !order.status.can_cancel() {
            return Err(ServiceError::Conflict(
                "Cannot cancel order in current status".into(),
            ));
        }

        let old_status = order.status;
        let customer_id = order.customer_id;
        let company_id = order.company_id;
        let version = order.version;
        let notes = order.notes.clone();

        let mut active: OrderActiveModel = order.into();
        active.status = Set(OrderStatus::Cancelled);
        if let Some(reason) = reason {
            let cancellation = format!("Cancelled: {}", reason);
            active.notes = Set(Some(match notes {
                Some(existing) => format!("{}\n{}", existing, cancellation),
                None => cancellation,
            }));
        }
        active.updated_at = Set(Some(Utc::now()));
        active.version = Set(version + 1);
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        info!(order_id = %order_id, old_status = %old_status, "Order cancelled");

        if let Err(e) = self.event_sender.send(Event::OrderCancelled(order_id)).await {
            warn!(error = %e, order_id = %order_id, "Failed to send order cancelled event");
        }

        // Tell the other side; the canceller already knows.
        let message = format!("Order {} was cancelled", updated.order_number);
        if caller.user_id() == customer_id {
            self.notify_company(company_id, "Order cancelled", &message, order_id)
                .await;
        } else {
            self.notify_user(customer_id, "Order cancelled", &message, order_id)
                .await;
        }

        Ok(model_to_response(updated))
    }

    /// Marks a production-complete order as shipped.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn mark_shipped(
        &self,
        caller: &Caller,
        order_id: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        self.progress_fulfillment(
            caller,
            order_id,
            OrderStatus::ProductionComplete,
            OrderStatus::Shipped,
        )
        .await
    }

    /// Marks a shipped order as delivered.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn mark_delivered(
        &self,
        caller: &Caller,
        order_id: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        self.progress_fulfillment(caller, order_id, OrderStatus::Shipped, OrderStatus::Delivered)
            .await
    }

    async fn progress_fulfillment(
        &self,
        caller: &Caller,
        order_id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<OrderResponse, ServiceError> {
        let txn = self.db_pool.begin().await?;

        let order = OrderEntity::find_by_id(order_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        assert_manufacturer_side(&order, caller)?;

        if order.status != expected {
            return Err(ServiceError::Conflict(format!(
                "Order must be {} to transition to {}, but is {}",
                expected, next, order.status
            )));
        }

        let customer_id = order.customer_id;
        let order_number = order.order_number.clone();
        let version = order.version;

        let mut active: OrderActiveModel = order.into();
        active.status = Set(next);
        active.updated_at = Set(Some(Utc::now()));
        active.version = Set(version + 1);
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        if let Err(e) = self
            .event_sender
            .send(Event::OrderStatusChanged {
                order_id,
                old_status: expected.to_string(),
                new_status: next.to_string(),
            })
            .await
        {
            warn!(error = %e, order_id = %order_id, "Failed to send status changed event");
        }

        self.notify_user(
            customer_id,
            "Order update",
            &format!("Order {} is now {}", order_number, next),
            order_id,
        )
        .await;

        Ok(model_to_response(updated))
    }

    async fn notify_user(&self, user_id: Uuid, title: &str, message: &str, order_id: Uuid) {
        let notification =
            Notification::new(user_id, title, message).with_link(EntityLink::Order(order_id));
        if let Err(e) = self.notifier.send(notification).await {
            warn!(error = %e, user_id = %user_id, "Failed to dispatch notification");
        }
    }

    async fn notify_company(&self, company_id: Uuid, title: &str, message: &str, order_id: Uuid) {
        match self.identity.company_member_ids(company_id).await {
            Ok(member_ids) => {
                for member_id in member_ids {
                    self.notify_user(member_id, title, message, order_id).await;
                }
            }
            Err(e) => {
                error!(error = %e, company_id = %company_id, "Failed to resolve company members for notification");
            }
        }
    }
}

/// Loads an order or fails with NotFound.
pub(crate) async fn find_order(db: &DbPool, order_id: Uuid) -> Result<OrderModel, ServiceError> {
    OrderEntity::find_by_id(order_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
}

/// Permits the order's customer, the manufacturer company's members, and
/// admins.
pub(crate) fn assert_order_party(order: &OrderModel, caller: &Caller) -> Result<(), ServiceError> {
    let permitted = match caller {
        Caller::Customer { user_id } => *user_id == order.customer_id,
        Caller::ManufacturerMember { company_id, .. } => *company_id == order.company_id,
        Caller::Admin { .. } => true,
    };
    if permitted {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(
            "You are not a party to this order".into(),
        ))
    }
}

/// Permits members of the order's manufacturer company and admins.
pub(crate) fn assert_manufacturer_side(
    order: &OrderModel,
    caller: &Caller,
) -> Result<(), ServiceError> {
    match caller {
        Caller::ManufacturerMember { company_id, .. } if *company_id == order.company_id => Ok(()),
        Caller::Admin { .. } => Ok(()),
        _ => Err(ServiceError::Forbidden(
            "Only the manufacturer can perform this action".into(),
        )),
    }
}

fn generate_order_number() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect();
    format!("ORD-{}-{}", Utc::now().format("%Y%m%d"), suffix)
}

/// Picks an order number that is not yet taken, retrying on the rare
/// suffix collision instead of surfacing the unique-key violation.
async fn unique_order_number<C: sea_orm::ConnectionTrait>(
    conn: &C,
) -> Result<String, ServiceError> {
    for _ in 0..3 {
        let candidate = generate_order_number();
        let taken = OrderEntity::find()
            .filter(order::Column::OrderNumber.eq(candidate.clone()))
            .count(conn)
            .await?;
        if taken == 0 {
            return Ok(candidate);
        }
    }
    Err(ServiceError::InternalError(
        "Could not allocate a unique order number".into(),
    ))
}

pub(crate) fn model_to_response(model: OrderModel) -> OrderResponse {
    OrderResponse {
        id: model.id,
        order_number: model.order_number,
        customer_id: model.customer_id,
        company_id: model.company_id,
        collection_id: model.collection_id,
        quantity: model.quantity,
        unit_price: model.unit_price,
        total_price: model.total_price,
        currency: model.currency,
        production_days: model.production_days,
        status: model.status,
        agreed_unit_price: model.agreed_unit_price,
        agreed_production_days: model.agreed_production_days,
        agreed_quantity: model.agreed_quantity,
        notes: model.notes,
        created_at: model.created_at,
        updated_at: model.updated_at,
        version: model.version,
    }
}
