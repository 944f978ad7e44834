mod common;

use common::{create_order, setup};
use loomline_api::{
    entities::negotiation::{NegotiationStatus, SenderRole},
    entities::order::{Entity as OrderEntity, OrderStatus},
    errors::ServiceError,
    events::Event,
    services::negotiations::SendOfferRequest,
};
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;

fn offer(unit_price: rust_decimal::Decimal, days: i32) -> SendOfferRequest {
    SendOfferRequest {
        unit_price,
        production_days: days,
        quantity: None,
        message: None,
        sender_role: None,
    }
}

#[tokio::test]
async fn manufacturer_offer_accept_confirms_order_with_agreed_terms() {
    let mut app = setup().await;
    let order = create_order(&app).await;
    assert_eq!(order.status, OrderStatus::Pending);

    let negotiation = app
        .services
        .negotiations
        .send_offer(&app.manufacturer, order.id, offer(dec!(5.50), 30))
        .await
        .expect("send offer");
    assert_eq!(negotiation.status, NegotiationStatus::Pending);
    assert_eq!(negotiation.sender_role, SenderRole::Manufacturer);

    let order_after_offer = app
        .services
        .orders
        .get_order(&app.customer, order.id)
        .await
        .unwrap();
    assert_eq!(order_after_offer.status, OrderStatus::QuoteSent);
    assert_eq!(order_after_offer.unit_price, dec!(5.50));
    assert_eq!(order_after_offer.production_days, Some(30));

    let accepted = app
        .services
        .negotiations
        .accept_offer(&app.customer, negotiation.id)
        .await
        .expect("accept offer");
    assert_eq!(accepted.status, NegotiationStatus::Accepted);

    let confirmed = app
        .services
        .orders
        .get_order(&app.customer, order.id)
        .await
        .unwrap();
    assert_eq!(confirmed.status, OrderStatus::Confirmed);
    assert_eq!(confirmed.unit_price, dec!(5.50));
    assert_eq!(confirmed.total_price, dec!(550.00));
    assert_eq!(confirmed.agreed_unit_price, Some(dec!(5.50)));
    assert_eq!(confirmed.agreed_production_days, Some(30));
    assert_eq!(confirmed.agreed_quantity, Some(100));

    let events = app.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::OfferAccepted { .. })));
}

#[tokio::test]
async fn counter_offer_supersedes_pending_offer() {
    let app = setup().await;
    let order = create_order(&app).await;

    let first = app
        .services
        .negotiations
        .send_offer(&app.manufacturer, order.id, offer(dec!(6.00), 25))
        .await
        .unwrap();

    let counter = app
        .services
        .negotiations
        .send_offer(&app.customer, order.id, offer(dec!(5.00), 25))
        .await
        .unwrap();
    assert_eq!(counter.sender_role, SenderRole::Customer);

    let history = app
        .services
        .negotiations
        .list_negotiations(&app.customer, order.id)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, first.id);
    assert_eq!(history[0].status, NegotiationStatus::Superseded);
    assert_eq!(history[1].status, NegotiationStatus::Pending);

    let pending: Vec<_> = history
        .iter()
        .filter(|n| n.status == NegotiationStatus::Pending)
        .collect();
    assert_eq!(pending.len(), 1);

    let order_now = app
        .services
        .orders
        .get_order(&app.customer, order.id)
        .await
        .unwrap();
    assert_eq!(order_now.status, OrderStatus::CustomerQuoteSent);
}

#[tokio::test]
async fn responding_twice_is_a_conflict() {
    let app = setup().await;
    let order = create_order(&app).await;

    let negotiation = app
        .services
        .negotiations
        .send_offer(&app.manufacturer, order.id, offer(dec!(5.50), 30))
        .await
        .unwrap();

    app.services
        .negotiations
        .accept_offer(&app.customer, negotiation.id)
        .await
        .unwrap();

    let again = app
        .services
        .negotiations
        .accept_offer(&app.customer, negotiation.id)
        .await;
    assert!(matches!(again, Err(ServiceError::Conflict(_))));

    let reject_after = app
        .services
        .negotiations
        .reject_offer(&app.customer, negotiation.id)
        .await;
    assert!(matches!(reject_after, Err(ServiceError::Conflict(_))));
}

#[tokio::test]
async fn admin_offers_default_to_the_manufacturer_side() {
    let app = setup().await;
    let order = create_order(&app).await;

    let negotiation = app
        .services
        .negotiations
        .send_offer(&app.admin, order.id, offer(dec!(5.25), 20))
        .await
        .unwrap();
    assert_eq!(negotiation.sender_role, SenderRole::Manufacturer);

    let order_now = app
        .services
        .orders
        .get_order(&app.customer, order.id)
        .await
        .unwrap();
    assert_eq!(order_now.status, OrderStatus::QuoteSent);
}

#[tokio::test]
async fn responding_to_a_superseded_offer_is_a_conflict() {
    let app = setup().await;
    let order = create_order(&app).await;

    let first = app
        .services
        .negotiations
        .send_offer(&app.manufacturer, order.id, offer(dec!(6.00), 25))
        .await
        .unwrap();
    app.services
        .negotiations
        .send_offer(&app.manufacturer, order.id, offer(dec!(5.75), 25))
        .await
        .unwrap();

    let stale = app
        .services
        .negotiations
        .accept_offer(&app.customer, first.id)
        .await;
    assert!(matches!(stale, Err(ServiceError::Conflict(_))));

    let order_now = app
        .services
        .orders
        .get_order(&app.customer, order.id)
        .await
        .unwrap();
    assert_eq!(order_now.status, OrderStatus::QuoteSent);
    assert_eq!(order_now.agreed_unit_price, None);
}

#[tokio::test]
async fn rejection_reopens_the_order() {
    let app = setup().await;
    let order = create_order(&app).await;

    let negotiation = app
        .services
        .negotiations
        .send_offer(&app.manufacturer, order.id, offer(dec!(7.00), 40))
        .await
        .unwrap();

    let rejected = app
        .services
        .negotiations
        .reject_offer(&app.customer, negotiation.id)
        .await
        .unwrap();
    assert_eq!(rejected.status, NegotiationStatus::Rejected);

    let order_now = app
        .services
        .orders
        .get_order(&app.customer, order.id)
        .await
        .unwrap();
    assert_eq!(order_now.status, OrderStatus::Pending);
    assert_eq!(order_now.agreed_unit_price, None);
}

#[tokio::test]
async fn sender_side_cannot_respond_to_its_own_offer() {
    let app = setup().await;
    let order = create_order(&app).await;

    let negotiation = app
        .services
        .negotiations
        .send_offer(&app.manufacturer, order.id, offer(dec!(5.50), 30))
        .await
        .unwrap();

    // Another member of the same company is still the sending side.
    let result = app
        .services
        .negotiations
        .accept_offer(&app.second_manufacturer, negotiation.id)
        .await;
    assert!(matches!(result, Err(ServiceError::Forbidden(_))));
}

#[tokio::test]
async fn offer_quantity_overrides_order_quantity_on_accept() {
    let app = setup().await;
    let order = create_order(&app).await;

    let negotiation = app
        .services
        .negotiations
        .send_offer(
            &app.manufacturer,
            order.id,
            SendOfferRequest {
                unit_price: dec!(4.80),
                production_days: 35,
                quantity: Some(250),
                message: Some("Better rate at 250 units".into()),
                sender_role: None,
            },
        )
        .await
        .unwrap();

    app.services
        .negotiations
        .accept_offer(&app.customer, negotiation.id)
        .await
        .unwrap();

    let confirmed = app
        .services
        .orders
        .get_order(&app.customer, order.id)
        .await
        .unwrap();
    assert_eq!(confirmed.quantity, 250);
    assert_eq!(confirmed.total_price, dec!(1200.00));
    assert_eq!(confirmed.agreed_quantity, Some(250));
}

#[tokio::test]
async fn customer_offer_notifies_every_company_member() {
    let app = setup().await;
    let order = create_order(&app).await;

    app.services
        .negotiations
        .send_offer(&app.customer, order.id, offer(dec!(4.50), 30))
        .await
        .unwrap();

    let sent = app.notifier.sent().await;
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|n| n.title == "New offer received"));
}

#[tokio::test]
async fn strangers_cannot_see_or_bid_on_an_order() {
    let app = setup().await;
    let order = create_order(&app).await;

    let stranger = loomline_api::auth::Caller::Customer {
        user_id: uuid::Uuid::new_v4(),
    };
    assert!(matches!(
        app.services.orders.get_order(&stranger, order.id).await,
        Err(ServiceError::Forbidden(_))
    ));
    assert!(matches!(
        app.services
            .negotiations
            .send_offer(&stranger, order.id, offer(dec!(1.00), 10))
            .await,
        Err(ServiceError::Forbidden(_))
    ));

    // The failed attempts wrote nothing.
    let order_row = OrderEntity::find_by_id(order.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order_row.status, OrderStatus::Pending);
}
