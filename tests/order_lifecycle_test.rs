mod common;

use common::setup;
use loomline_api::{
    entities::order::OrderStatus,
    services::orders::CreateOrderRequest,
};
use rust_decimal_macros::dec;

#[tokio::test]
async fn cancellation_appends_the_reason_to_the_notes() {
    let app = setup().await;

    let order = app
        .services
        .orders
        .create_order(
            &app.customer,
            CreateOrderRequest {
                collection_id: app.collection_id,
                customer_id: None,
                quantity: 50,
                unit_price: dec!(8.00),
                currency: "EUR".into(),
                notes: Some("Deliver in two batches".into()),
            },
        )
        .await
        .unwrap();

    let cancelled = app
        .services
        .orders
        .cancel_order(&app.customer, order.id, Some("Season was pulled".into()))
        .await
        .unwrap();

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    let notes = cancelled.notes.expect("notes");
    assert!(notes.contains("Deliver in two batches"));
    assert!(notes.contains("Cancelled: Season was pulled"));
}

#[tokio::test]
async fn cancellation_without_a_reason_keeps_the_notes_untouched() {
    let app = setup().await;

    let order = app
        .services
        .orders
        .create_order(
            &app.customer,
            CreateOrderRequest {
                collection_id: app.collection_id,
                customer_id: None,
                quantity: 50,
                unit_price: dec!(8.00),
                currency: "EUR".into(),
                notes: Some("Deliver in two batches".into()),
            },
        )
        .await
        .unwrap();

    let cancelled = app
        .services
        .orders
        .cancel_order(&app.customer, order.id, None)
        .await
        .unwrap();

    assert_eq!(cancelled.notes.as_deref(), Some("Deliver in two batches"));
}
