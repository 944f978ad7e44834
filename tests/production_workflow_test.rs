mod common;

use common::{create_order, setup, TestApp};
use loomline_api::{
    auth::Caller,
    entities::order::OrderStatus,
    entities::production_stage_update::StageStatus,
    entities::production_tracking::{
        OverallStatus, OwnedBy, PlanStatus, ProductionStage,
    },
    errors::ServiceError,
    events::Event,
    services::negotiations::SendOfferRequest,
    services::production::{
        CreateTrackingRequest, PlanDecisionRequest, SendPlanRequest, StageUpdateRequest,
        TrackingResponse,
    },
};
use rust_decimal_macros::dec;
use uuid::Uuid;

fn stage(stage: ProductionStage, status: StageStatus) -> StageUpdateRequest {
    StageUpdateRequest {
        stage,
        status,
        note: None,
        actual_start: None,
        actual_end: None,
        delay_reason: None,
        extra_days: None,
    }
}

/// Negotiates an order to CONFIRMED and creates its tracking record.
async fn confirmed_order_with_tracking(app: &TestApp) -> (Uuid, TrackingResponse) {
    let order = create_order(app).await;
    let negotiation = app
        .services
        .negotiations
        .send_offer(
            &app.manufacturer,
            order.id,
            SendOfferRequest {
                unit_price: dec!(5.50),
                production_days: 30,
                quantity: None,
                message: None,
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

    let tracking = app
        .services
        .production
        .create_tracking(
            &app.manufacturer,
            CreateTrackingRequest {
                owned_by: OwnedBy::Order(order.id),
            },
        )
        .await
        .unwrap();
    (order.id, tracking)
}

async fn approve_plan(app: &TestApp, tracking_id: Uuid) {
    app.services
        .production
        .send_production_plan(
            &app.manufacturer,
            tracking_id,
            SendPlanRequest {
                plan_notes: "Cut and sew in two batches".into(),
            },
        )
        .await
        .unwrap();
    app.services
        .production
        .respond_to_production_plan(
            &app.customer,
            tracking_id,
            PlanDecisionRequest {
                approve: true,
                rejection_reason: None,
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn tracking_starts_in_planning_with_draft_plan() {
    let app = setup().await;
    let (_, tracking) = confirmed_order_with_tracking(&app).await;

    assert_eq!(tracking.current_stage, ProductionStage::Planning);
    assert_eq!(tracking.overall_status, OverallStatus::NotStarted);
    assert_eq!(tracking.plan_status, PlanStatus::Draft);
    assert!(!tracking.can_start_production);

    // Second tracking for the same order is rejected.
    let duplicate = app
        .services
        .production
        .create_tracking(
            &app.manufacturer,
            CreateTrackingRequest {
                owned_by: tracking.owned_by,
            },
        )
        .await;
    assert!(matches!(duplicate, Err(ServiceError::Conflict(_))));
}

#[tokio::test]
async fn manufacturing_is_blocked_until_plan_approved() {
    let app = setup().await;
    let (_, tracking) = confirmed_order_with_tracking(&app).await;

    let blocked = app
        .services
        .production
        .update_production_stage(
            &app.manufacturer,
            tracking.id,
            stage(ProductionStage::Cutting, StageStatus::InProgress),
        )
        .await;
    assert!(matches!(blocked, Err(ServiceError::Conflict(_))));

    // Pre-manufacturing stages are fine without an approved plan.
    let sourcing = app
        .services
        .production
        .update_production_stage(
            &app.manufacturer,
            tracking.id,
            stage(ProductionStage::MaterialSourcing, StageStatus::InProgress),
        )
        .await
        .unwrap();
    assert_eq!(sourcing.current_stage, ProductionStage::MaterialSourcing);
    assert_eq!(sourcing.overall_status, OverallStatus::InProgress);
}

#[tokio::test]
async fn plan_rejection_bumps_revision_count_and_allows_resend() {
    let app = setup().await;
    let (_, tracking) = confirmed_order_with_tracking(&app).await;

    app.services
        .production
        .send_production_plan(
            &app.manufacturer,
            tracking.id,
            SendPlanRequest {
                plan_notes: "Single batch, 30 days".into(),
            },
        )
        .await
        .unwrap();

    let rejected = app
        .services
        .production
        .respond_to_production_plan(
            &app.customer,
            tracking.id,
            PlanDecisionRequest {
                approve: false,
                rejection_reason: Some("Lead time too long".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(rejected.plan_status, PlanStatus::Rejected);
    assert_eq!(rejected.revision_count, 1);
    assert_eq!(
        rejected.customer_rejection_reason.as_deref(),
        Some("Lead time too long")
    );
    assert!(!rejected.can_start_production);

    // A second decision on the same plan is a conflict.
    let again = app
        .services
        .production
        .respond_to_production_plan(
            &app.customer,
            tracking.id,
            PlanDecisionRequest {
                approve: true,
                rejection_reason: None,
            },
        )
        .await;
    assert!(matches!(again, Err(ServiceError::Conflict(_))));

    // Resend and approve.
    let resent = app
        .services
        .production
        .send_production_plan(
            &app.manufacturer,
            tracking.id,
            SendPlanRequest {
                plan_notes: "Two batches, 24 days".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(resent.plan_status, PlanStatus::Sent);
    assert!(resent.customer_rejection_reason.is_none());

    let approved = app
        .services
        .production
        .respond_to_production_plan(
            &app.customer,
            tracking.id,
            PlanDecisionRequest {
                approve: true,
                rejection_reason: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(approved.plan_status, PlanStatus::Approved);
    assert_eq!(approved.revision_count, 1);
    assert!(approved.can_start_production);
}

#[tokio::test]
async fn production_progress_mirrors_onto_the_order() {
    let mut app = setup().await;
    let (order_id, tracking) = confirmed_order_with_tracking(&app).await;
    approve_plan(&app, tracking.id).await;

    let cutting = app
        .services
        .production
        .update_production_stage(
            &app.manufacturer,
            tracking.id,
            stage(ProductionStage::Cutting, StageStatus::InProgress),
        )
        .await
        .unwrap();
    assert_eq!(cutting.overall_status, OverallStatus::InProgress);

    let order_now = app
        .services
        .orders
        .get_order(&app.customer, order_id)
        .await
        .unwrap();
    assert_eq!(order_now.status, OrderStatus::InProduction);

    // Cancellation window has closed.
    let cancel = app
        .services
        .orders
        .cancel_order(&app.customer, order_id, None)
        .await;
    match cancel {
        Err(ServiceError::Conflict(message)) => {
            assert_eq!(message, "Cannot cancel order in current status");
        }
        other => panic!("expected conflict, got {:?}", other.map(|o| o.status)),
    }

    let done = app
        .services
        .production
        .update_production_stage(
            &app.manufacturer,
            tracking.id,
            stage(ProductionStage::Packaging, StageStatus::Completed),
        )
        .await
        .unwrap();
    assert_eq!(done.overall_status, OverallStatus::Completed);

    let order_done = app
        .services
        .orders
        .get_order(&app.customer, order_id)
        .await
        .unwrap();
    assert_eq!(order_done.status, OrderStatus::ProductionComplete);

    // Ship and deliver complete the fulfillment arc.
    app.services
        .orders
        .mark_shipped(&app.manufacturer, order_id)
        .await
        .unwrap();
    let delivered = app
        .services
        .orders
        .mark_delivered(&app.manufacturer, order_id)
        .await
        .unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);

    let events = app.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::ProductionStageUpdated { .. })));
}

#[tokio::test]
async fn stage_updates_require_the_manufacturer_role() {
    let app = setup().await;
    let (_, tracking) = confirmed_order_with_tracking(&app).await;
    approve_plan(&app, tracking.id).await;

    let as_customer = app
        .services
        .production
        .update_production_stage(
            &app.customer,
            tracking.id,
            stage(ProductionStage::Cutting, StageStatus::InProgress),
        )
        .await;
    assert!(matches!(as_customer, Err(ServiceError::Forbidden(_))));

    let as_admin = app
        .services
        .production
        .update_production_stage(
            &app.admin,
            tracking.id,
            stage(ProductionStage::Cutting, StageStatus::InProgress),
        )
        .await;
    assert!(matches!(as_admin, Err(ServiceError::Forbidden(_))));

    let other_company = Caller::ManufacturerMember {
        user_id: Uuid::new_v4(),
        company_id: Uuid::new_v4(),
    };
    let as_other = app
        .services
        .production
        .update_production_stage(
            &other_company,
            tracking.id,
            stage(ProductionStage::Cutting, StageStatus::InProgress),
        )
        .await;
    assert!(matches!(as_other, Err(ServiceError::Forbidden(_))));
}

#[tokio::test]
async fn sample_tracking_follows_the_same_plan_gate() {
    let app = setup().await;

    let tracking = app
        .services
        .production
        .create_tracking(
            &app.manufacturer,
            CreateTrackingRequest {
                owned_by: OwnedBy::Sample(app.sample_id),
            },
        )
        .await
        .unwrap();
    assert_eq!(tracking.owned_by, OwnedBy::Sample(app.sample_id));

    let blocked = app
        .services
        .production
        .update_production_stage(
            &app.manufacturer,
            tracking.id,
            stage(ProductionStage::Sewing, StageStatus::InProgress),
        )
        .await;
    assert!(matches!(blocked, Err(ServiceError::Conflict(_))));

    approve_plan(&app, tracking.id).await;

    let sewing = app
        .services
        .production
        .update_production_stage(
            &app.manufacturer,
            tracking.id,
            stage(ProductionStage::Sewing, StageStatus::InProgress),
        )
        .await
        .unwrap();
    assert_eq!(sewing.current_stage, ProductionStage::Sewing);

    let history = app
        .services
        .production
        .list_stage_updates(&app.customer, tracking.id)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].stage, ProductionStage::Sewing);
}
