mod common;

use chrono::Utc;
use common::{create_order, setup};
use loomline_api::{
    auth::Caller,
    entities::production_tracking::{
        self, OverallStatus, OwnerType, PlanStatus, ProductionStage,
    },
    entities::revision_request::{
        Entity as RevisionEntity, RevisionStatus, RevisionType,
    },
    entities::revision_timeline::RevisionEvent,
    errors::ServiceError,
    services::revisions::{CreateRevisionRequest, RevisionDecisionRequest},
};
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use uuid::Uuid;

fn revision_for_order(order_id: uuid::Uuid) -> CreateRevisionRequest {
    CreateRevisionRequest {
        title: "Swap lining fabric".into(),
        description: "Replace viscose lining with cupro".into(),
        revision_type: RevisionType::Material,
        order_id: Some(order_id),
        sample_id: None,
        production_tracking_id: None,
        negotiation_id: None,
        assigned_to: None,
        estimated_cost_impact: None,
        estimated_time_impact_days: Some(4),
    }
}

#[tokio::test]
async fn unlinked_revision_is_rejected_before_any_write() {
    let app = setup().await;

    let result = app
        .services
        .revisions
        .create_revision(
            &app.customer,
            CreateRevisionRequest {
                title: "Floating request".into(),
                description: "No linked entity".into(),
                revision_type: RevisionType::Other,
                order_id: None,
                sample_id: None,
                production_tracking_id: None,
                negotiation_id: None,
                assigned_to: None,
                estimated_cost_impact: None,
                estimated_time_impact_days: None,
            },
        )
        .await;
    assert!(matches!(result, Err(ServiceError::ValidationError(_))));

    let count = RevisionEntity::find().count(&*app.db).await.unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn revision_linked_to_missing_order_is_not_found() {
    let app = setup().await;

    let result = app
        .services
        .revisions
        .create_revision(&app.customer, revision_for_order(uuid::Uuid::new_v4()))
        .await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));

    let count = RevisionEntity::find().count(&*app.db).await.unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn full_approval_chain_runs_to_completion() {
    let app = setup().await;
    let order = create_order(&app).await;

    let revision = app
        .services
        .revisions
        .create_revision(&app.customer, revision_for_order(order.id))
        .await
        .unwrap();
    assert_eq!(revision.status, RevisionStatus::NotStarted);
    assert!(revision.revision_number.starts_with("REV-"));

    let submitted = app
        .services
        .revisions
        .submit_revision(&app.customer, revision.id, Some("Ready for review".into()))
        .await
        .unwrap();
    assert_eq!(submitted.status, RevisionStatus::InProgress);
    assert_eq!(submitted.approval_level, 1);

    let approved = app
        .services
        .revisions
        .decide_revision(
            &app.manufacturer,
            revision.id,
            RevisionDecisionRequest {
                approve: true,
                comments: Some("Cupro works for us".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(approved.status, RevisionStatus::Completed);

    let timeline = app
        .services
        .revisions
        .list_timeline(&app.customer, revision.id)
        .await
        .unwrap();
    let events: Vec<RevisionEvent> = timeline.iter().map(|t| t.event).collect();
    assert_eq!(
        events,
        vec![
            RevisionEvent::Created,
            RevisionEvent::Submitted,
            RevisionEvent::Approved,
        ]
    );

    // Approval completed the revision; nothing further is accepted.
    assert!(matches!(
        app.services
            .revisions
            .implement_revision(&app.customer, revision.id, None)
            .await,
        Err(ServiceError::Conflict(_))
    ));
}

#[tokio::test]
async fn requester_cannot_decide_on_their_own_revision() {
    let app = setup().await;
    let order = create_order(&app).await;

    let revision = app
        .services
        .revisions
        .create_revision(&app.customer, revision_for_order(order.id))
        .await
        .unwrap();
    app.services
        .revisions
        .submit_revision(&app.customer, revision.id, None)
        .await
        .unwrap();

    let result = app
        .services
        .revisions
        .decide_revision(
            &app.customer,
            revision.id,
            RevisionDecisionRequest {
                approve: true,
                comments: None,
            },
        )
        .await;
    assert!(matches!(result, Err(ServiceError::Forbidden(_))));
}

#[tokio::test]
async fn requester_can_implement_their_own_revision() {
    let app = setup().await;
    let order = create_order(&app).await;

    let revision = app
        .services
        .revisions
        .create_revision(&app.customer, revision_for_order(order.id))
        .await
        .unwrap();
    app.services
        .revisions
        .submit_revision(&app.customer, revision.id, None)
        .await
        .unwrap();

    let implemented = app
        .services
        .revisions
        .implement_revision(&app.customer, revision.id, Some("Done on the sample".into()))
        .await
        .unwrap();
    assert_eq!(implemented.status, RevisionStatus::Completed);

    let timeline = app
        .services
        .revisions
        .list_timeline(&app.customer, revision.id)
        .await
        .unwrap();
    assert_eq!(timeline.last().unwrap().event, RevisionEvent::Implemented);

    // Implementation before submission is not defined.
    let second = app
        .services
        .revisions
        .create_revision(&app.customer, revision_for_order(order.id))
        .await
        .unwrap();
    assert!(matches!(
        app.services
            .revisions
            .implement_revision(&app.customer, second.id, None)
            .await,
        Err(ServiceError::Conflict(_))
    ));
}

#[tokio::test]
async fn revisions_are_hidden_from_outside_companies() {
    let app = setup().await;
    let order = create_order(&app).await;

    let revision = app
        .services
        .revisions
        .create_revision(&app.customer, revision_for_order(order.id))
        .await
        .unwrap();

    let rival = Caller::ManufacturerMember {
        user_id: Uuid::new_v4(),
        company_id: Uuid::new_v4(),
    };
    assert!(matches!(
        app.services.revisions.get_revision(&rival, revision.id).await,
        Err(ServiceError::Forbidden(_))
    ));
    assert!(matches!(
        app.services.revisions.list_timeline(&rival, revision.id).await,
        Err(ServiceError::Forbidden(_))
    ));

    // Members of the order's own manufacturer company remain parties.
    assert!(app
        .services
        .revisions
        .get_revision(&app.manufacturer, revision.id)
        .await
        .is_ok());
}

#[tokio::test]
async fn tracking_linked_revisions_require_a_party_caller() {
    let app = setup().await;

    let tracking_id = Uuid::new_v4();
    production_tracking::ActiveModel {
        id: Set(tracking_id),
        owner_type: Set(OwnerType::Sample),
        owner_id: Set(app.sample_id),
        current_stage: Set(ProductionStage::Planning),
        overall_status: Set(OverallStatus::NotStarted),
        plan_status: Set(PlanStatus::Draft),
        plan_notes: Set(None),
        customer_rejection_reason: Set(None),
        revision_count: Set(0),
        can_start_production: Set(false),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
    }
    .insert(&*app.db)
    .await
    .unwrap();

    let request = |title: &str| CreateRevisionRequest {
        title: title.into(),
        description: "Shift dye lot for the sample run".into(),
        revision_type: RevisionType::Material,
        order_id: None,
        sample_id: None,
        production_tracking_id: Some(tracking_id),
        negotiation_id: None,
        assigned_to: None,
        estimated_cost_impact: None,
        estimated_time_impact_days: None,
    };

    let stranger = Caller::Customer {
        user_id: Uuid::new_v4(),
    };
    assert!(matches!(
        app.services
            .revisions
            .create_revision(&stranger, request("Dye change"))
            .await,
        Err(ServiceError::Forbidden(_))
    ));

    // The sample's customer is a party through the tracking's owner.
    assert!(app
        .services
        .revisions
        .create_revision(&app.customer, request("Dye change"))
        .await
        .is_ok());
}

#[tokio::test]
async fn rejection_cancels_and_terminal_states_are_final() {
    let app = setup().await;
    let order = create_order(&app).await;

    let revision = app
        .services
        .revisions
        .create_revision(&app.customer, revision_for_order(order.id))
        .await
        .unwrap();

    // Submitting is required before a decision.
    let early = app
        .services
        .revisions
        .decide_revision(
            &app.manufacturer,
            revision.id,
            RevisionDecisionRequest {
                approve: false,
                comments: None,
            },
        )
        .await;
    assert!(matches!(early, Err(ServiceError::Conflict(_))));

    app.services
        .revisions
        .submit_revision(&app.customer, revision.id, None)
        .await
        .unwrap();

    let rejected = app
        .services
        .revisions
        .decide_revision(
            &app.manufacturer,
            revision.id,
            RevisionDecisionRequest {
                approve: false,
                comments: Some("Out of scope for this run".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(rejected.status, RevisionStatus::Cancelled);

    // No transition leaves a terminal state.
    assert!(matches!(
        app.services
            .revisions
            .submit_revision(&app.customer, revision.id, None)
            .await,
        Err(ServiceError::Conflict(_))
    ));
    assert!(matches!(
        app.services
            .revisions
            .implement_revision(&app.customer, revision.id, None)
            .await,
        Err(ServiceError::Conflict(_))
    ));

    let timeline = app
        .services
        .revisions
        .list_timeline(&app.customer, revision.id)
        .await
        .unwrap();
    assert_eq!(timeline.last().unwrap().event, RevisionEvent::Rejected);
}
