//! Shared harness for workflow integration tests.
//!
//! Runs the real migrator against an in-memory SQLite database, wires the
//! services with an in-memory notifier (recording double) and keeps the
//! event receiver so tests can assert on emitted events.

use chrono::Utc;
use loomline_api::{
    auth::Caller,
    db::{establish_connection, run_migrations, DbPool},
    entities::collection,
    entities::company,
    entities::sample,
    entities::user::{self, UserRole},
    events::{Event, EventSender},
    handlers::AppServices,
    notifications::InMemoryNotifier,
};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

pub struct TestApp {
    pub db: Arc<DbPool>,
    pub services: AppServices,
    pub notifier: InMemoryNotifier,
    pub event_rx: mpsc::Receiver<Event>,

    pub customer: Caller,
    pub manufacturer: Caller,
    pub second_manufacturer: Caller,
    pub admin: Caller,

    pub company_id: Uuid,
    pub collection_id: Uuid,
    pub sample_id: Uuid,
}

impl TestApp {
    /// Drains every event currently buffered on the channel.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }
}

pub async fn setup() -> TestApp {
    let db = establish_connection("sqlite::memory:")
        .await
        .expect("sqlite connection");
    run_migrations(&db).await.expect("migrations");
    let db = Arc::new(db);

    let (tx, event_rx) = mpsc::channel(256);
    let event_sender = Arc::new(EventSender::new(tx));
    let notifier = InMemoryNotifier::new();

    let services = AppServices::new(db.clone(), event_sender, Arc::new(notifier.clone()));

    let now = Utc::now();
    let company_id = Uuid::new_v4();
    company::ActiveModel {
        id: Set(company_id),
        name: Set("Meridian Textiles".into()),
        created_at: Set(now),
    }
    .insert(&*db)
    .await
    .expect("seed company");

    let customer_id = seed_user(&db, "buyer@example.com", UserRole::Customer, None).await;
    let manufacturer_id = seed_user(
        &db,
        "maker@meridian.example",
        UserRole::Manufacturer,
        Some(company_id),
    )
    .await;
    let second_manufacturer_id = seed_user(
        &db,
        "planner@meridian.example",
        UserRole::Manufacturer,
        Some(company_id),
    )
    .await;
    let admin_id = seed_user(&db, "ops@platform.example", UserRole::Admin, None).await;

    let collection_id = Uuid::new_v4();
    collection::ActiveModel {
        id: Set(collection_id),
        company_id: Set(company_id),
        name: Set("Autumn Knits".into()),
        created_at: Set(now),
    }
    .insert(&*db)
    .await
    .expect("seed collection");

    let sample_id = Uuid::new_v4();
    sample::ActiveModel {
        id: Set(sample_id),
        customer_id: Set(customer_id),
        company_id: Set(company_id),
        collection_id: Set(collection_id),
        name: Set("Merino crewneck".into()),
        created_at: Set(now),
    }
    .insert(&*db)
    .await
    .expect("seed sample");

    TestApp {
        db,
        services,
        notifier,
        event_rx,
        customer: Caller::Customer {
            user_id: customer_id,
        },
        manufacturer: Caller::ManufacturerMember {
            user_id: manufacturer_id,
            company_id,
        },
        second_manufacturer: Caller::ManufacturerMember {
            user_id: second_manufacturer_id,
            company_id,
        },
        admin: Caller::Admin { user_id: admin_id },
        company_id,
        collection_id,
        sample_id,
    }
}

async fn seed_user(db: &DbPool, email: &str, role: UserRole, company_id: Option<Uuid>) -> Uuid {
    let id = Uuid::new_v4();
    user::ActiveModel {
        id: Set(id),
        email: Set(email.into()),
        name: Set(email.split('@').next().unwrap_or("user").into()),
        role: Set(role),
        company_id: Set(company_id),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("seed user");
    id
}

/// Creates a PENDING order through the order service for the harness
/// customer.
pub async fn create_order(app: &TestApp) -> loomline_api::services::orders::OrderResponse {
    app.services
        .orders
        .create_order(
            &app.customer,
            loomline_api::services::orders::CreateOrderRequest {
                collection_id: app.collection_id,
                customer_id: None,
                quantity: 100,
                unit_price: dec!(5.00),
                currency: "USD".into(),
                notes: None,
            },
        )
        .await
        .expect("create order")
}
