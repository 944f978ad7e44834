pub mod negotiations;
pub mod orders;
pub mod production;
pub mod revisions;

use crate::{
    auth::{AuthUser, Caller, IdentityService},
    db::DbPool,
    errors::ServiceError,
    events::EventSender,
    notifications::Notifier,
};
use std::sync::Arc;

pub use crate::AppState;

/// Services layer wiring the workflow engines used by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<crate::services::orders::OrderService>,
    pub negotiations: Arc<crate::services::negotiations::NegotiationService>,
    pub production: Arc<crate::services::production::ProductionService>,
    pub revisions: Arc<crate::services::revisions::RevisionService>,
    pub identity: IdentityService,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let identity = IdentityService::new(db_pool.clone());

        let orders = Arc::new(crate::services::orders::OrderService::new(
            db_pool.clone(),
            event_sender.clone(),
            notifier.clone(),
            identity.clone(),
        ));
        let negotiations = Arc::new(crate::services::negotiations::NegotiationService::new(
            db_pool.clone(),
            event_sender.clone(),
            notifier.clone(),
            identity.clone(),
        ));
        let production = Arc::new(crate::services::production::ProductionService::new(
            db_pool.clone(),
            event_sender.clone(),
            notifier.clone(),
            identity.clone(),
        ));
        let revisions = Arc::new(crate::services::revisions::RevisionService::new(
            db_pool,
            event_sender,
            notifier,
            identity.clone(),
        ));

        Self {
            orders,
            negotiations,
            production,
            revisions,
            identity,
        }
    }
}

/// Resolves the authenticated user into their workflow capabilities.
pub(crate) async fn resolve_caller(
    state: &AppState,
    auth_user: &AuthUser,
) -> Result<Caller, ServiceError> {
    state.services.identity.resolve(auth_user).await
}
