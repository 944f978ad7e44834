use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Loomline API",
        version = "1.0.0",
        description = r#"
Backend for a textile B2B marketplace.

Customers place orders against manufacturer collections, negotiate price,
lead time and quantity through offers and counter-offers, approve production
plans before manufacturing starts, and track staged production progress.
Formal change requests flow through revision requests with an audited
approval timeline.

All endpoints under `/api/v1` require a bearer JWT:

```
Authorization: Bearer <token>
```
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Orders", description = "Order lifecycle"),
        (name = "Negotiations", description = "Offer and counter-offer workflow"),
        (name = "Production", description = "Plan approval and staged manufacturing"),
        (name = "Revisions", description = "Formal change requests")
    ),
    paths(
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::create_order,
        crate::handlers::orders::cancel_order,
        crate::handlers::orders::ship_order,
        crate::handlers::orders::deliver_order,
        crate::handlers::negotiations::send_offer,
        crate::handlers::negotiations::list_negotiations,
        crate::handlers::negotiations::accept_offer,
        crate::handlers::negotiations::reject_offer,
        crate::handlers::production::create_tracking,
        crate::handlers::production::get_tracking,
        crate::handlers::production::send_plan,
        crate::handlers::production::decide_plan,
        crate::handlers::production::update_stage,
        crate::handlers::production::list_stage_updates,
        crate::handlers::revisions::create_revision,
        crate::handlers::revisions::get_revision,
        crate::handlers::revisions::submit_revision,
        crate::handlers::revisions::decide_revision,
        crate::handlers::revisions::implement_revision,
        crate::handlers::revisions::list_timeline,
    ),
    components(schemas(
        crate::handlers::orders::CreateOrderPayload,
        crate::handlers::orders::CancelOrderPayload,
        crate::handlers::negotiations::SendOfferPayload,
        crate::handlers::production::CreateTrackingPayload,
        crate::handlers::production::SendPlanPayload,
        crate::handlers::production::PlanDecisionPayload,
        crate::handlers::production::StageUpdatePayload,
        crate::handlers::revisions::CreateRevisionPayload,
        crate::handlers::revisions::RevisionCommentPayload,
        crate::handlers::revisions::RevisionDecisionPayload,
    ))
)]
pub struct ApiDoc;

/// Swagger UI plus the generated OpenAPI document.
pub fn swagger_router() -> Router<AppState> {
    SwaggerUi::new("/docs")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_contains_core_paths() {
        let doc = ApiDoc::openapi();
        let paths = doc.paths.paths;
        assert!(paths.contains_key("/api/v1/orders"));
        assert!(paths.contains_key("/api/v1/negotiations/{id}/accept"));
        assert!(paths.contains_key("/api/v1/production/{id}/plan/decision"));
        assert!(paths.contains_key("/api/v1/revisions/{id}/timeline"));
    }

    #[test]
    fn every_request_body_payload_is_a_component() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        for schema in [
            "SendOfferPayload",
            "StageUpdatePayload",
            "CreateRevisionPayload",
        ] {
            assert!(components.schemas.contains_key(schema), "missing {schema}");
        }
    }
}
