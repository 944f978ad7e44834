use crate::{
    auth::AuthUser,
    entities::negotiation::SenderRole,
    services::negotiations::{NegotiationResponse, SendOfferRequest},
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, State},
    response::Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendOfferPayload {
    pub unit_price: Decimal,
    pub production_days: i32,
    pub quantity: Option<i32>,
    pub message: Option<String>,
    pub sender_role: Option<SenderRole>,
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/negotiations",
    request_body = SendOfferPayload,
    responses(
        (status = 200, description = "Offer sent, superseding any pending offer"),
        (status = 409, description = "Order is not open for offers")
    ),
    tag = "Negotiations"
)]
pub async fn send_offer(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<SendOfferPayload>,
) -> ApiResult<NegotiationResponse> {
    let caller = super::resolve_caller(&state, &auth_user).await?;
    let negotiation = state
        .services
        .negotiations
        .send_offer(
            &caller,
            order_id,
            SendOfferRequest {
                unit_price: payload.unit_price,
                production_days: payload.production_days,
                quantity: payload.quantity,
                message: payload.message,
                sender_role: payload.sender_role,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(negotiation)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/negotiations",
    responses((status = 200, description = "Offer history, oldest first")),
    tag = "Negotiations"
)]
pub async fn list_negotiations(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Vec<NegotiationResponse>> {
    let caller = super::resolve_caller(&state, &auth_user).await?;
    let negotiations = state
        .services
        .negotiations
        .list_negotiations(&caller, order_id)
        .await?;
    Ok(Json(ApiResponse::success(negotiations)))
}

#[utoipa::path(
    post,
    path = "/api/v1/negotiations/{id}/accept",
    responses(
        (status = 200, description = "Offer accepted, order confirmed"),
        (status = 409, description = "Offer already responded to")
    ),
    tag = "Negotiations"
)]
pub async fn accept_offer(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<NegotiationResponse> {
    let caller = super::resolve_caller(&state, &auth_user).await?;
    let negotiation = state.services.negotiations.accept_offer(&caller, id).await?;
    Ok(Json(ApiResponse::success(negotiation)))
}

#[utoipa::path(
    post,
    path = "/api/v1/negotiations/{id}/reject",
    responses(
        (status = 200, description = "Offer rejected, order reopened"),
        (status = 409, description = "Offer already responded to")
    ),
    tag = "Negotiations"
)]
pub async fn reject_offer(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<NegotiationResponse> {
    let caller = super::resolve_caller(&state, &auth_user).await?;
    let negotiation = state.services.negotiations.reject_offer(&caller, id).await?;
    Ok(Json(ApiResponse::success(negotiation)))
}
