use crate::{
    auth::AuthUser,
    services::orders::{CreateOrderRequest, OrderResponse},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct OrderListQuery {
    /// Page number (1-indexed)
    pub page: Option<u64>,
    /// Page size (max 100)
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderPayload {
    pub collection_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub currency: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct CancelOrderPayload {
    pub reason: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderPayload,
    responses(
        (status = 200, description = "Order created"),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Caller may not place orders")
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateOrderPayload>,
) -> ApiResult<OrderResponse> {
    let caller = super::resolve_caller(&state, &auth_user).await?;
    let order = state
        .services
        .orders
        .create_order(
            &caller,
            CreateOrderRequest {
                collection_id: payload.collection_id,
                customer_id: payload.customer_id,
                quantity: payload.quantity,
                unit_price: payload.unit_price,
                currency: payload.currency,
                notes: payload.notes,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    responses((status = 200, description = "Orders visible to the caller")),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> ApiResult<PaginatedResponse<OrderResponse>> {
    let caller = super::resolve_caller(&state, &auth_user).await?;
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let (items, total) = state.services.orders.list_orders(&caller, page, limit).await?;
    let total_pages = (total + limit - 1) / limit;
    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page,
        limit,
        total_pages,
    })))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    responses(
        (status = 200, description = "Order detail"),
        (status = 404, description = "Order not found")
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderResponse> {
    let caller = super::resolve_caller(&state, &auth_user).await?;
    let order = state.services.orders.get_order(&caller, id).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/cancel",
    request_body = CancelOrderPayload,
    responses(
        (status = 200, description = "Order cancelled"),
        (status = 409, description = "Order already in production")
    ),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelOrderPayload>,
) -> ApiResult<OrderResponse> {
    let caller = super::resolve_caller(&state, &auth_user).await?;
    let order = state
        .services
        .orders
        .cancel_order(&caller, id, payload.reason)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/ship",
    responses((status = 200, description = "Order marked shipped")),
    tag = "Orders"
)]
pub async fn ship_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderResponse> {
    let caller = super::resolve_caller(&state, &auth_user).await?;
    let order = state.services.orders.mark_shipped(&caller, id).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/deliver",
    responses((status = 200, description = "Order marked delivered")),
    tag = "Orders"
)]
pub async fn deliver_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderResponse> {
    let caller = super::resolve_caller(&state, &auth_user).await?;
    let order = state.services.orders.mark_delivered(&caller, id).await?;
    Ok(Json(ApiResponse::success(order)))
}
