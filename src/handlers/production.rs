use crate::{
    auth::AuthUser,
    entities::production_stage_update::{Model as StageUpdateModel, StageStatus},
    entities::production_tracking::{OwnedBy, ProductionStage},
    errors::ServiceError,
    services::production::{
        CreateTrackingRequest, PlanDecisionRequest, SendPlanRequest, StageUpdateRequest,
        TrackingResponse,
    },
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Wire shape for tracking creation. Exactly one of the two ids must be
/// given; it is folded into the owner union before touching the service.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTrackingPayload {
    pub order_id: Option<Uuid>,
    pub sample_id: Option<Uuid>,
}

impl CreateTrackingPayload {
    fn owned_by(&self) -> Result<OwnedBy, ServiceError> {
        match (self.order_id, self.sample_id) {
            (Some(order_id), None) => Ok(OwnedBy::Order(order_id)),
            (None, Some(sample_id)) => Ok(OwnedBy::Sample(sample_id)),
            _ => Err(ServiceError::ValidationError(
                "Exactly one of order_id or sample_id must be provided".into(),
            )),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendPlanPayload {
    pub plan_notes: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PlanDecisionPayload {
    pub approve: bool,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StageUpdatePayload {
    pub stage: ProductionStage,
    pub status: StageStatus,
    pub note: Option<String>,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
    pub delay_reason: Option<String>,
    pub extra_days: Option<i32>,
}

#[utoipa::path(
    post,
    path = "/api/v1/production",
    request_body = CreateTrackingPayload,
    responses(
        (status = 200, description = "Tracking record created"),
        (status = 409, description = "Tracking already exists for this entity")
    ),
    tag = "Production"
)]
pub async fn create_tracking(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateTrackingPayload>,
) -> ApiResult<TrackingResponse> {
    let caller = super::resolve_caller(&state, &auth_user).await?;
    let owned_by = payload.owned_by()?;
    let tracking = state
        .services
        .production
        .create_tracking(&caller, CreateTrackingRequest { owned_by })
        .await?;
    Ok(Json(ApiResponse::success(tracking)))
}

#[utoipa::path(
    get,
    path = "/api/v1/production/{id}",
    responses((status = 200, description = "Tracking detail")),
    tag = "Production"
)]
pub async fn get_tracking(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<TrackingResponse> {
    let caller = super::resolve_caller(&state, &auth_user).await?;
    let tracking = state.services.production.get_tracking(&caller, id).await?;
    Ok(Json(ApiResponse::success(tracking)))
}

#[utoipa::path(
    post,
    path = "/api/v1/production/{id}/plan",
    request_body = SendPlanPayload,
    responses(
        (status = 200, description = "Plan sent for customer approval"),
        (status = 409, description = "Plan is not in a sendable state")
    ),
    tag = "Production"
)]
pub async fn send_plan(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SendPlanPayload>,
) -> ApiResult<TrackingResponse> {
    let caller = super::resolve_caller(&state, &auth_user).await?;
    let tracking = state
        .services
        .production
        .send_production_plan(
            &caller,
            id,
            SendPlanRequest {
                plan_notes: payload.plan_notes,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(tracking)))
}

#[utoipa::path(
    post,
    path = "/api/v1/production/{id}/plan/decision",
    request_body = PlanDecisionPayload,
    responses(
        (status = 200, description = "Decision recorded"),
        (status = 409, description = "Plan is not awaiting a decision")
    ),
    tag = "Production"
)]
pub async fn decide_plan(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<PlanDecisionPayload>,
) -> ApiResult<TrackingResponse> {
    let caller = super::resolve_caller(&state, &auth_user).await?;
    let tracking = state
        .services
        .production
        .respond_to_production_plan(
            &caller,
            id,
            PlanDecisionRequest {
                approve: payload.approve,
                rejection_reason: payload.rejection_reason,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(tracking)))
}

#[utoipa::path(
    post,
    path = "/api/v1/production/{id}/stages",
    request_body = StageUpdatePayload,
    responses(
        (status = 200, description = "Stage update recorded"),
        (status = 409, description = "Plan not approved for manufacturing stages")
    ),
    tag = "Production"
)]
pub async fn update_stage(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<StageUpdatePayload>,
) -> ApiResult<TrackingResponse> {
    let caller = super::resolve_caller(&state, &auth_user).await?;
    let tracking = state
        .services
        .production
        .update_production_stage(
            &caller,
            id,
            StageUpdateRequest {
                stage: payload.stage,
                status: payload.status,
                note: payload.note,
                actual_start: payload.actual_start,
                actual_end: payload.actual_end,
                delay_reason: payload.delay_reason,
                extra_days: payload.extra_days,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(tracking)))
}

#[utoipa::path(
    get,
    path = "/api/v1/production/{id}/stages",
    responses((status = 200, description = "Stage update history, oldest first")),
    tag = "Production"
)]
pub async fn list_stage_updates(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<StageUpdateModel>> {
    let caller = super::resolve_caller(&state, &auth_user).await?;
    let updates = state
        .services
        .production
        .list_stage_updates(&caller, id)
        .await?;
    Ok(Json(ApiResponse::success(updates)))
}
