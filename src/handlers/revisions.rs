use crate::{
    auth::AuthUser,
    entities::revision_request::RevisionType,
    entities::revision_timeline::Model as TimelineModel,
    services::revisions::{CreateRevisionRequest, RevisionDecisionRequest, RevisionResponse},
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
pub struct CreateRevisionPayload {
    pub title: String,
    pub description: String,
    pub revision_type: RevisionType,
    pub order_id: Option<Uuid>,
    pub sample_id: Option<Uuid>,
    pub production_tracking_id: Option<Uuid>,
    pub negotiation_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub estimated_cost_impact: Option<Decimal>,
    pub estimated_time_impact_days: Option<i32>,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct RevisionCommentPayload {
    pub comments: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RevisionDecisionPayload {
    pub approve: bool,
    pub comments: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/revisions",
    request_body = CreateRevisionPayload,
    responses(
        (status = 200, description = "Revision request created"),
        (status = 400, description = "No linked entity given")
    ),
    tag = "Revisions"
)]
pub async fn create_revision(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateRevisionPayload>,
) -> ApiResult<RevisionResponse> {
    let caller = super::resolve_caller(&state, &auth_user).await?;
    let revision = state
        .services
        .revisions
        .create_revision(
            &caller,
            CreateRevisionRequest {
                title: payload.title,
                description: payload.description,
                revision_type: payload.revision_type,
                order_id: payload.order_id,
                sample_id: payload.sample_id,
                production_tracking_id: payload.production_tracking_id,
                negotiation_id: payload.negotiation_id,
                assigned_to: payload.assigned_to,
                estimated_cost_impact: payload.estimated_cost_impact,
                estimated_time_impact_days: payload.estimated_time_impact_days,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(revision)))
}

#[utoipa::path(
    get,
    path = "/api/v1/revisions/{id}",
    responses((status = 200, description = "Revision detail")),
    tag = "Revisions"
)]
pub async fn get_revision(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<RevisionResponse> {
    let caller = super::resolve_caller(&state, &auth_user).await?;
    let revision = state.services.revisions.get_revision(&caller, id).await?;
    Ok(Json(ApiResponse::success(revision)))
}

#[utoipa::path(
    post,
    path = "/api/v1/revisions/{id}/submit",
    request_body = RevisionCommentPayload,
    responses(
        (status = 200, description = "Revision submitted for review"),
        (status = 409, description = "Revision cannot be submitted from its current status")
    ),
    tag = "Revisions"
)]
pub async fn submit_revision(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RevisionCommentPayload>,
) -> ApiResult<RevisionResponse> {
    let caller = super::resolve_caller(&state, &auth_user).await?;
    let revision = state
        .services
        .revisions
        .submit_revision(&caller, id, payload.comments)
        .await?;
    Ok(Json(ApiResponse::success(revision)))
}

#[utoipa::path(
    post,
    path = "/api/v1/revisions/{id}/decision",
    request_body = RevisionDecisionPayload,
    responses(
        (status = 200, description = "Decision recorded"),
        (status = 403, description = "Requester cannot decide on their own revision")
    ),
    tag = "Revisions"
)]
pub async fn decide_revision(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RevisionDecisionPayload>,
) -> ApiResult<RevisionResponse> {
    let caller = super::resolve_caller(&state, &auth_user).await?;
    let revision = state
        .services
        .revisions
        .decide_revision(
            &caller,
            id,
            RevisionDecisionRequest {
                approve: payload.approve,
                comments: payload.comments,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(revision)))
}

#[utoipa::path(
    post,
    path = "/api/v1/revisions/{id}/implement",
    request_body = RevisionCommentPayload,
    responses(
        (status = 200, description = "Revision implemented"),
        (status = 409, description = "Revision is not in progress")
    ),
    tag = "Revisions"
)]
pub async fn implement_revision(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RevisionCommentPayload>,
) -> ApiResult<RevisionResponse> {
    let caller = super::resolve_caller(&state, &auth_user).await?;
    let revision = state
        .services
        .revisions
        .implement_revision(&caller, id, payload.comments)
        .await?;
    Ok(Json(ApiResponse::success(revision)))
}

#[utoipa::path(
    get,
    path = "/api/v1/revisions/{id}/timeline",
    responses((status = 200, description = "Audit timeline, oldest first")),
    tag = "Revisions"
)]
pub async fn list_timeline(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<TimelineModel>> {
    let caller = super::resolve_caller(&state, &auth_user).await?;
    let timeline = state.services.revisions.list_timeline(&caller, id).await?;
    Ok(Json(ApiResponse::success(timeline)))
}
