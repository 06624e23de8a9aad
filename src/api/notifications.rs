//! Inbox endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{error::AppResult, models::Notification};

use super::{AuthenticatedUser, ResolutionResponse};

#[derive(Serialize, ToSchema)]
pub struct UnreadCountResponse {
    pub unread: usize,
}

/// List the current user's notifications, newest first
#[utoipa::path(
    get,
    path = "/notifications",
    tag = "notifications",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Notifications", body = Vec<Notification>)
    )
)]
pub async fn list_notifications(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Notification>>> {
    let list = state
        .services
        .notifications
        .list_for_user(claims.user_id)
        .await?;
    Ok(Json(list))
}

#[utoipa::path(
    get,
    path = "/notifications/unread-count",
    tag = "notifications",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Unread notifications", body = UnreadCountResponse)
    )
)]
pub async fn unread_count(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<UnreadCountResponse>> {
    let unread = state
        .services
        .notifications
        .unread_count(claims.user_id)
        .await?;
    Ok(Json(UnreadCountResponse { unread }))
}

/// Mark an informational or reminder notification as read
#[utoipa::path(
    post,
    path = "/notifications/{id}/dismiss",
    tag = "notifications",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Dismissed or already gone", body = ResolutionResponse),
        (status = 409, description = "Requests must be accepted or declined")
    )
)]
pub async fn dismiss_notification(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ResolutionResponse>> {
    let resolution = state
        .services
        .notifications
        .dismiss(id, claims.user_id)
        .await?;
    Ok(Json(ResolutionResponse::from(&resolution)))
}

/// Delete a request notification without acting on it
#[utoipa::path(
    delete,
    path = "/notifications/{id}",
    tag = "notifications",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Resolved or already gone", body = ResolutionResponse),
        (status = 409, description = "Informational notifications are dismissed instead")
    )
)]
pub async fn resolve_notification(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ResolutionResponse>> {
    let resolution = state
        .services
        .notifications
        .resolve(id, claims.user_id)
        .await?;
    Ok(Json(ResolutionResponse::from(&resolution)))
}
