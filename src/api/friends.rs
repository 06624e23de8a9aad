//! Friendship endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::AppResult,
    models::{Friendship, FriendshipStatus, Notification, Resolution, UserRef, UserShort},
};

use super::{AuthenticatedUser, ResolutionResponse};

/// Send friend request body
#[derive(Deserialize, Validate, ToSchema)]
pub struct FriendRequestBody {
    /// User id or email address of the person to befriend
    #[validate(length(min = 1, max = 320, message = "Target must not be empty"))]
    pub target: String,
}

#[derive(Serialize, ToSchema)]
pub struct AcceptResponse {
    pub status: String,
    pub friendship: Option<Friendship>,
}

#[derive(Serialize, ToSchema)]
pub struct FriendshipStatusResponse {
    pub user_id: i32,
    pub status: FriendshipStatus,
}

/// List the current user's friends
#[utoipa::path(
    get,
    path = "/friends",
    tag = "friends",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Friends", body = Vec<UserShort>)
    )
)]
pub async fn list_friends(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<UserShort>>> {
    let friends = state.services.friendship.list_friends(claims.user_id).await?;
    Ok(Json(friends.iter().map(UserShort::from).collect()))
}

/// Where the current user stands with another user
#[utoipa::path(
    get,
    path = "/friends/status/{user_id}",
    tag = "friends",
    security(("bearer_auth" = [])),
    params(("user_id" = i32, Path, description = "Other user ID")),
    responses(
        (status = 200, description = "Relationship state", body = FriendshipStatusResponse)
    )
)]
pub async fn friendship_status(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(user_id): Path<i32>,
) -> AppResult<Json<FriendshipStatusResponse>> {
    let status = state
        .services
        .friendship
        .friendship_status(claims.user_id, user_id)
        .await?;
    Ok(Json(FriendshipStatusResponse { user_id, status }))
}

/// Send a friend request
#[utoipa::path(
    post,
    path = "/friends/requests",
    tag = "friends",
    security(("bearer_auth" = [])),
    request_body = FriendRequestBody,
    responses(
        (status = 201, description = "Request sent", body = Notification),
        (status = 404, description = "No such user"),
        (status = 409, description = "Already friends or request pending")
    )
)]
pub async fn send_friend_request(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(body): Json<FriendRequestBody>,
) -> AppResult<(StatusCode, Json<Notification>)> {
    body.validate()?;
    let target: UserRef = body.target.parse()?;

    let notification = state
        .services
        .friendship
        .send_friend_request(claims.user_id, &target)
        .await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

/// Accept a friend request addressed to the current user
#[utoipa::path(
    post,
    path = "/friends/requests/{id}/accept",
    tag = "friends",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Accepted or already resolved", body = AcceptResponse),
        (status = 403, description = "Not addressed to the current user")
    )
)]
pub async fn accept_friend_request(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<AcceptResponse>> {
    let resolution = state
        .services
        .friendship
        .accept_friend_request(id, claims.user_id)
        .await?;
    let status = resolution.status().to_string();
    let friendship = match resolution {
        Resolution::Applied(friendship) => Some(friendship),
        Resolution::AlreadyResolved => None,
    };
    Ok(Json(AcceptResponse { status, friendship }))
}

/// Decline a friend request addressed to the current user
#[utoipa::path(
    post,
    path = "/friends/requests/{id}/decline",
    tag = "friends",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Declined or already resolved", body = ResolutionResponse)
    )
)]
pub async fn decline_friend_request(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ResolutionResponse>> {
    let resolution = state
        .services
        .friendship
        .decline_friend_request(id, claims.user_id)
        .await?;
    Ok(Json(ResolutionResponse::from(&resolution)))
}
