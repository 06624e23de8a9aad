//! Share-link endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{error::AppResult, services::users::SharedLibrary};

use super::AuthenticatedUser;

#[derive(Serialize, ToSchema)]
pub struct ShareTokenResponse {
    pub token: String,
}

/// Issue a new share link for the current user's shelf
#[utoipa::path(
    post,
    path = "/users/me/share-token",
    tag = "sharing",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "New token; the previous link stops working", body = ShareTokenResponse)
    )
)]
pub async fn rotate_share_token(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<ShareTokenResponse>> {
    let token = state.services.users.rotate_share_token(claims.user_id).await?;
    Ok(Json(ShareTokenResponse { token }))
}

/// Disable the current user's share link
#[utoipa::path(
    delete,
    path = "/users/me/share-token",
    tag = "sharing",
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Share link disabled")
    )
)]
pub async fn revoke_share_token(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<StatusCode> {
    state.services.users.revoke_share_token(claims.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Anonymous read access to a shelf
#[utoipa::path(
    get,
    path = "/shared/{token}",
    tag = "sharing",
    params(("token" = String, Path, description = "Share token")),
    responses(
        (status = 200, description = "Owner and books", body = SharedLibrary),
        (status = 404, description = "Unknown share link")
    )
)]
pub async fn shared_library(
    State(state): State<crate::AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<SharedLibrary>> {
    let library = state.services.users.shared_library(&token).await?;
    Ok(Json(library))
}
