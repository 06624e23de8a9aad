//! API handlers for the Shelfshare REST endpoints

pub mod books;
pub mod friends;
pub mod health;
pub mod notifications;
pub mod openapi;
pub mod reminders;
pub mod shared;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{delete, get, post},
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::ToSchema;

use crate::{error::AppError, models::{Resolution, UserClaims}, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Outcome of accepting, approving or declining a request
#[derive(Serialize, ToSchema)]
pub struct ResolutionResponse {
    /// `applied` or `already_resolved`
    pub status: String,
}

impl<T> From<&Resolution<T>> for ResolutionResponse {
    fn from(resolution: &Resolution<T>) -> Self {
        Self {
            status: resolution.status().to_string(),
        }
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Friendships
        .route("/friends", get(friends::list_friends))
        .route("/friends/status/:user_id", get(friends::friendship_status))
        .route("/friends/requests", post(friends::send_friend_request))
        .route("/friends/requests/:id/accept", post(friends::accept_friend_request))
        .route("/friends/requests/:id/decline", post(friends::decline_friend_request))
        // Lending
        .route("/books/borrowed", get(books::list_borrowed))
        .route("/books/lent", get(books::list_lent))
        .route("/books/:id/request", post(books::request_book))
        .route("/books/:id/return", post(books::return_book))
        .route("/books/requests/:id/approve", post(books::approve_book_request))
        .route("/books/requests/:id/decline", post(books::decline_book_request))
        // Inbox
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/:id/dismiss", post(notifications::dismiss_notification))
        .route("/notifications/:id", delete(notifications::resolve_notification))
        // Scheduler trigger
        .route("/cron/reminders", get(reminders::run_reminders))
        // Share links
        .route(
            "/users/me/share-token",
            post(shared::rotate_share_token).delete(shared::revoke_share_token),
        )
        .route("/shared/:token", get(shared::shared_library))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
