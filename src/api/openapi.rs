//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, friends, health, notifications, reminders, shared};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Shelfshare API",
        version = "1.0.0",
        description = "Lend books to friends: friendships, borrow requests, returns and reminders"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Friends
        friends::list_friends,
        friends::friendship_status,
        friends::send_friend_request,
        friends::accept_friend_request,
        friends::decline_friend_request,
        // Lending
        books::list_borrowed,
        books::list_lent,
        books::request_book,
        books::approve_book_request,
        books::decline_book_request,
        books::return_book,
        // Notifications
        notifications::list_notifications,
        notifications::unread_count,
        notifications::dismiss_notification,
        notifications::resolve_notification,
        // Reminders
        reminders::run_reminders,
        // Sharing
        shared::rotate_share_token,
        shared::revoke_share_token,
        shared::shared_library,
    ),
    components(
        schemas(
            // Users
            crate::models::User,
            crate::models::UserShort,
            // Friends
            crate::models::Friendship,
            crate::models::FriendshipStatus,
            friends::FriendRequestBody,
            friends::AcceptResponse,
            friends::FriendshipStatusResponse,
            // Lending
            crate::models::BookView,
            crate::models::BookStatus,
            books::ApproveResponse,
            // Notifications
            crate::models::Notification,
            crate::models::NotificationKind,
            notifications::UnreadCountResponse,
            crate::api::ResolutionResponse,
            // Reminders
            crate::services::reminders::ScanReport,
            // Sharing
            shared::ShareTokenResponse,
            crate::services::users::SharedLibrary,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "friends", description = "Friend requests and friendships"),
        (name = "lending", description = "Borrow requests, loans and returns"),
        (name = "notifications", description = "Per-user inbox"),
        (name = "reminders", description = "Due-date reminder sweep"),
        (name = "sharing", description = "Public read-only shelf links")
    )
)]
pub struct ApiDoc;

/// Register the JWT bearer scheme referenced by `security(("bearer_auth" = []))`
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
