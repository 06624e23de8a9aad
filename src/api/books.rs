//! Lending endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{BookView, Notification, Resolution},
};

use super::{AuthenticatedUser, ResolutionResponse};

/// Approval outcome with the lent book
#[derive(Serialize, ToSchema)]
pub struct ApproveResponse {
    pub status: String,
    pub book: Option<BookView>,
}

/// List books the current user has borrowed
#[utoipa::path(
    get,
    path = "/books/borrowed",
    tag = "lending",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Borrowed books", body = Vec<BookView>)
    )
)]
pub async fn list_borrowed(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BookView>>> {
    let books = state.services.lending.borrowed_by(claims.user_id).await?;
    Ok(Json(books.iter().map(BookView::from).collect()))
}

/// List the current user's books that are lent out
#[utoipa::path(
    get,
    path = "/books/lent",
    tag = "lending",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Lent books", body = Vec<BookView>)
    )
)]
pub async fn list_lent(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BookView>>> {
    let books = state.services.lending.lent_out(claims.user_id).await?;
    Ok(Json(books.iter().map(BookView::from).collect()))
}

/// Ask to borrow a friend's book
#[utoipa::path(
    post,
    path = "/books/{id}/request",
    tag = "lending",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 201, description = "Request sent to the owner", body = Notification),
        (status = 403, description = "Not a friend of the owner"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Book lent, own book, or request pending")
    )
)]
pub async fn request_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(book_id): Path<i32>,
) -> AppResult<(StatusCode, Json<Notification>)> {
    let notification = state
        .services
        .lending
        .request_book(book_id, claims.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

/// Approve a borrow request addressed to the current user
#[utoipa::path(
    post,
    path = "/books/requests/{id}/approve",
    tag = "lending",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Lent or already resolved", body = ApproveResponse),
        (status = 409, description = "Book was lent in the meantime")
    )
)]
pub async fn approve_book_request(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ApproveResponse>> {
    let resolution = state
        .services
        .lending
        .approve_book_request(id, claims.user_id)
        .await?;
    let status = resolution.status().to_string();
    let book = match resolution {
        Resolution::Applied(book) => Some(BookView::from(&book)),
        Resolution::AlreadyResolved => None,
    };
    Ok(Json(ApproveResponse { status, book }))
}

/// Decline a borrow request addressed to the current user
#[utoipa::path(
    post,
    path = "/books/requests/{id}/decline",
    tag = "lending",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Declined or already resolved", body = ResolutionResponse)
    )
)]
pub async fn decline_book_request(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ResolutionResponse>> {
    let resolution = state
        .services
        .lending
        .decline_book_request(id, claims.user_id)
        .await?;
    Ok(Json(ResolutionResponse::from(&resolution)))
}

/// Mark a lent book as returned (owner or borrower)
#[utoipa::path(
    post,
    path = "/books/{id}/return",
    tag = "lending",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book returned", body = BookView),
        (status = 409, description = "Book is not lent out")
    )
)]
pub async fn return_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(book_id): Path<i32>,
) -> AppResult<Json<BookView>> {
    let book = state
        .services
        .lending
        .return_book(book_id, claims.user_id)
        .await?;
    Ok(Json(BookView::from(&book)))
}
