//! Directory store: durable record of users, books, friendships and notifications
//!
//! Every method is atomic on its own. The multi-step invariants of the
//! workflow (single borrower, single pending friend request, single unread
//! reminder) are closed here with conditional updates and uniqueness checks
//! rather than by read-then-write sequences in the services.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppResult,
    models::{
        Book, FriendPair, Friendship, NewNotification, Notification, NotificationKind, User,
    },
};

pub use memory::MemoryDirectory;
pub use postgres::PgDirectory;

/// Result of [`DirectoryStore::lend_book`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LendOutcome {
    Lent(Book),
    /// The request was declined, resolved or never matched this loan
    RequestGone,
    /// The book is missing or already lent
    BookUnavailable,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Cheap round trip used by the readiness probe
    async fn ping(&self) -> AppResult<()>;

    async fn get_user(&self, id: i32) -> AppResult<Option<User>>;

    /// Case-insensitive lookup
    async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn get_user_by_share_token(&self, token: &str) -> AppResult<Option<User>>;

    /// Returns false when the user does not exist
    async fn set_share_token(&self, user_id: i32, token: Option<String>) -> AppResult<bool>;

    async fn get_book(&self, id: i32) -> AppResult<Option<Book>>;

    async fn list_books_by_owner(&self, owner_id: i32) -> AppResult<Vec<Book>>;

    async fn list_books_borrowed_by(&self, borrower_id: i32) -> AppResult<Vec<Book>>;

    /// Every book currently in the lent state
    async fn list_lent_books(&self) -> AppResult<Vec<Book>>;

    /// Lend `book_id` to `borrower_id` and consume the BOOK_REQUEST
    /// `request_id` in one unit of work. Both conditions are checked inside
    /// it: the request must still exist for this book and borrower, and the
    /// book must still be available. Nothing changes unless the outcome is
    /// [`LendOutcome::Lent`].
    async fn lend_book(
        &self,
        book_id: i32,
        borrower_id: i32,
        due_date: DateTime<Utc>,
        request_id: i32,
    ) -> AppResult<LendOutcome>;

    /// Clear the loan of `book_id` only if it is lent. Returns the book as it
    /// was before the return, or `None` if it was not lent.
    async fn return_book(&self, book_id: i32) -> AppResult<Option<Book>>;

    /// Insert a notification. Returns `None` when a uniqueness rule rejects
    /// it (pending friend request for the pair, pending book request from the
    /// same requester, unread reminder of the same type).
    async fn create_notification(&self, notification: &NewNotification)
        -> AppResult<Option<Notification>>;

    async fn get_notification(&self, id: i32) -> AppResult<Option<Notification>>;

    /// Returns false when nothing was deleted
    async fn delete_notification(&self, id: i32) -> AppResult<bool>;

    /// Returns false when the notification does not exist
    async fn mark_notification_read(&self, id: i32) -> AppResult<bool>;

    /// Mark every unread reminder about `book_id` as read
    async fn mark_book_reminders_read(&self, book_id: i32) -> AppResult<u64>;

    /// Notifications addressed to `receiver_id`, newest first
    async fn list_notifications(&self, receiver_id: i32) -> AppResult<Vec<Notification>>;

    /// Pending friend request between the two users, in either direction
    async fn find_friend_request(&self, a: i32, b: i32) -> AppResult<Option<Notification>>;

    async fn find_unread_reminder(
        &self,
        book_id: i32,
        receiver_id: i32,
        kind: NotificationKind,
    ) -> AppResult<Option<Notification>>;

    async fn are_friends(&self, pair: FriendPair) -> AppResult<bool>;

    async fn list_friends(&self, user_id: i32) -> AppResult<Vec<User>>;

    /// Delete the friend request `request_id` and store the edge for `pair`
    /// in one unit of work. Returns `None` if the request was already gone.
    async fn create_friendship(
        &self,
        request_id: i32,
        pair: FriendPair,
    ) -> AppResult<Option<Friendship>>;
}
