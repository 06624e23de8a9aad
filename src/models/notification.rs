//! Notification model: the inbox record shared by the lending and friendship engines

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;

use super::{book::Book, user::User};

/// Notification type. Stored and serialized as SCREAMING_SNAKE_CASE text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    FriendRequest,
    BookRequest,
    BookApproved,
    BookReturned,
    OverdueReminder,
    DueSoonReminder,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::FriendRequest => "FRIEND_REQUEST",
            NotificationKind::BookRequest => "BOOK_REQUEST",
            NotificationKind::BookApproved => "BOOK_APPROVED",
            NotificationKind::BookReturned => "BOOK_RETURNED",
            NotificationKind::OverdueReminder => "OVERDUE_REMINDER",
            NotificationKind::DueSoonReminder => "DUE_SOON_REMINDER",
        }
    }

    /// Action-class kinds are hard-deleted once the receiver acts on them
    pub fn is_action(&self) -> bool {
        matches!(
            self,
            NotificationKind::FriendRequest | NotificationKind::BookRequest
        )
    }

    /// Everything that is not action-class is resolved by the read flag
    pub fn is_dismissable(&self) -> bool {
        !self.is_action()
    }

    /// Kinds subject to the single-active-reminder rule
    pub fn is_reminder(&self) -> bool {
        matches!(
            self,
            NotificationKind::OverdueReminder | NotificationKind::DueSoonReminder
        )
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FRIEND_REQUEST" => Ok(NotificationKind::FriendRequest),
            "BOOK_REQUEST" => Ok(NotificationKind::BookRequest),
            "BOOK_APPROVED" => Ok(NotificationKind::BookApproved),
            "BOOK_RETURNED" => Ok(NotificationKind::BookReturned),
            "OVERDUE_REMINDER" => Ok(NotificationKind::OverdueReminder),
            "DUE_SOON_REMINDER" => Ok(NotificationKind::DueSoonReminder),
            _ => Err(format!("Invalid notification type: {}", s)),
        }
    }
}

// SQLx conversion for NotificationKind
impl sqlx::Type<Postgres> for NotificationKind {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for NotificationKind {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for NotificationKind {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Persisted notification.
///
/// `sender_name` and `book_title` are snapshots taken when the event happened,
/// so old notifications still read correctly after a rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i32,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: NotificationKind,
    pub sender_id: i32,
    pub receiver_id: i32,
    pub sender_name: String,
    pub book_id: Option<i32>,
    pub book_title: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields of a notification about to be recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub kind: NotificationKind,
    pub sender_id: i32,
    pub receiver_id: i32,
    pub sender_name: String,
    pub book_id: Option<i32>,
    pub book_title: Option<String>,
}

impl NewNotification {
    fn about_book(kind: NotificationKind, sender: &User, receiver_id: i32, book: &Book) -> Self {
        Self {
            kind,
            sender_id: sender.id,
            receiver_id,
            sender_name: sender.display_name.clone(),
            book_id: Some(book.id),
            book_title: Some(book.title.clone()),
        }
    }

    pub fn friend_request(sender: &User, receiver_id: i32) -> Self {
        Self {
            kind: NotificationKind::FriendRequest,
            sender_id: sender.id,
            receiver_id,
            sender_name: sender.display_name.clone(),
            book_id: None,
            book_title: None,
        }
    }

    /// Request from `requester` addressed to the book's owner
    pub fn book_request(requester: &User, book: &Book) -> Self {
        Self::about_book(NotificationKind::BookRequest, requester, book.owner_id, book)
    }

    pub fn book_approved(owner: &User, borrower_id: i32, book: &Book) -> Self {
        Self::about_book(NotificationKind::BookApproved, owner, borrower_id, book)
    }

    pub fn book_returned(actor: &User, receiver_id: i32, book: &Book) -> Self {
        Self::about_book(NotificationKind::BookReturned, actor, receiver_id, book)
    }

    /// Reminder sent on the owner's behalf to the current borrower
    pub fn reminder(kind: NotificationKind, owner: &User, borrower_id: i32, book: &Book) -> Self {
        Self::about_book(kind, owner, borrower_id, book)
    }
}

/// Outcome of resolving a notification-backed request.
///
/// Resolving something that is already gone is not an error: two racing
/// resolutions must not surface a failure to the slower one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    Applied(T),
    AlreadyResolved,
}

impl<T> Resolution<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Resolution::Applied(_))
    }

    pub fn status(&self) -> &'static str {
        match self {
            Resolution::Applied(_) => "applied",
            Resolution::AlreadyResolved => "already_resolved",
        }
    }
}
