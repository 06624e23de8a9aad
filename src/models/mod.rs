//! Data models for Shelfshare

pub mod book;
pub mod friendship;
pub mod notification;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookStatus, BookView, Loan};
pub use friendship::{FriendPair, Friendship, FriendshipStatus};
pub use notification::{NewNotification, Notification, NotificationKind, Resolution};
pub use user::{User, UserClaims, UserRef, UserShort};
