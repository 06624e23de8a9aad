//! Notification inbox: per-user mailbox shared by the engines

use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{NewNotification, Notification, NotificationKind, Resolution},
    repository::DirectoryStore,
};

#[derive(Clone)]
pub struct NotificationInbox {
    store: Arc<dyn DirectoryStore>,
}

impl NotificationInbox {
    pub fn new(store: Arc<dyn DirectoryStore>) -> Self {
        Self { store }
    }

    /// All notifications addressed to `user_id`, newest first
    pub async fn list_for_user(&self, user_id: i32) -> AppResult<Vec<Notification>> {
        self.store.list_notifications(user_id).await
    }

    pub async fn unread_count(&self, user_id: i32) -> AppResult<usize> {
        let list = self.store.list_notifications(user_id).await?;
        Ok(list.iter().filter(|n| !n.read).count())
    }

    /// Fetch a notification the acting user is allowed to act on.
    /// `Ok(None)` means it no longer exists.
    pub(crate) async fn owned_by(
        &self,
        notification_id: i32,
        actor_id: i32,
    ) -> AppResult<Option<Notification>> {
        let Some(notification) = self.store.get_notification(notification_id).await? else {
            return Ok(None);
        };
        if notification.receiver_id != actor_id {
            return Err(AppError::Unauthorized(format!(
                "Notification {} is not addressed to user {}",
                notification_id, actor_id
            )));
        }
        Ok(Some(notification))
    }

    /// Record an engine event. A uniqueness rejection surfaces as `DuplicateRequest`.
    pub async fn record(&self, notification: NewNotification) -> AppResult<Notification> {
        let kind = notification.kind;
        let created = self
            .store
            .create_notification(&notification)
            .await?
            .ok_or_else(|| {
                AppError::DuplicateRequest(format!(
                    "A pending {} already exists from user {} to user {}",
                    kind, notification.sender_id, notification.receiver_id
                ))
            })?;

        tracing::info!(
            id = created.id,
            kind = %created.kind,
            sender = created.sender_id,
            receiver = created.receiver_id,
            "Notification recorded"
        );
        Ok(created)
    }

    /// Record a reminder unless an unread one of the same type already exists
    /// for this book and receiver. Returns `None` when skipped.
    ///
    /// The lookup is only a shortcut: the store rejects the insert on its own
    /// when a concurrent scan got there first.
    pub async fn record_reminder(
        &self,
        notification: NewNotification,
    ) -> AppResult<Option<Notification>> {
        let book_id = match (notification.kind.is_reminder(), notification.book_id) {
            (true, Some(book_id)) => book_id,
            _ => {
                return Err(AppError::Internal(format!(
                    "{} is not a book reminder",
                    notification.kind
                )))
            }
        };

        if self
            .store
            .find_unread_reminder(book_id, notification.receiver_id, notification.kind)
            .await?
            .is_some()
        {
            return Ok(None);
        }

        let created = self.store.create_notification(&notification).await?;
        if let Some(n) = &created {
            tracing::info!(id = n.id, kind = %n.kind, book = book_id, receiver = n.receiver_id, "Reminder recorded");
        }
        Ok(created)
    }

    /// Hard-delete an action-class notification (request accepted, declined or dismissed)
    pub async fn resolve(&self, notification_id: i32, actor_id: i32) -> AppResult<Resolution<()>> {
        let Some(notification) = self.owned_by(notification_id, actor_id).await? else {
            return Ok(Resolution::AlreadyResolved);
        };
        if !notification.kind.is_action() {
            return Err(AppError::InvalidState(format!(
                "{} notifications are dismissed, not resolved",
                notification.kind
            )));
        }

        if self.store.delete_notification(notification_id).await? {
            Ok(Resolution::Applied(()))
        } else {
            Ok(Resolution::AlreadyResolved)
        }
    }

    /// Mark an informational or reminder notification as read
    pub async fn dismiss(
        &self,
        notification_id: i32,
        actor_id: i32,
    ) -> AppResult<Resolution<Notification>> {
        let Some(mut notification) = self.owned_by(notification_id, actor_id).await? else {
            return Ok(Resolution::AlreadyResolved);
        };
        if !notification.kind.is_dismissable() {
            return Err(AppError::InvalidState(format!(
                "{} notifications must be accepted or declined",
                notification.kind
            )));
        }

        if self.store.mark_notification_read(notification_id).await? {
            notification.read = true;
            Ok(Resolution::Applied(notification))
        } else {
            Ok(Resolution::AlreadyResolved)
        }
    }

    /// Delete an action-class notification of the expected `kind`, on behalf of its receiver
    pub(crate) async fn decline(
        &self,
        notification_id: i32,
        actor_id: i32,
        kind: NotificationKind,
    ) -> AppResult<Resolution<()>> {
        let Some(notification) = self.owned_by(notification_id, actor_id).await? else {
            return Ok(Resolution::AlreadyResolved);
        };
        if notification.kind != kind {
            return Err(AppError::InvalidState(format!(
                "Notification {} is a {}, not a {}",
                notification_id, notification.kind, kind
            )));
        }
        self.resolve(notification_id, actor_id).await
    }
}
