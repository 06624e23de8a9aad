//! Reminder scanner: periodic sweep over lent books emitting overdue and
//! due-soon reminders to borrowers.
//!
//! The sweep is stateless and safe to re-run: the inbox keeps at most one
//! unread reminder per (book, receiver, type), so a second run over the same
//! data creates nothing.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use crate::{
    config::RemindersConfig,
    error::{AppError, AppResult},
    models::{Book, NewNotification, NotificationKind},
    repository::DirectoryStore,
    services::notifications::NotificationInbox,
};

/// Aggregate result of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub overdue_count: usize,
    pub near_due_count: usize,
    pub reminders_created: usize,
    /// Books whose processing failed; the sweep went on without them
    pub failed: usize,
}

#[derive(Clone)]
pub struct ReminderScanner {
    store: Arc<dyn DirectoryStore>,
    inbox: NotificationInbox,
    config: RemindersConfig,
}

impl ReminderScanner {
    pub fn new(
        store: Arc<dyn DirectoryStore>,
        inbox: NotificationInbox,
        config: RemindersConfig,
    ) -> Self {
        Self {
            store,
            inbox,
            config,
        }
    }

    /// Check the scheduler's shared secret
    pub fn authorize(&self, presented: &str) -> AppResult<()> {
        let Some(expected) = self.config.secret.as_deref().filter(|s| !s.is_empty()) else {
            return Err(AppError::Authentication(
                "Reminder scans are not enabled".to_string(),
            ));
        };
        // Compare digests, never the raw secrets
        let expected = Sha256::digest(expected.as_bytes());
        let presented = Sha256::digest(presented.as_bytes());
        if hex::encode(expected) == hex::encode(presented) {
            Ok(())
        } else {
            Err(AppError::Authentication("Invalid reminder secret".to_string()))
        }
    }

    /// Which reminder, if any, a loan due at `due` calls for at `now`
    pub fn classify(&self, due: DateTime<Utc>, now: DateTime<Utc>) -> Option<NotificationKind> {
        if due < now {
            Some(NotificationKind::OverdueReminder)
        } else if Duration::try_days(self.config.due_soon_days)
            .is_some_and(|window| due - now <= window)
        {
            Some(NotificationKind::DueSoonReminder)
        } else {
            None
        }
    }

    pub async fn run(&self) -> AppResult<ScanReport> {
        self.run_at(Utc::now()).await
    }

    /// Sweep every lent book as of `now`
    pub async fn run_at(&self, now: DateTime<Utc>) -> AppResult<ScanReport> {
        let books = self.store.list_lent_books().await?;
        let mut report = ScanReport::default();

        for book in &books {
            let Some(loan) = book.loan else { continue };
            let Some(kind) = self.classify(loan.due_date, now) else {
                continue;
            };
            match kind {
                NotificationKind::OverdueReminder => report.overdue_count += 1,
                _ => report.near_due_count += 1,
            }

            match self.remind(book, loan.borrower_id, kind).await {
                Ok(true) => report.reminders_created += 1,
                Ok(false) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(book = book.id, kind = %kind, "Reminder failed: {}", e);
                }
            }
        }

        tracing::info!(
            scanned = books.len(),
            overdue = report.overdue_count,
            near_due = report.near_due_count,
            created = report.reminders_created,
            failed = report.failed,
            "Reminder scan finished"
        );
        Ok(report)
    }

    async fn remind(&self, book: &Book, borrower_id: i32, kind: NotificationKind) -> AppResult<bool> {
        let owner = self.store.get_user(book.owner_id).await?.ok_or_else(|| {
            AppError::NotFound(format!("Owner {} of book {} not found", book.owner_id, book.id))
        })?;
        let reminder = NewNotification::reminder(kind, &owner, borrower_id, book);
        Ok(self.inbox.record_reminder(reminder).await?.is_some())
    }
}
