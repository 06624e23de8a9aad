//! Lending engine: book custody transitions `Available <-> Lent`.
//!
//! A pending request is not a book state; it exists only as a BOOK_REQUEST
//! in the owner's inbox until approved or declined.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::{
    config::{LendingConfig, ReturnNotifyPolicy},
    error::{AppError, AppResult},
    models::{Book, FriendPair, NewNotification, Notification, NotificationKind, Resolution, User},
    repository::{DirectoryStore, LendOutcome},
    services::{
        email::{BookRequestEmail, Mailer},
        notifications::NotificationInbox,
    },
};

#[derive(Clone)]
pub struct LendingService {
    store: Arc<dyn DirectoryStore>,
    inbox: NotificationInbox,
    mailer: Arc<dyn Mailer>,
    config: LendingConfig,
}

impl LendingService {
    pub fn new(
        store: Arc<dyn DirectoryStore>,
        inbox: NotificationInbox,
        mailer: Arc<dyn Mailer>,
        config: LendingConfig,
    ) -> Self {
        Self {
            store,
            inbox,
            mailer,
            config,
        }
    }

    async fn require_user(&self, id: i32) -> AppResult<User> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    async fn require_book(&self, id: i32) -> AppResult<Book> {
        self.store
            .get_book(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Ask the owner of `book_id` to lend it to `requester_id`
    pub async fn request_book(&self, book_id: i32, requester_id: i32) -> AppResult<Notification> {
        let book = self.require_book(book_id).await?;
        let requester = self.require_user(requester_id).await?;

        if book.owner_id == requester.id {
            return Err(AppError::InvalidState("You cannot borrow your own book".to_string()));
        }
        if book.is_lent() {
            return Err(AppError::InvalidState(format!(
                "\"{}\" is currently lent out",
                book.title
            )));
        }

        let owner = self.require_user(book.owner_id).await?;
        let pair = FriendPair::new(owner.id, requester.id)
            .ok_or_else(|| AppError::Internal("Owner and requester collapsed".to_string()))?;
        if !self.store.are_friends(pair).await? {
            return Err(AppError::Unauthorized(format!(
                "Only friends of {} can borrow their books",
                owner.display_name
            )));
        }

        let request = self
            .inbox
            .record(NewNotification::book_request(&requester, &book))
            .await
            .map_err(|e| match e {
                AppError::DuplicateRequest(_) => AppError::DuplicateRequest(format!(
                    "You already asked to borrow \"{}\"",
                    book.title
                )),
                other => other,
            })?;

        self.notify_owner_by_mail(&owner, &requester, &book).await;
        Ok(request)
    }

    async fn notify_owner_by_mail(&self, owner: &User, requester: &User, book: &Book) {
        if owner.email.is_empty() {
            return;
        }
        let email = BookRequestEmail {
            to_email: owner.email.clone(),
            to_name: owner.display_name.clone(),
            requester_name: requester.display_name.clone(),
            book_title: book.title.clone(),
        };
        if let Err(e) = self.mailer.send_book_request_email(&email).await {
            tracing::warn!(book = book.id, owner = owner.id, "Book request email failed: {}", e);
        }
    }

    /// Approve a pending request: the book becomes lent to the requester
    pub async fn approve_book_request(
        &self,
        notification_id: i32,
        actor_id: i32,
    ) -> AppResult<Resolution<Book>> {
        let Some(request) = self.inbox.owned_by(notification_id, actor_id).await? else {
            return Ok(Resolution::AlreadyResolved);
        };
        if request.kind != NotificationKind::BookRequest {
            return Err(AppError::InvalidState(format!(
                "Notification {} is not a book request",
                notification_id
            )));
        }
        let book_id = request.book_id.ok_or_else(|| {
            AppError::Internal(format!("Book request {} has no book", notification_id))
        })?;

        let book = self.require_book(book_id).await?;
        if book.owner_id != actor_id {
            return Err(AppError::Unauthorized(format!(
                "Only the owner can lend \"{}\"",
                book.title
            )));
        }
        if book.is_lent() {
            return Err(AppError::InvalidState(format!(
                "\"{}\" is already lent out",
                book.title
            )));
        }

        let due_date = Duration::try_days(self.config.loan_period_days)
            .filter(|period| *period > Duration::zero())
            .and_then(|period| Utc::now().checked_add_signed(period))
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "Invalid loan period of {} days",
                    self.config.loan_period_days
                ))
            })?;
        let lent = match self
            .store
            .lend_book(book.id, request.sender_id, due_date, request.id)
            .await?
        {
            LendOutcome::Lent(book) => book,
            // Declined or approved concurrently
            LendOutcome::RequestGone => return Ok(Resolution::AlreadyResolved),
            LendOutcome::BookUnavailable => {
                return Err(AppError::InvalidState(format!(
                    "\"{}\" was lent in the meantime",
                    book.title
                )))
            }
        };

        tracing::info!(
            book = lent.id,
            borrower = request.sender_id,
            due = %due_date,
            "Book lent"
        );

        let owner = self.require_user(actor_id).await?;
        self.inbox
            .record(NewNotification::book_approved(&owner, request.sender_id, &lent))
            .await?;

        Ok(Resolution::Applied(lent))
    }

    /// Decline a pending request; the book is untouched
    pub async fn decline_book_request(
        &self,
        notification_id: i32,
        actor_id: i32,
    ) -> AppResult<Resolution<()>> {
        let resolution = self
            .inbox
            .decline(notification_id, actor_id, NotificationKind::BookRequest)
            .await?;
        if resolution.is_applied() {
            tracing::info!(notification = notification_id, "Book request declined");
        }
        Ok(resolution)
    }

    /// Mark a lent book as returned. Either the borrower or the owner may do it.
    pub async fn return_book(&self, book_id: i32, actor_id: i32) -> AppResult<Book> {
        let book = self.require_book(book_id).await?;
        let Some(borrower_id) = book.borrower_id() else {
            return Err(AppError::InvalidState(format!(
                "\"{}\" is not lent out",
                book.title
            )));
        };
        if actor_id != borrower_id && actor_id != book.owner_id {
            return Err(AppError::Unauthorized(format!(
                "Only the owner or the borrower can return \"{}\"",
                book.title
            )));
        }

        // A racing return loses here
        let previous = self.store.return_book(book.id).await?.ok_or_else(|| {
            AppError::InvalidState(format!("\"{}\" has already been returned", book.title))
        })?;
        let borrower_id = previous.borrower_id().unwrap_or(borrower_id);

        let cleared = self.store.mark_book_reminders_read(book.id).await?;
        tracing::info!(book = book.id, borrower = borrower_id, reminders_cleared = cleared, "Book returned");

        if let Some(receiver_id) = self.return_recipient(actor_id, book.owner_id, borrower_id) {
            let actor = self.require_user(actor_id).await?;
            self.inbox
                .record(NewNotification::book_returned(&actor, receiver_id, &previous))
                .await?;
        }

        let mut returned = previous;
        returned.loan = None;
        Ok(returned)
    }

    fn return_recipient(&self, actor_id: i32, owner_id: i32, borrower_id: i32) -> Option<i32> {
        let receiver = match self.config.return_notify {
            ReturnNotifyPolicy::Silent => return None,
            ReturnNotifyPolicy::Owner => owner_id,
            ReturnNotifyPolicy::Counterparty if actor_id == owner_id => borrower_id,
            ReturnNotifyPolicy::Counterparty => owner_id,
        };
        (receiver != actor_id).then_some(receiver)
    }

    /// Books currently borrowed by `user_id`
    pub async fn borrowed_by(&self, user_id: i32) -> AppResult<Vec<Book>> {
        self.store.list_books_borrowed_by(user_id).await
    }

    /// Books owned by `owner_id` that are lent out
    pub async fn lent_out(&self, owner_id: i32) -> AppResult<Vec<Book>> {
        let books = self.store.list_books_by_owner(owner_id).await?;
        Ok(books.into_iter().filter(Book::is_lent).collect())
    }
}
