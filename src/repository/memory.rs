//! In-process directory store.
//!
//! Holds everything behind one async mutex, so each trait method is atomic
//! exactly like a single statement or transaction in the Postgres store.
//! Used by the test suites and for running the engines without a database.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    error::{AppError, AppResult},
    models::{
        Book, FriendPair, Friendship, Loan, NewNotification, Notification, NotificationKind, User,
    },
};

use super::{DirectoryStore, LendOutcome};

#[derive(Default)]
struct State {
    users: BTreeMap<i32, User>,
    books: BTreeMap<i32, Book>,
    friendships: BTreeMap<FriendPair, Friendship>,
    notifications: BTreeMap<i32, Notification>,
    next_id: i32,
    /// Monotonic creation clock so ordering stays stable within one instant
    last_created: Option<DateTime<Utc>>,
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn created_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let at = match self.last_created {
            Some(last) if last >= now => last + chrono::Duration::microseconds(1),
            _ => now,
        };
        self.last_created = Some(at);
        at
    }

    /// Mirrors the partial unique indexes of the notifications table
    fn violates_uniqueness(&self, new: &NewNotification) -> bool {
        self.notifications.values().any(|n| match new.kind {
            NotificationKind::FriendRequest => {
                n.kind == NotificationKind::FriendRequest
                    && FriendPair::new(n.sender_id, n.receiver_id)
                        == FriendPair::new(new.sender_id, new.receiver_id)
            }
            NotificationKind::BookRequest => {
                n.kind == NotificationKind::BookRequest
                    && n.sender_id == new.sender_id
                    && n.book_id == new.book_id
            }
            kind if kind.is_reminder() => {
                n.kind == kind
                    && !n.read
                    && n.book_id == new.book_id
                    && n.receiver_id == new.receiver_id
            }
            _ => false,
        })
    }
}

#[derive(Default)]
pub struct MemoryDirectory {
    state: Mutex<State>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user; the id is assigned by the store
    pub async fn add_user(&self, display_name: &str, email: &str) -> User {
        let mut state = self.state.lock().await;
        let user = User {
            id: state.next_id(),
            display_name: display_name.to_string(),
            email: email.to_string(),
            is_admin: false,
            share_token: None,
        };
        state.users.insert(user.id, user.clone());
        user
    }

    /// Add an available book owned by `owner_id`
    pub async fn add_book(&self, owner_id: i32, title: &str, author: Option<&str>) -> Book {
        let mut state = self.state.lock().await;
        let book = Book {
            id: state.next_id(),
            title: title.to_string(),
            author: author.map(str::to_string),
            cover_url: None,
            description: None,
            owner_id,
            loan: None,
        };
        state.books.insert(book.id, book.clone());
        book
    }

    /// Overwrite the loan of an existing book (last write wins)
    pub async fn set_loan(&self, book_id: i32, loan: Option<Loan>) -> AppResult<Book> {
        let mut state = self.state.lock().await;
        let book = state
            .books
            .get_mut(&book_id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;
        book.loan = loan;
        Ok(book.clone())
    }

    pub async fn rename_user(&self, user_id: i32, display_name: &str) {
        let mut state = self.state.lock().await;
        if let Some(user) = state.users.get_mut(&user_id) {
            user.display_name = display_name.to_string();
        }
    }

    /// Number of stored friendship edges
    pub async fn friendship_count(&self) -> usize {
        self.state.lock().await.friendships.len()
    }

    pub async fn notification_count(&self) -> usize {
        self.state.lock().await.notifications.len()
    }
}

#[async_trait]
impl DirectoryStore for MemoryDirectory {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn get_user(&self, id: i32) -> AppResult<Option<User>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn get_user_by_share_token(&self, token: &str) -> AppResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|u| u.share_token.as_deref() == Some(token))
            .cloned())
    }

    async fn set_share_token(&self, user_id: i32, token: Option<String>) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.users.get_mut(&user_id) {
            Some(user) => {
                user.share_token = token;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_book(&self, id: i32) -> AppResult<Option<Book>> {
        Ok(self.state.lock().await.books.get(&id).cloned())
    }

    async fn list_books_by_owner(&self, owner_id: i32) -> AppResult<Vec<Book>> {
        let state = self.state.lock().await;
        Ok(state
            .books
            .values()
            .filter(|b| b.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn list_books_borrowed_by(&self, borrower_id: i32) -> AppResult<Vec<Book>> {
        let state = self.state.lock().await;
        Ok(state
            .books
            .values()
            .filter(|b| b.borrower_id() == Some(borrower_id))
            .cloned()
            .collect())
    }

    async fn list_lent_books(&self) -> AppResult<Vec<Book>> {
        let state = self.state.lock().await;
        Ok(state.books.values().filter(|b| b.is_lent()).cloned().collect())
    }

    async fn lend_book(
        &self,
        book_id: i32,
        borrower_id: i32,
        due_date: DateTime<Utc>,
        request_id: i32,
    ) -> AppResult<LendOutcome> {
        let mut state = self.state.lock().await;
        let request_matches = state.notifications.get(&request_id).is_some_and(|n| {
            n.kind == NotificationKind::BookRequest
                && n.book_id == Some(book_id)
                && n.sender_id == borrower_id
        });
        if !request_matches {
            return Ok(LendOutcome::RequestGone);
        }

        let lent = match state.books.get_mut(&book_id) {
            Some(book) if !book.is_lent() => {
                book.loan = Some(Loan {
                    borrower_id,
                    due_date,
                });
                book.clone()
            }
            _ => return Ok(LendOutcome::BookUnavailable),
        };
        state.notifications.remove(&request_id);
        Ok(LendOutcome::Lent(lent))
    }

    async fn return_book(&self, book_id: i32) -> AppResult<Option<Book>> {
        let mut state = self.state.lock().await;
        match state.books.get_mut(&book_id) {
            Some(book) if book.is_lent() => {
                let previous = book.clone();
                book.loan = None;
                Ok(Some(previous))
            }
            _ => Ok(None),
        }
    }

    async fn create_notification(
        &self,
        notification: &NewNotification,
    ) -> AppResult<Option<Notification>> {
        let mut state = self.state.lock().await;
        if state.violates_uniqueness(notification) {
            return Ok(None);
        }
        let created = Notification {
            id: state.next_id(),
            kind: notification.kind,
            sender_id: notification.sender_id,
            receiver_id: notification.receiver_id,
            sender_name: notification.sender_name.clone(),
            book_id: notification.book_id,
            book_title: notification.book_title.clone(),
            read: false,
            created_at: state.created_at(),
        };
        state.notifications.insert(created.id, created.clone());
        Ok(Some(created))
    }

    async fn get_notification(&self, id: i32) -> AppResult<Option<Notification>> {
        Ok(self.state.lock().await.notifications.get(&id).cloned())
    }

    async fn delete_notification(&self, id: i32) -> AppResult<bool> {
        Ok(self.state.lock().await.notifications.remove(&id).is_some())
    }

    async fn mark_notification_read(&self, id: i32) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.notifications.get_mut(&id) {
            Some(n) => {
                n.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_book_reminders_read(&self, book_id: i32) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        let mut count = 0;
        for n in state.notifications.values_mut() {
            if n.kind.is_reminder() && !n.read && n.book_id == Some(book_id) {
                n.read = true;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn list_notifications(&self, receiver_id: i32) -> AppResult<Vec<Notification>> {
        let state = self.state.lock().await;
        let mut list: Vec<Notification> = state
            .notifications
            .values()
            .filter(|n| n.receiver_id == receiver_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(list)
    }

    async fn find_friend_request(&self, a: i32, b: i32) -> AppResult<Option<Notification>> {
        let state = self.state.lock().await;
        Ok(state
            .notifications
            .values()
            .find(|n| {
                n.kind == NotificationKind::FriendRequest
                    && ((n.sender_id == a && n.receiver_id == b)
                        || (n.sender_id == b && n.receiver_id == a))
            })
            .cloned())
    }

    async fn find_unread_reminder(
        &self,
        book_id: i32,
        receiver_id: i32,
        kind: NotificationKind,
    ) -> AppResult<Option<Notification>> {
        let state = self.state.lock().await;
        Ok(state
            .notifications
            .values()
            .find(|n| {
                n.kind == kind
                    && !n.read
                    && n.book_id == Some(book_id)
                    && n.receiver_id == receiver_id
            })
            .cloned())
    }

    async fn are_friends(&self, pair: FriendPair) -> AppResult<bool> {
        Ok(self.state.lock().await.friendships.contains_key(&pair))
    }

    async fn list_friends(&self, user_id: i32) -> AppResult<Vec<User>> {
        let state = self.state.lock().await;
        let ids: BTreeSet<i32> = state
            .friendships
            .values()
            .filter_map(|f| f.other(user_id))
            .collect();
        let mut friends: Vec<User> = ids
            .iter()
            .filter_map(|id| state.users.get(id).cloned())
            .collect();
        friends.sort_by(|a, b| a.display_name.cmp(&b.display_name).then(a.id.cmp(&b.id)));
        Ok(friends)
    }

    async fn create_friendship(
        &self,
        request_id: i32,
        pair: FriendPair,
    ) -> AppResult<Option<Friendship>> {
        let mut state = self.state.lock().await;
        let is_request = state
            .notifications
            .get(&request_id)
            .is_some_and(|n| n.kind == NotificationKind::FriendRequest);
        if !is_request {
            return Ok(None);
        }
        state.notifications.remove(&request_id);

        let created_at = state.created_at();
        let friendship = state
            .friendships
            .entry(pair)
            .or_insert_with(|| Friendship {
                user_low: pair.low(),
                user_high: pair.high(),
                created_at,
            })
            .clone();
        Ok(Some(friendship))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn book_request(store: &MemoryDirectory, requester: &User, book: &Book) -> i32 {
        store
            .create_notification(&NewNotification::book_request(requester, book))
            .await
            .unwrap()
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn lend_is_conditional_on_availability() {
        let store = MemoryDirectory::new();
        let owner = store.add_user("Owner", "owner@example.org").await;
        let first = store.add_user("First", "first@example.org").await;
        let second = store.add_user("Second", "second@example.org").await;
        let book = store.add_book(owner.id, "Dune", None).await;
        let due = Utc::now();
        let first_request = book_request(&store, &first, &book).await;
        let second_request = book_request(&store, &second, &book).await;

        let outcome = store.lend_book(book.id, first.id, due, first_request).await.unwrap();
        assert!(matches!(outcome, LendOutcome::Lent(_)));
        let outcome = store.lend_book(book.id, second.id, due, second_request).await.unwrap();
        assert_eq!(outcome, LendOutcome::BookUnavailable);

        let stored = store.get_book(book.id).await.unwrap().unwrap();
        assert_eq!(stored.borrower_id(), Some(first.id));
        // The losing request stays in the owner's inbox
        assert!(store.get_notification(second_request).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn lend_requires_the_request_to_still_exist() {
        let store = MemoryDirectory::new();
        let owner = store.add_user("Owner", "owner@example.org").await;
        let friend = store.add_user("Friend", "friend@example.org").await;
        let other = store.add_user("Other", "other@example.org").await;
        let book = store.add_book(owner.id, "Dune", None).await;
        let request = book_request(&store, &friend, &book).await;

        // The request does not belong to this borrower
        let outcome = store.lend_book(book.id, other.id, Utc::now(), request).await.unwrap();
        assert_eq!(outcome, LendOutcome::RequestGone);

        assert!(store.delete_notification(request).await.unwrap());
        let outcome = store.lend_book(book.id, friend.id, Utc::now(), request).await.unwrap();
        assert_eq!(outcome, LendOutcome::RequestGone);
        assert!(!store.get_book(book.id).await.unwrap().unwrap().is_lent());
    }

    #[tokio::test]
    async fn return_reports_previous_loan_once() {
        let store = MemoryDirectory::new();
        let owner = store.add_user("Owner", "owner@example.org").await;
        let friend = store.add_user("Friend", "friend@example.org").await;
        let book = store.add_book(owner.id, "Dune", None).await;
        let request = book_request(&store, &friend, &book).await;
        store.lend_book(book.id, friend.id, Utc::now(), request).await.unwrap();

        let previous = store.return_book(book.id).await.unwrap().unwrap();
        assert_eq!(previous.borrower_id(), Some(friend.id));
        assert!(store.return_book(book.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn friend_request_uniqueness_ignores_direction() {
        let store = MemoryDirectory::new();
        let a = store.add_user("A", "a@example.org").await;
        let b = store.add_user("B", "b@example.org").await;

        let first = NewNotification::friend_request(&a, b.id);
        let reverse = NewNotification::friend_request(&b, a.id);
        assert!(store.create_notification(&first).await.unwrap().is_some());
        assert!(store.create_notification(&reverse).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn email_lookup_is_case_insensitive() {
        let store = MemoryDirectory::new();
        let user = store.add_user("Ada", "Ada@Example.org").await;
        let found = store.get_user_by_email("ada@example.org").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
    }
}
