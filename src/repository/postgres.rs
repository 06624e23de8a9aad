//! Postgres-backed directory store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        book::BookRow, Book, FriendPair, Friendship, NewNotification, Notification,
        NotificationKind, User,
    },
};

use super::{DirectoryStore, LendOutcome};

const BOOK_COLUMNS: &str =
    "id, title, author, cover_url, description, owner_id, borrower_id, due_date";

const USER_COLUMNS: &str = "id, display_name, email, is_admin, share_token";

#[derive(Clone)]
pub struct PgDirectory {
    pool: Pool<Postgres>,
}

impl PgDirectory {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }

    async fn books_where(&self, condition: &str, bind: Option<i32>) -> AppResult<Vec<Book>> {
        let query = format!(
            "SELECT {} FROM books WHERE {} ORDER BY title, id",
            BOOK_COLUMNS, condition
        );
        let mut builder = sqlx::query_as::<_, BookRow>(&query);
        if let Some(value) = bind {
            builder = builder.bind(value);
        }
        builder
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Book::try_from)
            .collect()
    }
}

#[async_trait]
impl DirectoryStore for PgDirectory {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn get_user(&self, id: i32) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user_by_share_token(&self, token: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE share_token = $1",
            USER_COLUMNS
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn set_share_token(&self, user_id: i32, token: Option<String>) -> AppResult<bool> {
        let result = sqlx::query("UPDATE users SET share_token = $1 WHERE id = $2")
            .bind(token)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_book(&self, id: i32) -> AppResult<Option<Book>> {
        sqlx::query_as::<_, BookRow>(&format!(
            "SELECT {} FROM books WHERE id = $1",
            BOOK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Book::try_from)
        .transpose()
    }

    async fn list_books_by_owner(&self, owner_id: i32) -> AppResult<Vec<Book>> {
        self.books_where("owner_id = $1", Some(owner_id)).await
    }

    async fn list_books_borrowed_by(&self, borrower_id: i32) -> AppResult<Vec<Book>> {
        self.books_where("borrower_id = $1", Some(borrower_id)).await
    }

    async fn list_lent_books(&self) -> AppResult<Vec<Book>> {
        self.books_where("borrower_id IS NOT NULL", None).await
    }

    async fn lend_book(
        &self,
        book_id: i32,
        borrower_id: i32,
        due_date: DateTime<Utc>,
        request_id: i32,
    ) -> AppResult<LendOutcome> {
        let mut tx = self.pool.begin().await?;

        // A declined or already approved request is gone; it must not lend
        let consumed = sqlx::query(
            r#"
            DELETE FROM notifications
            WHERE id = $1 AND type = 'BOOK_REQUEST' AND book_id = $2 AND sender_id = $3
            "#,
        )
        .bind(request_id)
        .bind(book_id)
        .bind(borrower_id)
        .execute(&mut *tx)
        .await?;

        if consumed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(LendOutcome::RequestGone);
        }

        // Compare-and-set: only an available book can be lent
        let row = sqlx::query_as::<_, BookRow>(&format!(
            r#"
            UPDATE books SET borrower_id = $1, due_date = $2
            WHERE id = $3 AND borrower_id IS NULL
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(borrower_id)
        .bind(due_date)
        .bind(book_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(LendOutcome::BookUnavailable);
        };

        let book = Book::try_from(row)?;
        tx.commit().await?;
        Ok(LendOutcome::Lent(book))
    }

    async fn return_book(&self, book_id: i32) -> AppResult<Option<Book>> {
        // The CTE captures the loan before it is cleared
        sqlx::query_as::<_, BookRow>(&format!(
            r#"
            WITH previous AS (
                SELECT {} FROM books WHERE id = $1 AND borrower_id IS NOT NULL FOR UPDATE
            )
            UPDATE books b SET borrower_id = NULL, due_date = NULL
            FROM previous p
            WHERE b.id = p.id AND b.borrower_id IS NOT NULL
            RETURNING p.id, p.title, p.author, p.cover_url, p.description,
                      p.owner_id, p.borrower_id, p.due_date
            "#,
            BOOK_COLUMNS
        ))
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Book::try_from)
        .transpose()
    }

    async fn create_notification(
        &self,
        notification: &NewNotification,
    ) -> AppResult<Option<Notification>> {
        // Partial unique indexes reject duplicates; DO NOTHING turns that into "no row"
        let created = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (type, sender_id, receiver_id, sender_name, book_id, book_title)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT DO NOTHING
            RETURNING id, type, sender_id, receiver_id, sender_name, book_id, book_title, read, created_at
            "#,
        )
        .bind(notification.kind)
        .bind(notification.sender_id)
        .bind(notification.receiver_id)
        .bind(&notification.sender_name)
        .bind(notification.book_id)
        .bind(&notification.book_title)
        .fetch_optional(&self.pool)
        .await?;
        Ok(created)
    }

    async fn get_notification(&self, id: i32) -> AppResult<Option<Notification>> {
        let notification = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(notification)
    }

    async fn delete_notification(&self, id: i32) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_notification_read(&self, id: i32) -> AppResult<bool> {
        let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_book_reminders_read(&self, book_id: i32) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE notifications SET read = TRUE
            WHERE book_id = $1 AND NOT read
              AND type IN ('OVERDUE_REMINDER', 'DUE_SOON_REMINDER')
            "#,
        )
        .bind(book_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn list_notifications(&self, receiver_id: i32) -> AppResult<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE receiver_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(receiver_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(notifications)
    }

    async fn find_friend_request(&self, a: i32, b: i32) -> AppResult<Option<Notification>> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE type = 'FRIEND_REQUEST'
              AND ((sender_id = $1 AND receiver_id = $2) OR (sender_id = $2 AND receiver_id = $1))
            LIMIT 1
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_optional(&self.pool)
        .await?;
        Ok(notification)
    }

    async fn find_unread_reminder(
        &self,
        book_id: i32,
        receiver_id: i32,
        kind: NotificationKind,
    ) -> AppResult<Option<Notification>> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE book_id = $1 AND receiver_id = $2 AND type = $3 AND NOT read
            LIMIT 1
            "#,
        )
        .bind(book_id)
        .bind(receiver_id)
        .bind(kind)
        .fetch_optional(&self.pool)
        .await?;
        Ok(notification)
    }

    async fn are_friends(&self, pair: FriendPair) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM friendships WHERE user_low = $1 AND user_high = $2)",
        )
        .bind(pair.low())
        .bind(pair.high())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn list_friends(&self, user_id: i32) -> AppResult<Vec<User>> {
        let friends = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.display_name, u.email, u.is_admin, u.share_token
            FROM friendships f
            JOIN users u ON u.id = CASE WHEN f.user_low = $1 THEN f.user_high ELSE f.user_low END
            WHERE f.user_low = $1 OR f.user_high = $1
            ORDER BY u.display_name, u.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(friends)
    }

    async fn create_friendship(
        &self,
        request_id: i32,
        pair: FriendPair,
    ) -> AppResult<Option<Friendship>> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(
            "DELETE FROM notifications WHERE id = $1 AND type = 'FRIEND_REQUEST'",
        )
        .bind(request_id)
        .execute(&mut *tx)
        .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let friendship = sqlx::query_as::<_, Friendship>(
            r#"
            INSERT INTO friendships (user_low, user_high)
            VALUES ($1, $2)
            ON CONFLICT (user_low, user_high) DO UPDATE SET user_low = EXCLUDED.user_low
            RETURNING user_low, user_high, created_at
            "#,
        )
        .bind(pair.low())
        .bind(pair.high())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(friendship))
    }
}
