//! Book model and lending state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::error::AppError;

/// Custody state derived from a book's loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    Available,
    Lent,
}

/// Borrower and due date of a lent book. Both are set or neither is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Loan {
    pub borrower_id: i32,
    pub due_date: DateTime<Utc>,
}

/// Internal row structure for database queries
#[derive(Debug, Clone, FromRow)]
pub struct BookRow {
    id: i32,
    title: String,
    author: Option<String>,
    cover_url: Option<String>,
    description: Option<String>,
    owner_id: i32,
    borrower_id: Option<i32>,
    due_date: Option<DateTime<Utc>>,
}

impl TryFrom<BookRow> for Book {
    type Error = AppError;

    fn try_from(row: BookRow) -> Result<Self, Self::Error> {
        let loan = match (row.borrower_id, row.due_date) {
            (Some(borrower_id), Some(due_date)) => Some(Loan {
                borrower_id,
                due_date,
            }),
            (None, None) => None,
            _ => {
                return Err(AppError::Internal(format!(
                    "Book {} has a half-set loan (borrower {:?}, due {:?})",
                    row.id, row.borrower_id, row.due_date
                )))
            }
        };

        Ok(Book {
            id: row.id,
            title: row.title,
            author: row.author,
            cover_url: row.cover_url,
            description: row.description,
            owner_id: row.owner_id,
            loan,
        })
    }
}

/// Book in someone's personal library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: Option<String>,
    pub cover_url: Option<String>,
    pub description: Option<String>,
    pub owner_id: i32,
    pub loan: Option<Loan>,
}

impl Book {
    pub fn is_lent(&self) -> bool {
        self.loan.is_some()
    }

    pub fn status(&self) -> BookStatus {
        if self.is_lent() {
            BookStatus::Lent
        } else {
            BookStatus::Available
        }
    }

    pub fn borrower_id(&self) -> Option<i32> {
        self.loan.map(|l| l.borrower_id)
    }

    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        self.loan.map(|l| l.due_date)
    }
}

/// Wire form of a book: loan fields flattened to nullable columns
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookView {
    pub id: i32,
    pub title: String,
    pub author: Option<String>,
    pub cover_url: Option<String>,
    pub description: Option<String>,
    pub owner_id: i32,
    pub borrower_id: Option<i32>,
    pub due_date: Option<DateTime<Utc>>,
    pub status: BookStatus,
}

impl From<&Book> for BookView {
    fn from(book: &Book) -> Self {
        BookView {
            id: book.id,
            title: book.title.clone(),
            author: book.author.clone(),
            cover_url: book.cover_url.clone(),
            description: book.description.clone(),
            owner_id: book.owner_id,
            borrower_id: book.borrower_id(),
            due_date: book.due_date(),
            status: book.status(),
        }
    }
}

impl Serialize for Book {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        BookView::from(self).serialize(serializer)
    }
}
