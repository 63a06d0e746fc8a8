use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Registered account. Only the id is relevant to lending; the rest is
/// conventional account data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub full_name: Option<String>,
    pub hashed_password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: Uuid,
    pub name: String,
    pub bio: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewAuthor {
    pub name: String,
    pub bio: Option<String>,
}

/// Catalogue entry. `available` is owned by the lending engine: it is
/// `false` exactly while one open borrow record references this book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub publication_date: Option<String>,
    pub author_id: Uuid,
    pub available: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub description: Option<String>,
    pub publication_date: Option<String>,
    pub author_id: Uuid,
}

/// Partial update for a book. Deliberately has no `available` field; the
/// flag moves only in lock-step with borrow record creation and closure.
#[derive(Debug, Clone, Default)]
pub struct BookPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub publication_date: Option<Option<String>>,
    pub author_id: Option<Uuid>,
}

/// Filter for book listings. String filters are case-insensitive
/// substring matches.
#[derive(Debug, Clone, Default)]
pub struct BookFilter {
    pub title: Option<String>,
    pub author_name: Option<String>,
    pub available: Option<bool>,
    pub offset: usize,
    pub limit: usize,
}

/// One lending of one book to one user. `return_date == None` means the
/// loan is open and the book is out; the record is closed exactly once
/// and never reopened or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub borrow_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub return_date: Option<OffsetDateTime>,
}

impl BorrowRecord {
    /// Whether the loan is still outstanding.
    pub fn is_open(&self) -> bool {
        self.return_date.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewBorrowRecord {
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub borrow_date: OffsetDateTime,
}
