use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::entities::{
    Author, Book, BookFilter, BookPatch, BorrowRecord, NewAuthor, NewBook, NewBorrowRecord,
    NewUser, User,
};

/// Storage-layer failure. Lookups that simply find nothing return
/// `Option`, not an error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transient failure; the caller may retry with the same arguments.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A uniqueness constraint was violated, named by `table.column`.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(&'static str),
}

/// Account storage consumed by the auth module.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
}

/// Author storage consumed by the authors module.
#[async_trait]
pub trait AuthorStore: Send + Sync {
    async fn insert_author(&self, author: NewAuthor) -> Result<Author, StoreError>;

    async fn get_author(&self, id: Uuid) -> Result<Option<Author>, StoreError>;

    async fn list_authors(&self, offset: usize, limit: usize) -> Result<Vec<Author>, StoreError>;
}

/// Catalogue storage consumed by the books module. Note the absence of
/// any operation that writes `Book::available`.
#[async_trait]
pub trait BookStore: Send + Sync {
    async fn insert_book(&self, book: NewBook) -> Result<Book, StoreError>;

    async fn get_book(&self, id: Uuid) -> Result<Option<Book>, StoreError>;

    async fn list_books(&self, filter: BookFilter) -> Result<Vec<Book>, StoreError>;

    /// Apply a partial update. Returns the updated book, or `None` if the
    /// id does not resolve.
    async fn update_book(&self, id: Uuid, patch: BookPatch) -> Result<Option<Book>, StoreError>;

    /// Returns whether a row was deleted.
    async fn delete_book(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// Storage operations reserved for the lending engine. This trait is the
/// module boundary that keeps availability writes out of everyone else's
/// reach: only the engine takes a `LendingStore`.
#[mockall::automock]
#[async_trait]
pub trait LendingStore: Send + Sync {
    async fn get_book(&self, id: Uuid) -> Result<Option<Book>, StoreError>;

    async fn get_record(&self, id: Uuid) -> Result<Option<BorrowRecord>, StoreError>;

    async fn insert_record(&self, record: NewBorrowRecord) -> Result<BorrowRecord, StoreError>;

    /// Atomic compare-and-set on `Book::available`. Returns `true` only if
    /// the book exists and its flag matched `expected` and was flipped to
    /// `new`; a `false` result is the zero-rows-affected case.
    async fn conditional_update_book(
        &self,
        id: Uuid,
        expected: bool,
        new: bool,
    ) -> Result<bool, StoreError>;

    /// Atomic "set `return_date` where it is still null". Returns the
    /// closed record, or `None` when the record is missing or was already
    /// closed by a concurrent caller.
    async fn conditional_close_record(
        &self,
        id: Uuid,
        returned_at: OffsetDateTime,
    ) -> Result<Option<BorrowRecord>, StoreError>;

    /// Page of one user's records, newest borrow first, ties broken by
    /// record id descending.
    async fn records_by_user(
        &self,
        user_id: Uuid,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<BorrowRecord>, StoreError>;
}
