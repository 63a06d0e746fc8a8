//! In-process record store.
//!
//! Each table is a `RwLock<HashMap>`; every conditional update runs inside
//! a single write-lock critical section, which is the serialization
//! primitive the lending engine relies on. No method holds a lock across
//! an await point or across two tables.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::{Timestamp, Uuid};

use crate::entities::{
    Author, Book, BookFilter, BookPatch, BorrowRecord, NewAuthor, NewBook, NewBorrowRecord,
    NewUser, User,
};
use crate::traits::{AuthorStore, BookStore, LendingStore, StoreError, UserStore};

/// Keyed in-memory tables behind per-table read/write locks.
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    authors: RwLock<HashMap<Uuid, Author>>,
    books: RwLock<HashMap<Uuid, Book>>,
    records: RwLock<HashMap<Uuid, BorrowRecord>>,
}

fn next_id() -> Uuid {
    Uuid::new_v7(Timestamp::now(uuid::NoContext))
}

fn poisoned<T>(_: PoisonError<T>) -> StoreError {
    tracing::error!("table lock poisoned; reporting store as unavailable");
    StoreError::Unavailable("table lock poisoned".to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            authors: RwLock::new(HashMap::new()),
            books: RwLock::new(HashMap::new()),
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().map_err(poisoned)?;

        if users
            .values()
            .any(|existing| existing.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(StoreError::UniqueViolation("users.email"));
        }

        let stored = User {
            id: next_id(),
            email: user.email,
            full_name: user.full_name,
            hashed_password: user.hashed_password,
            is_active: true,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }
}

#[async_trait]
impl AuthorStore for MemoryStore {
    async fn insert_author(&self, author: NewAuthor) -> Result<Author, StoreError> {
        let mut authors = self.authors.write().map_err(poisoned)?;

        let stored = Author {
            id: next_id(),
            name: author.name,
            bio: author.bio,
            created_at: OffsetDateTime::now_utc(),
        };
        authors.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_author(&self, id: Uuid) -> Result<Option<Author>, StoreError> {
        let authors = self.authors.read().map_err(poisoned)?;
        Ok(authors.get(&id).cloned())
    }

    async fn list_authors(&self, offset: usize, limit: usize) -> Result<Vec<Author>, StoreError> {
        let authors = self.authors.read().map_err(poisoned)?;

        let mut all: Vec<Author> = authors.values().cloned().collect();
        // v7 ids are time-ordered, so this is creation order.
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all.into_iter().skip(offset).take(limit).collect())
    }
}

#[async_trait]
impl BookStore for MemoryStore {
    async fn insert_book(&self, book: NewBook) -> Result<Book, StoreError> {
        let mut books = self.books.write().map_err(poisoned)?;

        let stored = Book {
            id: next_id(),
            title: book.title,
            description: book.description,
            publication_date: book.publication_date,
            author_id: book.author_id,
            available: true,
            created_at: OffsetDateTime::now_utc(),
        };
        books.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_book(&self, id: Uuid) -> Result<Option<Book>, StoreError> {
        let books = self.books.read().map_err(poisoned)?;
        Ok(books.get(&id).cloned())
    }

    async fn list_books(&self, filter: BookFilter) -> Result<Vec<Book>, StoreError> {
        // Resolve the author-name filter to a set of ids before touching
        // the books table; locks are never nested.
        let author_ids: Option<HashSet<Uuid>> = match &filter.author_name {
            Some(needle) => {
                let authors = self.authors.read().map_err(poisoned)?;
                let needle = needle.to_lowercase();
                Some(
                    authors
                        .values()
                        .filter(|author| author.name.to_lowercase().contains(&needle))
                        .map(|author| author.id)
                        .collect(),
                )
            }
            None => None,
        };

        let books = self.books.read().map_err(poisoned)?;
        let title_needle = filter.title.as_ref().map(|t| t.to_lowercase());

        let mut matches: Vec<Book> = books
            .values()
            .filter(|book| match &title_needle {
                Some(needle) => book.title.to_lowercase().contains(needle),
                None => true,
            })
            .filter(|book| match filter.available {
                Some(wanted) => book.available == wanted,
                None => true,
            })
            .filter(|book| match &author_ids {
                Some(ids) => ids.contains(&book.author_id),
                None => true,
            })
            .cloned()
            .collect();

        matches.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matches
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .collect())
    }

    async fn update_book(&self, id: Uuid, patch: BookPatch) -> Result<Option<Book>, StoreError> {
        let mut books = self.books.write().map_err(poisoned)?;

        let Some(book) = books.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(title) = patch.title {
            book.title = title;
        }
        if let Some(description) = patch.description {
            book.description = description;
        }
        if let Some(publication_date) = patch.publication_date {
            book.publication_date = publication_date;
        }
        if let Some(author_id) = patch.author_id {
            book.author_id = author_id;
        }

        Ok(Some(book.clone()))
    }

    async fn delete_book(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut books = self.books.write().map_err(poisoned)?;
        Ok(books.remove(&id).is_some())
    }
}

#[async_trait]
impl LendingStore for MemoryStore {
    async fn get_book(&self, id: Uuid) -> Result<Option<Book>, StoreError> {
        let books = self.books.read().map_err(poisoned)?;
        Ok(books.get(&id).cloned())
    }

    async fn get_record(&self, id: Uuid) -> Result<Option<BorrowRecord>, StoreError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(&id).cloned())
    }

    async fn insert_record(&self, record: NewBorrowRecord) -> Result<BorrowRecord, StoreError> {
        let mut records = self.records.write().map_err(poisoned)?;

        let stored = BorrowRecord {
            id: next_id(),
            user_id: record.user_id,
            book_id: record.book_id,
            borrow_date: record.borrow_date,
            return_date: None,
        };
        records.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn conditional_update_book(
        &self,
        id: Uuid,
        expected: bool,
        new: bool,
    ) -> Result<bool, StoreError> {
        let mut books = self.books.write().map_err(poisoned)?;

        match books.get_mut(&id) {
            Some(book) if book.available == expected => {
                book.available = new;
                Ok(true)
            }
            // Missing row and stale precondition are both the
            // zero-rows-affected case.
            _ => Ok(false),
        }
    }

    async fn conditional_close_record(
        &self,
        id: Uuid,
        returned_at: OffsetDateTime,
    ) -> Result<Option<BorrowRecord>, StoreError> {
        let mut records = self.records.write().map_err(poisoned)?;

        match records.get_mut(&id) {
            Some(record) if record.return_date.is_none() => {
                record.return_date = Some(returned_at);
                Ok(Some(record.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn records_by_user(
        &self,
        user_id: Uuid,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<BorrowRecord>, StoreError> {
        let records = self.records.read().map_err(poisoned)?;

        let mut mine: Vec<BorrowRecord> = records
            .values()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect();

        mine.sort_by(|a, b| {
            b.borrow_date
                .cmp(&a.borrow_date)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(mine.into_iter().skip(offset).take(limit).collect())
    }
}
