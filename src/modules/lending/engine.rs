//! The lending engine: the state machine behind borrow and return.
//!
//! A book's `available` flag and its open borrow record move together, and
//! only through the two operations here. Every state transition is gated
//! on a conditional store update, so two callers racing on the same book
//! or record cannot both win; losers observe the zero-rows-affected result
//! and fail with a conflict.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use libris_store::{BorrowRecord, LendingStore, NewBorrowRecord, StoreError};

/// State-machine precondition that no longer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    BookUnavailable,
    AlreadyReturned,
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BookUnavailable => write!(f, "Book is currently not available"),
            Self::AlreadyReturned => write!(f, "Book already returned"),
        }
    }
}

/// Actor does not own the resource it is acting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForbiddenReason {
    NotOwner,
}

impl fmt::Display for ForbiddenReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotOwner => write!(f, "Not allowed to return this record"),
        }
    }
}

/// Engine-level failure. Terminal for the calling operation; only
/// `Unavailable` is worth retrying, and only with the same arguments.
#[derive(Debug, Error)]
pub enum LendError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(ConflictReason),

    #[error("{0}")]
    Forbidden(ForbiddenReason),

    #[error("lending store unavailable: {0}")]
    Unavailable(String),
}

fn map_store_error(error: StoreError) -> LendError {
    match error {
        StoreError::Unavailable(message) => LendError::Unavailable(message),
        // Borrow records carry no uniqueness constraints, so this only
        // happens if the store is misbehaving.
        StoreError::UniqueViolation(what) => {
            LendError::Unavailable(format!("unexpected unique violation on {what}"))
        }
    }
}

/// Borrow/return orchestration over a [`LendingStore`].
///
/// The engine is shared across request handlers; operations take `&self`
/// and rely on the store's conditional updates, not engine-side locking,
/// for serialization. Unrelated books never wait on each other.
pub struct LendingEngine<S> {
    store: Arc<S>,
}

impl<S> LendingEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S> LendingEngine<S>
where
    S: LendingStore,
{
    /// Lend a book to the acting user.
    ///
    /// Creates the open borrow record and takes the book off the shelf as
    /// one unit: the conditional flip of `available` is the gate, so of N
    /// concurrent borrows of one book exactly one passes. If the record
    /// insert fails after the flip, the flip is undone before the error
    /// surfaces.
    pub async fn borrow(&self, actor: Uuid, book_id: Uuid) -> Result<BorrowRecord, LendError> {
        let book = self
            .store
            .get_book(book_id)
            .await
            .map_err(map_store_error)?
            .ok_or(LendError::NotFound("Book"))?;

        if !book.available {
            return Err(LendError::Conflict(ConflictReason::BookUnavailable));
        }

        // The availability flip is the single-winner gate; a false result
        // means someone else borrowed between our read and this write.
        if !self
            .store
            .conditional_update_book(book.id, true, false)
            .await
            .map_err(map_store_error)?
        {
            return Err(LendError::Conflict(ConflictReason::BookUnavailable));
        }

        let inserted = self
            .store
            .insert_record(NewBorrowRecord {
                user_id: actor,
                book_id: book.id,
                borrow_date: OffsetDateTime::now_utc(),
            })
            .await;

        match inserted {
            Ok(record) => {
                tracing::info!(
                    record_id = %record.id,
                    user_id = %actor,
                    book_id = %book.id,
                    "book borrowed"
                );
                Ok(record)
            }
            Err(error) => {
                // Put the book back so the failed borrow leaves no trace.
                // Nobody else can have flipped it meanwhile: the book is
                // off the shelf and has no open record to return.
                if let Err(undo) = self.store.conditional_update_book(book.id, false, true).await {
                    tracing::error!(
                        book_id = %book.id,
                        error = %undo,
                        "failed to undo availability flip after record insert failure"
                    );
                }
                Err(map_store_error(error))
            }
        }
    }

    /// Close an open loan and put the book back on the shelf.
    ///
    /// Only the borrower may return a record, a record closes exactly
    /// once, and a book that was deleted while on loan does not block the
    /// return: the record still closes and the availability write is
    /// skipped.
    pub async fn give_back(&self, actor: Uuid, record_id: Uuid) -> Result<BorrowRecord, LendError> {
        let record = self
            .store
            .get_record(record_id)
            .await
            .map_err(map_store_error)?
            .ok_or(LendError::NotFound("BorrowRecord"))?;

        if record.return_date.is_some() {
            return Err(LendError::Conflict(ConflictReason::AlreadyReturned));
        }
        if record.user_id != actor {
            return Err(LendError::Forbidden(ForbiddenReason::NotOwner));
        }

        // Re-checked atomically: a concurrent return between the read
        // above and this write loses here, not at the read.
        let closed = self
            .store
            .conditional_close_record(record.id, OffsetDateTime::now_utc())
            .await
            .map_err(map_store_error)?
            .ok_or(LendError::Conflict(ConflictReason::AlreadyReturned))?;

        match self
            .store
            .conditional_update_book(closed.book_id, false, true)
            .await
        {
            Ok(true) => {}
            // Book deleted out-of-band while on loan. The record is
            // closed regardless; this is a recoverable inconsistency,
            // not a failed return.
            Ok(false) => {
                tracing::warn!(
                    record_id = %closed.id,
                    book_id = %closed.book_id,
                    "book missing during return; record closed, availability write skipped"
                );
            }
            Err(error) => {
                tracing::warn!(
                    record_id = %closed.id,
                    book_id = %closed.book_id,
                    error = %error,
                    "availability write failed during return; record closed"
                );
            }
        }

        tracing::info!(
            record_id = %closed.id,
            user_id = %actor,
            "book returned"
        );
        Ok(closed)
    }

    /// One user's borrow history, newest first.
    pub async fn history(
        &self,
        actor: Uuid,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<BorrowRecord>, LendError> {
        self.store
            .records_by_user(actor, offset, limit)
            .await
            .map_err(map_store_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libris_store::{
        AuthorStore, Book, BookStore, LendingStore, MemoryStore, MockLendingStore, NewAuthor,
        NewBook,
    };

    async fn seed_book(store: &MemoryStore) -> Uuid {
        let author = store
            .insert_author(NewAuthor {
                name: "N. K. Jemisin".to_string(),
                bio: None,
            })
            .await
            .unwrap();
        BookStore::insert_book(
            store,
            NewBook {
                title: "The Fifth Season".to_string(),
                description: None,
                publication_date: Some("2015".to_string()),
                author_id: author.id,
            },
        )
        .await
        .unwrap()
        .id
    }

    fn engine(store: &Arc<MemoryStore>) -> LendingEngine<MemoryStore> {
        LendingEngine::new(store.clone())
    }

    /// `available == true` iff no open record references the book.
    async fn assert_availability_invariant(store: &MemoryStore, user_id: Uuid, book_id: Uuid) {
        let book = LendingStore::get_book(store, book_id).await.unwrap();
        let open_loans = store
            .records_by_user(user_id, 0, 100)
            .await
            .unwrap()
            .into_iter()
            .filter(|record| record.book_id == book_id && record.is_open())
            .count();

        match book {
            Some(book) => {
                assert_eq!(
                    book.available,
                    open_loans == 0,
                    "availability flag disagrees with open loan count {open_loans}"
                );
                assert!(open_loans <= 1, "more than one open loan for one book");
            }
            None => {}
        }
    }

    #[tokio::test]
    async fn borrow_creates_open_record_and_flags_book() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);
        let book_id = seed_book(&store).await;
        let reader = Uuid::new_v4();

        let record = engine.borrow(reader, book_id).await.unwrap();

        assert_eq!(record.user_id, reader);
        assert_eq!(record.book_id, book_id);
        assert!(record.is_open());

        let book = LendingStore::get_book(&*store, book_id).await.unwrap().unwrap();
        assert!(!book.available);
        assert_availability_invariant(&store, reader, book_id).await;
    }

    #[tokio::test]
    async fn borrow_missing_book_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);

        let error = engine.borrow(Uuid::new_v4(), Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(error, LendError::NotFound("Book")));
    }

    #[tokio::test]
    async fn borrow_unavailable_book_conflicts() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);
        let book_id = seed_book(&store).await;

        engine.borrow(Uuid::new_v4(), book_id).await.unwrap();
        let error = engine.borrow(Uuid::new_v4(), book_id).await.unwrap_err();

        assert!(matches!(
            error,
            LendError::Conflict(ConflictReason::BookUnavailable)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_borrows_have_exactly_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let engine = Arc::new(LendingEngine::new(store.clone()));
        let book_id = seed_book(&store).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            let reader = Uuid::new_v4();
            handles.push(tokio::spawn(
                async move { engine.borrow(reader, book_id).await },
            ));
        }

        let mut winners = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(record) => {
                    assert!(record.is_open());
                    winners += 1;
                }
                Err(LendError::Conflict(ConflictReason::BookUnavailable)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(conflicts, 7);

        let book = LendingStore::get_book(&*store, book_id).await.unwrap().unwrap();
        assert!(!book.available);
    }

    #[tokio::test]
    async fn return_closes_record_and_frees_book() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);
        let book_id = seed_book(&store).await;
        let reader = Uuid::new_v4();

        let record = engine.borrow(reader, book_id).await.unwrap();
        let closed = engine.give_back(reader, record.id).await.unwrap();

        assert_eq!(closed.id, record.id);
        assert!(closed.return_date.is_some());

        let book = LendingStore::get_book(&*store, book_id).await.unwrap().unwrap();
        assert!(book.available);
        assert_availability_invariant(&store, reader, book_id).await;
    }

    #[tokio::test]
    async fn second_return_conflicts_and_mutates_nothing() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);
        let book_id = seed_book(&store).await;
        let reader = Uuid::new_v4();

        let record = engine.borrow(reader, book_id).await.unwrap();
        let closed = engine.give_back(reader, record.id).await.unwrap();

        let error = engine.give_back(reader, record.id).await.unwrap_err();
        assert!(matches!(
            error,
            LendError::Conflict(ConflictReason::AlreadyReturned)
        ));

        // Neither the record's close time nor the book moved again.
        let after = store.get_record(record.id).await.unwrap().unwrap();
        assert_eq!(after.return_date, closed.return_date);
        let book = LendingStore::get_book(&*store, book_id).await.unwrap().unwrap();
        assert!(book.available);
    }

    #[tokio::test]
    async fn return_by_non_owner_is_forbidden_and_mutates_nothing() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);
        let book_id = seed_book(&store).await;
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        let record = engine.borrow(owner, book_id).await.unwrap();
        let error = engine.give_back(stranger, record.id).await.unwrap_err();

        assert!(matches!(
            error,
            LendError::Forbidden(ForbiddenReason::NotOwner)
        ));

        let after = store.get_record(record.id).await.unwrap().unwrap();
        assert!(after.is_open());
        let book = LendingStore::get_book(&*store, book_id).await.unwrap().unwrap();
        assert!(!book.available);
    }

    #[tokio::test]
    async fn return_missing_record_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);

        let error = engine
            .give_back(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(error, LendError::NotFound("BorrowRecord")));
    }

    #[tokio::test]
    async fn return_still_closes_record_when_book_was_deleted() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);
        let book_id = seed_book(&store).await;
        let reader = Uuid::new_v4();

        let record = engine.borrow(reader, book_id).await.unwrap();
        assert!(BookStore::delete_book(&*store, book_id).await.unwrap());

        let closed = engine.give_back(reader, record.id).await.unwrap();
        assert!(closed.return_date.is_some());
    }

    #[tokio::test]
    async fn history_is_newest_first_and_scoped_to_actor() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);
        let reader = Uuid::new_v4();
        let other = Uuid::new_v4();

        let first_book = seed_book(&store).await;
        let second_book = seed_book(&store).await;

        // Two full borrow/return cycles for the reader, one loan for
        // someone else in between.
        let first = engine.borrow(reader, first_book).await.unwrap();
        engine.give_back(reader, first.id).await.unwrap();
        engine.borrow(other, first_book).await.unwrap();
        let second = engine.borrow(reader, second_book).await.unwrap();
        engine.give_back(reader, second.id).await.unwrap();

        let history = engine.history(reader, 0, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|record| record.user_id == reader));
        assert!(history[0].borrow_date >= history[1].borrow_date);
        assert_eq!(history[0].id, second.id);
        assert_eq!(history[1].id, first.id);

        let page = engine.history(reader, 1, 10).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, first.id);
    }

    fn sample_book(id: Uuid, available: bool) -> Book {
        Book {
            id,
            title: "The Obelisk Gate".to_string(),
            description: None,
            publication_date: None,
            author_id: Uuid::new_v4(),
            available,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn borrow_undoes_availability_flip_when_insert_fails() {
        let book_id = Uuid::new_v4();
        let mut store = MockLendingStore::new();

        store
            .expect_get_book()
            .times(1)
            .returning(move |id| Ok(Some(sample_book(id, true))));
        store
            .expect_conditional_update_book()
            .withf(|_, expected, new| *expected && !*new)
            .times(1)
            .returning(|_, _, _| Ok(true));
        store
            .expect_insert_record()
            .times(1)
            .returning(|_| Err(StoreError::Unavailable("write failed".to_string())));
        // The undo flip runs exactly once.
        store
            .expect_conditional_update_book()
            .withf(|_, expected, new| !*expected && *new)
            .times(1)
            .returning(|_, _, _| Ok(true));

        let engine = LendingEngine::new(Arc::new(store));
        let error = engine.borrow(Uuid::new_v4(), book_id).await.unwrap_err();
        assert!(matches!(error, LendError::Unavailable(_)));
    }

    #[tokio::test]
    async fn store_outage_surfaces_as_unavailable() {
        let mut store = MockLendingStore::new();
        store
            .expect_get_book()
            .times(1)
            .returning(|_| Err(StoreError::Unavailable("connection lost".to_string())));

        let engine = LendingEngine::new(Arc::new(store));
        let error = engine.borrow(Uuid::new_v4(), Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(error, LendError::Unavailable(_)));
    }
}
