//! Record store for libris: durable keyed storage for users, authors,
//! books, and borrow records.
//!
//! The store is consumed through narrow per-aggregate traits so that each
//! module only sees the operations it is allowed to perform. In particular
//! the book availability flag has no general-purpose setter: it can only be
//! flipped through [`LendingStore::conditional_update_book`], which belongs
//! to the lending engine.

pub mod entities;
pub mod memory;
pub mod traits;

pub use entities::{
    Author, Book, BookFilter, BookPatch, BorrowRecord, NewAuthor, NewBook, NewBorrowRecord,
    NewUser, User,
};
pub use memory::MemoryStore;
pub use traits::{AuthorStore, BookStore, LendingStore, MockLendingStore, StoreError, UserStore};
