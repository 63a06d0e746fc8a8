use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use libris_store::{Book, BookPatch};

/// Request model for creating a new book.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBook {
    pub title: String,
    pub description: Option<String>,
    pub publication_date: Option<String>,
    pub author_id: Uuid,
}

/// Partial update accepted by PATCH. Availability is deliberately not
/// accepted here; it belongs to the lending engine.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBook {
    pub title: Option<String>,
    pub description: Option<String>,
    pub publication_date: Option<String>,
    pub author_id: Option<Uuid>,
}

impl From<UpdateBook> for BookPatch {
    fn from(update: UpdateBook) -> Self {
        Self {
            title: update.title,
            description: update.description.map(Some),
            publication_date: update.publication_date.map(Some),
            author_id: update.author_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BookResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub publication_date: Option<String>,
    pub author_id: Uuid,
    pub available: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            title: book.title,
            description: book.description,
            publication_date: book.publication_date,
            author_id: book.author_id,
            available: book.available,
            created_at: book.created_at,
        }
    }
}
