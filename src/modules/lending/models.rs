use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use libris_store::BorrowRecord;

/// Request model for borrowing a book.
#[derive(Debug, Clone, Deserialize)]
pub struct BorrowRequest {
    pub book_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct BorrowRecordResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub borrow_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub return_date: Option<OffsetDateTime>,
}

impl From<BorrowRecord> for BorrowRecordResponse {
    fn from(record: BorrowRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            book_id: record.book_id,
            borrow_date: record.borrow_date,
            return_date: record.return_date,
        }
    }
}
