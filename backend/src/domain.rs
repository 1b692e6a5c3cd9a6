use crate::db::DbConnection;
use anyhow::Result;
use shared::{Book, Transaction};
use tracing::info;

/// Stateless orchestrator for book CRUD. Holds no state of its own; every
/// call goes straight to the gateway, which scopes a connection per
/// statement. A connection failure propagates to the caller, a missing row
/// is a normal `None`/`false` result.
#[derive(Clone)]
pub struct BookService {
    db: DbConnection,
}

impl BookService {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Create a book. False means the ISBN already exists; the unique key
    /// in storage is the only duplicate check.
    pub async fn create(&self, book: &Book) -> Result<bool> {
        info!("Creating book with isbn: {}", book.isbn);
        self.db.insert_book(book).await
    }

    pub async fn get_by_isbn(&self, isbn: &str) -> Result<Option<Book>> {
        info!("Fetching book with isbn: {}", isbn);
        self.db.get_book(isbn).await
    }

    pub async fn get_all(&self) -> Result<Vec<Book>> {
        self.db.all_books().await
    }

    pub async fn search_by_title(&self, term: &str) -> Result<Vec<Book>> {
        info!("Searching books by title: {}", term);
        self.db.search_books_by_title(term).await
    }

    /// Overwrite all mutable fields of an existing book. False when no row
    /// matches the ISBN.
    pub async fn update(&self, book: &Book) -> Result<bool> {
        info!("Updating book with isbn: {}", book.isbn);
        self.db.update_book(book).await
    }

    pub async fn delete(&self, isbn: &str) -> Result<bool> {
        info!("Deleting book with isbn: {}", isbn);
        self.db.delete_book(isbn).await
    }
}

/// Stateless orchestrator for transaction CRUD, same shape as
/// [`BookService`].
#[derive(Clone)]
pub struct TransactionService {
    db: DbConnection,
}

impl TransactionService {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Create a transaction. Returns the stored row (with the
    /// storage-stamped date), or `None` when the id already exists.
    pub async fn create(&self, transaction: &Transaction) -> Result<Option<Transaction>> {
        info!("Creating transaction with id: {}", transaction.id);
        self.db.insert_transaction(transaction).await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Transaction>> {
        info!("Fetching transaction with id: {}", id);
        self.db.get_transaction(id).await
    }

    pub async fn get_all(&self) -> Result<Vec<Transaction>> {
        self.db.all_transactions().await
    }

    pub async fn search_by_description(&self, term: &str) -> Result<Vec<Transaction>> {
        info!("Searching transactions by description: {}", term);
        self.db.search_transactions_by_description(term).await
    }

    /// Overwrite all mutable fields of an existing transaction. The create
    /// date is not a mutable field. False when no row matches the id.
    pub async fn update(&self, transaction: &Transaction) -> Result<bool> {
        info!("Updating transaction with id: {}", transaction.id);
        self.db.update_transaction(transaction).await
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        info!("Deleting transaction with id: {}", id);
        self.db.delete_transaction(id).await
    }
}
