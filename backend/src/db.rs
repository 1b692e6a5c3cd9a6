use anyhow::Result;
use chrono::Utc;
use shared::{Book, Transaction};
use sqlx::{migrate::MigrateDatabase, sqlite::SqliteRow, Row, Sqlite, SqlitePool};
use std::sync::Arc;

// The database URL for the production database
const DATABASE_URL: &str = "sqlite:library.db";

/// DbConnection owns the connection pool and executes every SQL statement
/// for both entity tables. A pooled connection is held only for the
/// duration of a single statement and returned on every exit path.
#[derive(Clone)]
pub struct DbConnection {
    pool: Arc<SqlitePool>,
}

impl DbConnection {
    /// Create a new database connection
    pub async fn new(url: &str) -> Result<Self> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(url).await.unwrap_or(false) {
            Sqlite::create_database(url).await?
        }

        // Connect to the database
        let pool = SqlitePool::connect(url).await?;

        // Setup database schema
        Self::setup_schema(&pool).await?;

        Ok(Self { pool: Arc::new(pool) })
    }

    /// Initialize the standard database, honouring a DATABASE_URL override
    pub async fn init() -> Result<Self> {
        let url = std::env::var("DATABASE_URL").unwrap_or_else(|_| DATABASE_URL.to_string());
        Self::new(&url).await
    }

    /// Initialize a test database with a unique name
    #[cfg(test)]
    pub async fn init_test() -> Result<Self> {
        // Generate a unique database name for tests
        let test_id = uuid::Uuid::new_v4().to_string();
        let db_url = format!("file:memdb_{}?mode=memory&cache=shared", test_id);

        Self::new(&db_url).await
    }

    /// Set up the required database schema
    async fn setup_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS books (
                isbn TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                author TEXT NOT NULL,
                page_count INTEGER NOT NULL,
                short_description TEXT NOT NULL,
                release_date TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY,
                amount REAL NOT NULL,
                description TEXT NOT NULL,
                type TEXT NOT NULL,
                ip_address_v4 TEXT NOT NULL,
                ip_address_v6 TEXT NOT NULL,
                transaction_date TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    // Books

    /// Insert a book. The primary key on `isbn` is the single source of
    /// truth for duplicates: a unique violation maps to `Ok(false)`, any
    /// other database failure propagates.
    pub async fn insert_book(&self, book: &Book) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO books (isbn, title, author, page_count, short_description, release_date)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&book.isbn)
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.page_count)
        .bind(&book.short_description)
        .bind(book.release_date)
        .execute(&*self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.rows_affected() > 0),
            Err(sqlx::Error::Database(e))
                if matches!(e.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
            {
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Retrieve a book by its ISBN; absence is a normal `None`
    pub async fn get_book(&self, isbn: &str) -> Result<Option<Book>> {
        let row = sqlx::query(
            "SELECT isbn, title, author, page_count, short_description, release_date \
             FROM books WHERE isbn = ?",
        )
        .bind(isbn)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(row.map(|r| Self::book_from_row(&r)))
    }

    /// List every book, unfiltered
    pub async fn all_books(&self) -> Result<Vec<Book>> {
        let rows = sqlx::query(
            "SELECT isbn, title, author, page_count, short_description, release_date FROM books",
        )
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows.iter().map(Self::book_from_row).collect())
    }

    /// Case-insensitive substring match on the title
    pub async fn search_books_by_title(&self, term: &str) -> Result<Vec<Book>> {
        let rows = sqlx::query(
            "SELECT isbn, title, author, page_count, short_description, release_date \
             FROM books WHERE title LIKE '%' || ? || '%'",
        )
        .bind(term)
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows.iter().map(Self::book_from_row).collect())
    }

    /// Full-replace of all mutable fields; false when no row matched
    pub async fn update_book(&self, book: &Book) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE books SET
                title = ?,
                author = ?,
                page_count = ?,
                short_description = ?,
                release_date = ?
            WHERE isbn = ?
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.page_count)
        .bind(&book.short_description)
        .bind(book.release_date)
        .bind(&book.isbn)
        .execute(&*self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a book by ISBN; false when no row matched
    pub async fn delete_book(&self, isbn: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM books WHERE isbn = ?")
            .bind(isbn)
            .execute(&*self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // Transactions

    /// Insert a transaction, stamping `transaction_date` with the current
    /// time. Returns the stored row, or `None` when the id already exists.
    pub async fn insert_transaction(&self, transaction: &Transaction) -> Result<Option<Transaction>> {
        let stored = Transaction {
            transaction_date: Utc::now(),
            ..transaction.clone()
        };

        let result = sqlx::query(
            r#"
            INSERT INTO transactions (id, amount, description, type, ip_address_v4, ip_address_v6, transaction_date)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(stored.id)
        .bind(stored.amount)
        .bind(&stored.description)
        .bind(&stored.transaction_type)
        .bind(&stored.ip_address_v4)
        .bind(&stored.ip_address_v6)
        .bind(stored.transaction_date)
        .execute(&*self.pool)
        .await;

        match result {
            Ok(_) => Ok(Some(stored)),
            Err(sqlx::Error::Database(e))
                if matches!(e.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Retrieve a transaction by id; absence is a normal `None`
    pub async fn get_transaction(&self, id: i64) -> Result<Option<Transaction>> {
        let row = sqlx::query(
            "SELECT id, amount, description, type, ip_address_v4, ip_address_v6, transaction_date \
             FROM transactions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(row.map(|r| Self::transaction_from_row(&r)))
    }

    /// List every transaction, unfiltered
    pub async fn all_transactions(&self) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            "SELECT id, amount, description, type, ip_address_v4, ip_address_v6, transaction_date \
             FROM transactions",
        )
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows.iter().map(Self::transaction_from_row).collect())
    }

    /// Case-insensitive substring match on the description
    pub async fn search_transactions_by_description(&self, term: &str) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            "SELECT id, amount, description, type, ip_address_v4, ip_address_v6, transaction_date \
             FROM transactions WHERE description LIKE '%' || ? || '%'",
        )
        .bind(term)
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows.iter().map(Self::transaction_from_row).collect())
    }

    /// Full-replace of all mutable fields; `transaction_date` stays as
    /// written at create time. False when no row matched.
    pub async fn update_transaction(&self, transaction: &Transaction) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE transactions SET
                amount = ?,
                description = ?,
                type = ?,
                ip_address_v4 = ?,
                ip_address_v6 = ?
            WHERE id = ?
            "#,
        )
        .bind(transaction.amount)
        .bind(&transaction.description)
        .bind(&transaction.transaction_type)
        .bind(&transaction.ip_address_v4)
        .bind(&transaction.ip_address_v6)
        .bind(transaction.id)
        .execute(&*self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a transaction by id; false when no row matched
    pub async fn delete_transaction(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = ?")
            .bind(id)
            .execute(&*self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    fn book_from_row(row: &SqliteRow) -> Book {
        Book {
            isbn: row.get("isbn"),
            title: row.get("title"),
            author: row.get("author"),
            page_count: row.get("page_count"),
            short_description: row.get("short_description"),
            release_date: row.get("release_date"),
        }
    }

    fn transaction_from_row(row: &SqliteRow) -> Transaction {
        Transaction {
            id: row.get("id"),
            amount: row.get("amount"),
            description: row.get("description"),
            transaction_type: row.get("type"),
            ip_address_v4: row.get("ip_address_v4"),
            ip_address_v6: row.get("ip_address_v6"),
            transaction_date: row.get("transaction_date"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    // Setup a new test database for each test
    async fn setup_test() -> DbConnection {
        DbConnection::init_test().await.expect("Failed to create test database")
    }

    fn sample_book(isbn: &str) -> Book {
        Book {
            isbn: isbn.to_string(),
            title: "The Dirty Coder".to_string(),
            author: "Nick Chapsas".to_string(),
            page_count: 420,
            short_description: "A tale of tech debt".to_string(),
            release_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        }
    }

    fn sample_transaction(id: i64) -> Transaction {
        Transaction {
            id,
            amount: 9.99,
            description: "coffee".to_string(),
            transaction_type: "credit".to_string(),
            ip_address_v4: "192.168.0.1".to_string(),
            ip_address_v6: "::1".to_string(),
            transaction_date: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_book() {
        let db = setup_test().await;
        let book = sample_book("978-0123456789");

        let created = db.insert_book(&book).await.expect("Failed to insert book");
        assert!(created);

        let fetched = db.get_book(&book.isbn).await.expect("Failed to get book");
        assert_eq!(fetched, Some(book));
    }

    #[tokio::test]
    async fn test_insert_duplicate_book_returns_false() {
        let db = setup_test().await;
        let book = sample_book("978-0123456789");

        assert!(db.insert_book(&book).await.expect("First insert failed"));
        let second = db.insert_book(&book).await.expect("Second insert errored");
        assert!(!second, "Duplicate isbn should be rejected, not inserted");
    }

    #[tokio::test]
    async fn test_get_nonexistent_book() {
        let db = setup_test().await;

        let result = db.get_book("978-9999999999").await.expect("Query failed");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_search_books_by_title_is_case_insensitive() {
        let db = setup_test().await;
        let book = sample_book("978-0123456789");
        db.insert_book(&book).await.expect("Failed to insert book");

        let matched = db.search_books_by_title("dirty").await.expect("Search failed");
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].isbn, book.isbn);

        let unmatched = db.search_books_by_title("clean").await.expect("Search failed");
        assert!(unmatched.is_empty());
    }

    #[tokio::test]
    async fn test_update_book() {
        let db = setup_test().await;
        let mut book = sample_book("978-0123456789");
        db.insert_book(&book).await.expect("Failed to insert book");

        book.title = "The Clean Coder".to_string();
        let updated = db.update_book(&book).await.expect("Failed to update book");
        assert!(updated);

        let fetched = db.get_book(&book.isbn).await.expect("Failed to get book").unwrap();
        assert_eq!(fetched.title, "The Clean Coder");
        // Untouched fields survive the full-replace update
        assert_eq!(fetched.author, book.author);
        assert_eq!(fetched.page_count, book.page_count);
    }

    #[tokio::test]
    async fn test_update_missing_book_returns_false() {
        let db = setup_test().await;
        let book = sample_book("978-0123456789");

        let updated = db.update_book(&book).await.expect("Update errored");
        assert!(!updated);
    }

    #[tokio::test]
    async fn test_delete_book() {
        let db = setup_test().await;
        let book = sample_book("978-0123456789");
        db.insert_book(&book).await.expect("Failed to insert book");

        assert!(db.delete_book(&book.isbn).await.expect("Failed to delete book"));
        assert!(db.get_book(&book.isbn).await.expect("Query failed").is_none());

        // Deleting again reports not-found
        assert!(!db.delete_book(&book.isbn).await.expect("Re-delete errored"));
    }

    #[tokio::test]
    async fn test_insert_transaction_stamps_date() {
        let db = setup_test().await;
        let transaction = sample_transaction(1);

        let before = Utc::now();
        let stored = db
            .insert_transaction(&transaction)
            .await
            .expect("Failed to insert transaction")
            .expect("Insert reported a conflict");
        let after = Utc::now();

        assert!(stored.transaction_date >= before && stored.transaction_date <= after);

        let fetched = db.get_transaction(1).await.expect("Failed to get transaction").unwrap();
        assert_eq!(fetched, stored);
    }

    #[tokio::test]
    async fn test_insert_duplicate_transaction_returns_none() {
        let db = setup_test().await;
        let transaction = sample_transaction(1);

        assert!(db.insert_transaction(&transaction).await.expect("First insert failed").is_some());
        let second = db.insert_transaction(&transaction).await.expect("Second insert errored");
        assert!(second.is_none(), "Duplicate id should be rejected, not inserted");
    }

    #[tokio::test]
    async fn test_search_transactions_by_description() {
        let db = setup_test().await;
        let mut transaction = sample_transaction(1);
        transaction.description = "test".to_string();
        db.insert_transaction(&transaction).await.expect("Failed to insert transaction");

        let other = sample_transaction(2);
        db.insert_transaction(&other).await.expect("Failed to insert transaction");

        let matched = db
            .search_transactions_by_description("test")
            .await
            .expect("Search failed");
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, 1);
    }

    #[tokio::test]
    async fn test_update_transaction_preserves_date() {
        let db = setup_test().await;
        let transaction = sample_transaction(1);
        let stored = db
            .insert_transaction(&transaction)
            .await
            .expect("Failed to insert transaction")
            .unwrap();

        let mut changed = stored.clone();
        changed.amount = -4.5;
        assert!(db.update_transaction(&changed).await.expect("Failed to update"));

        let fetched = db.get_transaction(1).await.expect("Failed to get transaction").unwrap();
        assert_eq!(fetched.amount, -4.5);
        assert_eq!(fetched.transaction_date, stored.transaction_date);
        assert_eq!(fetched.description, stored.description);
    }

    #[tokio::test]
    async fn test_delete_transaction() {
        let db = setup_test().await;
        let transaction = sample_transaction(1);
        db.insert_transaction(&transaction).await.expect("Failed to insert transaction");

        assert!(db.delete_transaction(1).await.expect("Failed to delete"));
        assert!(db.get_transaction(1).await.expect("Query failed").is_none());
        assert!(!db.delete_transaction(1).await.expect("Re-delete errored"));
    }
}
