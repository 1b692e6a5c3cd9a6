use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use shared::{Book, Transaction, ValidationFailure};
use thiserror::Error;
use tracing::info;

use crate::domain::{BookService, TransactionService};
use crate::validation::{validate_book, validate_transaction};

/// Application state containing the two entity services
#[derive(Clone)]
pub struct AppState {
    pub book_service: BookService,
    pub transaction_service: TransactionService,
}

impl AppState {
    pub fn new(book_service: BookService, transaction_service: TransactionService) -> Self {
        Self {
            book_service,
            transaction_service,
        }
    }
}

/// A storage fault that escaped the service layer. Not-found and validation
/// outcomes never take this path; those are mapped to 404/400 in the
/// handlers.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] anyhow::Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!("request failed: {:#}", self.0);
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

/// The full route table, declared statically
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/books", get(get_books).post(create_book))
        .route(
            "/books/:isbn",
            get(get_book).put(update_book).delete(delete_book),
        )
        .route(
            "/transactions",
            get(get_transactions).post(create_transaction),
        )
        .route(
            "/transactions/:id",
            get(get_transaction).put(update_transaction).delete(delete_transaction),
        )
        .route("/status", get(status_page))
        .with_state(state)
}

// Book handlers

#[derive(Deserialize, Debug)]
pub struct BooksQuery {
    #[serde(rename = "searchTerm")]
    pub search_term: Option<String>,
}

async fn create_book(
    State(state): State<AppState>,
    Json(book): Json<Book>,
) -> Result<Response, ApiError> {
    info!("POST /books - isbn: {}", book.isbn);

    let failures = validate_book(&book);
    if !failures.is_empty() {
        return Ok((StatusCode::BAD_REQUEST, Json(failures)).into_response());
    }

    let created = state.book_service.create(&book).await?;
    if !created {
        let conflict = vec![ValidationFailure::new(
            "Isbn",
            "A book with this ISBN-13 already exists",
        )];
        return Ok((StatusCode::BAD_REQUEST, Json(conflict)).into_response());
    }

    let location = format!("/books/{}", book.isbn);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(book),
    )
        .into_response())
}

async fn get_books(
    State(state): State<AppState>,
    Query(query): Query<BooksQuery>,
) -> Result<Response, ApiError> {
    info!("GET /books - query: {:?}", query);

    let books = match query.search_term.as_deref() {
        Some(term) if !term.trim().is_empty() => state.book_service.search_by_title(term).await?,
        _ => state.book_service.get_all().await?,
    };
    Ok((StatusCode::OK, Json(books)).into_response())
}

async fn get_book(
    State(state): State<AppState>,
    Path(isbn): Path<String>,
) -> Result<Response, ApiError> {
    info!("GET /books/{}", isbn);

    match state.book_service.get_by_isbn(&isbn).await? {
        Some(book) => Ok((StatusCode::OK, Json(book)).into_response()),
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

async fn update_book(
    State(state): State<AppState>,
    Path(isbn): Path<String>,
    Json(mut book): Json<Book>,
) -> Result<Response, ApiError> {
    info!("PUT /books/{}", isbn);

    // The route parameter wins over whatever key the body carried
    book.isbn = isbn;

    let failures = validate_book(&book);
    if !failures.is_empty() {
        return Ok((StatusCode::BAD_REQUEST, Json(failures)).into_response());
    }

    if state.book_service.update(&book).await? {
        Ok((StatusCode::OK, Json(book)).into_response())
    } else {
        Ok(StatusCode::NOT_FOUND.into_response())
    }
}

async fn delete_book(
    State(state): State<AppState>,
    Path(isbn): Path<String>,
) -> Result<Response, ApiError> {
    info!("DELETE /books/{}", isbn);

    if state.book_service.delete(&isbn).await? {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Ok(StatusCode::NOT_FOUND.into_response())
    }
}

// Transaction handlers

#[derive(Deserialize, Debug)]
pub struct TransactionsQuery {
    pub description: Option<String>,
}

async fn create_transaction(
    State(state): State<AppState>,
    Json(transaction): Json<Transaction>,
) -> Result<Response, ApiError> {
    info!("POST /transactions - id: {}", transaction.id);

    let failures = validate_transaction(&transaction);
    if !failures.is_empty() {
        return Ok((StatusCode::BAD_REQUEST, Json(failures)).into_response());
    }

    match state.transaction_service.create(&transaction).await? {
        Some(created) => {
            let location = format!("/transactions/{}", created.id);
            Ok((
                StatusCode::CREATED,
                [(header::LOCATION, location)],
                Json(created),
            )
                .into_response())
        }
        None => {
            let conflict = vec![ValidationFailure::new(
                "Id",
                "A transaction with this Id already exists",
            )];
            Ok((StatusCode::BAD_REQUEST, Json(conflict)).into_response())
        }
    }
}

async fn get_transactions(
    State(state): State<AppState>,
    Query(query): Query<TransactionsQuery>,
) -> Result<Response, ApiError> {
    info!("GET /transactions - query: {:?}", query);

    let transactions = match query.description.as_deref() {
        Some(term) if !term.trim().is_empty() => {
            state.transaction_service.search_by_description(term).await?
        }
        _ => state.transaction_service.get_all().await?,
    };
    Ok((StatusCode::OK, Json(transactions)).into_response())
}

async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    info!("GET /transactions/{}", id);

    match state.transaction_service.get_by_id(id).await? {
        Some(transaction) => Ok((StatusCode::OK, Json(transaction)).into_response()),
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

async fn update_transaction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(mut transaction): Json<Transaction>,
) -> Result<Response, ApiError> {
    info!("PUT /transactions/{}", id);

    // The route parameter wins over whatever key the body carried
    transaction.id = id;

    let failures = validate_transaction(&transaction);
    if !failures.is_empty() {
        return Ok((StatusCode::BAD_REQUEST, Json(failures)).into_response());
    }

    if state.transaction_service.update(&transaction).await? {
        Ok((StatusCode::OK, Json(transaction)).into_response())
    } else {
        Ok(StatusCode::NOT_FOUND.into_response())
    }
}

async fn delete_transaction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    info!("DELETE /transactions/{}", id);

    if state.transaction_service.delete(id).await? {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Ok(StatusCode::NOT_FOUND.into_response())
    }
}

async fn status_page() -> Html<&'static str> {
    Html(
        r#"<!doctype html>
<html>
  <head><title>Status Page</title></head>
  <body>
    <h1>Status Page</h1>
  </body>
</html>"#,
    )
}
