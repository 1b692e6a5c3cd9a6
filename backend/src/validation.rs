use once_cell::sync::Lazy;
use regex::Regex;
use shared::{Book, Transaction, ValidationFailure};

static ISBN_13_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{3}-\d{10}$").expect("valid isbn regex"));

/// Field-level rules for a book. Pure function: failures come back in rule
/// declaration order, an empty list means valid.
pub fn validate_book(book: &Book) -> Vec<ValidationFailure> {
    let mut failures = Vec::new();

    if !ISBN_13_RE.is_match(&book.isbn) {
        failures.push(ValidationFailure::new("Isbn", "Value was not a valid ISBN-13"));
    }

    failures
}

/// Field-level rules for a transaction, same contract as [`validate_book`].
pub fn validate_transaction(transaction: &Transaction) -> Vec<ValidationFailure> {
    let mut failures = Vec::new();

    if transaction.id <= 0 {
        failures.push(ValidationFailure::new("Id", "Value was not a valid Id"));
    }
    if transaction.amount == 0.0 {
        failures.push(ValidationFailure::new("Amount", "'Amount' must not be empty."));
    }
    if transaction.description.trim().is_empty() {
        failures.push(ValidationFailure::new(
            "Description",
            "'Description' must not be empty.",
        ));
    }
    if transaction.transaction_type.trim().is_empty() {
        failures.push(ValidationFailure::new("Type", "'Type' must not be empty."));
    }

    failures
}
