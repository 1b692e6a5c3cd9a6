use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A catalogue entry, keyed by its ISBN-13 in `DDD-DDDDDDDDDD` form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Natural key; must match the ISBN-13 pattern before persistence
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub page_count: i32,
    pub short_description: String,
    pub release_date: NaiveDate,
}

/// A payment record, keyed by a caller-supplied positive id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    /// Positive for credit, negative for debit; zero is rejected
    pub amount: f64,
    pub description: String,
    /// Free-form category, e.g. "credit"
    #[serde(rename = "type")]
    pub transaction_type: String,
    pub ip_address_v4: String,
    pub ip_address_v6: String,
    /// Stamped by the storage layer at create time; updates never touch it
    #[serde(default = "Utc::now")]
    pub transaction_date: DateTime<Utc>,
}

/// One field-scoped rejection. An empty list of these means the input
/// was valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFailure {
    pub property_name: String,
    pub error_message: String,
}

impl ValidationFailure {
    pub fn new(property_name: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            property_name: property_name.into(),
            error_message: error_message.into(),
        }
    }
}
