//! The row shapes used by CSV and JSON import/export.

use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    database_id::{CategoryId, SubcategoryId, TransactionId},
    money::Amount,
    transaction::TransactionKind,
};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// One parsed row of a per-user transactions CSV.
///
/// Category and subcategory are referenced by name; the import path
/// reconciles them against existing rows or creates them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRow {
    /// Whether the money was earned or spent.
    pub kind: TransactionKind,
    /// The amount of money earned or spent.
    pub amount: Amount,
    /// When the transaction happened.
    pub date: Date,
    /// The category name. Required and non-blank.
    pub category: String,
    /// The subcategory name, absent when the CSV field was empty.
    pub subcategory: Option<String>,
    /// The note, absent when the CSV field was empty.
    pub note: Option<String>,
}

/// One row of the admin (all users) transactions CSV and JSON formats.
///
/// The same shape is used for both directions: exports render it, imports
/// parse it and reconcile category and subcategory by name within the named
/// user's data. Users are never created by an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminTransactionRow {
    /// The owning user, resolved by lookup on import.
    pub username: String,
    /// Whether the money was earned or spent.
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// The amount of money earned or spent.
    pub amount: Amount,
    /// When the transaction happened.
    #[serde(with = "iso_date")]
    pub date: Date,
    /// The category name.
    pub category: String,
    /// The subcategory name, if any.
    pub subcategory: Option<String>,
    /// The note, if any.
    pub note: Option<String>,
}

/// One transaction in a per-user JSON export, carrying both the numeric
/// references and the resolved names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// Whether the money was earned or spent.
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// The amount of money earned or spent.
    pub amount: Amount,
    /// When the transaction happened.
    #[serde(with = "iso_date")]
    pub date: Date,
    /// The ID of the category the transaction is filed under.
    pub category_id: CategoryId,
    /// The category's name at export time.
    pub category_name: Option<String>,
    /// The ID of the subcategory, if any.
    pub subcategory_id: Option<SubcategoryId>,
    /// The subcategory's name at export time, if any.
    pub subcategory_name: Option<String>,
    /// The note, if any.
    pub note: Option<String>,
}

/// One transaction draft in a per-user JSON import.
///
/// Unlike the CSV path, category and subcategory are referenced by numeric ID
/// and must already exist; nothing is auto-created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionUpsert {
    /// Whether the money was earned or spent.
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// The amount of money earned or spent.
    pub amount: Amount,
    /// When the transaction happened.
    #[serde(with = "iso_date")]
    pub date: Date,
    /// The ID of an existing category owned by the importing user.
    pub category_id: CategoryId,
    /// The ID of an existing subcategory under `category_id`, if any.
    pub subcategory_id: Option<SubcategoryId>,
    /// The note, if any.
    pub note: Option<String>,
}
