//! Ledgerkeep is the consistency engine for a per-user finance tracker.
//!
//! It keeps categories, subcategories, and transactions mutually valid as
//! they are created, updated, deleted, and bulk-imported. The surrounding web
//! layer handles authentication and page rendering; this crate only consumes
//! a resolved username and returns plain domain values.
//!
//! The main entry points are:
//! - [db::initialize] to create the SQLite schema,
//! - the [category], [subcategory], [transaction], and [user] modules for
//!   ownership-scoped CRUD,
//! - the [cascade] module for dependency-ordered deletion,
//! - the [import_export] module for CSV/JSON import, export, and
//!   reconciliation by category/subcategory name.

#![warn(missing_docs)]

pub mod cascade;
pub mod category;
pub mod database_id;
pub mod db;
pub mod import_export;
pub mod money;
pub mod subcategory;
pub mod transaction;
pub mod user;

pub use category::{Category, CategoryName};
pub use money::Amount;
pub use subcategory::{Subcategory, SubcategoryName};
pub use transaction::{Totals, Transaction, TransactionDraft, TransactionKind};
pub use user::{Role, User};

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// No user with the given username exists.
    #[error("the user \"{0}\" could not be found")]
    UserNotFound(String),

    /// A user with the given username already exists.
    ///
    /// Usernames are unique; the caller should pick a different one.
    #[error("Username already taken")]
    UsernameTaken(String),

    /// An empty or whitespace-only string was used as a username.
    #[error("username cannot be empty")]
    EmptyUsername,

    /// The category does not exist or is not owned by the requesting user.
    #[error("Category not found")]
    CategoryNotFound,

    /// The subcategory does not exist or is not owned by the requesting user.
    #[error("Subcategory not found")]
    SubcategoryNotFound,

    /// The transaction does not exist or is not owned by the requesting user.
    #[error("Transaction not found")]
    TransactionNotFound,

    /// A transaction was created or updated with a category of the opposite
    /// kind (e.g. an expense under an income category).
    #[error("Category type must match transaction type")]
    CategoryKindMismatch,

    /// The selected subcategory belongs to a different category than the one
    /// selected for the transaction.
    #[error("Subcategory must belong to selected category")]
    SubcategoryOutsideCategory,

    /// An empty string was used to create a category name.
    #[error("Category name cannot be empty")]
    EmptyCategoryName,

    /// An empty string was used to create a subcategory name.
    #[error("Subcategory name cannot be empty")]
    EmptySubcategoryName,

    /// The subcategory name is already used within the same category.
    #[error("the subcategory \"{0}\" already exists in this category")]
    DuplicateSubcategoryName(String),

    /// A transaction note longer than [transaction::MAX_NOTE_LENGTH]
    /// characters was provided.
    #[error("note must be at most 255 characters")]
    NoteTooLong,

    /// An amount failed validation: it must be a positive decimal with at
    /// most twelve integer digits and at most two decimal places.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// A string that is not `INCOME` or `EXPENSE` was parsed as a
    /// transaction kind.
    #[error("unknown transaction type \"{0}\", expected INCOME or EXPENSE")]
    UnknownTransactionKind(String),

    /// A required CSV column was empty or missing from an import row.
    #[error("CSV row has empty {0} (required)")]
    MissingCsvField(&'static str),

    /// The CSV had issues that prevented it from being parsed.
    #[error("Invalid CSV format: {0}")]
    InvalidCsv(String),

    /// The JSON had issues that prevented it from being parsed.
    #[error("Invalid JSON format: {0}")]
    InvalidJson(String),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}
