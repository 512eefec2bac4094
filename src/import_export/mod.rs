//! Import and export of transactions as CSV and JSON.
//!
//! Two shapes exist per direction: a per-user format that names categories
//! and subcategories (CSV) or references them by ID (JSON), and an admin
//! format that adds a `username` column and spans every account. Imports
//! reconcile name references by reusing an existing category or subcategory
//! and creating one otherwise; users are never created by an import.

mod csv;
mod export;
mod import;
mod rows;

pub use export::{
    export_admin_transactions_csv, export_admin_transactions_json, export_transactions_csv,
    export_transactions_json,
};
pub use import::{
    import_admin_transactions_csv, import_admin_transactions_json, import_transactions_csv,
    import_transactions_json,
};
pub use rows::{AdminTransactionRow, CsvRow, TransactionRecord, TransactionUpsert};
