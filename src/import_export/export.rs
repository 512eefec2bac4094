//! Bulk export of transactions to CSV and JSON.
//!
//! Per-user exports follow the listing order (date descending, then ID
//! descending); admin exports group by username ascending first. Category and
//! subcategory names are resolved with left joins so that a row never blocks
//! an export.

use rusqlite::Connection;

use crate::{
    Error,
    import_export::{
        csv::{write_admin_transactions_csv, write_transactions_csv},
        rows::{AdminTransactionRow, CsvRow, TransactionRecord},
    },
};

/// Export a user's transactions as CSV text, header included.
///
/// # Errors
/// This function will return an [Error::InvalidCsv] if a row cannot be
/// rendered, or an [Error::SqlError] if there is an SQL error.
pub fn export_transactions_csv(username: &str, connection: &Connection) -> Result<String, Error> {
    let rows = user_csv_rows(username, connection)?;

    tracing::debug!("exporting {} transactions for {username} as CSV", rows.len());

    write_transactions_csv(&rows)
}

/// Export a user's transactions as a pretty-printed JSON array of
/// [TransactionRecord]s.
///
/// # Errors
/// This function will return an [Error::InvalidJson] if serialization fails,
/// or an [Error::SqlError] if there is an SQL error.
pub fn export_transactions_json(username: &str, connection: &Connection) -> Result<String, Error> {
    let records = transaction_records(username, connection)?;

    tracing::debug!(
        "exporting {} transactions for {username} as JSON",
        records.len()
    );

    serde_json::to_string_pretty(&records).map_err(|error| Error::InvalidJson(error.to_string()))
}

/// Export every user's transactions as CSV text with a leading `username`
/// column, header included.
///
/// # Errors
/// Same as [export_transactions_csv].
pub fn export_admin_transactions_csv(connection: &Connection) -> Result<String, Error> {
    let rows = admin_rows(connection)?;

    tracing::debug!("exporting {} transactions across users as CSV", rows.len());

    write_admin_transactions_csv(&rows)
}

/// Export every user's transactions as a pretty-printed JSON array.
///
/// # Errors
/// Same as [export_transactions_json].
pub fn export_admin_transactions_json(connection: &Connection) -> Result<String, Error> {
    let rows = admin_rows(connection)?;

    tracing::debug!("exporting {} transactions across users as JSON", rows.len());

    serde_json::to_string_pretty(&rows).map_err(|error| Error::InvalidJson(error.to_string()))
}

fn user_csv_rows(username: &str, connection: &Connection) -> Result<Vec<CsvRow>, Error> {
    connection
        .prepare(
            "SELECT t.kind, t.amount, t.date, COALESCE(c.name, ''), s.name, t.note \
             FROM tx t \
             INNER JOIN user u ON t.user_id = u.id \
             LEFT JOIN category c ON t.category_id = c.id \
             LEFT JOIN subcategory s ON t.subcategory_id = s.id \
             WHERE u.username = :username \
             ORDER BY t.date DESC, t.id DESC",
        )?
        .query_map(&[(":username", username)], |row| {
            Ok(CsvRow {
                kind: row.get(0)?,
                amount: row.get(1)?,
                date: row.get(2)?,
                category: row.get(3)?,
                subcategory: row.get(4)?,
                note: row.get(5)?,
            })
        })?
        .map(|row| row.map_err(Error::from))
        .collect()
}

fn transaction_records(
    username: &str,
    connection: &Connection,
) -> Result<Vec<TransactionRecord>, Error> {
    connection
        .prepare(
            "SELECT t.id, t.kind, t.amount, t.date, t.category_id, c.name, \
             t.subcategory_id, s.name, t.note \
             FROM tx t \
             INNER JOIN user u ON t.user_id = u.id \
             LEFT JOIN category c ON t.category_id = c.id \
             LEFT JOIN subcategory s ON t.subcategory_id = s.id \
             WHERE u.username = :username \
             ORDER BY t.date DESC, t.id DESC",
        )?
        .query_map(&[(":username", username)], |row| {
            Ok(TransactionRecord {
                id: row.get(0)?,
                kind: row.get(1)?,
                amount: row.get(2)?,
                date: row.get(3)?,
                category_id: row.get(4)?,
                category_name: row.get(5)?,
                subcategory_id: row.get(6)?,
                subcategory_name: row.get(7)?,
                note: row.get(8)?,
            })
        })?
        .map(|record| record.map_err(Error::from))
        .collect()
}

fn admin_rows(connection: &Connection) -> Result<Vec<AdminTransactionRow>, Error> {
    connection
        .prepare(
            "SELECT u.username, t.kind, t.amount, t.date, COALESCE(c.name, ''), s.name, t.note \
             FROM tx t \
             INNER JOIN user u ON t.user_id = u.id \
             LEFT JOIN category c ON t.category_id = c.id \
             LEFT JOIN subcategory s ON t.subcategory_id = s.id \
             ORDER BY u.username ASC, t.date DESC, t.id DESC",
        )?
        .query_map([], |row| {
            Ok(AdminTransactionRow {
                username: row.get(0)?,
                kind: row.get(1)?,
                amount: row.get(2)?,
                date: row.get(3)?,
                category: row.get(4)?,
                subcategory: row.get(5)?,
                note: row.get(6)?,
            })
        })?
        .map(|row| row.map_err(Error::from))
        .collect()
}
