//! Bulk import: parse rows, reconcile category and subcategory references,
//! and create transactions through the validated store path.
//!
//! Parsing happens up front, so a malformed document persists nothing. The
//! parsed rows are then applied sequentially, each as its own unit of work:
//! a validation failure partway through aborts the rest of the import but
//! leaves the earlier rows committed.

use rusqlite::Connection;
use time::Date;

use crate::{
    Error,
    category::{CategoryName, find_or_create_category},
    import_export::{
        csv::{parse_admin_transactions_csv, parse_transactions_csv},
        rows::{AdminTransactionRow, TransactionUpsert},
    },
    money::Amount,
    subcategory::{SubcategoryName, find_or_create_subcategory},
    transaction::{Transaction, TransactionDraft, TransactionKind, create_transaction},
    user::get_user_by_username,
};

/// Import a per-user transactions CSV, creating categories and subcategories
/// by name as needed. Returns the created transactions in row order.
///
/// # Errors
/// This function will return an:
/// - [Error::MissingCsvField] or [Error::InvalidCsv] if the document cannot
///   be parsed (nothing is persisted in that case),
/// - or any error from [create_transaction] for the failing row.
pub fn import_transactions_csv(
    username: &str,
    text: &str,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let rows = parse_transactions_csv(text)?;

    let mut imported = Vec::with_capacity(rows.len());

    for row in rows {
        imported.push(reconcile_and_create(
            username,
            row.kind,
            row.amount,
            row.date,
            &row.category,
            row.subcategory.as_deref(),
            row.note,
            connection,
        )?);
    }

    tracing::debug!("imported {} transactions for {username}", imported.len());

    Ok(imported)
}

/// Import a per-user JSON array of transaction drafts.
///
/// Category and subcategory are referenced by numeric ID and must already
/// exist and be owned by the user; nothing is auto-created on this path.
///
/// # Errors
/// This function will return an [Error::InvalidJson] if the document cannot
/// be parsed (nothing is persisted in that case), or any error from
/// [create_transaction] for the failing element.
pub fn import_transactions_json(
    username: &str,
    text: &str,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let drafts: Vec<TransactionUpsert> =
        serde_json::from_str(text).map_err(|error| Error::InvalidJson(error.to_string()))?;

    let mut imported = Vec::with_capacity(drafts.len());

    for draft in drafts {
        imported.push(create_transaction(
            username,
            TransactionDraft {
                kind: draft.kind,
                amount: draft.amount,
                date: draft.date,
                note: draft.note,
            },
            draft.category_id,
            draft.subcategory_id,
            connection,
        )?);
    }

    tracing::debug!("imported {} transactions for {username}", imported.len());

    Ok(imported)
}

/// Import an admin (all users) transactions CSV. Returns the number of
/// transactions created.
///
/// Each row's user is resolved by username and never created; category and
/// subcategory reconciliation is scoped to that row's user.
///
/// # Errors
/// Same as [import_transactions_csv], plus [Error::UserNotFound] for a row
/// naming an unknown user.
pub fn import_admin_transactions_csv(
    text: &str,
    connection: &Connection,
) -> Result<usize, Error> {
    let rows = parse_admin_transactions_csv(text)?;

    import_admin_rows(rows, connection)
}

/// Import an admin (all users) transactions JSON array. Returns the number
/// of transactions created.
///
/// # Errors
/// This function will return an [Error::InvalidJson] if the document cannot
/// be parsed, plus the per-row errors of [import_admin_transactions_csv].
pub fn import_admin_transactions_json(
    text: &str,
    connection: &Connection,
) -> Result<usize, Error> {
    let rows: Vec<AdminTransactionRow> =
        serde_json::from_str(text).map_err(|error| Error::InvalidJson(error.to_string()))?;

    import_admin_rows(rows, connection)
}

fn import_admin_rows(
    rows: Vec<AdminTransactionRow>,
    connection: &Connection,
) -> Result<usize, Error> {
    let mut count = 0;

    for row in rows {
        // Admin imports never create users.
        get_user_by_username(&row.username, connection)?;

        reconcile_and_create(
            &row.username,
            row.kind,
            row.amount,
            row.date,
            &row.category,
            row.subcategory.as_deref(),
            row.note,
            connection,
        )?;

        count += 1;
    }

    tracing::debug!("imported {count} transactions across users");

    Ok(count)
}

#[allow(clippy::too_many_arguments)]
fn reconcile_and_create(
    username: &str,
    kind: TransactionKind,
    amount: Amount,
    date: Date,
    category_name: &str,
    subcategory_name: Option<&str>,
    note: Option<String>,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let category = find_or_create_category(
        username,
        kind,
        &CategoryName::new(category_name)?,
        connection,
    )?;

    let subcategory_id = match subcategory_name {
        Some(name) => Some(
            find_or_create_subcategory(category.id, &SubcategoryName::new(name)?, connection)?.id,
        ),
        None => None,
    };

    // create_transaction re-applies the kind invariant even though the
    // category was just resolved with the same kind, guarding against a
    // concurrent kind change between resolution and insert.
    create_transaction(
        username,
        TransactionDraft {
            kind,
            amount,
            date,
            note,
        },
        category.id,
        subcategory_id,
        connection,
    )
}
