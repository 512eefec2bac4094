//! Transactions: the money movements recorded against a category, and the
//! validation rules that keep them consistent with the category hierarchy.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, OptionalExtension, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    category::get_owned_category,
    database_id::{CategoryId, SubcategoryId, TransactionId, UserId},
    money::Amount,
    subcategory::get_owned_subcategory,
    user::get_user_by_username,
};

/// The maximum number of characters a transaction note may have.
pub const MAX_NOTE_LENGTH: usize = 255;

/// Whether money was earned or spent.
///
/// Categories carry the same kind, and a transaction may only be filed under
/// a category of its own kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    /// Money earned.
    Income,
    /// Money spent.
    Expense,
}

impl TransactionKind {
    /// The canonical text form (`INCOME` or `EXPENSE`), as stored in the
    /// database and in CSV exports.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "INCOME",
            TransactionKind::Expense => "EXPENSE",
        }
    }
}

impl Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = Error;

    /// Case-sensitive exact match against `INCOME` and `EXPENSE`.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "INCOME" => Ok(TransactionKind::Income),
            "EXPENSE" => Ok(TransactionKind::Expense),
            other => Err(Error::UnknownTransactionKind(other.to_string())),
        }
    }
}

impl ToSql for TransactionKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;

        text.parse().map_err(|_| {
            FromSqlError::Other(Box::<dyn std::error::Error + Send + Sync>::from(format!(
                "unknown transaction kind \"{text}\""
            )))
        })
    }
}

/// An expense or income recorded against a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// Whether the money was earned or spent. Always matches the category's
    /// kind.
    pub kind: TransactionKind,
    /// The amount of money earned or spent.
    pub amount: Amount,
    /// When the transaction happened.
    pub date: Date,
    /// An optional free-text note, at most [MAX_NOTE_LENGTH] characters.
    pub note: Option<String>,
    /// The owning user. Immutable after creation.
    pub user_id: UserId,
    /// The category the transaction is filed under.
    pub category_id: CategoryId,
    /// The optional subcategory, always a child of `category_id`.
    pub subcategory_id: Option<SubcategoryId>,
}

/// The mutable fields of a transaction, supplied by the caller on create and
/// update. Category and subcategory are passed separately as IDs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDraft {
    /// Whether the money was earned or spent.
    pub kind: TransactionKind,
    /// The amount of money earned or spent.
    pub amount: Amount,
    /// When the transaction happened.
    pub date: Date,
    /// An optional free-text note.
    pub note: Option<String>,
}

/// The decimal income, expense, and balance sums for a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Totals {
    /// The sum of all income amounts.
    pub income: Decimal,
    /// The sum of all expense amounts.
    pub expense: Decimal,
    /// `income - expense`.
    pub balance: Decimal,
}

/// Retrieve a user's transactions ordered by date descending, then ID
/// descending (same-day entries list newest-inserted first).
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn list_transactions(username: &str, connection: &Connection) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(
            "SELECT t.id, t.kind, t.amount, t.date, t.note, t.user_id, t.category_id, t.subcategory_id \
             FROM tx t \
             INNER JOIN user u ON t.user_id = u.id \
             WHERE u.username = :username \
             ORDER BY t.date DESC, t.id DESC",
        )?
        .query_map(&[(":username", username)], map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(|error| error.into()))
        .collect()
}

/// Retrieve a single transaction owned by `username`.
///
/// # Errors
/// This function will return an [Error::TransactionNotFound] if no
/// transaction with `id` belongs to the user, or an [Error::SqlError] if
/// there is some other SQL error.
pub fn get_owned_transaction(
    username: &str,
    id: TransactionId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(
            "SELECT t.id, t.kind, t.amount, t.date, t.note, t.user_id, t.category_id, t.subcategory_id \
             FROM tx t \
             INNER JOIN user u ON t.user_id = u.id \
             WHERE t.id = :id AND u.username = :username",
        )?
        .query_row(
            rusqlite::named_params! {":id": id, ":username": username},
            map_transaction_row,
        )
        .optional()?
        .ok_or(Error::TransactionNotFound)
}

/// Create a transaction for `username` under the given category and optional
/// subcategory.
///
/// The full validation sequence runs before anything is persisted: the user
/// and the owned category are resolved, the category kind must match the
/// draft kind, and a given subcategory must be owned by the user and belong
/// to the selected category.
///
/// # Errors
/// This function will return an:
/// - [Error::UserNotFound] if `username` does not exist,
/// - or [Error::CategoryNotFound] / [Error::SubcategoryNotFound] if the IDs
///   do not refer to rows owned by the user,
/// - or [Error::CategoryKindMismatch] if the category kind differs from the
///   draft kind,
/// - or [Error::SubcategoryOutsideCategory] if the subcategory has a
///   different parent category,
/// - or [Error::NoteTooLong] if the note exceeds [MAX_NOTE_LENGTH],
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    username: &str,
    draft: TransactionDraft,
    category_id: CategoryId,
    subcategory_id: Option<SubcategoryId>,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let user = get_user_by_username(username, connection)?;
    let subcategory_id =
        validate_draft(username, &draft, category_id, subcategory_id, connection)?;

    connection.execute(
        "INSERT INTO tx (kind, amount, date, note, user_id, category_id, subcategory_id) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        (
            draft.kind,
            draft.amount,
            draft.date,
            &draft.note,
            user.id,
            category_id,
            subcategory_id,
        ),
    )?;

    Ok(Transaction {
        id: connection.last_insert_rowid(),
        kind: draft.kind,
        amount: draft.amount,
        date: draft.date,
        note: draft.note,
        user_id: user.id,
        category_id,
        subcategory_id,
    })
}

/// Replace the mutable fields of an owned transaction.
///
/// The same validation sequence as [create_transaction] runs against the new
/// values. The owning user is never changed.
///
/// # Errors
/// Same as [create_transaction], plus [Error::TransactionNotFound] if `id`
/// does not refer to a transaction owned by the user.
pub fn update_transaction(
    username: &str,
    id: TransactionId,
    draft: TransactionDraft,
    category_id: CategoryId,
    subcategory_id: Option<SubcategoryId>,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let existing = get_owned_transaction(username, id, connection)?;
    let subcategory_id =
        validate_draft(username, &draft, category_id, subcategory_id, connection)?;

    connection.execute(
        "UPDATE tx SET kind = ?1, amount = ?2, date = ?3, note = ?4, category_id = ?5, \
         subcategory_id = ?6 WHERE id = ?7",
        (
            draft.kind,
            draft.amount,
            draft.date,
            &draft.note,
            category_id,
            subcategory_id,
            id,
        ),
    )?;

    Ok(Transaction {
        id,
        kind: draft.kind,
        amount: draft.amount,
        date: draft.date,
        note: draft.note,
        user_id: existing.user_id,
        category_id,
        subcategory_id,
    })
}

/// Delete an owned transaction.
///
/// # Errors
/// This function will return an [Error::TransactionNotFound] if `id` does not
/// refer to a transaction owned by the user, or an [Error::SqlError] if there
/// is some other SQL error.
pub fn delete_transaction(
    username: &str,
    id: TransactionId,
    connection: &Connection,
) -> Result<(), Error> {
    let transaction = get_owned_transaction(username, id, connection)?;

    connection.execute("DELETE FROM tx WHERE id = ?1", [transaction.id])?;

    Ok(())
}

/// Sum a user's income and expense amounts over all transactions.
///
/// With zero transactions every total is `0.00`, never null.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn totals(username: &str, connection: &Connection) -> Result<Totals, Error> {
    sum_amounts(username, None, connection)
}

/// Sum a user's income and expense amounts over transactions dated on or
/// before `as_of`.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn totals_up_to(
    username: &str,
    as_of: Date,
    connection: &Connection,
) -> Result<Totals, Error> {
    sum_amounts(username, Some(as_of), connection)
}

fn sum_amounts(
    username: &str,
    as_of: Option<Date>,
    connection: &Connection,
) -> Result<Totals, Error> {
    let map_row = |row: &Row| -> Result<(TransactionKind, Amount), rusqlite::Error> {
        Ok((row.get(0)?, row.get(1)?))
    };

    // Sums are computed with decimal arithmetic in Rust because amounts are
    // stored as text; SQL SUM would fall back to floating point.
    let rows: Vec<(TransactionKind, Amount)> = match as_of {
        Some(as_of) => connection
            .prepare(
                "SELECT t.kind, t.amount FROM tx t \
                 INNER JOIN user u ON t.user_id = u.id \
                 WHERE u.username = :username AND t.date <= :as_of",
            )?
            .query_map(
                rusqlite::named_params! {":username": username, ":as_of": as_of},
                map_row,
            )?
            .collect::<Result<_, _>>()?,
        None => connection
            .prepare(
                "SELECT t.kind, t.amount FROM tx t \
                 INNER JOIN user u ON t.user_id = u.id \
                 WHERE u.username = :username",
            )?
            .query_map(&[(":username", username)], map_row)?
            .collect::<Result<_, _>>()?,
    };

    let mut income = Decimal::ZERO;
    let mut expense = Decimal::ZERO;

    for (kind, amount) in rows {
        match kind {
            TransactionKind::Income => income += amount.as_decimal(),
            TransactionKind::Expense => expense += amount.as_decimal(),
        }
    }

    income.rescale(2);
    expense.rescale(2);
    let mut balance = income - expense;
    balance.rescale(2);

    Ok(Totals {
        income,
        expense,
        balance,
    })
}

/// Resolve and check the category/subcategory references for a draft.
///
/// Returns the subcategory ID to persist (`None` when no subcategory was
/// given).
fn validate_draft(
    username: &str,
    draft: &TransactionDraft,
    category_id: CategoryId,
    subcategory_id: Option<SubcategoryId>,
    connection: &Connection,
) -> Result<Option<SubcategoryId>, Error> {
    let category = get_owned_category(username, category_id, connection)?;

    if category.kind != draft.kind {
        return Err(Error::CategoryKindMismatch);
    }

    if let Some(id) = subcategory_id {
        let subcategory = get_owned_subcategory(username, id, connection)?;

        if subcategory.category_id != category.id {
            return Err(Error::SubcategoryOutsideCategory);
        }
    }

    if let Some(note) = &draft.note
        && note.chars().count() > MAX_NOTE_LENGTH
    {
        return Err(Error::NoteTooLong);
    }

    Ok(subcategory_id)
}

/// Create the transaction table.
///
/// Foreign keys deliberately carry no `ON DELETE` actions: cascade ordering
/// is owned by [crate::cascade].
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS tx (
            id INTEGER PRIMARY KEY,
            kind TEXT NOT NULL,
            amount TEXT NOT NULL,
            date TEXT NOT NULL,
            note TEXT,
            user_id INTEGER NOT NULL,
            category_id INTEGER NOT NULL,
            subcategory_id INTEGER,
            FOREIGN KEY(user_id) REFERENCES user(id),
            FOREIGN KEY(category_id) REFERENCES category(id),
            FOREIGN KEY(subcategory_id) REFERENCES subcategory(id)
        );

        CREATE INDEX IF NOT EXISTS idx_tx_user_date ON tx(user_id, date);",
    )?;

    Ok(())
}

/// Map a database row to a [Transaction].
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        kind: row.get(1)?,
        amount: row.get(2)?,
        date: row.get(3)?,
        note: row.get(4)?,
        user_id: row.get(5)?,
        category_id: row.get(6)?,
        subcategory_id: row.get(7)?,
    })
}
