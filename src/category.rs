//! Categories: the top level of the user's classification hierarchy, and
//! their ownership-scoped database operations.

use std::{fmt::Display, str::FromStr};

use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    database_id::{CategoryId, UserId},
    transaction::TransactionKind,
    user::get_user_by_username,
};

/// A validated, non-empty category name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct CategoryName(String);

impl CategoryName {
    /// Create a category name.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::EmptyCategoryName] if `name` is
    /// an empty string.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            Err(Error::EmptyCategoryName)
        } else {
            Ok(Self(name.to_string()))
        }
    }

    /// Create a category name without validation.
    ///
    /// The caller should ensure that the string is not empty.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for CategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CategoryName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoryName::new(s)
    }
}

impl Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named grouping for transactions of one kind, owned by one user.
///
/// (user, kind, name) uniqueness is not enforced: duplicate names are
/// tolerated, and name-based lookups take the first match by ascending ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    /// The ID of the category.
    pub id: CategoryId,
    /// The display name.
    pub name: CategoryName,
    /// The kind of transactions the category groups.
    pub kind: TransactionKind,
    /// The owning user.
    pub user_id: UserId,
}

/// Retrieve a user's categories ordered by name ascending.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn list_categories(username: &str, connection: &Connection) -> Result<Vec<Category>, Error> {
    connection
        .prepare(
            "SELECT c.id, c.name, c.kind, c.user_id FROM category c \
             INNER JOIN user u ON c.user_id = u.id \
             WHERE u.username = :username \
             ORDER BY c.name ASC",
        )?
        .query_map(&[(":username", username)], map_category_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Retrieve a user's categories of one kind, ordered by name ascending.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn list_categories_by_kind(
    username: &str,
    kind: TransactionKind,
    connection: &Connection,
) -> Result<Vec<Category>, Error> {
    connection
        .prepare(
            "SELECT c.id, c.name, c.kind, c.user_id FROM category c \
             INNER JOIN user u ON c.user_id = u.id \
             WHERE u.username = :username AND c.kind = :kind \
             ORDER BY c.name ASC",
        )?
        .query_map(
            rusqlite::named_params! {":username": username, ":kind": kind},
            map_category_row,
        )?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Retrieve a single category owned by `username`.
///
/// # Errors
/// This function will return an [Error::CategoryNotFound] if no category with
/// `id` belongs to the user, or an [Error::SqlError] if there is some other
/// SQL error.
pub fn get_owned_category(
    username: &str,
    id: CategoryId,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .prepare(
            "SELECT c.id, c.name, c.kind, c.user_id FROM category c \
             INNER JOIN user u ON c.user_id = u.id \
             WHERE c.id = :id AND u.username = :username",
        )?
        .query_row(
            rusqlite::named_params! {":id": id, ":username": username},
            map_category_row,
        )
        .optional()?
        .ok_or(Error::CategoryNotFound)
}

/// Create a category for `username`.
///
/// # Errors
/// This function will return an [Error::UserNotFound] if `username` does not
/// exist, or an [Error::SqlError] if there is some other SQL error.
pub fn create_category(
    username: &str,
    name: CategoryName,
    kind: TransactionKind,
    connection: &Connection,
) -> Result<Category, Error> {
    let user = get_user_by_username(username, connection)?;

    connection.execute(
        "INSERT INTO category (name, kind, user_id) VALUES (?1, ?2, ?3)",
        (name.as_ref(), kind, user.id),
    )?;

    Ok(Category {
        id: connection.last_insert_rowid(),
        name,
        kind,
        user_id: user.id,
    })
}

/// Update an owned category's name and kind in place.
///
/// Existing transactions under the category are not revalidated: changing the
/// kind is allowed, and the kind-match invariant is re-applied on the next
/// write to each transaction.
///
/// # Errors
/// This function will return an [Error::CategoryNotFound] if `id` does not
/// refer to a category owned by the user, or an [Error::SqlError] if there is
/// some other SQL error.
pub fn update_category(
    username: &str,
    id: CategoryId,
    name: CategoryName,
    kind: TransactionKind,
    connection: &Connection,
) -> Result<Category, Error> {
    let category = get_owned_category(username, id, connection)?;

    connection.execute(
        "UPDATE category SET name = ?1, kind = ?2 WHERE id = ?3",
        (name.as_ref(), kind, id),
    )?;

    Ok(Category {
        name,
        kind,
        ..category
    })
}

/// Find a category by exact name and kind, or create it.
///
/// The lookup is case-sensitive and scoped to (user, kind, name). Because
/// duplicate names are tolerated, the first match by ascending ID wins.
///
/// # Errors
/// This function will return an [Error::UserNotFound] if `username` does not
/// exist, or an [Error::SqlError] if there is some other SQL error.
pub fn find_or_create_category(
    username: &str,
    kind: TransactionKind,
    name: &CategoryName,
    connection: &Connection,
) -> Result<Category, Error> {
    let existing = connection
        .prepare(
            "SELECT c.id, c.name, c.kind, c.user_id FROM category c \
             INNER JOIN user u ON c.user_id = u.id \
             WHERE u.username = :username AND c.kind = :kind AND c.name = :name \
             ORDER BY c.id ASC LIMIT 1",
        )?
        .query_row(
            rusqlite::named_params! {":username": username, ":kind": kind, ":name": name.as_ref()},
            map_category_row,
        )
        .optional()?;

    match existing {
        Some(category) => Ok(category),
        None => {
            tracing::debug!("creating category \"{name}\" ({kind}) for {username}");
            create_category(username, name.clone(), kind, connection)
        }
    }
}

/// Create the category table.
///
/// (user, kind, name) deliberately has no uniqueness constraint: the
/// reference data may already contain duplicates, and
/// [find_or_create_category] resolves them by ascending ID.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            user_id INTEGER NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id)
        );

        CREATE INDEX IF NOT EXISTS idx_category_user_name ON category(user_id, name);",
    )?;

    Ok(())
}

fn map_category_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let raw_name: String = row.get(1)?;

    Ok(Category {
        id: row.get(0)?,
        name: CategoryName::new_unchecked(&raw_name),
        kind: row.get(2)?,
        user_id: row.get(3)?,
    })
}
