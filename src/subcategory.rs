//! Subcategories: the optional second level of the classification hierarchy,
//! each an exclusive child of one category.

use std::{fmt::Display, str::FromStr};

use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    category::get_owned_category,
    database_id::{CategoryId, SubcategoryId},
};

/// A validated, non-empty subcategory name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct SubcategoryName(String);

impl SubcategoryName {
    /// Create a subcategory name.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::EmptySubcategoryName] if `name`
    /// is an empty string.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            Err(Error::EmptySubcategoryName)
        } else {
            Ok(Self(name.to_string()))
        }
    }

    /// Create a subcategory name without validation.
    ///
    /// The caller should ensure that the string is not empty.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for SubcategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for SubcategoryName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SubcategoryName::new(s)
    }
}

impl Display for SubcategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named subdivision of a category. Names are unique within a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subcategory {
    /// The ID of the subcategory.
    pub id: SubcategoryId,
    /// The display name, unique within the parent category.
    pub name: SubcategoryName,
    /// The parent category.
    pub category_id: CategoryId,
}

/// Retrieve the subcategories under one of the user's categories, ordered by
/// name ascending.
///
/// A category that does not exist or belongs to another user yields an empty
/// list.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn list_subcategories(
    username: &str,
    category_id: CategoryId,
    connection: &Connection,
) -> Result<Vec<Subcategory>, Error> {
    connection
        .prepare(
            "SELECT s.id, s.name, s.category_id FROM subcategory s \
             INNER JOIN category c ON s.category_id = c.id \
             INNER JOIN user u ON c.user_id = u.id \
             WHERE s.category_id = :category_id AND u.username = :username \
             ORDER BY s.name ASC",
        )?
        .query_map(
            rusqlite::named_params! {":category_id": category_id, ":username": username},
            map_subcategory_row,
        )?
        .map(|maybe_subcategory| maybe_subcategory.map_err(|error| error.into()))
        .collect()
}

/// Retrieve a single subcategory owned (via its parent category) by
/// `username`.
///
/// # Errors
/// This function will return an [Error::SubcategoryNotFound] if no
/// subcategory with `id` belongs to the user, or an [Error::SqlError] if
/// there is some other SQL error.
pub fn get_owned_subcategory(
    username: &str,
    id: SubcategoryId,
    connection: &Connection,
) -> Result<Subcategory, Error> {
    connection
        .prepare(
            "SELECT s.id, s.name, s.category_id FROM subcategory s \
             INNER JOIN category c ON s.category_id = c.id \
             INNER JOIN user u ON c.user_id = u.id \
             WHERE s.id = :id AND u.username = :username",
        )?
        .query_row(
            rusqlite::named_params! {":id": id, ":username": username},
            map_subcategory_row,
        )
        .optional()?
        .ok_or(Error::SubcategoryNotFound)
}

/// Create a subcategory under one of the user's categories.
///
/// # Errors
/// This function will return an:
/// - [Error::CategoryNotFound] if `category_id` does not refer to a category
///   owned by the user,
/// - or [Error::DuplicateSubcategoryName] if the category already has a
///   subcategory with this name,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_subcategory(
    username: &str,
    category_id: CategoryId,
    name: SubcategoryName,
    connection: &Connection,
) -> Result<Subcategory, Error> {
    let category = get_owned_category(username, category_id, connection)?;

    insert_subcategory(category.id, name, connection)
}

/// Rename an owned subcategory.
///
/// # Errors
/// This function will return an [Error::SubcategoryNotFound] if `id` does not
/// refer to a subcategory owned by the user, an
/// [Error::DuplicateSubcategoryName] if the new name is already used within
/// the category, or an [Error::SqlError] if there is some other SQL error.
pub fn update_subcategory(
    username: &str,
    id: SubcategoryId,
    name: SubcategoryName,
    connection: &Connection,
) -> Result<Subcategory, Error> {
    let subcategory = get_owned_subcategory(username, id, connection)?;

    connection
        .execute(
            "UPDATE subcategory SET name = ?1 WHERE id = ?2",
            (name.as_ref(), id),
        )
        .map_err(|error| map_unique_violation(error, &name))?;

    Ok(Subcategory { name, ..subcategory })
}

/// Find a subcategory by exact name within a category, or create it.
///
/// Two callers racing on the same name are resolved by the
/// `UNIQUE(category_id, name)` constraint: the loser of the insert re-selects
/// the winner's row.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn find_or_create_subcategory(
    category_id: CategoryId,
    name: &SubcategoryName,
    connection: &Connection,
) -> Result<Subcategory, Error> {
    if let Some(subcategory) = select_by_name(category_id, name, connection)? {
        return Ok(subcategory);
    }

    tracing::debug!("creating subcategory \"{name}\" under category {category_id}");

    match insert_subcategory(category_id, name.clone(), connection) {
        Ok(subcategory) => Ok(subcategory),
        Err(Error::DuplicateSubcategoryName(_)) => select_by_name(category_id, name, connection)?
            .ok_or(Error::SubcategoryNotFound),
        Err(error) => Err(error),
    }
}

/// Create the subcategory table.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_subcategory_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS subcategory (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            category_id INTEGER NOT NULL,
            FOREIGN KEY(category_id) REFERENCES category(id),
            UNIQUE(category_id, name)
        )",
        (),
    )?;

    Ok(())
}

fn insert_subcategory(
    category_id: CategoryId,
    name: SubcategoryName,
    connection: &Connection,
) -> Result<Subcategory, Error> {
    connection
        .execute(
            "INSERT INTO subcategory (name, category_id) VALUES (?1, ?2)",
            (name.as_ref(), category_id),
        )
        .map_err(|error| map_unique_violation(error, &name))?;

    Ok(Subcategory {
        id: connection.last_insert_rowid(),
        name,
        category_id,
    })
}

fn select_by_name(
    category_id: CategoryId,
    name: &SubcategoryName,
    connection: &Connection,
) -> Result<Option<Subcategory>, Error> {
    connection
        .prepare(
            "SELECT id, name, category_id FROM subcategory \
             WHERE category_id = :category_id AND name = :name",
        )?
        .query_row(
            rusqlite::named_params! {":category_id": category_id, ":name": name.as_ref()},
            map_subcategory_row,
        )
        .optional()
        .map_err(|error| error.into())
}

fn map_unique_violation(error: rusqlite::Error, name: &SubcategoryName) -> Error {
    match error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: _,
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
            },
            _,
        ) => Error::DuplicateSubcategoryName(name.to_string()),
        error => error.into(),
    }
}

fn map_subcategory_row(row: &Row) -> Result<Subcategory, rusqlite::Error> {
    let raw_name: String = row.get(1)?;

    Ok(Subcategory {
        id: row.get(0)?,
        name: SubcategoryName::new_unchecked(&raw_name),
        category_id: row.get(2)?,
    })
}

#[cfg(test)]
mod subcategory_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        category::{Category, CategoryName, create_category},
        db::initialize,
        subcategory::{
            SubcategoryName, create_subcategory, find_or_create_subcategory,
            get_owned_subcategory, list_subcategories, update_subcategory,
        },
        transaction::TransactionKind,
        user::register_user,
    };

    fn get_test_connection_with_category() -> (Connection, Category) {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        register_user("alice", "hash", &connection).expect("Could not register test user");
        let category = create_category(
            "alice",
            CategoryName::new_unchecked("Food"),
            TransactionKind::Expense,
            &connection,
        )
        .expect("Could not create test category");

        (connection, category)
    }

    #[test]
    fn create_subcategory_succeeds() {
        let (connection, category) = get_test_connection_with_category();
        let name = SubcategoryName::new("Lunch").unwrap();

        let subcategory = create_subcategory("alice", category.id, name.clone(), &connection)
            .expect("Could not create subcategory");

        assert!(subcategory.id > 0);
        assert_eq!(subcategory.name, name);
        assert_eq!(subcategory.category_id, category.id);
    }

    #[test]
    fn create_subcategory_fails_on_unowned_category() {
        let (connection, category) = get_test_connection_with_category();
        register_user("bob", "hash", &connection).unwrap();

        let result = create_subcategory(
            "bob",
            category.id,
            SubcategoryName::new_unchecked("Lunch"),
            &connection,
        );

        assert_eq!(result, Err(Error::CategoryNotFound));
    }

    #[test]
    fn create_subcategory_fails_on_duplicate_name() {
        let (connection, category) = get_test_connection_with_category();
        let name = SubcategoryName::new_unchecked("Lunch");
        create_subcategory("alice", category.id, name.clone(), &connection).unwrap();

        let result = create_subcategory("alice", category.id, name, &connection);

        assert_eq!(
            result,
            Err(Error::DuplicateSubcategoryName("Lunch".to_string()))
        );
    }

    #[test]
    fn list_subcategories_is_ordered_by_name() {
        let (connection, category) = get_test_connection_with_category();
        let snacks = create_subcategory(
            "alice",
            category.id,
            SubcategoryName::new_unchecked("Snacks"),
            &connection,
        )
        .unwrap();
        let lunch = create_subcategory(
            "alice",
            category.id,
            SubcategoryName::new_unchecked("Lunch"),
            &connection,
        )
        .unwrap();

        let subcategories = list_subcategories("alice", category.id, &connection)
            .expect("Could not list subcategories");

        assert_eq!(subcategories, vec![lunch, snacks]);
    }

    #[test]
    fn list_subcategories_is_empty_for_other_user() {
        let (connection, category) = get_test_connection_with_category();
        register_user("bob", "hash", &connection).unwrap();
        create_subcategory(
            "alice",
            category.id,
            SubcategoryName::new_unchecked("Lunch"),
            &connection,
        )
        .unwrap();

        let subcategories = list_subcategories("bob", category.id, &connection).unwrap();

        assert!(subcategories.is_empty());
    }

    #[test]
    fn update_subcategory_renames() {
        let (connection, category) = get_test_connection_with_category();
        let subcategory = create_subcategory(
            "alice",
            category.id,
            SubcategoryName::new_unchecked("Lunch"),
            &connection,
        )
        .unwrap();

        let updated = update_subcategory(
            "alice",
            subcategory.id,
            SubcategoryName::new_unchecked("Dinner"),
            &connection,
        )
        .expect("Could not update subcategory");

        assert_eq!(updated.id, subcategory.id);
        assert_eq!(updated.name.as_ref(), "Dinner");

        let stored = get_owned_subcategory("alice", subcategory.id, &connection).unwrap();
        assert_eq!(stored, updated);
    }

    #[test]
    fn find_or_create_returns_existing_subcategory() {
        let (connection, category) = get_test_connection_with_category();
        let name = SubcategoryName::new_unchecked("Lunch");
        let existing =
            create_subcategory("alice", category.id, name.clone(), &connection).unwrap();

        let found = find_or_create_subcategory(category.id, &name, &connection)
            .expect("Could not find or create subcategory");

        assert_eq!(found, existing);
    }

    #[test]
    fn find_or_create_creates_missing_subcategory() {
        let (connection, category) = get_test_connection_with_category();
        let name = SubcategoryName::new_unchecked("Lunch");

        let created = find_or_create_subcategory(category.id, &name, &connection)
            .expect("Could not find or create subcategory");

        assert!(created.id > 0);
        assert_eq!(
            list_subcategories("alice", category.id, &connection).unwrap(),
            vec![created]
        );
    }
}
