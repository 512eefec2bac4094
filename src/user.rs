//! User accounts and their database operations.
//!
//! Password hashing happens outside this crate: callers hand in an opaque
//! hash string and get it back unchanged.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, OptionalExtension, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::{Error, database_id::UserId};

/// The role assigned to a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// A regular user, only able to see their own data.
    User,
    /// An administrator, able to manage accounts and run bulk import/export.
    Admin,
}

impl Role {
    /// The canonical text form, as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            other => Err(Error::InvalidCsv(format!("unknown role \"{other}\""))),
        }
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;

        text.parse().map_err(|_| {
            FromSqlError::Other(Box::<dyn std::error::Error + Send + Sync>::from(format!(
                "unknown role \"{text}\""
            )))
        })
    }
}

/// An account that owns categories, subcategories, and transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// The ID of the user.
    pub id: UserId,
    /// The unique username used as the ownership scope for all other rows.
    pub username: String,
    /// The hashed credential. Opaque to this crate.
    pub password_hash: String,
    /// The role of the account.
    pub role: Role,
    /// Whether the account may log in. Disabled accounts keep their data.
    pub enabled: bool,
}

/// Register a new regular user.
///
/// # Errors
/// This function will return an:
/// - [Error::EmptyUsername] if `username` is blank,
/// - or [Error::UsernameTaken] if the username already exists,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn register_user(
    username: &str,
    password_hash: &str,
    connection: &Connection,
) -> Result<User, Error> {
    create_user(username, password_hash, Role::User, true, connection)
}

/// Create a user with an explicit role and enabled flag (the admin path).
///
/// # Errors
/// Same as [register_user].
pub fn create_user(
    username: &str,
    password_hash: &str,
    role: Role,
    enabled: bool,
    connection: &Connection,
) -> Result<User, Error> {
    let username = username.trim();

    if username.is_empty() {
        return Err(Error::EmptyUsername);
    }

    connection
        .execute(
            "INSERT INTO user (username, password_hash, role, enabled) VALUES (?1, ?2, ?3, ?4)",
            (username, password_hash, role, enabled),
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                _,
            ) => Error::UsernameTaken(username.to_string()),
            error => error.into(),
        })?;

    Ok(User {
        id: connection.last_insert_rowid(),
        username: username.to_string(),
        password_hash: password_hash.to_string(),
        role,
        enabled,
    })
}

/// Update a user's role, enabled flag, and optionally their password hash
/// (the admin path).
///
/// A `None` or blank `password_hash` leaves the stored hash unchanged.
///
/// # Errors
/// This function will return an [Error::NotFound] if `id` does not refer to a
/// user, or an [Error::SqlError] if there is some other SQL error.
pub fn update_user(
    id: UserId,
    password_hash: Option<&str>,
    role: Role,
    enabled: bool,
    connection: &Connection,
) -> Result<User, Error> {
    let user = get_user(id, connection)?;

    let password_hash = match password_hash {
        Some(hash) if !hash.trim().is_empty() => hash.to_string(),
        _ => user.password_hash,
    };

    connection.execute(
        "UPDATE user SET password_hash = ?1, role = ?2, enabled = ?3 WHERE id = ?4",
        (&password_hash, role, enabled, id),
    )?;

    Ok(User {
        password_hash,
        role,
        enabled,
        ..user
    })
}

/// Whether a username is already in use.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn username_taken(username: &str, connection: &Connection) -> Result<bool, Error> {
    let count: i64 = connection.query_row(
        "SELECT COUNT(id) FROM user WHERE username = :username",
        &[(":username", username)],
        |row| row.get(0),
    )?;

    Ok(count > 0)
}

/// Retrieve a user by ID.
///
/// # Errors
/// This function will return an [Error::NotFound] if `id` does not refer to a
/// user, or an [Error::SqlError] if there is some other SQL error.
pub fn get_user(id: UserId, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, username, password_hash, role, enabled FROM user WHERE id = :id")?
        .query_row(&[(":id", &id)], map_user_row)
        .map_err(|error| error.into())
}

/// Retrieve a user by username.
///
/// # Errors
/// This function will return an [Error::UserNotFound] if no user has the
/// given username, or an [Error::SqlError] if there is some other SQL error.
pub fn get_user_by_username(username: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(
            "SELECT id, username, password_hash, role, enabled FROM user \
             WHERE username = :username",
        )?
        .query_row(&[(":username", username)], map_user_row)
        .optional()?
        .ok_or_else(|| Error::UserNotFound(username.to_string()))
}

/// Retrieve all users ordered by ID (the admin listing).
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn all_users(connection: &Connection) -> Result<Vec<User>, Error> {
    connection
        .prepare("SELECT id, username, password_hash, role, enabled FROM user ORDER BY id ASC")?
        .query_map([], map_user_row)?
        .map(|maybe_user| maybe_user.map_err(|error| error.into()))
        .collect()
}

/// Create the user table.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL,
                enabled INTEGER NOT NULL
                )",
        (),
    )?;

    Ok(())
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        role: row.get(3)?,
        enabled: row.get(4)?,
    })
}

#[cfg(test)]
mod user_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        db::initialize,
        user::{
            Role, all_users, create_user, get_user, get_user_by_username, register_user,
            update_user, username_taken,
        },
    };

    fn get_test_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        connection
    }

    #[test]
    fn register_user_succeeds() {
        let connection = get_test_connection();

        let user = register_user("alice", "hash", &connection).expect("Could not register user");

        assert!(user.id > 0);
        assert_eq!(user.username, "alice");
        assert_eq!(user.role, Role::User);
        assert!(user.enabled);
    }

    #[test]
    fn register_user_fails_on_taken_username() {
        let connection = get_test_connection();
        register_user("alice", "hash", &connection).expect("Could not register user");

        let result = register_user("alice", "other-hash", &connection);

        assert_eq!(result, Err(Error::UsernameTaken("alice".to_string())));
    }

    #[test]
    fn register_user_fails_on_blank_username() {
        let connection = get_test_connection();

        let result = register_user("  \t", "hash", &connection);

        assert_eq!(result, Err(Error::EmptyUsername));
    }

    #[test]
    fn username_taken_reflects_registration() {
        let connection = get_test_connection();

        assert!(!username_taken("alice", &connection).unwrap());

        register_user("alice", "hash", &connection).expect("Could not register user");

        assert!(username_taken("alice", &connection).unwrap());
    }

    #[test]
    fn get_user_by_username_fails_on_unknown_name() {
        let connection = get_test_connection();

        let result = get_user_by_username("nobody", &connection);

        assert_eq!(result, Err(Error::UserNotFound("nobody".to_string())));
    }

    #[test]
    fn update_user_keeps_hash_when_password_blank() {
        let connection = get_test_connection();
        let user = register_user("alice", "original-hash", &connection)
            .expect("Could not register user");

        let updated = update_user(user.id, Some("  "), Role::Admin, false, &connection)
            .expect("Could not update user");

        assert_eq!(updated.password_hash, "original-hash");
        assert_eq!(updated.role, Role::Admin);
        assert!(!updated.enabled);

        let stored = get_user(user.id, &connection).expect("Could not get user");
        assert_eq!(stored, updated);
    }

    #[test]
    fn update_user_replaces_hash_when_password_given() {
        let connection = get_test_connection();
        let user = register_user("alice", "original-hash", &connection)
            .expect("Could not register user");

        let updated = update_user(user.id, Some("new-hash"), Role::User, true, &connection)
            .expect("Could not update user");

        assert_eq!(updated.password_hash, "new-hash");
    }

    #[test]
    fn update_user_fails_on_unknown_id() {
        let connection = get_test_connection();

        let result = update_user(999, None, Role::User, true, &connection);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn all_users_is_ordered_by_id() {
        let connection = get_test_connection();
        let alice = register_user("alice", "hash", &connection).unwrap();
        let bob = create_user("bob", "hash", Role::Admin, false, &connection).unwrap();

        let users = all_users(&connection).expect("Could not list users");

        assert_eq!(users, vec![alice, bob]);
    }
}
