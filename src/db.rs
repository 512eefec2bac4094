//! Database initialization.

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};

use crate::{
    Error, category::create_category_table, subcategory::create_subcategory_table,
    transaction::create_transaction_table, user::create_user_table,
};

/// Create the application schema and enable foreign-key enforcement.
///
/// Foreign keys carry no `ON DELETE` actions: dependency-ordered removal is
/// owned by [crate::cascade], and a wrong order must surface as a constraint
/// violation rather than silently cascading.
///
/// # Errors
/// This function will return an [Error::SqlError] if the schema could not be
/// created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    // The foreign_keys pragma is per-connection and cannot be changed inside
    // a transaction.
    connection.pragma_update(None, "foreign_keys", true)?;

    let transaction =
        SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_category_table(&transaction)?;
    create_subcategory_table(&transaction)?;
    create_transaction_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

#[cfg(test)]
mod db_tests {
    use rusqlite::Connection;

    use super::initialize;

    #[test]
    fn initialize_succeeds_on_empty_database() {
        let connection = Connection::open_in_memory().unwrap();

        let result = initialize(&connection);

        assert!(result.is_ok());
    }

    #[test]
    fn initialize_is_idempotent() {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).expect("Could not initialize database");

        let result = initialize(&connection);

        assert!(result.is_ok());
    }
}
